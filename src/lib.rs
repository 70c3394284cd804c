//! # RustyMetrics: streaming evaluation metrics in Rust
//!
//! **RustyMetrics** keeps running metric values over a stream of batches
//! without ever revisiting earlier batches. All state lives in named
//! accumulators inside an [`AccumulatorStore`](state::AccumulatorStore);
//! metrics only increment them and read them back.
//!
//! ## Usage Example
//!
//! ```
//! use ndarray::arr1;
//! use rustymetrics::context::MetricContext;
//! use rustymetrics::metrics::{AucConfig, Auc, MetricConfig, Precision};
//!
//! // 1. One context per evaluation run: store + array backend
//! let ctx = MetricContext::new().scoped("eval");
//!
//! // 2. Build metrics; their accumulators are created zeroed
//! let precision = Precision::new(&ctx, MetricConfig::default()).unwrap();
//! let auc = Auc::new(&ctx, AucConfig::new().with_num_thresholds(100)).unwrap();
//!
//! // 3. Feed batches
//! let scores = arr1(&[0.1f32, 0.4, 0.35, 0.8]).into_dyn();
//! let predicted = arr1(&[0.0f32, 0.0, 0.0, 1.0]).into_dyn();
//! let labels = arr1(&[0.0f32, 0.0, 1.0, 1.0]).into_dyn();
//! precision.update(predicted.view(), labels.view(), None).unwrap();
//! let current_auc = auc.update(scores.view(), labels.view(), None).unwrap();
//!
//! // 4. Read without mutating
//! assert_eq!(precision.value(), 1.0);
//! assert_eq!(auc.value(), current_auc);
//!
//! // Every accumulator is listed under its full name, e.g. "eval/auc/true_positives/count"
//! assert!(ctx.store().contains("eval/precision/true_positives/count"));
//! ```

// Declare public modules that constitute the core library API.
pub mod analysis;
pub mod context;
pub mod metrics;
pub mod runtime;
pub mod state;
