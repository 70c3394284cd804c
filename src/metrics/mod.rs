//! Модуль потоковых метрик.
//!
//! Каждая метрика хранит своё состояние в именованных аккумуляторах
//! [`AccumulatorStore`](crate::state::AccumulatorStore) и предоставляет две операции:
//! - `update(batch)` - добавляет батч к аккумуляторам и возвращает новое значение;
//! - `value()` - читает текущее значение, не изменяя состояние.
//!
//! Значение, возвращённое `update`, совпадает с тем, что вернёт следующий `value()`.
//!
//! - **Классификация**: Accuracy, Precision, Recall, RecallAtK, AUC
//! - **Регрессия**: MAE, MRE, MSE, RMSE, косинусное расстояние
//! - **Общие**: StreamingMean, PercentageLess
//!
//! # Пример использования
//!
//! ```rust
//! use ndarray::arr1;
//! use rustymetrics::context::MetricContext;
//! use rustymetrics::metrics::{Accuracy, MetricConfig};
//!
//! let ctx = MetricContext::new();
//! let accuracy = Accuracy::new(&ctx, MetricConfig::default()).unwrap();
//!
//! let predictions = arr1(&[1.0f32, 0.0, 1.0, 1.0]).into_dyn();
//! let labels = arr1(&[1.0f32, 0.0, 0.0, 1.0]).into_dyn();
//! let updated = accuracy.update(predictions.view(), labels.view(), None).unwrap();
//!
//! assert_eq!(updated, 0.75);
//! assert_eq!(accuracy.value(), updated);
//! ```

pub mod auc;
pub mod classification;
pub mod collection;
pub mod config;
pub mod primitives;
pub mod regression;
pub mod running;
pub mod weighting;

pub use auc::Auc;
pub use classification::{Accuracy, Precision, Recall, RecallAtK};
pub use collection::{MetricCollection, MetricValue};
pub use config::{AucConfig, CosineDistanceConfig, MetricConfig, PercentageLessConfig, RecallAtKConfig};
pub use primitives::{ConfusionCounter, ConfusionKind, Count, TotalCount};
pub use regression::{
    MeanAbsoluteError, MeanCosineDistance, MeanRelativeError, MeanSquaredError, RootMeanSquaredError,
};
pub use running::{PercentageLess, StreamingMean};
pub use weighting::resolve_weights;

use crate::analysis::ShapeError;
use crate::runtime::RuntimeError;
use crate::state::{AccumulatorHandle, StateError};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Ошибка формы: {0}")]
    Shape(#[from] ShapeError),

    #[error("Ошибка аккумулятора: {0}")]
    State(#[from] StateError),

    #[error("Ошибка операции над массивом: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Переданы одновременно маска игнорирования и веса. Передайте не более одного из них.")]
    ConflictingWeighting,

    #[error("Неверная конфигурация метрики: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MetricError>;

/// Базовый трейт для всех потоковых метрик.
///
/// Трейт объектно-безопасен: `update` у каждой метрики своя сигнатура,
/// поэтому здесь только то, что нужно реестру и инспекции.
pub trait Metric: Send + Sync + fmt::Debug {
    /// Полное имя области (scope) метрики.
    fn name(&self) -> &str;

    /// Текущее значение. Не изменяет состояние.
    fn value(&self) -> f64;

    /// Аккумуляторы, в которых живёт состояние метрики.
    fn accumulators(&self) -> Vec<AccumulatorHandle>;
}

/// `numerator / denominator`, либо 0, если знаменатель не положителен.
pub(crate) fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
