//! Streaming evaluation example - scoring a noisy binary classifier batch by batch.
//!
//! This example demonstrates:
//! - Creating a metric context with a scope per evaluation run
//! - Updating several metrics from the same stream of batches
//! - Reading all values through a metric collection
//! - Listing and resetting the accumulators
//!
//! Run with: `RUST_LOG=debug cargo run --example streaming_eval`

use ndarray::{Array1, Array2, ArrayD, Axis};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustymetrics::context::MetricContext;
use rustymetrics::metrics::{
    Accuracy, Auc, AucConfig, MetricCollection, MetricConfig, Precision, Recall, RecallAtK, RecallAtKConfig,
    RootMeanSquaredError,
};
use std::sync::Arc;

const NUM_BATCHES: usize = 20;
const BATCH_SIZE: usize = 64;
const NUM_CLASSES: usize = 5;

/// Labels are coin flips; scores lean towards the label with Gaussian noise.
fn make_batch(rng: &mut StdRng) -> (ArrayD<f32>, ArrayD<f32>) {
    let labels = Array1::random_using(BATCH_SIZE, Uniform::new(0.0f32, 1.0), &mut *rng).mapv(|x| x.round());
    let noise = Array1::random_using(BATCH_SIZE, Normal::new(0.0f32, 0.25).unwrap(), &mut *rng);
    let scores = (&labels * 0.5 + 0.25 + &noise).mapv(|x| x.clamp(0.0, 1.0));
    (scores.into_dyn(), labels.into_dyn())
}

fn main() {
    env_logger::init();
    println!("=== RustyMetrics Streaming Evaluation Example ===\n");

    let mut rng = StdRng::seed_from_u64(42);
    let ctx = MetricContext::new().scoped("eval");
    let registry = MetricCollection::new();

    let accuracy = Arc::new(Accuracy::new(&ctx, MetricConfig::default()).unwrap());
    let precision = Arc::new(Precision::new(&ctx, MetricConfig::default()).unwrap());
    let recall = Arc::new(Recall::new(&ctx, MetricConfig::default()).unwrap());
    let auc = Arc::new(Auc::new(&ctx, AucConfig::default()).unwrap());
    let rmse = Arc::new(RootMeanSquaredError::new(&ctx, MetricConfig::default()).unwrap());
    let top2 = Arc::new(RecallAtK::new(&ctx, RecallAtKConfig::new().with_k(2)).unwrap());

    registry.register("binary", accuracy.clone());
    registry.register("binary", precision.clone());
    registry.register("binary", recall.clone());
    registry.register("binary", auc.clone());
    registry.register("binary", rmse.clone());
    registry.register("multiclass", top2.clone());

    for batch in 0..NUM_BATCHES {
        let (scores, labels) = make_batch(&mut rng);
        let predicted = scores.mapv(|s| if s > 0.5 { 1.0 } else { 0.0 });

        accuracy.update(predicted.view(), labels.view(), None).unwrap();
        precision.update(predicted.view(), labels.view(), None).unwrap();
        recall.update(predicted.view(), labels.view(), None).unwrap();
        rmse.update(scores.view(), labels.view(), None).unwrap();
        let current_auc = auc.update(scores.view(), labels.view(), None).unwrap();

        let class_scores = Array2::random_using((BATCH_SIZE, NUM_CLASSES), Uniform::new(0.0f32, 1.0), &mut rng);
        let targets = class_scores
            .map_axis(Axis(1), |row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
                    .0 as i64
            })
            .mapv(|class| (class + (batch as i64 % 3)) % NUM_CLASSES as i64);
        top2.update(class_scores.view(), targets.view(), None).unwrap();

        if batch % 5 == 4 {
            println!("Batch {:>2}: accuracy = {:.4}, auc = {:.4}", batch + 1, accuracy.value(), current_auc);
        }
    }

    println!("\n--- Final values ---");
    for collection in registry.collections() {
        for metric in registry.values(&collection) {
            println!("[{}] {:<40} {:.4}", collection, metric.name, metric.value);
        }
    }

    println!("\n--- Accumulators ---");
    for snapshot in ctx.store().list() {
        let preview: Vec<f64> = snapshot.value.iter().take(3).copied().collect();
        println!("{:<45} {:<7} {:?}", snapshot.name, snapshot.shape.to_string(), preview);
    }

    ctx.store().reset_all();
    println!("\nAfter reset: accuracy = {:.4}, auc = {:.4}", accuracy.value(), auc.value());
}
