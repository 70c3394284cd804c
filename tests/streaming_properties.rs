//! Интеграционные тесты потоковых свойств метрик: update/value, идемпотентность,
//! независимость областей, конкурентные обновления и сброс состояния.

use rustymetrics::context::MetricContext;
use rustymetrics::metrics::{
    Accuracy, Auc, AucConfig, MeanAbsoluteError, MeanSquaredError, Metric, MetricConfig, MetricError,
    PercentageLess, PercentageLessConfig, Precision, Recall, RecallAtK, RecallAtKConfig, StreamingMean,
};
use rustymetrics::state::{AccumulatorShape, AccumulatorSnapshot};

use approx::assert_abs_diff_eq;
use ndarray::{arr1, Array1, Array2, ArrayD};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

const BATCHES: usize = 8;
const BATCH_SIZE: usize = 32;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_batch(rng: &mut StdRng) -> (ArrayD<f32>, ArrayD<f32>) {
    let scores = Array1::random_using(BATCH_SIZE, Uniform::new(0.0f32, 1.0), &mut *rng).into_dyn();
    let labels = Array1::random_using(BATCH_SIZE, Uniform::new(0.0f32, 1.0), &mut *rng)
        .mapv(|x| if x > 0.5 { 1.0 } else { 0.0 })
        .into_dyn();
    (scores, labels)
}

/// Проверяет контракт: значение, возвращённое update, равно следующему value().
fn assert_update_matches_value(metric: &dyn Metric, updated: f64) {
    assert_eq!(metric.value(), updated, "value() of '{}' differs from update()", metric.name());
    assert_eq!(metric.value(), metric.value(), "value() of '{}' is not idempotent", metric.name());
}

#[test]
fn test_update_then_value_on_random_batches() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(7);
    let ctx = MetricContext::new();

    let mean = StreamingMean::new(&ctx, MetricConfig::default()).unwrap();
    let accuracy = Accuracy::new(&ctx, MetricConfig::default()).unwrap();
    let precision = Precision::new(&ctx, MetricConfig::default()).unwrap();
    let recall = Recall::new(&ctx, MetricConfig::default()).unwrap();
    let mae = MeanAbsoluteError::new(&ctx, MetricConfig::default()).unwrap();
    let below = PercentageLess::new(&ctx, PercentageLessConfig::new().with_threshold(0.5)).unwrap();
    let auc = Auc::new(&ctx, AucConfig::default()).unwrap();

    for _ in 0..BATCHES {
        let (scores, labels) = random_batch(&mut rng);
        let predicted = scores.mapv(|s| if s > 0.5 { 1.0 } else { 0.0 });

        let v = mean.update(scores.view(), None).unwrap();
        assert_update_matches_value(&mean, v);
        let v = accuracy.update(predicted.view(), labels.view(), None).unwrap();
        assert_update_matches_value(&accuracy, v);
        let v = precision.update(predicted.view(), labels.view(), None).unwrap();
        assert_update_matches_value(&precision, v);
        let v = recall.update(predicted.view(), labels.view(), None).unwrap();
        assert_update_matches_value(&recall, v);
        let v = mae.update(scores.view(), labels.view(), None).unwrap();
        assert_update_matches_value(&mae, v);
        let v = below.update(scores.view(), None).unwrap();
        assert_update_matches_value(&below, v);
        let v = auc.update(scores.view(), labels.view(), None).unwrap();
        assert_update_matches_value(&auc, v);
        assert!((0.0..=1.0 + 1e-9).contains(&v));
    }
}

#[test]
fn test_streaming_mean_equals_mean_of_all_batches() {
    let mut rng = StdRng::seed_from_u64(11);
    let ctx = MetricContext::new();
    let mean = StreamingMean::new(&ctx, MetricConfig::default()).unwrap();

    let mut seen = Vec::new();
    for _ in 0..BATCHES {
        let (scores, _) = random_batch(&mut rng);
        mean.update(scores.view(), None).unwrap();
        seen.extend(scores.iter().map(|&x| x as f64));
    }

    let expected = seen.iter().sum::<f64>() / seen.len() as f64;
    assert_abs_diff_eq!(mean.value(), expected, epsilon = 1e-5);
}

#[test]
fn test_distinct_scopes_are_independent() {
    let ctx = MetricContext::new();
    let train = ctx.scoped("train");
    let eval = ctx.scoped("eval");

    let train_acc = Accuracy::new(&train, MetricConfig::default()).unwrap();
    let eval_acc = Accuracy::new(&eval, MetricConfig::default()).unwrap();
    let ones = arr1(&[1.0f32, 1.0]).into_dyn();
    let zeros = arr1(&[0.0f32, 0.0]).into_dyn();

    train_acc.update(ones.view(), ones.view(), None).unwrap();
    eval_acc.update(ones.view(), zeros.view(), None).unwrap();
    train_acc.update(zeros.view(), zeros.view(), None).unwrap();

    assert_eq!(train_acc.value(), 1.0);
    assert_eq!(eval_acc.value(), 0.0);
    assert_eq!(train_acc.name(), "train/accuracy");
    assert_eq!(eval_acc.name(), "eval/accuracy");
}

#[test]
fn test_same_explicit_name_shares_state() {
    let ctx = MetricContext::new();
    let a = StreamingMean::new(&ctx, MetricConfig::new().with_name("shared")).unwrap();
    let b = StreamingMean::new(&ctx, MetricConfig::new().with_name("shared")).unwrap();

    a.update(arr1(&[2.0f32]).into_dyn().view(), None).unwrap();
    assert_eq!(b.value(), 2.0);
}

#[test]
fn test_default_name_never_reuses_explicit_scope() {
    let ctx = MetricContext::new();
    let ones = arr1(&[1.0f32, 1.0]).into_dyn();
    let zeros = arr1(&[0.0f32, 0.0]).into_dyn();

    let explicit = Accuracy::new(&ctx, MetricConfig::new().with_name("accuracy")).unwrap();
    explicit.update(ones.view(), ones.view(), None).unwrap();
    let default = Accuracy::new(&ctx, MetricConfig::default()).unwrap();
    assert_eq!(default.name(), "accuracy_1");
    assert_eq!(default.value(), 0.0);
    default.update(ones.view(), zeros.view(), None).unwrap();
    assert_eq!(explicit.value(), 1.0);

    let taken = StreamingMean::new(&ctx, MetricConfig::new().with_name("mean_1")).unwrap();
    taken.update(arr1(&[5.0f32]).into_dyn().view(), None).unwrap();
    let first = StreamingMean::new(&ctx, MetricConfig::default()).unwrap();
    let second = StreamingMean::new(&ctx, MetricConfig::default()).unwrap();
    assert_eq!(first.name(), "mean");
    assert_eq!(second.name(), "mean_2");
    assert_eq!(second.value(), 0.0);
}

#[test]
fn test_shared_scope_updates_are_serialized() {
    let ctx = MetricContext::new();
    let a = StreamingMean::new(&ctx, MetricConfig::new().with_name("shared")).unwrap();
    let b = StreamingMean::new(&ctx, MetricConfig::new().with_name("shared")).unwrap();
    let one = arr1(&[1.0f32]).into_dyn();

    // Every consistent (total, count) pair has mean exactly 1.
    std::thread::scope(|s| {
        for i in 0..4 {
            let metric = if i % 2 == 0 { &a } else { &b };
            let one = &one;
            s.spawn(move || {
                for _ in 0..2000 {
                    assert_eq!(metric.update(one.view(), None).unwrap(), 1.0);
                    assert_eq!(metric.value(), 1.0);
                }
            });
        }
    });

    let count = ctx.store().list().into_iter().find(|s| s.name == "shared/count").unwrap();
    assert_eq!(count.value, vec![8000.0]);
}

#[test]
fn test_mismatched_mask_is_rejected_without_state_change() {
    let ctx = MetricContext::new();
    let auc = Auc::new(&ctx, AucConfig::new().with_num_thresholds(10)).unwrap();
    let below = PercentageLess::new(&ctx, PercentageLessConfig::new().with_threshold(0.5)).unwrap();
    let scores = arr1(&[0.2f32, 0.8, 0.6]).into_dyn();
    let labels = arr1(&[0.0f32, 1.0, 1.0]).into_dyn();
    auc.update(scores.view(), labels.view(), None).unwrap();
    below.update(scores.view(), None).unwrap();
    let before = ctx.store().list();
    let (auc_before, below_before) = (auc.value(), below.value());

    let short_mask = arr1(&[false, true]).into_dyn();
    let err = auc.update(scores.view(), labels.view(), Some(short_mask.view())).unwrap_err();
    assert!(matches!(err, MetricError::Shape(_)));
    let err = below.update(scores.view(), Some(short_mask.view())).unwrap_err();
    assert!(matches!(err, MetricError::Shape(_)));

    assert_eq!(ctx.store().list(), before);
    assert_eq!(auc.value(), auc_before);
    assert_eq!(below.value(), below_before);
}

#[test]
fn test_explicit_name_with_different_shape_conflicts() {
    let ctx = MetricContext::new();
    let config = AucConfig::new().with_name("roc");
    Auc::new(&ctx, config.clone().with_num_thresholds(10)).unwrap();

    let err = Auc::new(&ctx, config.with_num_thresholds(20)).unwrap_err();
    assert!(matches!(err, MetricError::State(_)));
}

#[test]
fn test_failed_update_leaves_state_untouched() {
    let ctx = MetricContext::new();
    let mse = MeanSquaredError::new(&ctx, MetricConfig::default()).unwrap();
    let predictions = arr1(&[0.0f32, 0.0]).into_dyn();
    let labels = arr1(&[3.0f32, 4.0]).into_dyn();
    mse.update(predictions.view(), labels.view(), None).unwrap();
    let before = ctx.store().list();

    let bad_labels = arr1(&[1.0f32, 2.0, 3.0]).into_dyn();
    assert!(mse.update(predictions.view(), bad_labels.view(), None).is_err());
    let bad_weights = arr1(&[1.0f32]).into_dyn();
    assert!(mse.update(predictions.view(), labels.view(), Some(bad_weights.view())).is_err());

    assert_eq!(ctx.store().list(), before);
    assert_eq!(mse.value(), 12.5);
}

#[test]
fn test_reset_all_returns_metrics_to_zero() {
    let ctx = MetricContext::new();
    let accuracy = Accuracy::new(&ctx, MetricConfig::default()).unwrap();
    let auc = Auc::new(&ctx, AucConfig::new().with_num_thresholds(20)).unwrap();
    let scores = arr1(&[0.1f32, 0.9]).into_dyn();
    let labels = arr1(&[0.0f32, 1.0]).into_dyn();

    accuracy.update(labels.view(), labels.view(), None).unwrap();
    auc.update(scores.view(), labels.view(), None).unwrap();
    assert!(accuracy.value() > 0.0 && auc.value() > 0.0);

    ctx.store().reset_all();
    assert_eq!(accuracy.value(), 0.0);
    assert_eq!(auc.value(), 0.0);

    // Handles survive the reset.
    assert_eq!(accuracy.update(labels.view(), labels.view(), None).unwrap(), 1.0);
}

#[test]
fn test_concurrent_updates_lose_nothing() {
    init_logger();
    let ctx = MetricContext::new();
    let mean = StreamingMean::new(&ctx, MetricConfig::default()).unwrap();
    let recall_at_k = RecallAtK::new(&ctx, RecallAtKConfig::new().with_k(1)).unwrap();

    let values = arr1(&[1.0f32, 2.0, 3.0]).into_dyn();
    let scores = Array2::from_shape_vec((2, 2), vec![0.9f32, 0.1, 0.2, 0.8]).unwrap();
    let targets = arr1(&[0i64, 0]);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..250 {
                    mean.update(values.view(), None).unwrap();
                    recall_at_k.update(scores.view(), targets.view(), None).unwrap();
                }
            });
        }
    });

    let count = ctx.store().list().into_iter().find(|s| s.name == "mean/count").unwrap();
    assert_eq!(count.value, vec![3000.0]);
    assert_eq!(mean.value(), 2.0);
    assert_eq!(recall_at_k.value(), 0.5);
}

#[test]
fn test_snapshot_serializes() {
    let ctx = MetricContext::new();
    let mean = StreamingMean::new(&ctx, MetricConfig::new().with_name("loss")).unwrap();
    mean.update(arr1(&[1.0f32, 2.0]).into_dyn().view(), None).unwrap();

    let snapshots = ctx.store().list();
    let json = serde_json::to_string(&snapshots).unwrap();
    let restored: Vec<AccumulatorSnapshot> = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, snapshots);
    assert_eq!(restored[0].name, "loss/count");
    assert_eq!(restored[0].shape, AccumulatorShape::Scalar);
    assert_eq!(restored[1].value, vec![3.0]);
}

#[test]
fn test_config_from_partial_json() {
    let config: AucConfig = serde_json::from_str(r#"{"name": "val_auc"}"#).unwrap();
    assert_eq!(config.num_thresholds, 200);
    assert_eq!(config.name.as_deref(), Some("val_auc"));

    let config: RecallAtKConfig = serde_json::from_str(r#"{"k": 5}"#).unwrap();
    assert_eq!(config.k, 5);
    assert!(config.name.is_none());
}
