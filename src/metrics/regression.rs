//! Потоковые метрики регрессии.
//!
//! Каждая метрика поэлементно преобразует `(predictions, labels)` и хранит
//! взвешенное [`StreamingMean`] результата.

use super::config::{CosineDistanceConfig, MetricConfig};
use super::primitives::MetricCore;
use super::running::StreamingMean;
use super::weighting::resolve_weights;
use super::{Metric, Result};
use crate::analysis::{align, ensure_axis, ensure_same_shape};
use crate::context::MetricContext;
use crate::state::AccumulatorHandle;
use ndarray::{arr0, ArrayViewD};

macro_rules! impl_metric_for_mean {
    ($metric:ty) => {
        impl Metric for $metric {
            fn name(&self) -> &str {
                self.mean.core().name()
            }

            fn value(&self) -> f64 {
                <$metric>::value(self)
            }

            fn accumulators(&self) -> Vec<AccumulatorHandle> {
                self.mean.accumulators()
            }
        }
    };
}

/// Mean of `|prediction - label|`.
#[derive(Debug, Clone)]
pub struct MeanAbsoluteError {
    mean: StreamingMean,
}

impl MeanAbsoluteError {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "mean_absolute_error", config.name.as_deref());
        Ok(Self { mean: StreamingMean::in_scope(core)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (predictions, labels) = align("mean_absolute_error", predictions, labels)?;
        let weights = resolve_weights(backend, None, weights, predictions.shape())?;

        let diff = backend.subtract(predictions, labels)?;
        let errors = backend.abs(diff.view());
        self.mean.accumulate(errors.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl_metric_for_mean!(MeanAbsoluteError);

/// Mean of `|label - prediction| / normalizer`.
///
/// A zero normalizer is not guarded against; the resulting `inf`/`NaN`
/// propagates into the mean.
#[derive(Debug, Clone)]
pub struct MeanRelativeError {
    mean: StreamingMean,
}

impl MeanRelativeError {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "mean_relative_error", config.name.as_deref());
        Ok(Self { mean: StreamingMean::in_scope(core)? })
    }

    /// `normalizer` is squeezed and validated against `predictions` the
    /// same way `labels` is.
    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        normalizer: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (predictions, labels) = align("mean_relative_error", predictions, labels)?;
        let (predictions, normalizer) = align("mean_relative_error", predictions, normalizer)?;
        ensure_same_shape("mean_relative_error", predictions.shape(), labels.shape())?;
        let weights = resolve_weights(backend, None, weights, predictions.shape())?;

        let diff = backend.subtract(labels, predictions)?;
        let relative_errors = backend.divide(backend.abs(diff.view()).view(), normalizer)?;
        self.mean.accumulate(relative_errors.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl_metric_for_mean!(MeanRelativeError);

/// Mean of `(label - prediction)^2`.
#[derive(Debug, Clone)]
pub struct MeanSquaredError {
    mean: StreamingMean,
}

impl MeanSquaredError {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        Self::in_scope(MetricCore::new(context, "mean_squared_error", config.name.as_deref()))
    }

    fn in_scope(core: MetricCore) -> Result<Self> {
        Ok(Self { mean: StreamingMean::in_scope(core)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (predictions, labels) = align("mean_squared_error", predictions, labels)?;
        let weights = resolve_weights(backend, None, weights, predictions.shape())?;

        let diff = backend.subtract(labels, predictions)?;
        let squared = backend.square(diff.view());
        self.mean.accumulate(squared.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl_metric_for_mean!(MeanSquaredError);

/// `sqrt` of a mean squared error it owns, stored in its own scope.
#[derive(Debug, Clone)]
pub struct RootMeanSquaredError {
    mse: MeanSquaredError,
}

impl RootMeanSquaredError {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "root_mean_squared_error", config.name.as_deref());
        Ok(Self { mse: MeanSquaredError::in_scope(core)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let mse = self.mse.update(predictions, labels, weights)?;
        Ok(self.root(mse))
    }

    pub fn value(&self) -> f64 {
        self.root(self.mse.value())
    }

    fn root(&self, mean_squared: f64) -> f64 {
        let backend = self.mse.mean.core().backend();
        backend.sqrt(arr0(mean_squared).into_dyn().view()).sum()
    }
}

impl Metric for RootMeanSquaredError {
    fn name(&self) -> &str {
        self.mse.mean.core().name()
    }

    fn value(&self) -> f64 {
        RootMeanSquaredError::value(self)
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.mse.mean.accumulators()
    }
}

/// `1 - mean(Σ_dim prediction·label)`.
///
/// For unit-normalized inputs the inner sum is the cosine similarity of
/// each pair of vectors along `dim`. Before any weight is seen the value is 1.
#[derive(Debug, Clone)]
pub struct MeanCosineDistance {
    mean: StreamingMean,
    dim: usize,
}

impl MeanCosineDistance {
    pub fn new(context: &MetricContext, config: CosineDistanceConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "mean_cosine_distance", config.name.as_deref());
        Ok(Self {
            mean: StreamingMean::in_scope(core)?,
            dim: config.dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `weights` has the shape of `labels` with axis `dim` set to 1.
    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (predictions, labels) = align("mean_cosine_distance", predictions, labels)?;
        ensure_axis("mean_cosine_distance", self.dim, predictions.ndim())?;

        let products = backend.multiply(predictions, labels)?;
        let radial_diffs = backend.reduce_sum_axis(products.view(), self.dim, true)?;
        let weights = resolve_weights(backend, None, weights, radial_diffs.shape())?;

        let mean = self.mean.accumulate(radial_diffs.view(), weights.as_ref().map(|w| w.view()))?;
        Ok(1.0 - mean)
    }

    pub fn value(&self) -> f64 {
        1.0 - self.mean.value()
    }
}

impl_metric_for_mean!(MeanCosineDistance);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ShapeError;
    use crate::metrics::MetricError;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_mean_absolute_error() {
        let ctx = MetricContext::new();
        let mae = MeanAbsoluteError::new(&ctx, MetricConfig::default()).unwrap();
        let predictions = arr1(&[1.0f32, 2.0, 3.0]).into_dyn();
        let labels = arr1(&[2.0f32, 2.0, 0.0]).into_dyn();

        assert_abs_diff_eq!(mae.update(predictions.view(), labels.view(), None).unwrap(), 4.0 / 3.0, epsilon = 1e-9);

        let weights = arr1(&[0.0f32, 1.0, 1.0]).into_dyn();
        // (4 + 0 + 3) / (3 + 2)
        assert_abs_diff_eq!(
            mae.update(predictions.view(), labels.view(), Some(weights.view())).unwrap(),
            1.4,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(mae.value(), 1.4, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_relative_error() {
        let ctx = MetricContext::new();
        let mre = MeanRelativeError::new(&ctx, MetricConfig::default()).unwrap();
        let predictions = arr1(&[1.0f32, 4.0]).into_dyn();
        let labels = arr1(&[2.0f32, 2.0]).into_dyn();
        let normalizer = arr2(&[[2.0f32], [4.0]]).into_dyn();

        // (1/2 + 2/4) / 2
        let value = mre.update(predictions.view(), labels.view(), normalizer.view(), None).unwrap();
        assert_abs_diff_eq!(value, 0.5, epsilon = 1e-9);

        let short = arr1(&[1.0f32]).into_dyn();
        assert!(mre.update(predictions.view(), labels.view(), short.view(), None).is_err());
        assert_abs_diff_eq!(mre.value(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_squared_and_root_mean_squared_error() {
        let ctx = MetricContext::new();
        let mse = MeanSquaredError::new(&ctx, MetricConfig::default()).unwrap();
        let rmse = RootMeanSquaredError::new(&ctx, MetricConfig::default()).unwrap();
        let predictions = arr1(&[0.0f32, 0.0]).into_dyn();
        let labels = arr1(&[3.0f32, 4.0]).into_dyn();

        assert_eq!(mse.update(predictions.view(), labels.view(), None).unwrap(), 12.5);
        let root = rmse.update(predictions.view(), labels.view(), None).unwrap();
        assert_abs_diff_eq!(root, 12.5f64.sqrt(), epsilon = 1e-12);
        assert_eq!(rmse.value(), root);

        let names: Vec<String> = rmse.accumulators().iter().map(|h| h.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["root_mean_squared_error/total".to_string(), "root_mean_squared_error/count".to_string()]
        );
    }

    #[test]
    fn test_mean_cosine_distance() {
        let ctx = MetricContext::new();
        let metric = MeanCosineDistance::new(&ctx, CosineDistanceConfig::new().with_dim(1)).unwrap();
        assert_eq!(metric.value(), 1.0);

        let predictions = arr2(&[[1.0f32, 0.0], [0.0, 1.0], [0.6, 0.8]]).into_dyn();
        let labels = arr2(&[[1.0f32, 0.0], [1.0, 0.0], [0.6, 0.8]]).into_dyn();

        // Similarities 1, 0, 1 -> distance 1 - 2/3.
        let value = metric.update(predictions.view(), labels.view(), None).unwrap();
        assert_abs_diff_eq!(value, 1.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(metric.value(), value, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_cosine_distance_weights_use_reduced_shape() {
        let ctx = MetricContext::new();
        let metric = MeanCosineDistance::new(&ctx, CosineDistanceConfig::new().with_dim(1)).unwrap();
        let predictions = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]).into_dyn();
        let labels = arr2(&[[1.0f32, 0.0], [1.0, 0.0]]).into_dyn();

        let weights = arr2(&[[0.0f32], [1.0]]).into_dyn();
        let value = metric.update(predictions.view(), labels.view(), Some(weights.view())).unwrap();
        assert_abs_diff_eq!(value, 1.0, epsilon = 1e-9);

        let full_weights = arr2(&[[1.0f32, 1.0], [1.0, 1.0]]).into_dyn();
        assert!(matches!(
            metric.update(predictions.view(), labels.view(), Some(full_weights.view())),
            Err(MetricError::Shape(ShapeError::IncompatibleShapes { .. }))
        ));
    }

    #[test]
    fn test_mean_cosine_distance_invalid_dim() {
        let ctx = MetricContext::new();
        let metric = MeanCosineDistance::new(&ctx, CosineDistanceConfig::new().with_dim(2)).unwrap();
        let x = arr2(&[[1.0f32, 0.0]]).into_dyn();

        assert!(matches!(
            metric.update(x.view(), x.view(), None),
            Err(MetricError::Shape(ShapeError::InvalidAxis { axis: 2, rank: 2, .. }))
        ));
    }
}
