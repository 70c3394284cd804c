//! Потоковые средние значения.
//!
//! [`StreamingMean`] - основа всех метрик семейства средних: accuracy,
//! метрики ошибок, recall@k и [`PercentageLess`] передают в него
//! преобразованный батч.

use super::config::{MetricConfig, PercentageLessConfig};
use super::primitives::{MetricCore, TotalCount};
use super::weighting::resolve_weights;
use super::{Metric, Result};
use crate::context::MetricContext;
use crate::state::AccumulatorHandle;
use ndarray::ArrayViewD;

/// Weighted running mean: `total / count`, 0 before any weight is seen.
#[derive(Debug, Clone)]
pub struct StreamingMean {
    core: MetricCore,
    mean: TotalCount,
}

impl StreamingMean {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        Self::in_scope(MetricCore::new(context, "mean", config.name.as_deref()))
    }

    /// Builds the mean directly in `core`'s scope. Used by the metrics that
    /// are a mean of some per-element transform.
    pub(crate) fn in_scope(core: MetricCore) -> Result<Self> {
        let mean = TotalCount::new(core.store(), core.name())?;
        Ok(Self { core, mean })
    }

    /// `weights`, when given, must have the shape of `values`.
    pub fn update(&self, values: ArrayViewD<'_, f32>, weights: Option<ArrayViewD<'_, f32>>) -> Result<f64> {
        let weights = resolve_weights(self.core.backend(), None, weights, values.shape())?;
        self.accumulate(values, weights.as_ref().map(|w| w.view()))
    }

    /// Weights must already be resolved and shape-checked.
    pub(crate) fn accumulate(&self, values: ArrayViewD<'_, f32>, weights: Option<ArrayViewD<'_, f32>>) -> Result<f64> {
        let delta = self.mean.prepare(self.core.backend(), values, weights)?;

        let _guard = self.core.lock();
        let value = self.mean.commit(self.core.store(), delta)?;
        log::trace!("{}: total += {}, count += {} -> {}", self.core.name(), delta.total, delta.count, value);
        Ok(value)
    }

    pub fn value(&self) -> f64 {
        let _guard = self.core.lock();
        self.mean.value(self.core.store())
    }

    pub(crate) fn core(&self) -> &MetricCore {
        &self.core
    }
}

impl Metric for StreamingMean {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn value(&self) -> f64 {
        StreamingMean::value(self)
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.mean.handles()
    }
}

/// Fraction of (unmasked) values strictly below a threshold.
#[derive(Debug, Clone)]
pub struct PercentageLess {
    mean: StreamingMean,
    threshold: f32,
}

impl PercentageLess {
    pub fn new(context: &MetricContext, config: PercentageLessConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "percentage_below_threshold", config.name.as_deref());
        Ok(Self {
            mean: StreamingMean::in_scope(core)?,
            threshold: config.threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Masked values (`true` in `ignore_mask`) are left out of both the
    /// numerator and the denominator.
    pub fn update(&self, values: ArrayViewD<'_, f32>, ignore_mask: Option<ArrayViewD<'_, bool>>) -> Result<f64> {
        let backend = self.mean.core().backend();
        let weights = resolve_weights(backend, ignore_mask, None, values.shape())?;
        let is_below = backend.less_scalar(values, self.threshold);
        let is_below = backend.cast_to_float(is_below.view());
        self.mean.accumulate(is_below.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl Metric for PercentageLess {
    fn name(&self) -> &str {
        self.mean.core().name()
    }

    fn value(&self) -> f64 {
        self.mean.value()
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.mean.accumulators()
    }
}
