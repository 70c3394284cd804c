//! Потоковые метрики классификации.
//!
//! Предсказания и метки - массивы `f32` одной формы (после правила
//! squeeze). Precision и recall считают `1` положительным классом, а `0`
//! отрицательным; остальные значения не попадают ни в одну ячейку матрицы ошибок.

use super::config::{MetricConfig, RecallAtKConfig};
use super::primitives::{ConfusionCounter, ConfusionKind, MetricCore};
use super::running::StreamingMean;
use super::weighting::resolve_weights;
use super::{safe_div, Metric, Result};
use crate::analysis::{align, ensure_same_shape};
use crate::context::MetricContext;
use crate::state::AccumulatorHandle;
use ndarray::{ArrayView1, ArrayView2, ArrayViewD};

/// Weighted fraction of positions where `prediction == label`.
#[derive(Debug, Clone)]
pub struct Accuracy {
    mean: StreamingMean,
}

impl Accuracy {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "accuracy", config.name.as_deref());
        Ok(Self { mean: StreamingMean::in_scope(core)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (predictions, labels) = align("accuracy", predictions, labels)?;
        let weights = resolve_weights(backend, None, weights, predictions.shape())?;

        let is_correct = backend.equal(predictions, labels)?;
        let is_correct = backend.cast_to_float(is_correct.view());
        self.mean.accumulate(is_correct.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl Metric for Accuracy {
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

/// A ratio `hits / (hits + misses)` of two confusion counters.
///
/// Precision is `TP / (TP + FP)`, recall is `TP / (TP + FN)`.
#[derive(Debug, Clone)]
struct ConfusionRatio {
    core: MetricCore,
    hits: ConfusionCounter,
    misses: ConfusionCounter,
}

impl ConfusionRatio {
    fn new(core: MetricCore, misses: ConfusionKind) -> Result<Self> {
        let hits = ConfusionCounter::new(core.store(), core.name(), ConfusionKind::TruePositive)?;
        let misses = ConfusionCounter::new(core.store(), core.name(), misses)?;
        Ok(Self { core, hits, misses })
    }

    fn update(
        &self,
        op: &str,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        ignore_mask: Option<ArrayViewD<'_, bool>>,
    ) -> Result<f64> {
        let backend = self.core.backend();
        let (predictions, labels) = align(op, predictions, labels)?;
        let weights = resolve_weights(backend, ignore_mask, None, predictions.shape())?;
        let weights = weights.as_ref().map(|w| w.view());

        let hits = self.hits.prepare(backend, predictions.view(), labels.view(), weights.clone())?;
        let misses = self.misses.prepare(backend, predictions, labels, weights)?;

        let _guard = self.core.lock();
        let hits = self.hits.commit(self.core.store(), &hits)?[0];
        let misses = self.misses.commit(self.core.store(), &misses)?[0];
        let value = safe_div(hits, hits + misses);
        log::trace!("{}: {} hits, {} misses -> {}", self.core.name(), hits, misses, value);
        Ok(value)
    }

    fn value(&self) -> f64 {
        let _guard = self.core.lock();
        let hits = self.hits.value(self.core.store());
        let misses = self.misses.value(self.core.store());
        safe_div(hits, hits + misses)
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        vec![self.hits.handle().clone(), self.misses.handle().clone()]
    }
}

/// Streaming precision, `TP / (TP + FP)`.
#[derive(Debug, Clone)]
pub struct Precision {
    ratio: ConfusionRatio,
}

impl Precision {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "precision", config.name.as_deref());
        Ok(Self { ratio: ConfusionRatio::new(core, ConfusionKind::FalsePositive)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        ignore_mask: Option<ArrayViewD<'_, bool>>,
    ) -> Result<f64> {
        self.ratio.update("precision", predictions, labels, ignore_mask)
    }

    pub fn value(&self) -> f64 {
        self.ratio.value()
    }
}

impl Metric for Precision {
    fn name(&self) -> &str {
        self.ratio.core.name()
    }

    fn value(&self) -> f64 {
        self.ratio.value()
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.ratio.accumulators()
    }
}

/// Streaming recall, `TP / (TP + FN)`.
#[derive(Debug, Clone)]
pub struct Recall {
    ratio: ConfusionRatio,
}

impl Recall {
    pub fn new(context: &MetricContext, config: MetricConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "recall", config.name.as_deref());
        Ok(Self { ratio: ConfusionRatio::new(core, ConfusionKind::FalseNegative)? })
    }

    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        ignore_mask: Option<ArrayViewD<'_, bool>>,
    ) -> Result<f64> {
        self.ratio.update("recall", predictions, labels, ignore_mask)
    }

    pub fn value(&self) -> f64 {
        self.ratio.value()
    }
}

impl Metric for Recall {
    fn name(&self) -> &str {
        self.ratio.core.name()
    }

    fn value(&self) -> f64 {
        self.ratio.value()
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.ratio.accumulators()
    }
}

/// Fraction of rows whose label is among the `k` highest-scoring classes.
#[derive(Debug, Clone)]
pub struct RecallAtK {
    mean: StreamingMean,
    k: usize,
}

impl RecallAtK {
    pub fn new(context: &MetricContext, config: RecallAtKConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "recall_at_k", config.name.as_deref());
        Ok(Self {
            mean: StreamingMean::in_scope(core)?,
            k: config.k,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// `predictions` is `[batch, num_classes]`, `labels` and `ignore_mask`
    /// are `[batch]`. A label outside `[0, num_classes)` is a miss.
    pub fn update(
        &self,
        predictions: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, i64>,
        ignore_mask: Option<ArrayView1<'_, bool>>,
    ) -> Result<f64> {
        let backend = self.mean.core().backend();
        let (batch, num_classes) = predictions.dim();
        ensure_same_shape("recall_at_k", &[batch], labels.shape())?;
        let weights = resolve_weights(backend, ignore_mask.map(|m| m.into_dyn()), None, &[batch])?;

        let out_of_range = labels.iter().filter(|&&l| l < 0 || l as usize >= num_classes).count();
        if out_of_range > 0 {
            log::warn!(
                "{}: {} of {} labels are outside [0, {}) and count as misses",
                self.mean.core().name(),
                out_of_range,
                batch,
                num_classes
            );
        }

        let in_top_k = backend.in_top_k(predictions, labels, self.k)?;
        let in_top_k = backend.cast_to_float(in_top_k.view());
        self.mean.accumulate(in_top_k.view(), weights.as_ref().map(|w| w.view()))
    }

    pub fn value(&self) -> f64 {
        self.mean.value()
    }
}

impl Metric for RecallAtK {
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
