//! Площадь под ROC-кривой, приближённая перебором порогов.
//!
//! Диапазон оценок делится на `num_thresholds` равноотстоящих точек на
//! `[-1e-7, 1 + 1e-7]`. Каждый порог задаёт бинарный классификатор
//! (`score > threshold`), а четыре вектора матрицы ошибок хранят по одной
//! ячейке на порог. Кривая затем интегрируется методом трапеций.
//!
//! ```text
//! thresholds  [T]        predictions [n]
//!      |                      |
//!  reshape [T,1]          reshape [n,1] -> transpose [1,n]
//!  tile [T,n]             tile [T,n]
//!      \______ greater ______/
//!               |
//!   TP/FP/FN/TN indicators [T,n] -> sum over n -> four [T] deltas
//! ```

use super::config::AucConfig;
use super::primitives::{ConfusionCounter, ConfusionKind, MetricCore};
use super::weighting::resolve_weights;
use super::{Metric, Result};
use crate::analysis::{align, ensure_rank};
use crate::context::MetricContext;
use crate::runtime::Backend;
use crate::state::AccumulatorHandle;
use ndarray::{ArrayD, ArrayViewD};

/// Pushes the extreme thresholds just outside `[0, 1]`, so the first one
/// classifies every score as positive and the last one none.
const THRESHOLD_EPSILON: f32 = 1e-7;

/// Keeps the rates finite when a class has not been seen yet.
const RATE_EPSILON: f64 = 1e-6;

const KINDS: [ConfusionKind; 4] = [
    ConfusionKind::TruePositive,
    ConfusionKind::FalseNegative,
    ConfusionKind::TrueNegative,
    ConfusionKind::FalsePositive,
];

#[derive(Debug, Clone)]
pub struct Auc {
    core: MetricCore,
    thresholds: ArrayD<f32>,
    /// In `KINDS` order.
    counters: Vec<ConfusionCounter>,
}

impl Auc {
    pub fn new(context: &MetricContext, config: AucConfig) -> Result<Self> {
        config.validate()?;
        let core = MetricCore::new(context, "auc", config.name.as_deref());
        let num_thresholds = config.num_thresholds;

        let counters = KINDS
            .iter()
            .map(|&kind| ConfusionCounter::with_length(core.store(), core.name(), kind, num_thresholds))
            .collect::<Result<Vec<_>>>()?;
        let thresholds = core
            .backend()
            .linspace(-THRESHOLD_EPSILON, 1.0 + THRESHOLD_EPSILON, num_thresholds);

        Ok(Self { core, thresholds, counters })
    }

    pub fn num_thresholds(&self) -> usize {
        self.thresholds.len()
    }

    /// `predictions` are scores in `[0, 1]`, `labels` are 0/1. Both must be
    /// rank 1 after the squeeze rule.
    pub fn update(
        &self,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        ignore_mask: Option<ArrayViewD<'_, bool>>,
    ) -> Result<f64> {
        let backend = self.core.backend();
        let (predictions, labels) = align("auc", predictions, labels)?;
        ensure_rank("auc", predictions.shape(), 1)?;
        let weights = resolve_weights(backend, ignore_mask, None, predictions.shape())?;

        let num_thresholds = self.num_thresholds();
        let num_predictions = predictions.len();

        let thresh_tiled = backend.tile(
            backend.reshape(self.thresholds.view(), &[num_thresholds, 1])?.view(),
            &[1, num_predictions],
        )?;
        let pred_tiled = tile_rows(backend, predictions, num_thresholds)?;
        let pred_positive = backend.greater(pred_tiled.view(), thresh_tiled.view())?;
        let pred_positive = backend.cast_to_float(pred_positive.view());
        let labels_tiled = tile_rows(backend, labels, num_thresholds)?;
        let weights_tiled = match &weights {
            Some(w) => Some(tile_rows(backend, w.view(), num_thresholds)?),
            None => None,
        };

        let deltas = self
            .counters
            .iter()
            .map(|counter| {
                counter.prepare(
                    backend,
                    pred_positive.view(),
                    labels_tiled.view(),
                    weights_tiled.as_ref().map(|w| w.view()),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let _guard = self.core.lock();
        let totals = self
            .counters
            .iter()
            .zip(&deltas)
            .map(|(counter, delta)| counter.commit(self.core.store(), delta))
            .collect::<Result<Vec<_>>>()?;
        let auc = area_under_curve(&totals[0], &totals[1], &totals[2], &totals[3]);
        log::trace!("{}: {} predictions over {} thresholds -> {}", self.core.name(), num_predictions, num_thresholds, auc);
        Ok(auc)
    }

    pub fn value(&self) -> f64 {
        let _guard = self.core.lock();
        let totals: Vec<Vec<f64>> = self.counters.iter().map(|c| c.read(self.core.store())).collect();
        area_under_curve(&totals[0], &totals[1], &totals[2], &totals[3])
    }
}

impl Metric for Auc {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn value(&self) -> f64 {
        Auc::value(self)
    }

    fn accumulators(&self) -> Vec<AccumulatorHandle> {
        self.counters.iter().map(|c| c.handle().clone()).collect()
    }
}

/// `[n]` -> `[rows, n]`, every row a copy of the input.
fn tile_rows(backend: &dyn Backend, values: ArrayViewD<'_, f32>, rows: usize) -> Result<ArrayD<f32>> {
    let column = backend.reshape(values.view(), &[values.len(), 1])?;
    let row = backend.transpose(column.view());
    Ok(backend.tile(row.view(), &[rows, 1])?)
}

/// Trapezoidal area under recall vs. false-positive rate.
///
/// Thresholds increase with the index, so `fpr` is non-increasing and
/// every `fpr[i] - fpr[i + 1]` is non-negative.
fn area_under_curve(tp: &[f64], fn_: &[f64], tn: &[f64], fp: &[f64]) -> f64 {
    let fpr: Vec<f64> = fp.iter().zip(tn).map(|(&fp, &tn)| fp / (fp + tn + RATE_EPSILON)).collect();
    let recall: Vec<f64> = tp
        .iter()
        .zip(fn_)
        .map(|(&tp, &fn_)| (tp + RATE_EPSILON) / (tp + fn_ + RATE_EPSILON))
        .collect();

    fpr.windows(2)
        .zip(recall.windows(2))
        .map(|(f, r)| (f[0] - f[1]) * (r[0] + r[1]) / 2.0)
        .sum()
}
