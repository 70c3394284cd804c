//! Примитивные счётчики, из которых строятся производные метрики.
//!
//! Каждый примитив делит обновление на два шага:
//! - `prepare` проверяет батч и вычисляет приращение, ничего не изменяя;
//! - `commit` применяет приращение к хранилищу.
//!
//! Составная метрика сначала готовит все приращения, а затем фиксирует их
//! под блокировкой своего scope. Отклонённый батч не оставляет частичного
//! состояния.

use super::{safe_div, Result};
use crate::analysis::{ensure_rank, ensure_same_shape};
use crate::context::MetricContext;
use crate::runtime::Backend;
use crate::state::{AccumulatorHandle, AccumulatorShape, AccumulatorStore, ScopeLock};
use ndarray::{ArrayD, ArrayViewD};
use parking_lot::MutexGuard;

/// Scope, контекст и блокировка обновлений одной метрики.
///
/// Блокировка берётся из хранилища по имени scope, поэтому все экземпляры
/// с одним scope (и одним состоянием) сериализуются вместе.
#[derive(Debug, Clone)]
pub struct MetricCore {
    name: String,
    context: MetricContext,
    lock: ScopeLock,
}

impl MetricCore {
    /// Scope из явного имени или уникального имени по умолчанию.
    pub fn new(context: &MetricContext, default_name: &str, explicit: Option<&str>) -> Self {
        Self::in_scope(context, context.scope_name(default_name, explicit))
    }

    /// Uses `name` as the full scope, without prefixing or uniquifying it.
    pub fn in_scope(context: &MetricContext, name: String) -> Self {
        log::debug!("creating metric '{}'", name);
        let lock = context.store().scope_lock(&name);
        Self {
            name,
            context: context.clone(),
            lock,
        }
    }

    /// Полное имя scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Бэкенд контекста.
    pub fn backend(&self) -> &dyn Backend {
        self.context.backend()
    }

    /// Хранилище контекста.
    pub fn store(&self) -> &AccumulatorStore {
        self.context.store()
    }

    /// Held across commit + finalization and across reads. Shared by every
    /// metric on the same scope.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

/// Weighted count of `true` elements.
///
/// A scalar count sums the whole indicator. A vector count of length `n`
/// takes an `[n, batch]` indicator and sums each row into its own cell.
#[derive(Debug, Clone)]
pub struct Count {
    handle: AccumulatorHandle,
}

impl Count {
    /// Скалярный счётчик `name`.
    pub fn new(store: &AccumulatorStore, name: &str) -> Result<Self> {
        let handle = store.get_or_create(name, AccumulatorShape::Scalar)?;
        Ok(Self { handle })
    }

    /// Векторный счётчик `name` из `len` ячеек.
    pub fn with_length(store: &AccumulatorStore, name: &str, len: usize) -> Result<Self> {
        let handle = store.get_or_create(name, AccumulatorShape::Vector(len))?;
        Ok(Self { handle })
    }

    /// Взвешенная сумма индикатора: одно число для скаляра, сумма по
    /// каждой строке для вектора.
    pub fn prepare(
        &self,
        backend: &dyn Backend,
        indicator: ArrayViewD<'_, bool>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<Vec<f64>> {
        let mut contributions = backend.cast_to_float(indicator);
        if let Some(weights) = weights {
            contributions = backend.multiply(contributions.view(), weights)?;
        }

        match self.handle.shape() {
            AccumulatorShape::Scalar => Ok(vec![backend.reduce_sum(contributions.view())]),
            AccumulatorShape::Vector(len) => {
                ensure_rank(self.handle.name(), contributions.shape(), 2)?;
                ensure_same_shape(self.handle.name(), &[len], &contributions.shape()[..1])?;
                let per_row = backend.reduce_sum_axis(contributions.view(), 1, false)?;
                Ok(per_row.iter().map(|&x| x as f64).collect())
            }
        }
    }

    /// Применяет приращение и возвращает новое значение.
    pub fn commit(&self, store: &AccumulatorStore, delta: &[f64]) -> Result<Vec<f64>> {
        Ok(store.increment_by(&self.handle, delta)?)
    }

    /// Все ячейки счётчика.
    pub fn read(&self, store: &AccumulatorStore) -> Vec<f64> {
        store.read(&self.handle)
    }

    /// Значение скалярного счётчика.
    pub fn value(&self, store: &AccumulatorStore) -> f64 {
        store.read_scalar(&self.handle)
    }

    pub fn handle(&self) -> &AccumulatorHandle {
        &self.handle
    }
}

/// Приращения `total` и `count` одного батча.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalCountDelta {
    pub total: f64,
    pub count: f64,
}

/// The streaming-mean primitive: `total / count`.
#[derive(Debug, Clone)]
pub struct TotalCount {
    total: AccumulatorHandle,
    count: AccumulatorHandle,
}

impl TotalCount {
    /// Creates `{scope}/total` and `{scope}/count`.
    pub fn new(store: &AccumulatorStore, scope: &str) -> Result<Self> {
        Ok(Self {
            total: store.get_or_create(&format!("{}/total", scope), AccumulatorShape::Scalar)?,
            count: store.get_or_create(&format!("{}/count", scope), AccumulatorShape::Scalar)?,
        })
    }

    /// With weights: `total += Σ values·weights`, `count += Σ weights`.
    /// Without: `total += Σ values`, `count += number of elements`.
    pub fn prepare(
        &self,
        backend: &dyn Backend,
        values: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<TotalCountDelta> {
        match weights {
            Some(weights) => {
                let weighted = backend.multiply(values, weights.view())?;
                Ok(TotalCountDelta {
                    total: backend.reduce_sum(weighted.view()),
                    count: backend.reduce_sum(weights),
                })
            }
            None => Ok(TotalCountDelta {
                total: backend.reduce_sum(values.view()),
                count: values.len() as f64,
            }),
        }
    }

    /// Applies the increments and returns the new mean.
    pub fn commit(&self, store: &AccumulatorStore, delta: TotalCountDelta) -> Result<f64> {
        let total = store.increment_by(&self.total, &[delta.total])?;
        let count = store.increment_by(&self.count, &[delta.count])?;
        Ok(safe_div(total[0], count[0]))
    }

    pub fn value(&self, store: &AccumulatorStore) -> f64 {
        safe_div(store.read_scalar(&self.total), store.read_scalar(&self.count))
    }

    pub fn handles(&self) -> Vec<AccumulatorHandle> {
        vec![self.total.clone(), self.count.clone()]
    }
}

/// Which cell of the binary confusion matrix a counter tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfusionKind {
    TruePositive,
    FalsePositive,
    FalseNegative,
    TrueNegative,
}

impl ConfusionKind {
    pub fn scope(&self) -> &'static str {
        match self {
            ConfusionKind::TruePositive => "true_positives",
            ConfusionKind::FalsePositive => "false_positives",
            ConfusionKind::FalseNegative => "false_negatives",
            ConfusionKind::TrueNegative => "true_negatives",
        }
    }

    /// `(label, prediction)` pair this kind matches.
    fn cell(&self) -> (f32, f32) {
        match self {
            ConfusionKind::TruePositive => (1.0, 1.0),
            ConfusionKind::FalsePositive => (0.0, 1.0),
            ConfusionKind::FalseNegative => (1.0, 0.0),
            ConfusionKind::TrueNegative => (0.0, 0.0),
        }
    }

    /// `label == l AND prediction == p` element-wise. Values other than 0
    /// and 1 match no kind.
    pub fn indicator(
        &self,
        backend: &dyn Backend,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
    ) -> Result<ArrayD<bool>> {
        let (label, prediction) = self.cell();
        let label_matches = backend.equal_scalar(labels, label);
        let prediction_matches = backend.equal_scalar(predictions, prediction);
        Ok(backend.logical_and(label_matches.view(), prediction_matches.view())?)
    }
}

/// A [`Count`] over one confusion-matrix indicator, stored at
/// `{scope}/{kind}/count`.
#[derive(Debug, Clone)]
pub struct ConfusionCounter {
    kind: ConfusionKind,
    count: Count,
}

impl ConfusionCounter {
    pub fn new(store: &AccumulatorStore, scope: &str, kind: ConfusionKind) -> Result<Self> {
        let count = Count::new(store, &Self::count_name(scope, kind))?;
        Ok(Self { kind, count })
    }

    /// One cell per threshold: indicators passed to `prepare` are `[len, batch]`.
    pub fn with_length(store: &AccumulatorStore, scope: &str, kind: ConfusionKind, len: usize) -> Result<Self> {
        let count = Count::with_length(store, &Self::count_name(scope, kind), len)?;
        Ok(Self { kind, count })
    }

    fn count_name(scope: &str, kind: ConfusionKind) -> String {
        format!("{}/{}/count", scope, kind.scope())
    }

    /// Masked positions are zeroed in the indicator through `weights`;
    /// predictions and labels themselves are never altered.
    pub fn prepare(
        &self,
        backend: &dyn Backend,
        predictions: ArrayViewD<'_, f32>,
        labels: ArrayViewD<'_, f32>,
        weights: Option<ArrayViewD<'_, f32>>,
    ) -> Result<Vec<f64>> {
        let indicator = self.kind.indicator(backend, predictions, labels)?;
        self.count.prepare(backend, indicator.view(), weights)
    }

    pub fn commit(&self, store: &AccumulatorStore, delta: &[f64]) -> Result<Vec<f64>> {
        self.count.commit(store, delta)
    }

    pub fn read(&self, store: &AccumulatorStore) -> Vec<f64> {
        self.count.read(store)
    }

    pub fn value(&self, store: &AccumulatorStore) -> f64 {
        self.count.value(store)
    }

    pub fn handle(&self) -> &AccumulatorHandle {
        self.count.handle()
    }
}
