//! Модуль именованных аккумуляторов.
//!
//! [`AccumulatorStore`] владеет всем долговременным состоянием метрик:
//! скалярами и векторами фиксированной длины типа `f64`, инициализированными
//! нулями и переживающими обновления батчей. Метрики держат
//! [`AccumulatorHandle`] и изменяют состояние только через
//! [`AccumulatorStore::increment_by`].
//!
//! Хранилище также раздаёт имена областей (scope) и блокировки обновлений:
//! все метрики с одним и тем же scope сериализуются одной блокировкой.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Аккумулятор '{name}' уже существует с формой {existing}, запрошена {requested}. \
             Дайте независимым метрикам разные имена областей.")]
    ShapeConflict {
        name: String,
        existing: AccumulatorShape,
        requested: AccumulatorShape,
    },

    #[error("Приращение для аккумулятора '{name}' содержит {actual} элементов, а аккумулятор хранит {expected}.")]
    DeltaLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Результат операций хранилища.
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Форма одного аккумулятора.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccumulatorShape {
    Scalar,
    Vector(usize),
}

impl AccumulatorShape {
    /// Количество ячеек `f64`, в которых хранится аккумулятор.
    pub fn len(&self) -> usize {
        match self {
            AccumulatorShape::Scalar => 1,
            AccumulatorShape::Vector(n) => *n,
        }
    }

    /// `true` для вектора нулевой длины.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for AccumulatorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccumulatorShape::Scalar => write!(f, "[]"),
            AccumulatorShape::Vector(n) => write!(f, "[{}]", n),
        }
    }
}

#[derive(Debug)]
struct Slot {
    shape: AccumulatorShape,
    cells: Mutex<Vec<f64>>,
}

/// Дескриптор одного аккумулятора. Клонирование не копирует состояние.
#[derive(Debug, Clone)]
pub struct AccumulatorHandle {
    name: Arc<str>,
    slot: Arc<Slot>,
}

impl AccumulatorHandle {
    /// Полное имя аккумулятора, например `eval/auc/true_positives/count`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Форма, с которой аккумулятор был создан.
    pub fn shape(&self) -> AccumulatorShape {
        self.slot.shape
    }
}

impl PartialEq for AccumulatorHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

/// Снимок одного аккумулятора на момент вызова [`AccumulatorStore::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    pub name: String,
    pub shape: AccumulatorShape,
    pub value: Vec<f64>,
}

/// Блокировка, общая для всех метрик одного scope.
pub type ScopeLock = Arc<Mutex<()>>;

#[derive(Debug, Default)]
struct Registry {
    slots: BTreeMap<String, Arc<Slot>>,
    /// Every scope claimed by a metric, explicit or default.
    scopes: BTreeMap<String, ScopeLock>,
    /// How many times each default scope base has been tried.
    scope_counters: BTreeMap<String, usize>,
}

impl Registry {
    /// Claimed by a metric, or already holding accumulators under `{scope}/`.
    fn is_taken(&self, scope: &str) -> bool {
        if self.scopes.contains_key(scope) || self.slots.contains_key(scope) {
            return true;
        }
        let prefix = format!("{}/", scope);
        self.slots
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(name, _)| name.starts_with(&prefix))
    }
}

/// Хранилище именованных аккумуляторов.
///
/// Клонируется дёшево, все клоны разделяют одни и те же аккумуляторы.
/// Приращения одного аккумулятора сериализуются его собственной
/// блокировкой, поэтому параллельные обновления ничего не теряют.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorStore {
    registry: Arc<RwLock<Registry>>,
}

impl AccumulatorStore {
    /// Создает пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulator called `name`, creating it zero-filled if absent.
    ///
    /// Repeated calls with the same name return handles to the same state.
    pub fn get_or_create(&self, name: &str, shape: AccumulatorShape) -> StateResult<AccumulatorHandle> {
        if let Some(slot) = self.registry.read().slots.get(name) {
            return Self::existing(name, slot, shape);
        }

        let mut registry = self.registry.write();
        // Another thread may have created it between the two locks.
        if let Some(slot) = registry.slots.get(name) {
            return Self::existing(name, slot, shape);
        }
        let slot = Arc::new(Slot {
            shape,
            cells: Mutex::new(vec![0.0; shape.len()]),
        });
        registry.slots.insert(name.to_string(), Arc::clone(&slot));
        log::debug!("created accumulator '{}' with shape {}", name, shape);

        Ok(AccumulatorHandle { name: Arc::from(name), slot })
    }

    fn existing(name: &str, slot: &Arc<Slot>, shape: AccumulatorShape) -> StateResult<AccumulatorHandle> {
        if slot.shape != shape {
            return Err(StateError::ShapeConflict {
                name: name.to_string(),
                existing: slot.shape,
                requested: shape,
            });
        }
        Ok(AccumulatorHandle { name: Arc::from(name), slot: Arc::clone(slot) })
    }

    /// Non-mutating snapshot of the accumulator's cells.
    pub fn read(&self, handle: &AccumulatorHandle) -> Vec<f64> {
        handle.slot.cells.lock().clone()
    }

    /// First cell of the accumulator; the whole value for scalars.
    pub fn read_scalar(&self, handle: &AccumulatorHandle) -> f64 {
        handle.slot.cells.lock().first().copied().unwrap_or(0.0)
    }

    /// Atomically adds `delta` cell-wise and returns the new value.
    pub fn increment_by(&self, handle: &AccumulatorHandle, delta: &[f64]) -> StateResult<Vec<f64>> {
        let mut cells = handle.slot.cells.lock();
        if cells.len() != delta.len() {
            return Err(StateError::DeltaLength {
                name: handle.name.to_string(),
                expected: cells.len(),
                actual: delta.len(),
            });
        }
        for (cell, d) in cells.iter_mut().zip(delta) {
            *cell += d;
        }
        log::trace!("incremented '{}' by {:?}", handle.name, delta);
        Ok(cells.clone())
    }

    /// All accumulators, sorted by name.
    pub fn list(&self) -> Vec<AccumulatorSnapshot> {
        self.registry
            .read()
            .slots
            .iter()
            .map(|(name, slot)| AccumulatorSnapshot {
                name: name.clone(),
                shape: slot.shape,
                value: slot.cells.lock().clone(),
            })
            .collect()
    }

    /// Zeroes every accumulator. Handles stay valid.
    pub fn reset_all(&self) {
        let registry = self.registry.read();
        for slot in registry.slots.values() {
            slot.cells.lock().iter_mut().for_each(|cell| *cell = 0.0);
        }
        log::info!("reset {} accumulators", registry.slots.len());
    }

    /// Hands out `base`, then `base_1`, `base_2`, ... skipping every name
    /// that is already taken, and claims the result.
    ///
    /// Metrics constructed without an explicit name use this, so a default
    /// name never lands on the state of another metric, explicit or not.
    pub fn unique_scope(&self, base: &str) -> String {
        let mut registry = self.registry.write();
        loop {
            let counter = registry.scope_counters.entry(base.to_string()).or_insert(0);
            let candidate = if *counter == 0 {
                base.to_string()
            } else {
                format!("{}_{}", base, counter)
            };
            *counter += 1;

            if !registry.is_taken(&candidate) {
                registry.scopes.insert(candidate.clone(), ScopeLock::default());
                return candidate;
            }
        }
    }

    /// Claims `scope` and returns its update lock.
    ///
    /// Every caller asking for the same scope gets the same lock, so metric
    /// instances sharing state also serialize their updates and reads.
    pub fn scope_lock(&self, scope: &str) -> ScopeLock {
        if let Some(lock) = self.registry.read().scopes.get(scope) {
            return Arc::clone(lock);
        }
        let mut registry = self.registry.write();
        Arc::clone(registry.scopes.entry(scope.to_string()).or_default())
    }

    /// Есть ли аккумулятор с таким полным именем.
    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().slots.contains_key(name)
    }

    /// Количество аккумуляторов.
    pub fn len(&self) -> usize {
        self.registry.read().slots.len()
    }

    /// `true`, если не создано ни одного аккумулятора.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
