//! Модуль, определяющий `MetricContext`.
//!
//! `MetricContext` - это то, что получает каждый конструктор метрики: общее
//! хранилище аккумуляторов, бэкенд для операций над массивами и префикс
//! области имён (scope). Контекст дёшево клонируется, все клоны разделяют
//! одно и то же состояние.

use crate::runtime::{Backend, CpuBackend};
use crate::state::AccumulatorStore;
use std::sync::Arc;

/// Контекст построения метрик.
#[derive(Debug, Clone)]
pub struct MetricContext {
    store: AccumulatorStore,
    backend: Arc<dyn Backend>,
    scope: Option<String>,
}

impl MetricContext {
    /// Создает контекст с новым пустым хранилищем и `CpuBackend`.
    pub fn new() -> Self {
        Self {
            store: AccumulatorStore::new(),
            backend: Arc::new(CpuBackend::new()),
            scope: None,
        }
    }

    /// Заменяет бэкенд, сохраняя хранилище и scope.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = backend;
        self
    }

    /// Использует уже существующее хранилище (например, общее для нескольких контекстов).
    pub fn with_store(mut self, store: AccumulatorStore) -> Self {
        self.store = store;
        self
    }

    /// Дочерний контекст: имена всех метрик, созданных через него,
    /// получают префикс `prefix/`.
    pub fn scoped(&self, prefix: &str) -> Self {
        Self {
            store: self.store.clone(),
            backend: Arc::clone(&self.backend),
            scope: Some(self.qualify(prefix)),
        }
    }

    /// Общее хранилище аккумуляторов.
    pub fn store(&self) -> &AccumulatorStore {
        &self.store
    }

    /// Бэкенд для операций над массивами.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Префикс области имён, `None` у корневого контекста.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Имя области для новой метрики.
    ///
    /// Явное имя используется как есть (с префиксом контекста). Имя по
    /// умолчанию делается уникальным: `mean`, `mean_1`, `mean_2`, ...
    /// и пропускает имена, уже занятые другими метриками.
    pub fn scope_name(&self, default: &str, explicit: Option<&str>) -> String {
        match explicit {
            Some(name) => self.qualify(name),
            None => self.store.unique_scope(&self.qualify(default)),
        }
    }

    fn qualify(&self, name: &str) -> String {
        match &self.scope {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }
}

impl Default for MetricContext {
    fn default() -> Self {
        Self::new()
    }
}
