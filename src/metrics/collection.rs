//! Реестр метрик, сгруппированных по именованным коллекциям.
//!
//! Замена глобальных коллекций: реестр создаётся вызывающим кодом и
//! передаётся явно. Одна метрика может входить в несколько коллекций.

use super::Metric;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Значение одной метрики на момент чтения.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricCollection {
    collections: Arc<RwLock<BTreeMap<String, Vec<Arc<dyn Metric>>>>>,
}

impl MetricCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет метрику в коллекцию `collection`, создавая её при необходимости.
    pub fn register(&self, collection: &str, metric: Arc<dyn Metric>) {
        log::debug!("registering metric '{}' in collection '{}'", metric.name(), collection);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(metric);
    }

    /// Метрики коллекции в порядке регистрации. Пусто для неизвестной коллекции.
    pub fn metrics(&self, collection: &str) -> Vec<Arc<dyn Metric>> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    /// Текущие значения всех метрик коллекции.
    pub fn values(&self, collection: &str) -> Vec<MetricValue> {
        self.metrics(collection)
            .iter()
            .map(|metric| MetricValue {
                name: metric.name().to_string(),
                value: metric.value(),
            })
            .collect()
    }

    /// Имена коллекций, отсортированные.
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MetricContext;
    use crate::metrics::{Accuracy, MetricConfig, StreamingMean};
    use ndarray::arr1;

    #[test]
    fn test_register_and_read_values() {
        let ctx = MetricContext::new();
        let registry = MetricCollection::new();
        let mean = Arc::new(StreamingMean::new(&ctx, MetricConfig::new().with_name("loss")).unwrap());
        let accuracy = Arc::new(Accuracy::new(&ctx, MetricConfig::default()).unwrap());

        registry.register("eval", mean.clone());
        registry.register("eval", accuracy.clone());
        registry.register("summaries", mean.clone());

        mean.update(arr1(&[1.0f32, 3.0]).into_dyn().view(), None).unwrap();

        assert_eq!(registry.collections(), vec!["eval".to_string(), "summaries".to_string()]);
        assert_eq!(
            registry.values("eval"),
            vec![
                MetricValue { name: "loss".to_string(), value: 2.0 },
                MetricValue { name: "accuracy".to_string(), value: 0.0 },
            ]
        );
        assert_eq!(registry.metrics("summaries").len(), 1);
        assert!(registry.metrics("missing").is_empty());
    }
}
