//! Конфигурации метрик.
//!
//! Одна структура на семейство метрик, с документированными значениями по
//! умолчанию. Все поля сериализуемы, отсутствующие в JSON поля берутся из `Default`.

use super::{MetricError, Result};
use serde::{Deserialize, Serialize};

fn validate_name(name: &Option<String>) -> Result<()> {
    match name {
        Some(name) if name.is_empty() => Err(MetricError::InvalidConfig("имя метрики не может быть пустым".to_string())),
        _ => Ok(()),
    }
}

/// Общая конфигурация: среднее, accuracy, precision, recall, MAE/MRE/MSE/RMSE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Явное имя области. Если `None`, используется имя по умолчанию метрики.
    pub name: Option<String>,
}

impl MetricConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Устанавливает имя области
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Конфигурация AUC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AucConfig {
    pub name: Option<String>,
    /// Число порогов разбиения `[0, 1]`, не меньше 2
    pub num_thresholds: usize,
}

impl Default for AucConfig {
    fn default() -> Self {
        Self {
            name: None,
            num_thresholds: 200,
        }
    }
}

impl AucConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Устанавливает число порогов
    pub fn with_num_thresholds(mut self, num_thresholds: usize) -> Self {
        self.num_thresholds = num_thresholds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.num_thresholds < 2 {
            return Err(MetricError::InvalidConfig(format!(
                "num_thresholds должно быть не меньше 2, получено {}",
                self.num_thresholds
            )));
        }
        Ok(())
    }
}

/// Конфигурация recall@k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallAtKConfig {
    pub name: Option<String>,
    pub k: usize,
}

impl Default for RecallAtKConfig {
    fn default() -> Self {
        Self { name: None, k: 1 }
    }
}

impl RecallAtKConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.k == 0 {
            return Err(MetricError::InvalidConfig("k должно быть не меньше 1".to_string()));
        }
        Ok(())
    }
}

/// Конфигурация косинусного расстояния.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosineDistanceConfig {
    pub name: Option<String>,
    /// Ось, вдоль которой суммируется `predictions * labels`
    pub dim: usize,
}

impl CosineDistanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Конфигурация доли значений ниже порога.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentageLessConfig {
    pub name: Option<String>,
    pub threshold: f32,
}

impl PercentageLessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if !self.threshold.is_finite() {
            return Err(MetricError::InvalidConfig(format!(
                "threshold должен быть конечным, получено {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(AucConfig::default().num_thresholds, 200);
        assert_eq!(RecallAtKConfig::default().k, 1);
        assert_eq!(CosineDistanceConfig::default().dim, 0);
        assert_eq!(PercentageLessConfig::default().threshold, 0.0);
        assert_eq!(MetricConfig::default().name, None);
    }

    #[test]
    fn test_builders() {
        let config = AucConfig::new().with_name("val_auc").with_num_thresholds(50);
        assert_eq!(config.name.as_deref(), Some("val_auc"));
        assert_eq!(config.num_thresholds, 50);
        assert!(config.validate().is_ok());

        let config = PercentageLessConfig::new().with_threshold(3.0);
        assert_eq!(config.threshold, 3.0);
    }

    #[test]
    fn test_validation() {
        assert!(AucConfig::new().with_num_thresholds(1).validate().is_err());
        assert!(RecallAtKConfig::new().with_k(0).validate().is_err());
        assert!(PercentageLessConfig::new().with_threshold(f32::NAN).validate().is_err());
        assert!(matches!(
            MetricConfig::new().with_name("").validate(),
            Err(MetricError::InvalidConfig(_))
        ));
    }
}
