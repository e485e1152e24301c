use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Run configuration for a mislabeling-detection benchmark. Saved as
/// `config.json` next to each method's results for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub mislabeling_ratio: f64,
    pub train_batch_size: usize,
    pub test_batch_size: usize,
    pub influence_batch_size: Option<usize>,
    /// Free-form extra keys carried along into config.json.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EvaluatorConfig {
    pub fn new(
        mislabeling_ratio: f64,
        train_batch_size: usize,
        test_batch_size: usize,
        influence_batch_size: Option<usize>,
    ) -> Result<Self> {
        ensure!(
            mislabeling_ratio > 0.0 && mislabeling_ratio < 1.0,
            "mislabeling_ratio must lie strictly inside (0, 1), got {}",
            mislabeling_ratio
        );
        ensure!(train_batch_size > 0, "train_batch_size must be positive");
        ensure!(test_batch_size > 0, "test_batch_size must be positive");
        ensure!(
            influence_batch_size != Some(0),
            "influence_batch_size must be positive when given"
        );
        Ok(Self {
            mislabeling_ratio,
            train_batch_size,
            test_batch_size,
            influence_batch_size,
            extra: serde_json::Map::new(),
        })
    }

    /// Batch size used for influence scoring (defaults to the train batch size).
    pub fn scoring_batch_size(&self) -> usize {
        self.influence_batch_size.unwrap_or(self.train_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_ratio() {
        assert!(EvaluatorConfig::new(0.0, 32, 32, None).is_err());
        assert!(EvaluatorConfig::new(1.0, 32, 32, None).is_err());
        assert!(EvaluatorConfig::new(-0.1, 32, 32, None).is_err());
        assert!(EvaluatorConfig::new(0.1, 32, 32, None).is_ok());
    }

    #[test]
    fn rejects_zero_batch_sizes() {
        assert!(EvaluatorConfig::new(0.1, 0, 32, None).is_err());
        assert!(EvaluatorConfig::new(0.1, 32, 0, None).is_err());
        assert!(EvaluatorConfig::new(0.1, 32, 32, Some(0)).is_err());
    }

    #[test]
    fn scoring_batch_size_falls_back_to_train() {
        let config = EvaluatorConfig::new(0.1, 32, 64, None).unwrap();
        assert_eq!(config.scoring_batch_size(), 32);
        let config = EvaluatorConfig::new(0.1, 32, 64, Some(128)).unwrap();
        assert_eq!(config.scoring_batch_size(), 128);
    }

    #[test]
    fn extra_keys_survive_a_serde_roundtrip() {
        let mut config = EvaluatorConfig::new(0.2, 16, 16, None).unwrap();
        config
            .extra
            .insert("model".to_string(), serde_json::json!("softmax"));
        let json = serde_json::to_string(&config).unwrap();
        let back: EvaluatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra["model"], serde_json::json!("softmax"));
        assert_eq!(back.train_batch_size, 16);
    }
}
