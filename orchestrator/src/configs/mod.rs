mod model;
mod training;

pub use model::ModelConfig;
pub use training::{DatasetConfig, TrainingConfig};

#[cfg(test)]
mod tests {
    use distributed::DistributedLearnerSpec;

    use super::*;
    use crate::OrchestratorError;

    const CONFIG: &str = r#"{
        "model": { "kind": "linear", "features": 2 },
        "workers": 3,
        "dataset": { "kind": "synthetic", "samples": 25, "weights": [2.0, -1.0], "bias": 0.5 },
        "optimizer": { "gradient_descent": { "learning_rate": 0.5 } },
        "learner": { "kind": "data_parallel" },
        "batch_size": 4,
        "epochs": 10
    }"#;

    fn with(key: &str, value: serde_json::Value) -> String {
        let mut config: serde_json::Value = serde_json::from_str(CONFIG).unwrap();
        config[key] = value;
        config.to_string()
    }

    #[test]
    fn parses_with_defaults() {
        let config = TrainingConfig::from_json_str(CONFIG).unwrap();

        assert_eq!(config.workers.get(), 3);
        assert_eq!(config.dataset.samples(), 25);
        assert_eq!(config.seed, None);
        assert_eq!(
            config.learner,
            DistributedLearnerSpec::DataParallel {
                distribute_after_samples: 0,
                use_async_buffered_parameter_update: false
            }
        );
    }

    #[test]
    fn feature_mismatch_is_rejected() {
        let json = with("model", serde_json::json!({ "kind": "linear", "features": 3 }));
        let err = TrainingConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    }

    #[test]
    fn ragged_inline_dataset_is_rejected() {
        let dataset = serde_json::json!({ "kind": "inline", "features": 2, "data": [1.0, 2.0, 3.0, 4.0] });
        let err = TrainingConfig::from_json_str(&with("dataset", dataset)).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_optimizer_is_rejected() {
        let optimizer = serde_json::json!({ "gradient_descent": { "learning_rate": -1.0 } });
        let err = TrainingConfig::from_json_str(&with("optimizer", optimizer)).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_block_momentum_is_rejected() {
        let learner = serde_json::json!({
            "kind": "block_momentum",
            "block_size": 2,
            "block_momentum_as_time_constant": -4.0
        });
        let err = TrainingConfig::from_json_str(&with("learner", learner)).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    }

    #[test]
    fn threshold_crossed_on_different_rounds_is_rejected() {
        // Shards of 9, 8 and 8 samples diverge on the third round, before 10 samples.
        let learner = serde_json::json!({ "kind": "data_parallel", "distribute_after_samples": 10 });
        let err = TrainingConfig::from_json_str(&with("learner", learner)).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConfig(_)));

        let learner = serde_json::json!({ "kind": "quantized_data_parallel", "distribute_after_samples": 8 });
        assert!(TrainingConfig::from_json_str(&with("learner", learner)).is_ok());
    }

    #[test]
    fn block_momentum_threshold_is_not_restricted() {
        let learner = serde_json::json!({
            "kind": "block_momentum",
            "block_size": 2,
            "distribute_after_samples": 10
        });
        assert!(TrainingConfig::from_json_str(&with("learner", learner)).is_ok());
    }

    #[test]
    fn zero_workers_fail_to_parse() {
        let err = TrainingConfig::from_json_str(&with("workers", 0.into())).unwrap_err();
        assert!(matches!(err, OrchestratorError::Json(_)));
    }
}
