use std::{fs, num::NonZeroUsize, path::Path};

use distributed::DistributedLearnerSpec;
use machine_learning::{LearningRateUnit, dataset::Dataset, specs::OptimizerSpec};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ModelConfig;
use crate::{
    error::{OrchestratorError, Result},
    source::MinibatchSource,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Samples of a known linear model with gaussian noise on the targets.
    Synthetic {
        samples: usize,
        weights: Vec<f32>,
        bias: f32,
        #[serde(default)]
        noise: f32,
    },
    /// Row-major samples, each row holds `features` inputs followed by the target.
    Inline { data: Vec<f32>, features: usize },
}

impl DatasetConfig {
    pub fn features(&self) -> usize {
        match self {
            DatasetConfig::Synthetic { weights, .. } => weights.len(),
            DatasetConfig::Inline { features, .. } => *features,
        }
    }

    pub fn samples(&self) -> usize {
        match self {
            DatasetConfig::Synthetic { samples, .. } => *samples,
            DatasetConfig::Inline { data, features } => data.len() / (features + 1),
        }
    }

    /// Materializes the dataset.
    ///
    /// # Arguments
    /// * `rng` - Used to draw the synthetic samples.
    ///
    /// # Returns
    /// The dataset or an error if the config is inconsistent.
    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Dataset> {
        let dataset = match self {
            DatasetConfig::Synthetic {
                samples,
                weights,
                bias,
                noise,
            } => Dataset::synthetic_linear(*samples, weights, *bias, *noise, rng)?,
            DatasetConfig::Inline { data, features } => {
                let rows: Vec<Vec<f32>> = data.chunks(features + 1).map(<[f32]>::to_vec).collect();
                Dataset::from_rows(*features, &rows)?
            }
        };

        Ok(dataset)
    }

    fn validate(&self) -> Result<()> {
        match self {
            DatasetConfig::Synthetic { noise, .. } if !(noise.is_finite() && *noise >= 0.) => {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "noise must be a non-negative standard deviation, got {noise}"
                )));
            }
            DatasetConfig::Inline { data, features } if data.len() % (features + 1) != 0 => {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "dataset length ({}) is not divisible by features + 1 ({})",
                    data.len(),
                    features + 1
                )));
            }
            _ => {}
        }

        if self.samples() == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "dataset must have at least one sample".into(),
            ));
        }

        Ok(())
    }
}

/// The whole configuration of a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub workers: NonZeroUsize,
    pub dataset: DatasetConfig,
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub learning_rate_unit: LearningRateUnit,
    pub learner: DistributedLearnerSpec,
    pub batch_size: NonZeroUsize,
    pub epochs: NonZeroUsize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Reads and validates a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parses and validates a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config describes a runnable session.
    ///
    /// # Returns
    /// `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |e: &dyn std::fmt::Display| OrchestratorError::InvalidConfig(e.to_string());

        if self.model.features() == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "model must have at least one feature".into(),
            ));
        }

        self.dataset.validate()?;

        if self.dataset.features() != self.model.features() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "dataset has {} features but the model expects {}",
                self.dataset.features(),
                self.model.features()
            )));
        }

        self.optimizer.validate().map_err(|e| invalid(&e))?;

        match &self.learner {
            DistributedLearnerSpec::QuantizedDataParallel { quantization, .. } => {
                quantization.validate().map_err(|e| invalid(&e))?;
            }
            DistributedLearnerSpec::BlockMomentum(spec) => {
                spec.config(self.workers.get()).map_err(|e| invalid(&e))?;
            }
            DistributedLearnerSpec::DataParallel { .. } => {}
        }

        // Block momentum sums its sample counts at every block boundary, the
        // other learners count locally until they start aggregating.
        let threshold = self.learner.distribute_after_samples();
        let counts_locally = !matches!(self.learner, DistributedLearnerSpec::BlockMomentum(_));

        if counts_locally
            && !MinibatchSource::crosses_threshold_together(
                self.dataset.samples(),
                self.workers.get(),
                self.batch_size,
                self.epochs.get(),
                threshold,
            )
        {
            return Err(OrchestratorError::InvalidConfig(format!(
                "workers reach distribute_after_samples ({threshold}) on different rounds with \
                 {} samples over {} workers in batches of {}",
                self.dataset.samples(),
                self.workers,
                self.batch_size
            )));
        }

        Ok(())
    }
}
