use std::num::NonZeroUsize;

use comms::QuantizationSpec;
use serde::{Deserialize, Serialize};

use crate::{BlockMomentumConfig, Result, block_momentum::momentum_from_time_constant};

fn default_true() -> bool {
    true
}

fn default_block_learning_rate() -> f64 {
    1.
}

/// The specification for the `DistributedLearner` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributedLearnerSpec {
    DataParallel {
        #[serde(default)]
        distribute_after_samples: usize,
        #[serde(default)]
        use_async_buffered_parameter_update: bool,
    },
    QuantizedDataParallel {
        #[serde(default)]
        distribute_after_samples: usize,
        #[serde(default)]
        use_async_buffered_parameter_update: bool,
        #[serde(default)]
        quantization: QuantizationSpec,
    },
    BlockMomentum(BlockMomentumSpec),
}

impl DistributedLearnerSpec {
    /// Samples to see before the learner starts aggregating.
    pub fn distribute_after_samples(&self) -> usize {
        match self {
            DistributedLearnerSpec::DataParallel {
                distribute_after_samples,
                ..
            }
            | DistributedLearnerSpec::QuantizedDataParallel {
                distribute_after_samples,
                ..
            } => *distribute_after_samples,
            DistributedLearnerSpec::BlockMomentum(spec) => spec.distribute_after_samples,
        }
    }
}

/// The specification for the block momentum learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockMomentumSpec {
    #[serde(default)]
    pub distribute_after_samples: usize,
    /// Rounds between model synchronizations.
    pub block_size: NonZeroUsize,
    #[serde(default = "default_true", alias = "use_nestrov_momentum")]
    pub use_nesterov_momentum: bool,
    #[serde(default = "default_true")]
    pub reset_sgd_momentum_after_aggregation: bool,
    #[serde(default = "default_block_learning_rate")]
    pub block_learning_rate: f64,
    /// Rounds, `None` derives the momentum `1 - 1 / workers`.
    #[serde(default)]
    pub block_momentum_as_time_constant: Option<f64>,
}

impl BlockMomentumSpec {
    /// Resolves this spec for a group of `workers`.
    ///
    /// # Returns
    /// The validated `BlockMomentumConfig` or `InvalidConfig`.
    pub fn config(&self, workers: usize) -> Result<BlockMomentumConfig> {
        let mut config = BlockMomentumConfig {
            distribute_after_samples: self.distribute_after_samples,
            use_nesterov_momentum: self.use_nesterov_momentum,
            reset_sgd_momentum_after_aggregation: self.reset_sgd_momentum_after_aggregation,
            block_learning_rate: self.block_learning_rate,
            ..BlockMomentumConfig::new(self.block_size, workers)
        };

        if let Some(time_constant) = self.block_momentum_as_time_constant {
            config.block_momentum = momentum_from_time_constant(self.block_size, time_constant)?;
        }

        config.validate()?;
        Ok(config)
    }
}
