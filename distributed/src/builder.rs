use std::sync::Arc;

use comms::{Communicator, QuantizingCommunicator};
use log::info;
use ml_core::Learners;

use crate::{
    BlockMomentumLearner, Capabilities, DataParallelLearner, DistributedLearner,
    DistributedLearnerSpec, QuantizedDataParallelLearner, Result,
};

/// Builds `DistributedLearner`s given a specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributedLearnerBuilder {
    capabilities: Capabilities,
}

impl DistributedLearnerBuilder {
    /// Creates a new `DistributedLearnerBuilder` with the capabilities of this build.
    ///
    /// # Returns
    /// A new `DistributedLearnerBuilder` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the capabilities the learners are checked against.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Builds a new distributed learner following a specification.
    ///
    /// # Arguments
    /// * `spec` - The specification of the learner.
    /// * `communicator` - This worker's handle to the group.
    /// * `learners` - The local learners wrapped by the distributed learner.
    ///
    /// # Returns
    /// A new boxed `DistributedLearner` or an error if the spec is invalid or
    /// requires a capability this build lacks.
    pub fn build(
        &self,
        spec: &DistributedLearnerSpec,
        communicator: Arc<dyn Communicator>,
        learners: Learners,
    ) -> Result<Box<dyn DistributedLearner>> {
        let learner: Box<dyn DistributedLearner> = match *spec {
            DistributedLearnerSpec::DataParallel {
                distribute_after_samples,
                use_async_buffered_parameter_update,
            } => Box::new(DataParallelLearner::new(
                communicator,
                learners,
                distribute_after_samples,
                use_async_buffered_parameter_update,
            )?),
            DistributedLearnerSpec::QuantizedDataParallel {
                distribute_after_samples,
                use_async_buffered_parameter_update,
                quantization,
            } => {
                self.capabilities
                    .require_parallel_training("quantized data parallel training")?;

                let quantizing = QuantizingCommunicator::new(communicator, quantization)?;
                Box::new(QuantizedDataParallelLearner::new(
                    &self.capabilities,
                    Arc::new(quantizing),
                    learners,
                    distribute_after_samples,
                    use_async_buffered_parameter_update,
                )?)
            }
            DistributedLearnerSpec::BlockMomentum(block_spec) => {
                self.capabilities
                    .require_parallel_training("block momentum training")?;

                let config = block_spec.config(communicator.workers().len())?;
                Box::new(BlockMomentumLearner::new(
                    &self.capabilities,
                    communicator,
                    learners,
                    config,
                )?)
            }
        };

        info!(kind = learner.kind(); "built distributed learner");
        Ok(learner)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use comms::QuantizationSpec;

    use super::*;
    use crate::{
        BlockMomentumSpec, DistributedErr, capability::PARALLEL_TRAINING,
        test::{RecordingLearner, param, single_worker},
    };

    fn learners() -> Learners {
        Learners::single(RecordingLearner::new(vec![param("w", &[0.])])).unwrap()
    }

    fn specs() -> [DistributedLearnerSpec; 3] {
        [
            DistributedLearnerSpec::DataParallel {
                distribute_after_samples: 0,
                use_async_buffered_parameter_update: false,
            },
            DistributedLearnerSpec::QuantizedDataParallel {
                distribute_after_samples: 0,
                use_async_buffered_parameter_update: true,
                quantization: QuantizationSpec::default(),
            },
            DistributedLearnerSpec::BlockMomentum(BlockMomentumSpec {
                distribute_after_samples: 0,
                block_size: NonZeroUsize::MIN,
                use_nesterov_momentum: true,
                reset_sgd_momentum_after_aggregation: true,
                block_learning_rate: 1.,
                block_momentum_as_time_constant: None,
            }),
        ]
    }

    #[test]
    fn builds_every_strategy_with_parallel_training() {
        let builder = DistributedLearnerBuilder::new().with_capabilities(Capabilities {
            parallel_training: true,
        });

        let kinds: Vec<&str> = specs()
            .iter()
            .map(|spec| builder.build(spec, single_worker(), learners()).unwrap().kind())
            .collect();

        assert_eq!(
            kinds,
            vec!["data_parallel", "quantized_data_parallel", "block_momentum"]
        );
    }

    #[test]
    fn gated_strategies_fail_without_parallel_training() {
        let builder = DistributedLearnerBuilder::new()
            .with_capabilities(Capabilities::without_parallel_training());
        let [plain, quantized, block] = specs();

        assert!(builder.build(&plain, single_worker(), learners()).is_ok());

        for spec in [quantized, block] {
            let err = builder.build(&spec, single_worker(), learners()).err().unwrap();
            assert!(matches!(
                err,
                DistributedErr::Unsupported {
                    capability: PARALLEL_TRAINING,
                    ..
                }
            ));
        }
    }

    #[test]
    fn invalid_quantization_is_rejected() {
        let spec = DistributedLearnerSpec::QuantizedDataParallel {
            distribute_after_samples: 0,
            use_async_buffered_parameter_update: false,
            quantization: QuantizationSpec {
                bits: 0,
                ..Default::default()
            },
        };

        let builder = DistributedLearnerBuilder::new().with_capabilities(Capabilities {
            parallel_training: true,
        });
        let err = builder.build(&spec, single_worker(), learners()).err().unwrap();
        assert!(matches!(err, DistributedErr::Comms(_)));
    }
}
