use std::{num::NonZeroUsize, sync::Arc};

use comms::Communicator;
use log::{debug, info};
use ml_core::{Device, GradientValue, Learners, MinibatchInfo, Parameter, Tensor};

use crate::{
    Capabilities, DistributedErr, DistributedLearner, DistributedLearnerBase, LearnerCheckpoint,
    Result, UpdateOutcome,
};

/// Derives the block momentum from its time constant, `exp(-block_size / time_constant)`.
///
/// # Arguments
/// * `block_size` - The amount of rounds per block.
/// * `time_constant` - The time constant in rounds, zero disables the momentum.
///
/// # Returns
/// The momentum or `InvalidConfig` if the time constant is negative or not a number.
pub fn momentum_from_time_constant(block_size: NonZeroUsize, time_constant: f64) -> Result<f64> {
    if time_constant.is_nan() || time_constant < 0. {
        return Err(DistributedErr::InvalidConfig(format!(
            "block momentum time constant must be non-negative, got {time_constant}"
        )));
    }

    if time_constant == 0. {
        return Ok(0.);
    }

    Ok((-(block_size.get() as f64) / time_constant).exp())
}

/// The parameters of block momentum training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMomentumConfig {
    pub distribute_after_samples: usize,
    /// Rounds between model synchronizations.
    pub block_size: NonZeroUsize,
    pub block_momentum: f64,
    pub block_learning_rate: f64,
    pub use_nesterov_momentum: bool,
    pub reset_sgd_momentum_after_aggregation: bool,
}

impl BlockMomentumConfig {
    /// Creates a config with the default momentum `1 - 1 / workers`.
    ///
    /// # Arguments
    /// * `block_size` - Rounds between model synchronizations.
    /// * `workers` - The size of the group.
    ///
    /// # Returns
    /// A new `BlockMomentumConfig` with Nesterov momentum, learner resets and a block
    /// learning rate of one.
    pub fn new(block_size: NonZeroUsize, workers: usize) -> Self {
        Self {
            distribute_after_samples: 0,
            block_size,
            block_momentum: 1. - 1. / workers.max(1) as f64,
            block_learning_rate: 1.,
            use_nesterov_momentum: true,
            reset_sgd_momentum_after_aggregation: true,
        }
    }

    /// Checks the momentum is in `[0, 1)` and the learning rate is positive.
    pub fn validate(&self) -> Result<()> {
        if !(0. ..1.).contains(&self.block_momentum) {
            return Err(DistributedErr::InvalidConfig(format!(
                "block momentum must be in [0, 1), got {}",
                self.block_momentum
            )));
        }

        if !(self.block_learning_rate.is_finite() && self.block_learning_rate > 0.) {
            return Err(DistributedErr::InvalidConfig(format!(
                "block learning rate must be positive, got {}",
                self.block_learning_rate
            )));
        }

        Ok(())
    }
}

/// Block-wise model update filtering (block momentum).
///
/// Workers train locally and only synchronize their models every `block_size`
/// rounds. At a synchronization the averaged model change of the block is blended
/// into a momentum term, which is then applied to the last synchronized model.
pub struct BlockMomentumLearner {
    base: DistributedLearnerBase,
    config: BlockMomentumConfig,
    rounds_in_block: usize,
    samples_in_block: usize,
    active: bool,
    previous: Vec<Tensor>,
    smoothed: Vec<Tensor>,
}

impl BlockMomentumLearner {
    /// Creates a new `BlockMomentumLearner`.
    ///
    /// # Arguments
    /// * `capabilities` - The capabilities of this build.
    /// * `communicator` - This worker's handle to the group.
    /// * `learners` - The local learners run every round.
    /// * `config` - The block momentum parameters.
    ///
    /// # Returns
    /// A new `BlockMomentumLearner`, `Unsupported` without parallel training or
    /// `InvalidConfig` if `config` is invalid.
    pub fn new(
        capabilities: &Capabilities,
        communicator: Arc<dyn Communicator>,
        learners: Learners,
        config: BlockMomentumConfig,
    ) -> Result<Self> {
        capabilities.require_parallel_training("block momentum training")?;
        config.validate()?;

        info!(
            worker = communicator.current_worker().global_rank,
            block_size = config.block_size.get(),
            block_momentum = config.block_momentum,
            nesterov = config.use_nesterov_momentum;
            "created block momentum learner"
        );

        Ok(Self {
            base: DistributedLearnerBase::new(
                communicator,
                learners,
                config.distribute_after_samples,
            ),
            config,
            rounds_in_block: 0,
            samples_in_block: 0,
            active: true,
            previous: Vec::new(),
            smoothed: Vec::new(),
        })
    }

    pub fn config(&self) -> &BlockMomentumConfig {
        &self.config
    }

    /// Ends the block: sums the block's sample counts and activity, then syncs the models.
    ///
    /// # Returns
    /// Whether any worker was still training in the last round.
    fn end_block(&mut self) -> Result<bool> {
        let communicator = Arc::clone(self.base.communicator());

        let mut header = Tensor::from_f64_vec(
            &[2],
            vec![self.samples_in_block as f64, f64::from(u8::from(self.active))],
            Device::Cpu,
        )?;
        communicator.aggregate_in_place(&mut [&mut header], communicator.workers())?;

        let (samples, active_workers) = match header.values()[..] {
            [samples, active_workers] => (samples, active_workers),
            _ => return Err(DistributedErr::InvalidSampleCount(f64::NAN)),
        };

        if !samples.is_finite() || samples < 0. || samples.fract() != 0. {
            return Err(DistributedErr::InvalidSampleCount(samples));
        }

        let distributing = self.base.is_distributing();
        self.base.record_samples(samples as usize);
        self.rounds_in_block = 0;
        self.samples_in_block = 0;

        if distributing {
            self.synchronize(communicator.as_ref())?;
        }

        debug!(
            worker = communicator.current_worker().global_rank,
            samples = samples,
            active_workers = active_workers,
            synchronized = distributing;
            "block finished"
        );

        Ok(active_workers > 0.)
    }

    /// Replaces every replica with the momentum-filtered model.
    fn synchronize(&mut self, communicator: &dyn Communicator) -> Result<()> {
        let parameters: Vec<Parameter> = self.base.learners().parameters().to_vec();
        let mut current: Vec<Tensor> = parameters.iter().map(|p| p.value().clone()).collect();
        let workers = communicator.workers();
        let scale = 1. / workers.len() as f64;

        if self.previous.is_empty() {
            sum_across(communicator, &mut current)?;
            for (parameter, value) in parameters.iter().zip(&mut current) {
                value.scale(scale);
                parameter.value_mut().assign(value)?;
            }

            self.smoothed = current.iter().map(Tensor::zeros_like).collect();
            self.previous = current;
        } else {
            for (value, previous) in current.iter_mut().zip(&self.previous) {
                value.zip_mut_with(previous, |c, p| p - c)?;
            }
            sum_across(communicator, &mut current)?;

            let BlockMomentumConfig {
                block_momentum: momentum,
                block_learning_rate: learning_rate,
                use_nesterov_momentum,
                ..
            } = self.config;

            let state = parameters
                .iter()
                .zip(&current)
                .zip(self.smoothed.iter_mut().zip(&mut self.previous));

            for ((parameter, block_grad), (smoothed, previous)) in state {
                smoothed.zip_mut_with(block_grad, |s, g| momentum * s + learning_rate * scale * g)?;
                previous.scaled_add(-1., smoothed)?;

                let mut model = previous.clone();
                if use_nesterov_momentum {
                    model.scaled_add(-momentum, smoothed)?;
                }

                parameter.value_mut().assign(&model)?;
            }
        }

        if self.config.reset_sgd_momentum_after_aggregation {
            self.base.learners_mut().reset_smoothed_gradients();
        }

        Ok(())
    }
}

fn sum_across(communicator: &dyn Communicator, values: &mut [Tensor]) -> Result<()> {
    let mut values: Vec<&mut Tensor> = values.iter_mut().collect();
    communicator.aggregate_in_place(&mut values, communicator.workers())?;
    Ok(())
}

impl DistributedLearner for BlockMomentumLearner {
    fn update(
        &mut self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<UpdateOutcome> {
        self.active = if info.is_empty() {
            false
        } else {
            self.base.align_gradients(gradients)?;
            self.base.learners_mut().update(gradients, info)?.applied
        };

        self.samples_in_block += info.number_of_samples;
        self.rounds_in_block += 1;

        let continue_training = if self.rounds_in_block >= self.config.block_size.get() {
            self.end_block()?
        } else {
            true
        };

        Ok(UpdateOutcome {
            continue_training,
            total_samples_seen: self.total_samples_seen(),
        })
    }

    fn base(&self) -> &DistributedLearnerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DistributedLearnerBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "block_momentum"
    }

    /// Samples of the synchronized blocks plus this worker's samples of the current block.
    fn total_samples_seen(&self) -> usize {
        self.base.total_samples_seen() + self.samples_in_block
    }

    fn restore(&mut self, checkpoint: &LearnerCheckpoint) {
        self.base.restore(checkpoint);
        self.rounds_in_block = 0;
        self.samples_in_block = 0;
        self.active = true;
    }
}
