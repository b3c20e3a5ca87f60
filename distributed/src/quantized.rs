use std::sync::Arc;

use comms::{Communicator, QuantizedCommunicator};
use log::{debug, info};
use ml_core::{GradientValue, Learners, MinibatchInfo, Tensor};

use crate::{
    AggregationPayload, Capabilities, DistributedLearner, DistributedLearnerBase, Result,
    UpdateOutcome,
};

/// An aggregated round waiting to be applied.
struct PendingUpdate {
    gradients: Vec<GradientValue>,
    info: MinibatchInfo,
}

/// Data-parallel training exchanging quantized gradients.
///
/// Gradients go through the quantizing collective, keeping one residual per
/// parameter so the quantization error is sent in later rounds. Statistics and
/// sample counts are aggregated exactly. With buffered updates the local
/// learners apply the previous round's aggregate, one round stale.
pub struct QuantizedDataParallelLearner {
    base: DistributedLearnerBase,
    quantized: Arc<dyn QuantizedCommunicator>,
    residuals: Vec<Tensor>,
    use_async_buffered_parameter_update: bool,
    pending: Option<PendingUpdate>,
}

impl QuantizedDataParallelLearner {
    /// Creates a new `QuantizedDataParallelLearner`.
    ///
    /// # Arguments
    /// * `capabilities` - The capabilities of this build.
    /// * `communicator` - This worker's handle to the group.
    /// * `learners` - The local learners applying the aggregated gradients.
    /// * `distribute_after_samples` - Samples to see before aggregating across workers.
    /// * `use_async_buffered_parameter_update` - Whether to apply aggregates one round late.
    ///
    /// # Returns
    /// A new `QuantizedDataParallelLearner` or `Unsupported` without parallel training.
    pub fn new<Q>(
        capabilities: &Capabilities,
        communicator: Arc<Q>,
        learners: Learners,
        distribute_after_samples: usize,
        use_async_buffered_parameter_update: bool,
    ) -> Result<Self>
    where
        Q: QuantizedCommunicator + 'static,
    {
        capabilities.require_parallel_training("quantized data parallel training")?;

        info!(
            worker = communicator.current_worker().global_rank,
            workers = communicator.workers().len(),
            distribute_after_samples = distribute_after_samples,
            buffered = use_async_buffered_parameter_update;
            "created quantized data parallel learner"
        );

        let exact: Arc<dyn Communicator> = communicator.clone();

        Ok(Self {
            base: DistributedLearnerBase::new(exact, learners, distribute_after_samples),
            quantized: communicator,
            residuals: Vec::new(),
            use_async_buffered_parameter_update,
            pending: None,
        })
    }

    fn aggregate(
        &mut self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<()> {
        if info.is_empty() {
            self.base.prepare_zero_gradients(gradients, info)?;
        } else {
            self.base.align_gradients(gradients)?;
            self.base.ensure_statistics(info);
        }

        if self.residuals.is_empty() {
            self.residuals = gradients.iter().map(|gv| gv.gradient.zeros_like()).collect();
        }

        let communicator = &self.quantized;
        let workers = communicator.workers();
        let mut payload = AggregationPayload::new(gradients, info)?;

        communicator.quantized_aggregate_in_place(
            payload.gradients_mut(),
            &mut self.residuals,
            workers,
        )?;
        communicator.aggregate_in_place(&mut payload.statistics_mut(), workers)?;

        let samples = payload.aggregated_sample_count()?;
        info.number_of_samples = samples;
        Ok(())
    }

    /// Applies the previous round's aggregate and buffers the current one.
    ///
    /// # Returns
    /// Whether the local learners accept to continue, `true` when nothing was buffered.
    fn apply_buffered(&mut self, gradients: &[GradientValue], info: &MinibatchInfo) -> Result<bool> {
        let current = (!info.is_empty()).then(|| PendingUpdate {
            gradients: gradients.to_vec(),
            info: info.clone(),
        });

        let Some(previous) = std::mem::replace(&mut self.pending, current) else {
            return Ok(true);
        };

        let update = self
            .base
            .learners_mut()
            .update(&previous.gradients, &previous.info)?;

        Ok(update.applied)
    }
}

impl DistributedLearner for QuantizedDataParallelLearner {
    fn update(
        &mut self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<UpdateOutcome> {
        let aggregated = self.base.is_distributing();
        if aggregated {
            self.aggregate(gradients, info)?;
        }

        let total_samples_seen = self.base.record_samples(info.number_of_samples);

        let applied = if aggregated && self.use_async_buffered_parameter_update {
            self.apply_buffered(gradients, info)?
        } else {
            self.base.learners_mut().update(gradients, info)?.applied
        };

        debug!(
            worker = self.base.communicator().current_worker().global_rank,
            aggregated = aggregated,
            samples = info.number_of_samples,
            total = total_samples_seen;
            "quantized data parallel round"
        );

        Ok(UpdateOutcome {
            continue_training: applied && !info.is_empty(),
            total_samples_seen,
        })
    }

    fn base(&self) -> &DistributedLearnerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DistributedLearnerBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "quantized_data_parallel"
    }
}
