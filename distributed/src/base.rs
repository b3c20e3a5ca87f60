use std::sync::Arc;

use comms::Communicator;
use log::warn;
use ml_core::{DataType, Device, GradientValue, Learners, MinibatchInfo, Parameter, Tensor};

use crate::{DistributedErr, LearnerCheckpoint, Result};

/// The bookkeeping shared by every distributed learner.
///
/// Holds the communicator, the wrapped local learners, the warm-up threshold and
/// the worker's sample counter. It never runs collectives itself.
pub struct DistributedLearnerBase {
    communicator: Arc<dyn Communicator>,
    learners: Learners,
    distribute_after_samples: usize,
    total_samples_seen: usize,
}

impl DistributedLearnerBase {
    /// Creates a new `DistributedLearnerBase`.
    ///
    /// # Arguments
    /// * `communicator` - This worker's handle to the group.
    /// * `learners` - The local learners, their parameter order is the aggregation order.
    /// * `distribute_after_samples` - Samples to see before aggregating across workers.
    ///
    /// # Returns
    /// A new `DistributedLearnerBase` instance with no samples seen.
    pub fn new(
        communicator: Arc<dyn Communicator>,
        learners: Learners,
        distribute_after_samples: usize,
    ) -> Self {
        Self {
            communicator,
            learners,
            distribute_after_samples,
            total_samples_seen: 0,
        }
    }

    pub fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.communicator
    }

    pub fn learners(&self) -> &Learners {
        &self.learners
    }

    pub fn learners_mut(&mut self) -> &mut Learners {
        &mut self.learners
    }

    pub fn distribute_after_samples(&self) -> usize {
        self.distribute_after_samples
    }

    pub fn total_samples_seen(&self) -> usize {
        self.total_samples_seen
    }

    /// Whether the warm-up is over and rounds must be aggregated.
    pub fn is_distributing(&self) -> bool {
        self.total_samples_seen >= self.distribute_after_samples
    }

    /// Adds `samples` to the counter and returns the new total.
    pub fn record_samples(&mut self, samples: usize) -> usize {
        self.total_samples_seen = self.total_samples_seen.saturating_add(samples);
        self.total_samples_seen
    }

    pub fn restore(&mut self, checkpoint: &LearnerCheckpoint) {
        self.total_samples_seen = checkpoint.total_samples_seen;
    }

    /// Turns an empty round into an additive identity contribution.
    ///
    /// Afterwards `gradients` holds one zero tensor per parameter, in aggregation
    /// order, with the parameter's shape, data type and device. The loss and
    /// criterion of `info` are zero scalars and the sample count stays zero.
    ///
    /// # Arguments
    /// * `gradients` - Whatever gradients the caller had, possibly none.
    /// * `info` - The empty round's statistics.
    ///
    /// # Returns
    /// An error if a gradient belongs to a parameter no learner owns.
    pub fn prepare_zero_gradients(
        &self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<()> {
        self.reorder(gradients, |parameter, existing| {
            let zeros = match existing {
                Some(mut gradient) if gradient.check_compatible(&parameter.value()).is_ok() => {
                    gradient.fill(0.);
                    gradient
                }
                _ => parameter.value().zeros_like(),
            };

            Ok(zeros)
        })?;

        let zero = self.zero_scalar();
        for statistic in [&mut info.training_loss_value, &mut info.eval_criterion_value] {
            statistic.get_or_insert_with(|| zero.clone()).fill(0.);
        }

        info.number_of_samples = 0;
        Ok(())
    }

    /// Re-orders `gradients` into aggregation order.
    ///
    /// # Returns
    /// An error if a parameter has no gradient, more than one, or a gradient
    /// belongs to a parameter no learner owns.
    pub fn align_gradients(&self, gradients: &mut Vec<GradientValue>) -> Result<()> {
        self.reorder(gradients, |parameter, existing| {
            existing.ok_or_else(|| DistributedErr::MissingGradient {
                name: parameter.name().to_string(),
            })
        })
    }

    /// Fills in the loss or criterion of a non-empty round that lacks them.
    ///
    /// The missing statistic contributes zero to the aggregated value.
    pub fn ensure_statistics(&self, info: &mut MinibatchInfo) {
        let statistics = [
            ("training loss", &mut info.training_loss_value),
            ("evaluation criterion", &mut info.eval_criterion_value),
        ];

        for (which, statistic) in statistics {
            if statistic.is_none() {
                warn!(samples = info.number_of_samples; "minibatch has no {which}, contributing zero");
                *statistic = Some(self.zero_scalar());
            }
        }
    }

    /// A zero scalar with the data type and device of the first parameter.
    fn zero_scalar(&self) -> Tensor {
        match self.learners.parameters().first() {
            Some(parameter) => {
                let value = parameter.value();
                Tensor::scalar(0., value.data_type(), value.device())
            }
            None => Tensor::scalar(0., DataType::Float, Device::Cpu),
        }
    }

    fn reorder<F>(&self, gradients: &mut Vec<GradientValue>, mut resolve: F) -> Result<()>
    where
        F: FnMut(&Parameter, Option<Tensor>) -> Result<Tensor>,
    {
        let parameters = self.learners.parameters();

        if let Some(unknown) = gradients
            .iter()
            .find(|gv| !parameters.contains(&gv.parameter))
        {
            return Err(DistributedErr::UnknownParameter {
                name: unknown.parameter.name().to_string(),
            });
        }

        let mut ordered = Vec::with_capacity(parameters.len());

        for parameter in parameters {
            let existing = gradients
                .iter()
                .position(|gv| gv.parameter == *parameter)
                .map(|i| gradients.swap_remove(i).gradient);

            ordered.push(GradientValue::new(parameter.clone(), resolve(parameter, existing)?));
        }

        if let Some(duplicate) = gradients.first() {
            return Err(DistributedErr::DuplicateGradient {
                name: duplicate.parameter.name().to_string(),
            });
        }

        *gradients = ordered;
        Ok(())
    }
}
