use ml_core::{GradientValue, MinibatchInfo, Parameter};
use serde::{Deserialize, Serialize};

use crate::{DistributedLearnerBase, Result};

/// What a distributed learner reports after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// `false` once the local learners stop or the round carried no data anywhere.
    pub continue_training: bool,
    /// The worker's sample counter after the round.
    pub total_samples_seen: usize,
}

/// The serializable progress of a distributed learner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerCheckpoint {
    pub total_samples_seen: usize,
}

/// A strategy turning per-worker gradients into one consistent update.
///
/// Every worker of a group must call `update` the same number of times with
/// gradients for the same parameters. Breaking that precondition leaves the
/// group blocked in a collective or silently diverging, it is not detected.
pub trait DistributedLearner: Send {
    /// Runs one training round.
    ///
    /// # Arguments
    /// * `gradients` - The local gradients, replaced with the values the local learners used.
    /// * `info` - The local minibatch statistics, replaced with the aggregated ones.
    ///
    /// # Returns
    /// Whether training should continue and the updated sample counter.
    fn update(
        &mut self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<UpdateOutcome>;

    fn base(&self) -> &DistributedLearnerBase;

    fn base_mut(&mut self) -> &mut DistributedLearnerBase;

    /// A short name of the strategy, used in logs.
    fn kind(&self) -> &'static str;

    fn total_samples_seen(&self) -> usize {
        self.base().total_samples_seen()
    }

    /// The parameters of the wrapped learners in aggregation order.
    fn parameters(&self) -> &[Parameter] {
        self.base().learners().parameters()
    }

    fn checkpoint(&self) -> LearnerCheckpoint {
        LearnerCheckpoint {
            total_samples_seen: self.total_samples_seen(),
        }
    }

    fn restore(&mut self, checkpoint: &LearnerCheckpoint) {
        self.base_mut().restore(checkpoint);
    }
}
