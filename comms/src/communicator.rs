use std::sync::Arc;

use ml_core::Tensor;

use crate::{Result, WorkerDescriptor, WorkerSet};

/// A handle to a group of workers able to run blocking collectives.
///
/// Every worker of the group owns its own handle. Collectives only complete once
/// every worker of the group has entered them, so all workers must issue the same
/// sequence of calls with the same tensor layouts.
pub trait Communicator: Send + Sync {
    /// The worker this handle belongs to.
    fn current_worker(&self) -> &WorkerDescriptor;

    /// Every worker of the group, including the current one.
    fn workers(&self) -> &WorkerSet;

    /// Replaces every tensor with its element-wise sum across `workers`.
    ///
    /// # Arguments
    /// * `values` - The local contributions, overwritten with the sums.
    /// * `workers` - The participants, must be the whole group.
    ///
    /// # Returns
    /// An error if the worker set is not the whole group or the participants
    /// contributed tensors that cannot be summed together.
    fn aggregate_in_place(&self, values: &mut [&mut Tensor], workers: &WorkerSet) -> Result<()>;

    /// Blocks until every worker of the group has reached the barrier.
    fn barrier(&self) -> Result<()>;
}

impl<T: Communicator + ?Sized> Communicator for Arc<T> {
    fn current_worker(&self) -> &WorkerDescriptor {
        (**self).current_worker()
    }

    fn workers(&self) -> &WorkerSet {
        (**self).workers()
    }

    fn aggregate_in_place(&self, values: &mut [&mut Tensor], workers: &WorkerSet) -> Result<()> {
        (**self).aggregate_in_place(values, workers)
    }

    fn barrier(&self) -> Result<()> {
        (**self).barrier()
    }
}
