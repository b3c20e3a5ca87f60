//! Data-parallel distributed learners.
//!
//! Each worker owns a replica of the model and a set of local learners. A
//! distributed learner wraps those learners and, every round, combines the
//! workers' gradients through a `Communicator` so that every replica applies
//! the same update.

pub use comms;
pub use distributed;
pub use machine_learning;
pub use ml_core;
pub use orchestrator;

pub use distributed::{
    Capabilities, DistributedLearner, DistributedLearnerBuilder, DistributedLearnerSpec,
    UpdateOutcome,
};
pub use orchestrator::{SessionReport, train};
