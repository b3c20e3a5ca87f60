mod base;
mod block_momentum;
mod builder;
mod capability;
mod data_parallel;
mod error;
mod learner;
mod payload;
mod quantized;
mod specs;
mod test;

pub use base::DistributedLearnerBase;
pub use block_momentum::{BlockMomentumConfig, BlockMomentumLearner, momentum_from_time_constant};
pub use builder::DistributedLearnerBuilder;
pub use capability::Capabilities;
pub use data_parallel::DataParallelLearner;
pub use error::{DistributedErr, Result};
pub use learner::{DistributedLearner, LearnerCheckpoint, UpdateOutcome};
pub use payload::AggregationPayload;
pub use quantized::QuantizedDataParallelLearner;
pub use specs::{BlockMomentumSpec, DistributedLearnerSpec};
