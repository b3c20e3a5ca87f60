pub mod dataset;
pub mod initialization;
mod learner;
pub mod model;
pub mod optimization;
pub mod specs;

pub use learner::{LearningRateUnit, OptimizerLearner};
pub use ml_core::{MlErr, Result};
