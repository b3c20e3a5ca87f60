mod device;
mod error;
mod learner;
mod minibatch;
mod parameter;
mod tensor;

pub use device::Device;
pub use error::{MlErr, Result};
pub use learner::{Learner, Learners, LearnersUpdate, find_gradient};
pub use minibatch::MinibatchInfo;
pub use parameter::{GradientValue, Parameter};
pub use tensor::{DataType, Tensor};
