mod communicator;
mod error;
mod local;
pub mod quantization;
mod quantized;
mod worker;

pub use communicator::Communicator;
pub use error::{CommsErr, Result};
pub use local::{LocalCommunicator, LocalGroup};
pub use quantization::QuantizationSpec;
pub use quantized::{QuantizedCommunicator, QuantizingCommunicator};
pub use worker::{WorkerDescriptor, WorkerSet};
