use std::{
    error::Error,
    fmt::{self, Display},
};

use comms::CommsErr;
use ml_core::MlErr;

/// The result type used by the distributed learners.
pub type Result<T> = std::result::Result<T, DistributedErr>;

/// The distributed learners' error type.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributedErr {
    /// The requested behavior is not available in this build or not implemented.
    Unsupported {
        capability: &'static str,
        detail: String,
    },
    InvalidConfig(String),
    /// A gradient was supplied for a parameter no learner owns.
    UnknownParameter { name: String },
    /// A parameter owned by the learners has no gradient.
    MissingGradient { name: String },
    DuplicateGradient { name: String },
    /// A non-empty round was missing its loss or criterion.
    MissingStatistic { which: &'static str },
    /// The aggregated sample count is not a non-negative integer.
    InvalidSampleCount(f64),
    Comms(CommsErr),
    Ml(MlErr),
}

impl Display for DistributedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributedErr::Unsupported { capability, detail } => {
                write!(f, "unsupported ({capability}): {detail}")
            }
            DistributedErr::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            DistributedErr::UnknownParameter { name } => {
                write!(f, "got a gradient for '{name}', which no learner owns")
            }
            DistributedErr::MissingGradient { name } => {
                write!(f, "no gradient was provided for parameter '{name}'")
            }
            DistributedErr::DuplicateGradient { name } => {
                write!(f, "parameter '{name}' has more than one gradient")
            }
            DistributedErr::MissingStatistic { which } => {
                write!(f, "a non-empty minibatch must carry its {which}")
            }
            DistributedErr::InvalidSampleCount(count) => {
                write!(f, "aggregated sample count {count} is not a non-negative integer")
            }
            DistributedErr::Comms(e) => write!(f, "{e}"),
            DistributedErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for DistributedErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DistributedErr::Comms(e) => Some(e),
            DistributedErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommsErr> for DistributedErr {
    fn from(e: CommsErr) -> Self {
        Self::Comms(e)
    }
}

impl From<MlErr> for DistributedErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}
