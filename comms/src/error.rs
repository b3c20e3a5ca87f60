use std::{
    error::Error,
    fmt::{self, Display},
};

use ml_core::MlErr;

/// The result type used across the communication layer.
pub type Result<T> = std::result::Result<T, CommsErr>;

/// The communication layer's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum CommsErr {
    /// A group needs at least one worker.
    EmptyGroup,
    /// A collective was requested over a worker set other than the whole group.
    WorkerSetMismatch { expected: Vec<usize>, got: Vec<usize> },
    /// The participants of a collective disagreed on what they were reducing.
    Misaligned(String),
    InvalidQuantization { bits: u32 },
    Ml(MlErr),
}

impl Display for CommsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsErr::EmptyGroup => f.write_str("a worker group needs at least one worker"),
            CommsErr::WorkerSetMismatch { expected, got } => write!(
                f,
                "collectives must span the whole group {expected:?}, got workers {got:?}"
            ),
            CommsErr::Misaligned(msg) => write!(f, "misaligned collective: {msg}"),
            CommsErr::InvalidQuantization { bits } => {
                write!(f, "cannot quantize with {bits} bits per value")
            }
            CommsErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for CommsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommsErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for CommsErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}
