use std::{fmt, io};

use distributed::DistributedErr;
use ml_core::MlErr;

/// The result type used by the orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any worker starts.
    InvalidConfig(String),
    /// A worker produced an unrecoverable error during training.
    WorkerError { worker_id: usize, msg: String },
    WorkerPanicked { msg: String },
    /// Building a distributed learner failed.
    Distributed(DistributedErr),
    Ml(MlErr),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::WorkerError { worker_id, msg } => {
                write!(f, "worker {worker_id} error: {msg}")
            }
            Self::WorkerPanicked { msg } => write!(f, "a worker panicked: {msg}"),
            Self::Distributed(e) => write!(f, "distributed learner error: {e}"),
            Self::Ml(e) => write!(f, "machine learning error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Distributed(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DistributedErr> for OrchestratorError {
    fn from(e: DistributedErr) -> Self {
        Self::Distributed(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
