pub mod configs;
mod error;
mod session;
mod source;
mod trainer;

pub use error::{OrchestratorError, Result};
pub use session::{Session, SessionReport};
pub use source::{MinibatchSource, Round};
pub use trainer::{Trainer, WorkerReport};

use configs::TrainingConfig;

/// Runs a whole training session and waits for it to finish.
///
/// # Errors
/// Returns an `OrchestratorError` if the config is invalid or any worker fails.
pub fn train(config: &TrainingConfig) -> Result<SessionReport> {
    log::info!(workers = config.workers.get(); "starting training session");
    Session::new(config)?.wait()
}
