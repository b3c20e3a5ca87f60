use std::env;

use log::{info, warn};
use orchestrator::{OrchestratorError, configs::TrainingConfig, train};

fn main() -> Result<(), OrchestratorError> {
    env_logger::init();

    let path = env::args().nth(1).ok_or_else(|| {
        OrchestratorError::InvalidConfig("usage: orchestrator <config.json>".into())
    })?;

    let config = TrainingConfig::from_json_file(&path)?;
    info!("loaded config from {path}");

    let report = train(&config)?;
    if !report.replicas_agree() {
        warn!("worker replicas ended with different parameters");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
