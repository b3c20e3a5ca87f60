use std::sync::Arc;

use comms::{Communicator, LocalGroup};
use distributed::{DistributedErr, DistributedLearnerBuilder};
use log::{info, warn};
use machine_learning::{model::LinearModel, specs::LearnerBuilder};
use ml_core::Learners;
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tokio::{runtime::Runtime, task::JoinSet};

use crate::{
    configs::{ModelConfig, TrainingConfig},
    error::{OrchestratorError, Result},
    source::MinibatchSource,
    trainer::{Trainer, WorkerReport},
};

/// The outcome of a whole training session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// One report per worker, ordered by rank.
    pub workers: Vec<WorkerReport>,
}

impl SessionReport {
    /// Whether every worker ended with bit-identical parameters.
    pub fn replicas_agree(&self) -> bool {
        let bits = |report: &WorkerReport| {
            let mut bits: Vec<u64> = report.weights.iter().map(|w| w.to_bits()).collect();
            bits.push(report.bias.to_bits());
            bits
        };

        self.workers
            .split_first()
            .is_none_or(|(first, rest)| rest.iter().all(|r| bits(r) == bits(first)))
    }
}

/// A training session running one blocking worker per thread in the background.
pub struct Session {
    runtime: Runtime,
    tasks: JoinSet<Result<WorkerReport>>,
}

impl Session {
    /// Creates a new `Session` and starts every worker.
    ///
    /// Every worker is fully built before the first one starts, so configuration
    /// errors never leave a partial group blocked in a collective.
    ///
    /// # Arguments
    /// * `config` - The configuration of the session.
    ///
    /// # Returns
    /// A new running `Session` or an error if the config is invalid.
    pub fn new(config: &TrainingConfig) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let dataset = config.dataset.build(&mut StdRng::seed_from_u64(seed))?;
        let workers = config.workers.get();

        if dataset.len() < workers {
            warn!(samples = dataset.len(), workers = workers; "some workers get no samples");
        }

        let rounds_per_sweep =
            MinibatchSource::rounds_per_sweep(dataset.len(), workers, config.batch_size);
        let communicators = LocalGroup::create(workers).map_err(DistributedErr::from)?;
        let learner_builder = LearnerBuilder::new(config.learning_rate_unit);
        let distributed_builder = DistributedLearnerBuilder::new();

        let mut trainers = Vec::with_capacity(workers);
        for comm in communicators {
            let rank = comm.current_worker().global_rank;

            // Same seed on every worker, replicas must start identical.
            let ModelConfig::Linear { features, init } = config.model;
            let model = LinearModel::new(features, &init, &mut StdRng::seed_from_u64(seed))?;

            let local = learner_builder.build(&config.optimizer, model.parameters())?;
            let communicator: Arc<dyn Communicator> = Arc::new(comm);
            let learner =
                distributed_builder.build(&config.learner, communicator, Learners::new(vec![local])?)?;

            let source = MinibatchSource::new(
                dataset.shard(workers, rank),
                config.batch_size,
                rounds_per_sweep,
                config.epochs.get(),
            );

            trainers.push(Trainer::new(rank, model, learner, source));
        }

        let runtime = Runtime::new()?;
        let mut tasks = JoinSet::new();

        for trainer in trainers {
            let worker_id = trainer.worker_id();
            let task = move || {
                trainer.run().map_err(|e| OrchestratorError::WorkerError {
                    worker_id,
                    msg: e.to_string(),
                })
            };

            tasks.spawn_blocking_on(task, runtime.handle());
        }

        info!(workers = workers, seed = seed, rounds_per_sweep = rounds_per_sweep; "session started");
        Ok(Self { runtime, tasks })
    }

    /// Waits until every worker finished training.
    ///
    /// # Returns
    /// The report of every worker or the first worker failure.
    pub fn wait(self) -> Result<SessionReport> {
        let Self { runtime, mut tasks } = self;

        let result = runtime.block_on(async {
            let mut workers = Vec::with_capacity(tasks.len());

            while let Some(joined) = tasks.join_next().await {
                let report = joined.map_err(|e| OrchestratorError::WorkerPanicked {
                    msg: e.to_string(),
                })??;

                workers.push(report);
            }

            workers.sort_by_key(|r| r.worker_id);
            Ok::<_, OrchestratorError>(SessionReport { workers })
        });

        // The remaining workers may be blocked in a collective forever.
        if result.is_err() {
            runtime.shutdown_background();
        }

        result
    }
}
