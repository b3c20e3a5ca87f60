use distributed::{DistributedLearner, LearnerCheckpoint, UpdateOutcome};
use log::{debug, info};
use machine_learning::model::LinearModel;
use ml_core::MinibatchInfo;
use serde::Serialize;

use crate::{
    error::Result,
    source::{MinibatchSource, Round},
};

/// The final state of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub rounds: usize,
    pub total_samples_seen: usize,
    /// The mean loss of the last completed sweep, as seen by this worker.
    pub last_sweep_loss: Option<f64>,
    pub checkpoint: LearnerCheckpoint,
}

/// Drives one worker: computes the gradients of every round and hands them
/// to the distributed learner.
pub struct Trainer {
    worker_id: usize,
    model: LinearModel,
    learner: Box<dyn DistributedLearner>,
    source: MinibatchSource,
    rounds: usize,
    sweep_loss: f64,
    sweep_samples: usize,
    last_sweep_loss: Option<f64>,
}

impl Trainer {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `worker_id` - The rank of this worker, used for observability.
    /// * `model` - The model whose parameters `learner` updates.
    /// * `learner` - This worker's distributed learner.
    /// * `source` - The minibatches of this worker.
    pub fn new(
        worker_id: usize,
        model: LinearModel,
        learner: Box<dyn DistributedLearner>,
        source: MinibatchSource,
    ) -> Self {
        Self {
            worker_id,
            model,
            learner,
            source,
            rounds: 0,
            sweep_loss: 0.,
            sweep_samples: 0,
            last_sweep_loss: None,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Runs a single round.
    ///
    /// # Arguments
    /// * `round` - The local minibatch, `None` once this worker ran out of data.
    ///
    /// # Returns
    /// The learner's outcome or an error if the round failed.
    pub fn train_minibatch(&mut self, round: Option<Round>) -> Result<UpdateOutcome> {
        let (mut gradients, mut info) = match &round {
            Some(Round {
                batch,
                at_end_of_sweep,
                ..
            }) => {
                let (gradients, info) = self.model.gradients(batch)?;
                (gradients, info.with_end_of_sweep(*at_end_of_sweep))
            }
            None => (Vec::new(), MinibatchInfo::default().with_end_of_data(true)),
        };

        let outcome = self.learner.update(&mut gradients, &mut info)?;
        self.rounds += 1;

        if let Some(loss) = info.training_loss() {
            self.sweep_loss += loss;
            self.sweep_samples += info.number_of_samples;
        }

        if let Some(round) = round.filter(|r| r.at_end_of_sweep) {
            let mean = self.sweep_loss / self.sweep_samples.max(1) as f64;
            self.last_sweep_loss = Some(mean);
            self.sweep_loss = 0.;
            self.sweep_samples = 0;

            info!(
                worker = self.worker_id,
                sweep = round.sweep,
                loss = mean,
                total_samples_seen = outcome.total_samples_seen;
                "finished sweep"
            );
        }

        Ok(outcome)
    }

    /// Trains until the source is exhausted and every worker agreed to stop.
    ///
    /// # Returns
    /// The report of this worker or the first error of a round.
    pub fn run(mut self) -> Result<WorkerReport> {
        info!(
            worker = self.worker_id,
            strategy = self.learner.kind(),
            shard = self.source.shard_len();
            "starting training"
        );

        loop {
            let round = self.source.next();
            let exhausted = round.is_none();

            let outcome = self.train_minibatch(round)?;
            if !outcome.continue_training {
                break;
            }

            if exhausted {
                debug!(worker = self.worker_id; "waiting for the group to run out of data");
            }
        }

        let (weights, bias) = self.model.snapshot();
        info!(worker = self.worker_id, rounds = self.rounds; "training finished");

        Ok(WorkerReport {
            worker_id: self.worker_id,
            weights,
            bias,
            rounds: self.rounds,
            total_samples_seen: self.learner.total_samples_seen(),
            last_sweep_loss: self.last_sweep_loss,
            checkpoint: self.learner.checkpoint(),
        })
    }
}
