use std::sync::Arc;

use comms::Communicator;
use log::{debug, info};
use ml_core::{GradientValue, Learners, MinibatchInfo};

use crate::{
    AggregationPayload, DistributedErr, DistributedLearner, DistributedLearnerBase, Result,
    UpdateOutcome,
};

/// Synchronous data-parallel training.
///
/// Once the warm-up threshold is reached, every round sums the gradients, the
/// statistics and the sample counts of all workers, so every worker applies the
/// exact same update and replicas never diverge.
pub struct DataParallelLearner {
    base: DistributedLearnerBase,
}

impl DataParallelLearner {
    /// Creates a new `DataParallelLearner`.
    ///
    /// # Arguments
    /// * `communicator` - This worker's handle to the group.
    /// * `learners` - The local learners applying the aggregated gradients.
    /// * `distribute_after_samples` - Samples to see before aggregating across workers.
    /// * `use_async_buffered_parameter_update` - Must be `false`.
    ///
    /// # Returns
    /// A new `DataParallelLearner` or `Unsupported` if asynchronous updates were requested.
    pub fn new(
        communicator: Arc<dyn Communicator>,
        learners: Learners,
        distribute_after_samples: usize,
        use_async_buffered_parameter_update: bool,
    ) -> Result<Self> {
        if use_async_buffered_parameter_update {
            return Err(DistributedErr::Unsupported {
                capability: "asynchronous parameter update",
                detail: "Asynchronous parameter update is not yet supported".to_string(),
            });
        }

        info!(
            worker = communicator.current_worker().global_rank,
            workers = communicator.workers().len(),
            distribute_after_samples = distribute_after_samples;
            "created data parallel learner"
        );

        Ok(Self {
            base: DistributedLearnerBase::new(communicator, learners, distribute_after_samples),
        })
    }

    /// Replaces the round's values with their sums across every worker.
    fn aggregate(
        &self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<()> {
        if info.is_empty() {
            self.base.prepare_zero_gradients(gradients, info)?;
        } else {
            self.base.align_gradients(gradients)?;
            self.base.ensure_statistics(info);
        }

        let communicator = self.base.communicator();
        let mut payload = AggregationPayload::new(gradients, info)?;
        communicator.aggregate_in_place(&mut payload.values(), communicator.workers())?;

        let samples = payload.aggregated_sample_count()?;
        info.number_of_samples = samples;
        Ok(())
    }
}

impl DistributedLearner for DataParallelLearner {
    fn update(
        &mut self,
        gradients: &mut Vec<GradientValue>,
        info: &mut MinibatchInfo,
    ) -> Result<UpdateOutcome> {
        let aggregated = self.base.is_distributing();
        if aggregated {
            self.aggregate(gradients, info)?;
        }

        let total_samples_seen = self.base.record_samples(info.number_of_samples);
        let update = self.base.learners_mut().update(gradients, info)?;

        debug!(
            worker = self.base.communicator().current_worker().global_rank,
            aggregated = aggregated,
            samples = info.number_of_samples,
            total = total_samples_seen;
            "data parallel round"
        );

        Ok(UpdateOutcome {
            continue_training: update.applied && !info.is_empty(),
            total_samples_seen,
        })
    }

    fn base(&self) -> &DistributedLearnerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DistributedLearnerBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "data_parallel"
    }
}

#[cfg(test)]
mod tests {
    use ml_core::Learner;

    use super::*;
    use crate::test::{RecordingLearner, gradient, minibatch, param, run_workers, single_worker};

    fn build(
        communicator: Arc<dyn Communicator>,
        value: &[f32],
        threshold: usize,
    ) -> (DataParallelLearner, RecordingLearner) {
        let recorder = RecordingLearner::new(vec![param("w", value)]);
        let learners = Learners::single(recorder.clone()).unwrap();
        let learner = DataParallelLearner::new(communicator, learners, threshold, false).unwrap();
        (learner, recorder)
    }

    #[test]
    fn asynchronous_update_fails_fast() {
        let comm = single_worker();
        let learners = Learners::single(RecordingLearner::new(vec![param("w", &[0.])])).unwrap();

        let err = DataParallelLearner::new(comm, learners, 0, true).err().unwrap();
        assert_eq!(
            err,
            DistributedErr::Unsupported {
                capability: "asynchronous parameter update",
                detail: "Asynchronous parameter update is not yet supported".into()
            }
        );
    }

    #[test]
    fn two_workers_sum_gradients_and_counts() {
        let results = run_workers(2, |comm| {
            let rank = comm.current_worker().global_rank;
            let (mut learner, recorder) = build(comm, &[0.], 0);
            let w = learner.parameters()[0].clone();

            let local = if rank == 0 { 1. } else { 3. };
            let mut gradients = vec![gradient(&w, &[local])];
            let mut info = minibatch(5, 1., 2.);

            let outcome = learner.update(&mut gradients, &mut info).unwrap();
            (outcome, gradients[0].gradient.values(), info, recorder.records())
        });

        for (outcome, gradient, info, records) in results {
            assert_eq!(gradient, vec![4.]);
            assert_eq!(info.number_of_samples, 10);
            assert_eq!(info.training_loss(), Some(2.));
            assert_eq!(info.eval_criterion(), Some(4.));
            assert_eq!(outcome.total_samples_seen, 10);
            assert!(outcome.continue_training);
            assert_eq!(records, vec![(vec![4.], 10)]);
        }
    }

    #[test]
    fn sample_count_is_conserved_with_an_empty_worker() {
        let counts = [10, 0, 25];

        let results = run_workers(3, |comm| {
            let rank = comm.current_worker().global_rank;
            let (mut learner, _) = build(comm, &[0.], 0);
            let w = learner.parameters()[0].clone();

            let (mut gradients, mut info) = match counts[rank] {
                0 => (vec![], MinibatchInfo::default()),
                n => (vec![gradient(&w, &[rank as f32])], minibatch(n, 1., 1.)),
            };

            let outcome = learner.update(&mut gradients, &mut info).unwrap();
            (outcome, gradients[0].gradient.values(), info.number_of_samples)
        });

        for (outcome, gradient, samples) in results {
            assert_eq!(samples, 35);
            assert_eq!(outcome.total_samples_seen, 35);
            assert_eq!(gradient, vec![2.]);
            assert!(outcome.continue_training);
        }
    }

    #[test]
    fn infinite_threshold_never_aggregates() {
        let results = run_workers(2, |comm| {
            let rank = comm.current_worker().global_rank;
            let (mut learner, recorder) = build(comm, &[0.], usize::MAX);
            let w = learner.parameters()[0].clone();

            let mut totals = vec![];
            for _ in 0..3 {
                let mut gradients = vec![gradient(&w, &[rank as f32 + 1.])];
                let mut info = minibatch(rank + 1, 0., 0.);
                totals.push(learner.update(&mut gradients, &mut info).unwrap().total_samples_seen);
            }

            (rank, totals, recorder.records())
        });

        for (rank, totals, records) in results {
            let n = rank + 1;
            assert_eq!(totals, vec![n, 2 * n, 3 * n]);
            assert!(records.iter().all(|r| *r == (vec![n as f64], n)));
        }
    }

    #[test]
    fn threshold_starts_aggregation_once_reached() {
        let results = run_workers(2, |comm| {
            let (mut learner, recorder) = build(comm, &[0.], 8);
            let w = learner.parameters()[0].clone();

            let mut totals = vec![];
            for _ in 0..4 {
                let mut gradients = vec![gradient(&w, &[1.])];
                let mut info = minibatch(4, 0., 0.);
                totals.push(learner.update(&mut gradients, &mut info).unwrap().total_samples_seen);
            }

            (totals, recorder.records())
        });

        for (totals, records) in results {
            assert_eq!(totals, vec![4, 8, 16, 24]);

            let counts: Vec<usize> = records.iter().map(|(_, n)| *n).collect();
            assert_eq!(counts, vec![4, 4, 8, 8]);
            assert_eq!(records[2].0, vec![2.]);
        }
    }

    #[test]
    fn replicas_stay_bit_identical() {
        let results = run_workers(4, |comm| {
            let rank = comm.current_worker().global_rank;
            let (mut learner, _) = build(comm, &[0.5, -0.25, 1.], 0);
            let w = learner.parameters()[0].clone();

            let mut trace = vec![];
            for round in 0..6 {
                let seed = (rank * 7 + round * 3) as f32;
                let local = [seed.sin() * 1e-3, seed.cos() / 3., 0.1 * seed];
                let mut gradients = vec![gradient(&w, &local)];
                let mut info = minibatch(rank + round, 0.3 * seed as f64, 1.);

                let outcome = learner.update(&mut gradients, &mut info).unwrap();
                let bits: Vec<u64> = w.value().values().iter().map(|v| v.to_bits()).collect();
                trace.push((outcome.total_samples_seen, bits, info.training_loss()));
            }

            trace
        });

        for trace in &results[1..] {
            assert_eq!(*trace, results[0]);
        }
    }

    #[test]
    fn empty_round_everywhere_stops_training() {
        let results = run_workers(2, |comm| {
            let (mut learner, _) = build(comm, &[1.], 0);
            let mut gradients = vec![];
            let mut info = MinibatchInfo::default();

            learner.update(&mut gradients, &mut info).unwrap()
        });

        for outcome in results {
            assert!(!outcome.continue_training);
            assert_eq!(outcome.total_samples_seen, 0);
        }
    }

    #[test]
    fn stopped_local_learner_stops_training() {
        let comm = single_worker();
        let recorder = RecordingLearner::new(vec![param("w", &[0.])]).stopping();
        let w = recorder.parameters()[0].clone();
        let learners = Learners::single(recorder).unwrap();
        let mut learner = DataParallelLearner::new(comm, learners, 0, false).unwrap();

        let mut gradients = vec![gradient(&w, &[1.])];
        let outcome = learner.update(&mut gradients, &mut minibatch(3, 0., 0.)).unwrap();

        assert!(!outcome.continue_training);
        assert_eq!(outcome.total_samples_seen, 3);
    }

    #[test]
    fn checkpoint_round_trip() {
        let (mut learner, _) = build(single_worker(), &[0.], 0);
        let w = learner.parameters()[0].clone();

        learner
            .update(&mut vec![gradient(&w, &[1.])], &mut minibatch(6, 0., 0.))
            .unwrap();
        let checkpoint = learner.checkpoint();
        assert_eq!(checkpoint.total_samples_seen, 6);

        let (mut restored, _) = build(single_worker(), &[0.], 0);
        restored.restore(&checkpoint);
        assert_eq!(restored.total_samples_seen(), 6);
    }
}
