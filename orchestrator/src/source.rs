use std::num::NonZeroUsize;

use machine_learning::dataset::{Batch, Dataset};

/// One round's worth of local samples.
#[derive(Debug, Clone)]
pub struct Round {
    pub batch: Batch,
    pub sweep: usize,
    pub at_end_of_sweep: bool,
}

/// Cuts a worker's shard into the minibatches of every round.
///
/// Every worker of a session runs `rounds_per_sweep` rounds per sweep, shards
/// shorter than the longest one contribute empty batches once they run out.
pub struct MinibatchSource {
    shard: Dataset,
    batch_size: NonZeroUsize,
    rounds_per_sweep: usize,
    sweeps: usize,
    round: usize,
}

impl MinibatchSource {
    /// Creates a new `MinibatchSource`.
    ///
    /// # Arguments
    /// * `shard` - This worker's samples.
    /// * `batch_size` - The amount of local samples per round.
    /// * `rounds_per_sweep` - The amount of rounds of a sweep, equal on every worker.
    /// * `sweeps` - The amount of passes over the shard.
    pub fn new(
        shard: Dataset,
        batch_size: NonZeroUsize,
        rounds_per_sweep: usize,
        sweeps: usize,
    ) -> Self {
        Self {
            shard,
            batch_size,
            rounds_per_sweep,
            sweeps,
            round: 0,
        }
    }

    /// The amount of rounds per sweep for a dataset split across `workers`.
    pub fn rounds_per_sweep(samples: usize, workers: usize, batch_size: NonZeroUsize) -> usize {
        samples
            .div_ceil(workers.max(1))
            .div_ceil(batch_size.get())
            .max(1)
    }

    pub fn shard_len(&self) -> usize {
        self.shard.len()
    }

    /// Whether every worker has seen the same local samples by the round any of
    /// them reaches `threshold`, so the whole group starts aggregating together.
    ///
    /// Shards follow the round-robin split of `Dataset::shard`.
    ///
    /// # Arguments
    /// * `samples` - The size of the whole dataset.
    /// * `workers` - The amount of shards.
    /// * `batch_size` - The amount of local samples per round.
    /// * `sweeps` - The amount of passes over every shard.
    /// * `threshold` - The samples to see before aggregating.
    pub fn crosses_threshold_together(
        samples: usize,
        workers: usize,
        batch_size: NonZeroUsize,
        sweeps: usize,
        threshold: usize,
    ) -> bool {
        let workers = workers.max(1);
        let rounds_per_sweep = Self::rounds_per_sweep(samples, workers, batch_size);
        let shards: Vec<usize> = (0..workers)
            .map(|rank| samples / workers + usize::from(rank < samples % workers))
            .collect();

        let round_samples = |shard_len: usize, round: usize| {
            let start = (round % rounds_per_sweep) * batch_size.get();
            shard_len.saturating_sub(start).min(batch_size.get())
        };

        let mut seen = 0;
        for round in 0..rounds_per_sweep * sweeps {
            if seen >= threshold {
                return true;
            }

            let local = round_samples(shards[0], round);
            if shards.iter().any(|&len| round_samples(len, round) != local) {
                return false;
            }

            seen += local;
        }

        true
    }
}

impl Iterator for MinibatchSource {
    type Item = Round;

    fn next(&mut self) -> Option<Self::Item> {
        if self.round >= self.rounds_per_sweep * self.sweeps {
            return None;
        }

        let sweep = self.round / self.rounds_per_sweep;
        let index = self.round % self.rounds_per_sweep;
        self.round += 1;

        let start = index * self.batch_size.get();
        Some(Round {
            batch: self.shard.batch(start..start + self.batch_size.get()),
            sweep,
            at_end_of_sweep: index + 1 == self.rounds_per_sweep,
        })
    }
}
