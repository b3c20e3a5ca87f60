use std::sync::{Arc, Barrier};

use log::{debug, warn};
use ml_core::Tensor;
use parking_lot::{Mutex, RwLock};

use crate::{Communicator, CommsErr, Result, WorkerDescriptor, WorkerSet};

const LOCAL_HOST: &str = "localhost";

type Outcome = std::result::Result<Vec<Tensor>, String>;

/// State shared by every handle of a `LocalGroup`.
struct Rendezvous {
    barrier: Barrier,
    contributions: Mutex<Vec<Option<Vec<Tensor>>>>,
    outcome: RwLock<Option<Outcome>>,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            barrier: Barrier::new(size),
            contributions: Mutex::new(vec![None; size]),
            outcome: RwLock::new(None),
        }
    }
}

/// Builds in-process worker groups.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates a group of `size` workers living in the same process.
    ///
    /// Each returned handle is meant to be moved to its own thread, collectives
    /// block until every handle has entered them.
    ///
    /// # Arguments
    /// * `size` - The amount of workers in the group.
    ///
    /// # Returns
    /// One communicator per worker, ordered by rank, or `EmptyGroup` if `size` is zero.
    pub fn create(size: usize) -> Result<Vec<LocalCommunicator>> {
        if size == 0 {
            return Err(CommsErr::EmptyGroup);
        }

        let rendezvous = Arc::new(Rendezvous::new(size));
        let workers: WorkerSet = (0..size)
            .map(|rank| WorkerDescriptor::new(rank, LOCAL_HOST))
            .collect();

        let communicators = (0..size)
            .map(|rank| LocalCommunicator {
                current: WorkerDescriptor::new(rank, LOCAL_HOST),
                workers: workers.clone(),
                rendezvous: Arc::clone(&rendezvous),
            })
            .collect();

        Ok(communicators)
    }
}

/// A worker's handle to a `LocalGroup`.
///
/// Sums are computed once, by a single worker, adding contributions in rank
/// order, and then copied to every worker. Every worker therefore observes
/// bit-identical results.
pub struct LocalCommunicator {
    current: WorkerDescriptor,
    workers: WorkerSet,
    rendezvous: Arc<Rendezvous>,
}

impl LocalCommunicator {
    fn rank(&self) -> usize {
        self.current.global_rank
    }

    fn reduce(&self) {
        let size = self.workers.len();
        let contributions =
            std::mem::replace(&mut *self.rendezvous.contributions.lock(), vec![None; size]);

        let outcome = reduce_in_rank_order(contributions);
        if let Err(msg) = &outcome {
            warn!(worker = self.rank(); "aggregation failed: {msg}");
        }

        *self.rendezvous.outcome.write() = Some(outcome);
    }
}

fn reduce_in_rank_order(contributions: Vec<Option<Vec<Tensor>>>) -> Outcome {
    let mut contributions = contributions.into_iter().enumerate();

    let mut sum = match contributions.next() {
        Some((_, Some(first))) => first,
        _ => return Err("worker 0 did not contribute".to_string()),
    };

    for (rank, contribution) in contributions {
        let contribution =
            contribution.ok_or_else(|| format!("worker {rank} did not contribute"))?;

        if contribution.len() != sum.len() {
            return Err(format!(
                "worker {rank} contributed {} tensors, worker 0 contributed {}",
                contribution.len(),
                sum.len()
            ));
        }

        for (i, (acc, value)) in sum.iter_mut().zip(&contribution).enumerate() {
            acc.add_assign(value)
                .map_err(|e| format!("tensor {i} of worker {rank}: {e}"))?;
        }
    }

    Ok(sum)
}

impl Communicator for LocalCommunicator {
    fn current_worker(&self) -> &WorkerDescriptor {
        &self.current
    }

    fn workers(&self) -> &WorkerSet {
        &self.workers
    }

    fn aggregate_in_place(&self, values: &mut [&mut Tensor], workers: &WorkerSet) -> Result<()> {
        if *workers != self.workers {
            return Err(CommsErr::WorkerSetMismatch {
                expected: self.workers.ranks(),
                got: workers.ranks(),
            });
        }

        let contribution = values.iter().map(|value| (**value).clone()).collect();
        self.rendezvous.contributions.lock()[self.rank()] = Some(contribution);

        if self.rendezvous.barrier.wait().is_leader() {
            self.reduce();
        }

        self.rendezvous.barrier.wait();

        let outcome = self.rendezvous.outcome.read();
        match outcome.as_ref() {
            Some(Ok(sums)) if sums.len() == values.len() => {
                for (value, sum) in values.iter_mut().zip(sums) {
                    value.assign(sum)?;
                }
            }
            Some(Ok(sums)) => {
                return Err(CommsErr::Misaligned(format!(
                    "worker {} contributed {} tensors, the sum has {}",
                    self.rank(),
                    values.len(),
                    sums.len()
                )));
            }
            Some(Err(msg)) => return Err(CommsErr::Misaligned(msg.clone())),
            None => return Err(CommsErr::Misaligned("no aggregation outcome".to_string())),
        }

        debug!(worker = self.rank(), tensors = values.len(); "aggregated");
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        self.rendezvous.barrier.wait();
        Ok(())
    }
}
