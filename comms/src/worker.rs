use std::collections::{BTreeSet, btree_set};

use serde::{Deserialize, Serialize};

/// Identifies one participant of a training group.
///
/// Workers are ordered by their global rank first, which is the order every
/// collective reduces in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub global_rank: usize,
    pub host_id: String,
}

impl WorkerDescriptor {
    pub fn new(global_rank: usize, host_id: impl Into<String>) -> Self {
        Self {
            global_rank,
            host_id: host_id.into(),
        }
    }
}

/// An ordered set of workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSet(BTreeSet<WorkerDescriptor>);

impl WorkerSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, worker: &WorkerDescriptor) -> bool {
        self.0.contains(worker)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, WorkerDescriptor> {
        self.0.iter()
    }

    /// The global ranks of the workers in ascending order.
    pub fn ranks(&self) -> Vec<usize> {
        self.0.iter().map(|w| w.global_rank).collect()
    }
}

impl FromIterator<WorkerDescriptor> for WorkerSet {
    fn from_iter<I: IntoIterator<Item = WorkerDescriptor>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a WorkerSet {
    type Item = &'a WorkerDescriptor;
    type IntoIter = btree_set::Iter<'a, WorkerDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_ordered_by_rank() {
        let set: WorkerSet = [2, 0, 1]
            .into_iter()
            .map(|rank| WorkerDescriptor::new(rank, "host"))
            .collect();

        assert_eq!(set.ranks(), vec![0, 1, 2]);
        assert!(set.contains(&WorkerDescriptor::new(1, "host")));
        assert!(!set.contains(&WorkerDescriptor::new(1, "other")));
    }

    #[test]
    fn descriptor_serializes_to_json() {
        let worker = WorkerDescriptor::new(3, "node-a");
        let json = serde_json::to_string(&worker).unwrap();

        assert_eq!(json, r#"{"global_rank":3,"host_id":"node-a"}"#);
    }
}
