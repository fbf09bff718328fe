use minority_core::TxHash;
use std::collections::{HashSet, VecDeque};

/// Hashes already looked at, bounded by dropping the oldest entries.
#[derive(Debug)]
pub struct SeenSet {
    order: VecDeque<TxHash>,
    members: HashSet<TxHash>,
    capacity: usize,
    retain: usize,
}

impl SeenSet {
    /// Once more than `capacity` hashes are held, only the newest `retain` survive.
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
            retain: retain.min(capacity),
        }
    }

    /// Returns `true` if the hash was not seen before.
    pub fn insert(&mut self, hash: TxHash) -> bool {
        if !self.members.insert(hash) {
            return false;
        }
        self.order.push_back(hash);

        if self.order.len() > self.capacity {
            let drop = self.order.len() - self.retain;
            for old in self.order.drain(..drop) {
                self.members.remove(&old);
            }
            tracing::debug!("Pruned {} seen transactions, keeping {}", drop, self.retain);
        }
        true
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.members.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
