//! Min-heap of pending fires ordered by due time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use super::task::TaskToken;

/// One pending fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingFire {
    pub due: DateTime<Utc>,
    pub token: TaskToken,
    /// Insertion sequence; FIFO among equal due times.
    seq: u64,
}

impl PartialOrd for PendingFire {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingFire {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest due first (reversed for max-heap), then lowest sequence
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending fires across all scheduled tasks. O(log n) push and pop.
#[derive(Debug, Default)]
pub(crate) struct FireQueue {
    heap: BinaryHeap<PendingFire>,
    next_seq: u64,
}

impl FireQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: TaskToken, due: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PendingFire { due, token, seq });
    }

    /// Earliest due time, if any.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|f| f.due)
    }

    /// Remove and return every fire due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<PendingFire> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|f| f.due <= now) {
            if let Some(fire) = self.heap.pop() {
                due.push(fire);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
