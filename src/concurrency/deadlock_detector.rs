use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::TransactionId;

/// Wait-for graph over transactions.
///
/// An edge `A -> B` means `A` is blocked on a page that `B` currently holds.
/// A waiter's out-edges are replaced wholesale every time it fails to get a
/// lock, and removed once it stops waiting, so the graph only ever describes
/// the most recent snapshot of each blocked transaction.
///
/// The whole graph sits behind one mutex: cycle detection must see a
/// consistent set of edges across transactions.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    waits_for: Mutex<HashMap<TransactionId, HashSet<TransactionId>>>,
}

impl DeadlockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the out-edges of `txn` with `holders`, the transactions
    /// currently holding the page `txn` is blocked on. `txn` itself is never
    /// recorded as one of its own holders.
    pub fn record_wait<I>(&self, txn: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let edges: HashSet<TransactionId> =
            holders.into_iter().filter(|holder| *holder != txn).collect();

        let mut waits_for = self.waits_for.lock();
        if edges.is_empty() {
            waits_for.remove(&txn);
        } else {
            waits_for.insert(txn, edges);
        }
    }

    /// Removes every out-edge of `txn`. Called once `txn` is granted the page
    /// it was waiting on, gives up, or completes.
    pub fn clear_wait(&self, txn: TransactionId) {
        self.waits_for.lock().remove(&txn);
    }

    /// Breadth-first search from `from`; true iff `from` can reach itself
    /// through at least one edge.
    pub fn has_cycle(&self, from: TransactionId) -> bool {
        let waits_for = self.waits_for.lock();

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        queue.push_back(from);

        while let Some(txn) = queue.pop_front() {
            let Some(edges) = waits_for.get(&txn) else {
                continue;
            };
            for &next in edges {
                if next == from {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        false
    }

    /// Returns the transactions `txn` is currently recorded as waiting on.
    pub fn waits_for(&self, txn: TransactionId) -> HashSet<TransactionId> {
        self.waits_for
            .lock()
            .get(&txn)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of transactions with at least one recorded out-edge.
    pub fn waiting_count(&self) -> usize {
        self.waits_for.lock().len()
    }
}
