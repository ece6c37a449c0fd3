use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::common::{PageId, Permission, Result, StrataError, TransactionId};

use super::DeadlockDetector;

/// Holders of one page's lock.
///
/// Either `exclusive` is set and `shared` is empty, or `exclusive` is unset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockState {
    /// Grants `permission` to `txn` if it is compatible with the current
    /// holders. A denied request leaves the state untouched.
    ///
    /// A writer may upgrade only when it is the sole shared holder. Two
    /// shared holders that both ask for an upgrade wait on each other.
    pub fn try_grant(&mut self, txn: TransactionId, permission: Permission) -> bool {
        if let Some(holder) = self.exclusive {
            return holder == txn;
        }

        match permission {
            Permission::ReadOnly => {
                self.shared.insert(txn);
                true
            }
            Permission::ReadWrite => {
                let sole_or_none = self.shared.is_empty()
                    || (self.shared.len() == 1 && self.shared.contains(&txn));
                if sole_or_none {
                    self.shared.clear();
                    self.exclusive = Some(txn);
                }
                sole_or_none
            }
        }
    }

    /// Drops whatever `txn` holds. Returns true if it held anything.
    pub fn release(&mut self, txn: TransactionId) -> bool {
        if self.exclusive == Some(txn) {
            self.exclusive = None;
            true
        } else {
            self.shared.remove(&txn)
        }
    }

    pub fn holds(&self, txn: TransactionId) -> bool {
        self.exclusive == Some(txn) || self.shared.contains(&txn)
    }

    pub fn exclusive_holder(&self) -> Option<TransactionId> {
        self.exclusive
    }

    pub fn shared_holders(&self) -> &HashSet<TransactionId> {
        &self.shared
    }

    /// Every transaction holding the page, shared or exclusive.
    pub fn holders(&self) -> HashSet<TransactionId> {
        let mut holders = self.shared.clone();
        holders.extend(self.exclusive);
        holders
    }

    pub fn is_idle(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

/// Lock record for a single page: its holders plus a condition variable
/// signaled whenever someone releases the page.
#[derive(Debug, Default)]
struct LockRecord {
    state: Mutex<LockState>,
    released: Condvar,
}

/// LockTable tracks shared/exclusive page locks.
///
/// Each page gets its own record with its own mutex, so decisions on
/// unrelated pages never serialize against each other. The map lock is only
/// held long enough to find or create a record.
#[derive(Debug, Default)]
pub struct LockTable {
    records: Mutex<HashMap<PageId, Arc<LockRecord>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, page_id: PageId) -> Arc<LockRecord> {
        let mut records = self.records.lock();
        Arc::clone(records.entry(page_id).or_default())
    }

    fn existing_record(&self, page_id: PageId) -> Option<Arc<LockRecord>> {
        self.records.lock().get(&page_id).cloned()
    }

    /// Attempts to grant `permission` on `page_id` to `txn` without blocking.
    pub fn try_acquire(&self, page_id: PageId, txn: TransactionId, permission: Permission) -> bool {
        let record = self.record(page_id);
        let granted = record.state.lock().try_grant(txn, permission);
        granted
    }

    /// Blocks until `txn` is granted `permission` on `page_id`, or fails with
    /// `Deadlock` once waiting would close a cycle in the wait-for graph.
    ///
    /// While denied, the waiter records the page's current holders as its
    /// out-edges and sleeps on the record's condition variable. It wakes on
    /// every release and at least once per `recheck_interval`, at which point
    /// the edges are refreshed and the cycle check runs again.
    pub fn acquire(
        &self,
        page_id: PageId,
        txn: TransactionId,
        permission: Permission,
        detector: &DeadlockDetector,
        recheck_interval: Duration,
    ) -> Result<()> {
        let record = self.record(page_id);
        let mut state = record.state.lock();

        loop {
            if state.try_grant(txn, permission) {
                detector.clear_wait(txn);
                log::trace!("{txn} granted {permission:?} on {page_id}");
                return Ok(());
            }

            detector.record_wait(txn, state.holders());
            if detector.has_cycle(txn) {
                detector.clear_wait(txn);
                log::warn!("{txn} waiting for {page_id} would deadlock, aborting it");
                return Err(StrataError::Deadlock(txn));
            }

            log::trace!("{txn} blocked on {page_id} held by {:?}", state.holders());
            record.released.wait_for(&mut state, recheck_interval);
        }
    }

    /// Releases whatever `txn` holds on `page_id` and wakes its waiters.
    pub fn release(&self, page_id: PageId, txn: TransactionId) {
        let Some(record) = self.existing_record(page_id) else {
            return;
        };

        let released = record.state.lock().release(txn);
        if released {
            record.released.notify_all();
        }
    }

    pub fn holds(&self, page_id: PageId, txn: TransactionId) -> bool {
        self.existing_record(page_id)
            .map(|record| record.state.lock().holds(txn))
            .unwrap_or(false)
    }

    pub fn exclusive_holder(&self, page_id: PageId) -> Option<TransactionId> {
        self.existing_record(page_id)
            .and_then(|record| record.state.lock().exclusive_holder())
    }

    /// Snapshot of a page's lock state. Pages never locked report no holders.
    pub fn state(&self, page_id: PageId) -> LockState {
        self.existing_record(page_id)
            .map(|record| record.state.lock().clone())
            .unwrap_or_default()
    }

    /// Removes records that have no holders and that no other thread is
    /// currently using. Returns the number of records removed.
    pub fn prune(&self) -> usize {
        let mut records = self.records.lock();
        let before = records.len();

        // Every thread touching a record clones its Arc under the map lock,
        // so a strong count of one means nobody else can be inside it.
        records.retain(|_, record| {
            if Arc::strong_count(record) > 1 {
                return true;
            }
            match record.state.try_lock() {
                Some(state) => !state.is_idle(),
                None => true,
            }
        });

        before - records.len()
    }

    /// Number of lock records currently retained.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
