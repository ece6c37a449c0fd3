use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::{
    BufferPoolConfig, PageId, Permission, Result, StrataError, TableId, TransactionId,
};
use crate::concurrency::{DeadlockDetector, LockTable};
use crate::storage::PageStore;
use crate::tuple::Tuple;

use super::Page;

/// BufferPool mediates every access to on-disk pages.
///
/// It caches up to `capacity` pages, takes page-level shared/exclusive locks
/// on behalf of transactions (held until the transaction completes), and
/// implements commit and abort under a NO-STEAL policy: a dirty page is never
/// written to its store until the transaction that dirtied it commits, so
/// abort only has to restore the page's before-image in memory.
///
/// A page is evictable when it is clean and no caller still holds the
/// `Arc<Page>` handed out by `get_page`. Callers should drop page handles as
/// soon as they are done with them.
pub struct BufferPool {
    config: BufferPoolConfig,
    catalog: Arc<Catalog>,
    /// Cached pages. All structural changes (load, evict, discard) happen
    /// under this lock so the capacity bound is exact.
    cache: Mutex<HashMap<PageId, Arc<Page>>>,
    lock_table: LockTable,
    detector: DeadlockDetector,
    /// Pages each active transaction holds a lock on
    held_pages: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            catalog,
            cache: Mutex::new(HashMap::new()),
            lock_table: LockTable::new(),
            detector: DeadlockDetector::new(),
            held_pages: Mutex::new(HashMap::new()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }

    pub fn deadlock_detector(&self) -> &DeadlockDetector {
        &self.detector
    }

    /// Number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().contains_key(&page_id)
    }

    /// Pages `txn` currently holds a lock on.
    pub fn held_pages(&self, txn: TransactionId) -> HashSet<PageId> {
        self.held_pages
            .lock()
            .get(&txn)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true if `txn` holds any lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_table.holds(page_id, txn)
    }

    /// Fetches `page_id` on behalf of `txn` with the given permission.
    ///
    /// Blocks while another transaction holds a conflicting lock. Fails with
    /// `Deadlock` if waiting would close a cycle in the wait-for graph; the
    /// caller must then abort `txn`. Fails with `BufferPoolFull` if the page
    /// has to be loaded and no cached page can be evicted.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<Arc<Page>> {
        self.lock_table.acquire(
            page_id,
            txn,
            permission,
            &self.detector,
            self.config.deadlock_recheck_interval,
        )?;
        self.held_pages
            .lock()
            .entry(txn)
            .or_default()
            .insert(page_id);

        let mut cache = self.cache.lock();
        if let Some(page) = cache.get(&page_id) {
            return Ok(Arc::clone(page));
        }

        let store = self.store_for(page_id.table_id())?;
        while cache.len() >= self.config.capacity {
            self.evict_page(&mut cache)?;
        }

        let page = Arc::new(store.read_page(page_id)?);
        log::trace!("loaded {page_id} for {txn}");
        cache.insert(page_id, Arc::clone(&page));
        Ok(page)
    }

    /// Releases `txn`'s lock on a single page before the transaction
    /// completes.
    ///
    /// This breaks strict two-phase locking: only call it for pages `txn`
    /// looked at but did not modify.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_table.release(page_id, txn);
        if let Some(pages) = self.held_pages.lock().get_mut(&txn) {
            pages.remove(&page_id);
        }
    }

    /// Adds `tuple` to `table_id` on behalf of `txn`, taking write locks on
    /// every page the store touches. On success the tuple carries its new
    /// record ID.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let store = self.catalog.store_for_table(table_id)?;
        let dirtied = store.insert_tuple(self, txn, tuple)?;
        self.install_dirty_pages(txn, dirtied)
    }

    /// Removes `tuple` from the table its record ID points into.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or(StrataError::InvalidRecordId(None))?;
        let store = self.catalog.store_for_table(record_id.page_id.table_id())?;
        let dirtied = store.delete_tuple(self, txn, tuple)?;
        self.install_dirty_pages(txn, dirtied)
    }

    /// Marks pages returned by a store as dirtied by `txn` and makes them the
    /// cached version, replacing whatever copy the cache held.
    fn install_dirty_pages(&self, txn: TransactionId, pages: Vec<Arc<Page>>) -> Result<()> {
        let mut cache = self.cache.lock();
        for page in pages {
            let page_id = page.page_id();
            page.mark_dirty(Some(txn));
            while !cache.contains_key(&page_id) && cache.len() >= self.config.capacity {
                self.evict_page(&mut cache)?;
            }
            cache.insert(page_id, page);
        }
        Ok(())
    }

    /// Commits `txn`.
    pub fn commit(&self, txn: TransactionId) -> Result<()> {
        self.transaction_complete(txn, true)
    }

    /// Aborts `txn`.
    pub fn abort(&self, txn: TransactionId) -> Result<()> {
        self.transaction_complete(txn, false)
    }

    /// Finishes `txn` and releases all of its locks.
    ///
    /// For each cached page `txn` holds exclusively: on commit the page is
    /// written to its store and its before-image refreshed; on abort its
    /// contents revert to the before-image without touching the store.
    ///
    /// If a commit-time write fails the error is returned with `txn` still
    /// holding its locks, so the caller can abort it. Pages already written
    /// stay written.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        self.detector.clear_wait(txn);

        let pages = self.held_pages(txn);
        for &page_id in &pages {
            if self.lock_table.exclusive_holder(page_id) != Some(txn) {
                continue;
            }
            let Some(page) = self.cache.lock().get(&page_id).cloned() else {
                continue;
            };

            if commit {
                self.flush(&page)?;
            } else {
                page.restore_before_image();
            }
        }

        self.held_pages.lock().remove(&txn);
        for &page_id in &pages {
            self.lock_table.release(page_id, txn);
        }
        self.lock_table.prune();

        log::debug!(
            "{txn} {} releasing {} page locks",
            if commit { "committed" } else { "aborted" },
            pages.len()
        );
        Ok(())
    }

    /// Writes every dirty cached page to its store.
    ///
    /// Dangerous: this writes uncommitted changes and so breaks NO-STEAL if
    /// the transactions that dirtied those pages have not completed. Meant
    /// for tests and orderly shutdown.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<Arc<Page>> = self.cache.lock().values().cloned().collect();
        for page in pages {
            self.flush(&page)?;
        }
        Ok(())
    }

    /// Writes every cached page dirtied by `txn` to its store. Breaks
    /// NO-STEAL in the same way as `flush_all_pages` if `txn` later aborts.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        for page_id in self.held_pages(txn) {
            let Some(page) = self.cache.lock().get(&page_id).cloned() else {
                continue;
            };
            if page.dirtied_by() == Some(txn) {
                self.flush(&page)?;
            }
        }
        Ok(())
    }

    /// Drops `page_id` from the cache without writing it. Used when the
    /// storage layer frees a page so the cache cannot resurrect it.
    pub fn discard_page(&self, page_id: PageId) {
        if self.cache.lock().remove(&page_id).is_some() {
            log::trace!("discarded {page_id}");
        }
    }

    fn store_for(&self, table_id: TableId) -> Result<Arc<dyn PageStore>> {
        let store = self.catalog.store_for_table(table_id)?;
        if store.page_size() != self.config.page_size {
            return Err(StrataError::PageSizeMismatch {
                expected: self.config.page_size,
                actual: store.page_size(),
            });
        }
        Ok(store)
    }

    /// Writes `page` to its store if dirty.
    fn flush(&self, page: &Page) -> Result<bool> {
        let store = self.catalog.store_for_table(page.page_id().table_id())?;
        let written = page.flush_with(|page_id, data| store.write_page(page_id, data))?;
        if written {
            log::trace!("flushed {}", page.page_id());
        }
        Ok(written)
    }

    /// Evicts the first clean page nobody else holds a handle to.
    ///
    /// Clean pages match their store byte for byte, so nothing is written.
    /// Dirty pages belong to undecided transactions and are never evicted;
    /// when every cached page is dirty or in use, the pool is full.
    fn evict_page(&self, cache: &mut HashMap<PageId, Arc<Page>>) -> Result<()> {
        // The cache lock is held, so a strong count of one means no caller
        // can be reading or writing the page.
        let victim = cache
            .iter()
            .find(|(_, page)| Arc::strong_count(page) == 1 && !page.is_dirty())
            .map(|(&page_id, _)| page_id);

        match victim {
            Some(page_id) => {
                cache.remove(&page_id);
                log::trace!("evicted {page_id}");
                Ok(())
            }
            None => {
                log::warn!(
                    "no evictable page among {} cached pages",
                    cache.len()
                );
                Err(StrataError::BufferPoolFull {
                    capacity: self.config.capacity,
                })
            }
        }
    }
}
