use std::sync::Arc;

use crate::buffer::{BufferPool, Page};
use crate::common::{PageId, Result, TableId, TransactionId};
use crate::tuple::Tuple;

/// Paged backing store for one table.
///
/// Reads and writes always cover whole pages. Tuple-level mutations go back
/// through the `BufferPool` for every page they touch, so they obey the same
/// locking discipline as any other access, and return the pages they dirtied.
pub trait PageStore: Send + Sync {
    fn table_id(&self) -> TableId;

    fn page_size(&self) -> usize;

    /// Number of pages currently in the store.
    fn num_pages(&self) -> Result<u32>;

    /// Reads one page straight from storage, bypassing any cache.
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Overwrites the page-sized region for `page_id` with `data`.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Stores `tuple` in the first page with a free slot, appending a page if
    /// none has room, and records its new location in the tuple.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<Arc<Page>>>;

    /// Frees the slot `tuple` was read from.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Arc<Page>>>;
}
