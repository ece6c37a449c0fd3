use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{BufferPool, Page};
use crate::common::{
    PageId, Permission, RecordId, Result, StrataError, TableId, TransactionId,
};
use crate::storage::page::{HeapPage, HeapPageLayout, HeapPageRef};
use crate::storage::PageStore;
use crate::tuple::Tuple;

use super::HeapFileIterator;

/// HeapFile stores one table's tuples, unordered, as a sequence of
/// fixed-size heap pages in a single file. Page `n` lives at byte offset
/// `n * page_size`, and the page count is derived from the file length.
pub struct HeapFile {
    table_id: TableId,
    /// The backing file
    file: Mutex<File>,
    /// Path to the backing file
    path: PathBuf,
    layout: HeapPageLayout,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(
        table_id: TableId,
        path: P,
        page_size: usize,
        tuple_width: usize,
    ) -> Result<Self> {
        let layout = HeapPageLayout::new(page_size, tuple_width)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            table_id,
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
            layout,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn layout(&self) -> HeapPageLayout {
        self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Returns a forward-only scan over every tuple, fetching pages through
    /// `pool` with read permission on behalf of `txn`.
    pub fn scan<'a>(&'a self, pool: &'a BufferPool, txn: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, pool, txn)
    }

    /// Returns the ID of page `page_no` of this file.
    pub fn page_id(&self, page_no: u32) -> PageId {
        PageId::new(self.table_id, page_no)
    }

    fn offset(&self, page_id: PageId) -> u64 {
        page_id.page_no() as u64 * self.layout.page_size() as u64
    }

    fn pages_in(&self, file: &File) -> Result<u32> {
        let len = file.metadata()?.len();
        Ok((len / self.layout.page_size() as u64) as u32)
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id() != self.table_id {
            return Err(StrataError::PageNotFound(page_id));
        }
        Ok(())
    }

    /// Appends an empty page to the file and returns its ID. The page is
    /// durable before anyone can lock it, so it has a valid before-image.
    fn append_empty_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_id = self.page_id(self.pages_in(&file)?);

        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.write_all(&self.layout.empty_page_data())?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        log::debug!("appended {page_id} to {}", self.path.display());
        Ok(page_id)
    }

    /// Writes `tuple` into `page` if it has a free slot.
    fn insert_into(&self, page: &Page, txn: TransactionId, tuple: &mut Tuple) -> Result<bool> {
        let page_id = page.page_id();
        if HeapPageRef::new(&page.read(), self.layout).num_empty_slots() == 0 {
            return Ok(false);
        }

        let mut data = page.write(txn);
        let slot_id = HeapPage::new(&mut data, self.layout).insert_tuple(page_id, tuple.data())?;
        tuple.set_record_id(Some(RecordId::new(page_id, slot_id)));
        Ok(true)
    }
}

impl PageStore for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    fn num_pages(&self) -> Result<u32> {
        let file = self.file.lock();
        self.pages_in(&file)
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.check_table(page_id)?;

        let mut file = self.file.lock();
        if page_id.page_no() >= self.pages_in(&file)? {
            return Err(StrataError::PageNotFound(page_id));
        }

        let mut data = vec![0u8; self.layout.page_size()];
        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.read_exact(&mut data)?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(Page::new(page_id, data))
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_table(page_id)?;
        if data.len() != self.layout.page_size() {
            return Err(StrataError::PageSizeMismatch {
                expected: self.layout.page_size(),
                actual: data.len(),
            });
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        if tuple.len() != self.layout.tuple_width() {
            return Err(StrataError::TupleWidthMismatch {
                expected: self.layout.tuple_width(),
                actual: tuple.len(),
            });
        }

        for page_no in 0..self.num_pages()? {
            let page = pool.get_page(txn, self.page_id(page_no), Permission::ReadWrite)?;
            if self.insert_into(&page, txn, tuple)? {
                return Ok(vec![page]);
            }
        }

        // Every existing page is full. Another inserter may fill a freshly
        // appended page before we get its lock, so keep appending until one
        // takes the tuple.
        loop {
            let page_id = self.append_empty_page()?;
            let page = pool.get_page(txn, page_id, Permission::ReadWrite)?;
            if self.insert_into(&page, txn, tuple)? {
                return Ok(vec![page]);
            }
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Arc<Page>>> {
        let record_id = tuple
            .record_id()
            .ok_or(StrataError::InvalidRecordId(None))?;
        if record_id.page_id.table_id() != self.table_id {
            return Err(StrataError::InvalidRecordId(Some(record_id)));
        }

        let page = pool.get_page(txn, record_id.page_id, Permission::ReadWrite)?;

        // Fail on an empty or out-of-range slot before the page is dirtied
        HeapPageRef::new(&page.read(), self.layout).get_tuple(record_id.slot_id)?;

        let mut data = page.write(txn);
        HeapPage::new(&mut data, self.layout).delete_tuple(record_id.slot_id)?;
        drop(data);

        Ok(vec![page])
    }
}
