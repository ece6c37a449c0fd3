use std::collections::VecDeque;

use crate::buffer::BufferPool;
use crate::common::{Permission, Result, TransactionId};
use crate::storage::page::HeapPageRef;
use crate::storage::PageStore;
use crate::tuple::Tuple;

use super::HeapFile;

/// Forward-only scan over a heap file in page-number order.
///
/// Pages are fetched lazily through the buffer pool with read permission,
/// one page per refill, so a scan takes the same shared locks a point read
/// would. The end of the file is `None`, never an error. An error (for
/// example a deadlock) closes the iterator; `rewind` starts over from the
/// first page.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    txn: TransactionId,
    /// Next page to fetch once `buffered` runs dry
    next_page_no: u32,
    /// Tuples of the most recently fetched page not yet returned
    buffered: VecDeque<Tuple>,
    open: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub(crate) fn new(file: &'a HeapFile, pool: &'a BufferPool, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            next_page_no: 0,
            buffered: VecDeque::new(),
            open: true,
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) {
        self.next_page_no = 0;
        self.buffered.clear();
        self.open = true;
    }

    /// Stops the scan; `next` returns `None` until `rewind` is called.
    pub fn close(&mut self) {
        self.buffered.clear();
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn fetch_page(&mut self, page_no: u32) -> Result<()> {
        let page_id = self.file.page_id(page_no);
        let page = self.pool.get_page(self.txn, page_id, Permission::ReadOnly)?;

        let data = page.read();
        let view = HeapPageRef::new(&data, self.file.layout());
        self.buffered.extend(
            view.tuples(page_id)
                .map(|(record_id, bytes)| Tuple::with_record_id(bytes, record_id)),
        );
        Ok(())
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.open {
            return None;
        }

        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Some(Ok(tuple));
            }

            let num_pages = match self.file.num_pages() {
                Ok(num_pages) => num_pages,
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            };
            if self.next_page_no >= num_pages {
                return None;
            }

            if let Err(e) = self.fetch_page(self.next_page_no) {
                self.close();
                return Some(Err(e));
            }
            self.next_page_no += 1;
        }
    }
}
