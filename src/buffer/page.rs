use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, Result, TransactionId};

struct PageState {
    /// Current in-memory contents
    data: Box<[u8]>,
    /// Last contents known to be durable
    before_image: Box<[u8]>,
    /// Transaction that dirtied the page, if any
    dirtied_by: Option<TransactionId>,
}

/// A cached page: a fixed-size byte buffer plus the bookkeeping the buffer
/// pool needs to enforce NO-STEAL.
///
/// The before-image is only refreshed while the page is clean (after a load
/// or a successful flush), so an abort can always restore the last durable
/// contents.
pub struct Page {
    page_id: PageId,
    state: RwLock<PageState>,
}

impl Page {
    /// Creates a clean page whose before-image equals `data`.
    pub fn new(page_id: PageId, data: Vec<u8>) -> Self {
        let data = data.into_boxed_slice();
        Self {
            page_id,
            state: RwLock::new(PageState {
                before_image: data.clone(),
                data,
                dirtied_by: None,
            }),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn page_size(&self) -> usize {
        self.state.read().data.len()
    }

    /// Returns the transaction that dirtied this page, or None if clean.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.state.read().dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by().is_some()
    }

    /// Marks the page dirty on behalf of `txn`, or clean with `None`.
    pub fn mark_dirty(&self, txn: Option<TransactionId>) {
        self.state.write().dirtied_by = txn;
    }

    /// Returns a read guard over the page contents.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.state.read(), |state| &*state.data)
    }

    /// Returns a write guard over the page contents and marks the page dirty
    /// on behalf of `txn` before any byte can change.
    pub fn write(&self, txn: TransactionId) -> MappedRwLockWriteGuard<'_, [u8]> {
        let mut state = self.state.write();
        state.dirtied_by = Some(txn);
        RwLockWriteGuard::map(state, |state| &mut *state.data)
    }

    /// Copies the current contents out of the page.
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.read().data.to_vec()
    }

    /// Copies the before-image out of the page.
    pub fn before_image(&self) -> Vec<u8> {
        self.state.read().before_image.to_vec()
    }

    /// Records the current contents as the durable before-image.
    pub fn set_before_image(&self) {
        let mut state = self.state.write();
        let PageState {
            data, before_image, ..
        } = &mut *state;
        before_image.copy_from_slice(data);
    }

    /// Discards in-memory changes: contents revert to the before-image and
    /// the page becomes clean.
    pub fn restore_before_image(&self) {
        let mut state = self.state.write();
        let PageState {
            data,
            before_image,
            dirtied_by,
        } = &mut *state;
        data.copy_from_slice(before_image);
        *dirtied_by = None;
    }

    /// Writes the page through `write` if it is dirty, then marks it clean and
    /// refreshes the before-image. Returns whether anything was written.
    ///
    /// The page stays write-locked for the duration, so no writer can slip a
    /// change in between the write and the before-image refresh.
    pub fn flush_with<F>(&self, write: F) -> Result<bool>
    where
        F: FnOnce(PageId, &[u8]) -> Result<()>,
    {
        let mut state = self.state.write();
        if state.dirtied_by.is_none() {
            return Ok(false);
        }

        write(self.page_id, &state.data)?;

        let PageState {
            data,
            before_image,
            dirtied_by,
        } = &mut *state;
        before_image.copy_from_slice(data);
        *dirtied_by = None;
        Ok(true)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_id", &self.page_id)
            .field("dirtied_by", &self.dirtied_by())
            .finish()
    }
}
