use thiserror::Error;

use super::types::{PageId, RecordId, SlotId, TableId, TransactionId};

/// Database error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction {0} aborted: deadlock detected")]
    Deadlock(TransactionId),

    #[error("Buffer pool is full: none of {capacity} cached pages can be evicted")]
    BufferPoolFull { capacity: usize },

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table {0} already exists")]
    TableAlreadyExists(TableId),

    #[error("Invalid record ID: {0:?}")]
    InvalidRecordId(Option<RecordId>),

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(SlotId),

    #[error("Slot {0} is empty")]
    EmptySlot(SlotId),

    #[error("Page {0} is full")]
    PageFull(PageId),

    #[error("Tuple width mismatch: expected {expected} bytes, got {actual}")]
    TupleWidthMismatch { expected: usize, actual: usize },

    #[error("Page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StrataError {
    /// Returns true for conditions a correctly functioning system expects to
    /// hit under contention: the transaction (or operation) may be retried
    /// once others have made progress. Everything else is fatal to the
    /// operation that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StrataError::Deadlock(_) | StrataError::BufferPoolFull { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;
