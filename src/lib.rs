//! Strata - the storage and concurrency core of a disk-oriented RDBMS
//!
//! Every read and write of on-disk data goes through a fixed-capacity page
//! cache that locks pages on behalf of transactions, detects deadlocks among
//! them, and makes commit and abort safe by keeping an in-memory
//! before-image of each page under a NO-STEAL policy.
//!
//! # Architecture
//!
//! - **Buffer** (`buffer`): the page cache
//!   - `BufferPool`: fetches, locks, evicts, commits and aborts
//!   - `Page`: cached page bytes, dirty owner and before-image
//!
//! - **Concurrency** (`concurrency`): page locking
//!   - `LockTable`: per-page shared/exclusive lock records
//!   - `DeadlockDetector`: wait-for graph with cycle detection
//!
//! - **Storage Layer** (`storage`): paged files on disk
//!   - `PageStore`: whole-page I/O plus tuple insert/delete for one table
//!   - `HeapFile`: unordered table file of fixed-width tuple slots
//!   - `HeapPage`: occupancy bitmap + slot array page codec
//!
//! - **Catalog** (`catalog`): table ID to `PageStore` registry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPool;
//! use strata::catalog::Catalog;
//! use strata::common::{BufferPoolConfig, TableId, TransactionId, DEFAULT_PAGE_SIZE};
//! use strata::storage::heap::HeapFile;
//! use strata::tuple::Tuple;
//!
//! let table_id = TableId::new(1);
//! let heap = Arc::new(HeapFile::open(table_id, "users.dat", DEFAULT_PAGE_SIZE, 16).unwrap());
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.add_table(heap.clone()).unwrap();
//! let pool = BufferPool::new(BufferPoolConfig::default(), catalog).unwrap();
//!
//! let txn = TransactionId::new();
//! let mut tuple = Tuple::new(*b"0123456789abcdef");
//! pool.insert_tuple(txn, table_id, &mut tuple).unwrap();
//! pool.commit(txn).unwrap();
//!
//! let reader = TransactionId::new();
//! for tuple in heap.scan(&pool, reader) {
//!     println!("{:?}", tuple.unwrap().record_id());
//! }
//! pool.commit(reader).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{
    PageId, Permission, RecordId, Result, SlotId, StrataError, TableId, TransactionId,
};
