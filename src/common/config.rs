use std::time::Duration;

use super::error::{Result, StrataError};

/// Size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of cached pages)
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

/// How long a blocked lock request sleeps before re-running deadlock detection
pub const DEFAULT_DEADLOCK_RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Construction-time configuration for a `BufferPool`.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Maximum number of pages held in the cache at once.
    pub capacity: usize,
    /// Size of every page in bytes. All stores served by one pool
    /// must agree on this value.
    pub page_size: usize,
    /// Upper bound on how long a waiter blocks on a lock record before it
    /// refreshes its wait-for edges and checks for a cycle again. Waiters are
    /// also woken early whenever a holder releases the page.
    pub deadlock_recheck_interval: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_POOL_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            deadlock_recheck_interval: DEFAULT_DEADLOCK_RECHECK_INTERVAL,
        }
    }
}

impl BufferPoolConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_deadlock_recheck_interval(mut self, interval: Duration) -> Self {
        self.deadlock_recheck_interval = interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(StrataError::InvalidConfig(
                "capacity must be non-zero".to_string(),
            ));
        }

        if self.page_size == 0 {
            return Err(StrataError::InvalidConfig(
                "page_size must be non-zero".to_string(),
            ));
        }

        if self.deadlock_recheck_interval.is_zero() {
            return Err(StrataError::InvalidConfig(
                "deadlock_recheck_interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
