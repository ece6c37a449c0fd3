mod deadlock_detector;
mod lock_table;

pub use deadlock_detector::*;
pub use lock_table::*;
