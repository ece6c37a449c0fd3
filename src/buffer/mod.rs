mod buffer_pool;
mod page;

pub use buffer_pool::*;
pub use page::*;
