pub mod heap;
pub mod page;
mod page_store;

pub use page_store::PageStore;
