use std::sync::Arc;

use strata::buffer::BufferPool;
use strata::catalog::Catalog;
use strata::common::{BufferPoolConfig, TableId, TransactionId};
use strata::storage::heap::HeapFile;
use strata::storage::PageStore;
use strata::tuple::Tuple;

const TUPLE_WIDTH: usize = 32;

fn tuple(text: &str) -> Tuple {
    let mut data = [0u8; TUPLE_WIDTH];
    let len = text.len().min(TUPLE_WIDTH);
    data[..len].copy_from_slice(&text.as_bytes()[..len]);
    Tuple::new(data)
}

fn main() -> strata::Result<()> {
    println!("Strata - page cache and locking core");
    println!("====================================\n");

    // Create a table file for demonstration
    let db_path = "demo.dat";
    let table_id = TableId::new(1);
    let config = BufferPoolConfig::default().with_capacity(4);

    let heap = Arc::new(HeapFile::open(table_id, db_path, config.page_size, TUPLE_WIDTH)?);
    println!(
        "Opened {} ({} slots of {} bytes per page)",
        db_path,
        heap.layout().slots_per_page(),
        TUPLE_WIDTH
    );

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(heap.clone())?;
    let pool = BufferPool::new(config, catalog)?;
    println!("Created buffer pool with {} pages\n", pool.capacity());

    // A committed transaction
    let writer = TransactionId::new();
    for text in ["Hello, World!", "This is Strata", "NO-STEAL in action"] {
        let mut t = tuple(text);
        pool.insert_tuple(writer, table_id, &mut t)?;
        println!("{writer} inserted tuple at {:?}", t.record_id());
    }
    pool.commit(writer)?;
    println!("{writer} committed, file has {} page(s)\n", heap.num_pages()?);

    // An aborted transaction leaves no trace
    let doomed = TransactionId::new();
    let mut t = tuple("never visible");
    pool.insert_tuple(doomed, table_id, &mut t)?;
    pool.abort(doomed)?;
    println!("{doomed} aborted\n");

    // Read the data back
    let reader = TransactionId::new();
    for result in heap.scan(&pool, reader) {
        let t = result?;
        let text = String::from_utf8_lossy(t.data());
        println!("  - {:?}: {}", t.record_id(), text.trim_end_matches('\0'));
    }
    pool.commit(reader)?;

    // Clean up
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
