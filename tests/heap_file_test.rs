//! Integration tests for heap files accessed through the buffer pool

use std::sync::Arc;

use strata::buffer::BufferPool;
use strata::catalog::Catalog;
use strata::common::{BufferPoolConfig, PageId, StrataError, TableId, TransactionId};
use strata::storage::heap::HeapFile;
use strata::storage::page::HeapPageRef;
use strata::storage::PageStore;
use strata::tuple::Tuple;
use tempfile::NamedTempFile;

const TABLE: TableId = TableId(1);

/// Two 16-byte slots per 40-byte page: floor(320 / 129) = 2.
const SMALL_PAGE: usize = 40;
const WIDTH: usize = 16;

fn create_table(page_size: usize, capacity: usize) -> (BufferPool, Arc<HeapFile>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let heap = Arc::new(HeapFile::open(TABLE, temp_file.path(), page_size, WIDTH).unwrap());

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(heap.clone()).unwrap();

    let config = BufferPoolConfig::default()
        .with_capacity(capacity)
        .with_page_size(page_size);
    let pool = BufferPool::new(config, catalog).unwrap();
    (pool, heap, temp_file)
}

fn tuple(tag: u8) -> Tuple {
    Tuple::new(vec![tag; WIDTH])
}

fn scan_tags(heap: &HeapFile, pool: &BufferPool) -> Vec<u8> {
    let txn = TransactionId::new();
    let tags = heap
        .scan(pool, txn)
        .map(|t| t.unwrap().data()[0])
        .collect();
    pool.commit(txn).unwrap();
    tags
}

#[test]
fn test_insert_fills_pages_in_order() {
    let (pool, heap, temp) = create_table(SMALL_PAGE, 10);
    assert_eq!(heap.layout().slots_per_page(), 2);

    let txn = TransactionId::new();
    let mut inserted = Vec::new();
    for tag in 1..=3 {
        let mut t = tuple(tag);
        pool.insert_tuple(txn, TABLE, &mut t).unwrap();
        inserted.push(t.record_id().unwrap());
    }
    pool.commit(txn).unwrap();

    assert_eq!(heap.num_pages().unwrap(), 2);
    assert_eq!(
        std::fs::metadata(temp.path()).unwrap().len(),
        2 * SMALL_PAGE as u64
    );
    assert_eq!(inserted[0].page_id, PageId::new(TABLE, 0));
    assert_eq!(inserted[1].page_id, PageId::new(TABLE, 0));
    assert_eq!(inserted[2].page_id, PageId::new(TABLE, 1));

    let layout = heap.layout();
    let first = heap.read_page(PageId::new(TABLE, 0)).unwrap();
    let second = heap.read_page(PageId::new(TABLE, 1)).unwrap();
    assert_eq!(HeapPageRef::new(&first.read(), layout).tuple_count(), 2);
    assert_eq!(HeapPageRef::new(&second.read(), layout).tuple_count(), 1);
}

#[test]
fn test_insert_marks_page_dirty_until_commit() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();

    let mut t = tuple(9);
    pool.insert_tuple(txn, TABLE, &mut t).unwrap();
    let pid = t.record_id().unwrap().page_id;

    let page = pool.get_page(txn, pid, strata::Permission::ReadOnly).unwrap();
    assert_eq!(page.dirtied_by(), Some(txn));
    // The appended page is on disk, but still empty there
    let on_disk = heap.read_page(pid).unwrap();
    assert_eq!(HeapPageRef::new(&on_disk.read(), heap.layout()).tuple_count(), 0);
    drop(page);

    pool.commit(txn).unwrap();
    let on_disk = heap.read_page(pid).unwrap();
    assert_eq!(HeapPageRef::new(&on_disk.read(), heap.layout()).tuple_count(), 1);
}

#[test]
fn test_scan_returns_tuples_in_page_order() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    for tag in 1..=5 {
        pool.insert_tuple(txn, TABLE, &mut tuple(tag)).unwrap();
    }
    pool.commit(txn).unwrap();

    assert_eq!(scan_tags(&heap, &pool), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_scan_empty_table() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    let mut scan = heap.scan(&pool, txn);
    assert!(scan.next().is_none());
    assert!(scan.next().is_none());
}

#[test]
fn test_scan_rewind_and_close() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    for tag in 1..=3 {
        pool.insert_tuple(txn, TABLE, &mut tuple(tag)).unwrap();
    }

    let mut scan = heap.scan(&pool, txn);
    assert_eq!(scan.next().unwrap().unwrap().data()[0], 1);
    assert_eq!(scan.next().unwrap().unwrap().data()[0], 2);

    scan.rewind();
    let all: Vec<_> = scan.by_ref().map(|t| t.unwrap().data()[0]).collect();
    assert_eq!(all, vec![1, 2, 3]);

    scan.rewind();
    scan.close();
    assert!(!scan.is_open());
    assert!(scan.next().is_none());
}

#[test]
fn test_scan_skips_empty_pages() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    let mut tuples: Vec<_> = (1..=6).map(tuple).collect();
    for t in tuples.iter_mut() {
        pool.insert_tuple(txn, TABLE, t).unwrap();
    }
    // Empty out the middle page
    pool.delete_tuple(txn, &tuples[2]).unwrap();
    pool.delete_tuple(txn, &tuples[3]).unwrap();
    pool.commit(txn).unwrap();

    assert_eq!(scan_tags(&heap, &pool), vec![1, 2, 5, 6]);
}

#[test]
fn test_scanned_tuples_carry_record_ids() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    for tag in 1..=3 {
        pool.insert_tuple(txn, TABLE, &mut tuple(tag)).unwrap();
    }

    let victim = heap
        .scan(&pool, txn)
        .map(|t| t.unwrap())
        .find(|t| t.data()[0] == 2)
        .unwrap();
    pool.delete_tuple(txn, &victim).unwrap();
    pool.commit(txn).unwrap();

    assert_eq!(scan_tags(&heap, &pool), vec![1, 3]);
}

#[test]
fn test_delete_then_insert_reuses_slot() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    let mut a = tuple(1);
    let mut b = tuple(2);
    pool.insert_tuple(txn, TABLE, &mut a).unwrap();
    pool.insert_tuple(txn, TABLE, &mut b).unwrap();
    pool.delete_tuple(txn, &a).unwrap();

    let mut c = tuple(3);
    pool.insert_tuple(txn, TABLE, &mut c).unwrap();
    assert_eq!(c.record_id(), a.record_id());
    pool.commit(txn).unwrap();

    assert_eq!(heap.num_pages().unwrap(), 1);
    assert_eq!(scan_tags(&heap, &pool), vec![3, 2]);
}

#[test]
fn test_aborted_insert_is_invisible() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);

    let committed = TransactionId::new();
    pool.insert_tuple(committed, TABLE, &mut tuple(1)).unwrap();
    pool.commit(committed).unwrap();

    let aborted = TransactionId::new();
    pool.insert_tuple(aborted, TABLE, &mut tuple(2)).unwrap();
    pool.insert_tuple(aborted, TABLE, &mut tuple(3)).unwrap();
    pool.abort(aborted).unwrap();

    assert_eq!(scan_tags(&heap, &pool), vec![1]);
}

#[test]
fn test_aborted_delete_is_undone() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);

    let setup = TransactionId::new();
    let mut t = tuple(4);
    pool.insert_tuple(setup, TABLE, &mut t).unwrap();
    pool.commit(setup).unwrap();

    let txn = TransactionId::new();
    pool.delete_tuple(txn, &t).unwrap();
    pool.abort(txn).unwrap();

    assert_eq!(scan_tags(&heap, &pool), vec![4]);
}

#[test]
fn test_insert_rejects_wrong_width() {
    let (pool, heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();
    let result = pool.insert_tuple(txn, TABLE, &mut Tuple::new(vec![0u8; WIDTH + 1]));
    assert!(matches!(
        result,
        Err(StrataError::TupleWidthMismatch { expected: WIDTH, .. })
    ));
    assert_eq!(heap.num_pages().unwrap(), 0);
}

#[test]
fn test_delete_requires_valid_record_id() {
    let (pool, _heap, _temp) = create_table(SMALL_PAGE, 10);
    let txn = TransactionId::new();

    let result = pool.delete_tuple(txn, &tuple(1));
    assert!(matches!(result, Err(StrataError::InvalidRecordId(None))));

    let mut t = tuple(1);
    pool.insert_tuple(txn, TABLE, &mut t).unwrap();
    pool.delete_tuple(txn, &t).unwrap();
    assert!(matches!(
        pool.delete_tuple(txn, &t),
        Err(StrataError::EmptySlot(_))
    ));
}

#[test]
fn test_insert_into_unknown_table() {
    let (pool, _heap, _temp) = create_table(SMALL_PAGE, 10);
    let result = pool.insert_tuple(TransactionId::new(), TableId::new(99), &mut tuple(1));
    assert!(matches!(result, Err(StrataError::TableNotFound(_))));
}

#[test]
fn test_heap_file_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    {
        let heap = Arc::new(HeapFile::open(TABLE, &path, SMALL_PAGE, WIDTH).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(heap.clone()).unwrap();
        let config = BufferPoolConfig::default().with_page_size(SMALL_PAGE);
        let pool = BufferPool::new(config, catalog).unwrap();

        let txn = TransactionId::new();
        for tag in 1..=3 {
            pool.insert_tuple(txn, TABLE, &mut tuple(tag)).unwrap();
        }
        pool.commit(txn).unwrap();
    }

    let heap = Arc::new(HeapFile::open(TABLE, &path, SMALL_PAGE, WIDTH).unwrap());
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(heap.clone()).unwrap();
    let config = BufferPoolConfig::default().with_page_size(SMALL_PAGE);
    let pool = BufferPool::new(config, catalog).unwrap();

    assert_eq!(heap.num_pages().unwrap(), 2);
    assert_eq!(scan_tags(&heap, &pool), vec![1, 2, 3]);
}

#[test]
fn test_large_table_with_small_pool() {
    // 4096-byte pages hold 254 16-byte tuples; 1000 tuples need 4 pages
    let (pool, heap, _temp) = create_table(4096, 3);
    assert_eq!(heap.layout().slots_per_page(), 254);

    for tag in 0..1000u32 {
        let txn = TransactionId::new();
        pool.insert_tuple(txn, TABLE, &mut tuple((tag % 251) as u8))
            .unwrap();
        pool.commit(txn).unwrap();
    }

    assert_eq!(heap.num_pages().unwrap(), 4);
    let tags = scan_tags(&heap, &pool);
    assert_eq!(tags.len(), 1000);
    assert_eq!(tags[0], 0);
    assert_eq!(tags[999], (999 % 251) as u8);
}
