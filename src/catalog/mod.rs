//! Registry mapping table IDs to their backing page stores.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Result, StrataError, TableId};
use crate::storage::PageStore;

/// Catalog resolves the table a page belongs to into the store that can
/// read and write it.
#[derive(Default)]
pub struct Catalog {
    stores: RwLock<HashMap<TableId, Arc<dyn PageStore>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` under its own table ID.
    pub fn add_table(&self, store: Arc<dyn PageStore>) -> Result<()> {
        let table_id = store.table_id();
        let mut stores = self.stores.write();
        if stores.contains_key(&table_id) {
            return Err(StrataError::TableAlreadyExists(table_id));
        }
        stores.insert(table_id, store);
        Ok(())
    }

    pub fn store_for_table(&self, table_id: TableId) -> Result<Arc<dyn PageStore>> {
        self.stores
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(StrataError::TableNotFound(table_id))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.stores.read().keys().copied().collect();
        ids.sort();
        ids
    }
}
