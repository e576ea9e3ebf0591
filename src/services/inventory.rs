use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::bom::{BomCreatorRecord, ExistingBom, Item};

use super::RepositoryError;

/// Item masters and BOM Creator records the importer reads and writes.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn get_item(&self, item_code: &str) -> Result<Option<Item>, RepositoryError>;

    async fn insert_item(&self, item: &Item) -> Result<(), RepositoryError>;

    async fn item_group_exists(&self, name: &str) -> Result<bool, RepositoryError>;

    async fn operation_exists(&self, name: &str) -> Result<bool, RepositoryError>;

    /// BOM Creator record stored for a finished-good item, if any.
    async fn find_bom(&self, item_code: &str) -> Result<Option<ExistingBom>, RepositoryError>;

    async fn delete_bom(&self, name: &str) -> Result<(), RepositoryError>;

    async fn insert_bom(&self, record: &BomCreatorRecord) -> Result<(), RepositoryError>;
}

#[derive(Default)]
struct InventoryTables {
    items: HashMap<String, Item>,
    item_groups: HashSet<String>,
    operations: HashSet<String>,
    boms: HashMap<String, BomCreatorRecord>,
}

/// Inventory held in process memory, seeded with master data.
#[derive(Default)]
pub struct InMemoryInventory {
    tables: RwLock<InventoryTables>,
}

impl InMemoryInventory {
    pub fn new<G, O>(item_groups: G, operations: O) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            tables: RwLock::new(InventoryTables {
                item_groups: item_groups.into_iter().map(Into::into).collect(),
                operations: operations.into_iter().map(Into::into).collect(),
                ..Default::default()
            }),
        }
    }

    pub async fn bom(&self, name: &str) -> Option<BomCreatorRecord> {
        self.tables.read().await.boms.get(name).cloned()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.read().await.items.len()
    }
}

#[async_trait]
impl Inventory for InMemoryInventory {
    async fn get_item(&self, item_code: &str) -> Result<Option<Item>, RepositoryError> {
        Ok(self.tables.read().await.items.get(item_code).cloned())
    }

    async fn insert_item(&self, item: &Item) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.items.contains_key(&item.item_code) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "item {} already exists",
                item.item_code
            )));
        }
        tables.items.insert(item.item_code.clone(), item.clone());
        Ok(())
    }

    async fn item_group_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables.read().await.item_groups.contains(name))
    }

    async fn operation_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.tables.read().await.operations.contains(name))
    }

    async fn find_bom(&self, item_code: &str) -> Result<Option<ExistingBom>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .boms
            .values()
            .find(|b| b.item_code == item_code)
            .map(|b| ExistingBom {
                name: b.name.clone(),
                docstatus: b.docstatus,
            }))
    }

    async fn delete_bom(&self, name: &str) -> Result<(), RepositoryError> {
        self.tables.write().await.boms.remove(name);
        Ok(())
    }

    async fn insert_bom(&self, record: &BomCreatorRecord) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.boms.contains_key(&record.name) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "BOM Creator {} already exists",
                record.name
            )));
        }
        tables.boms.insert(record.name.clone(), record.clone());
        Ok(())
    }
}
