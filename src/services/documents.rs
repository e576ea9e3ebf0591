use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::document::BomToolDocument;

use super::RepositoryError;

/// Storage of BOM Creator Tool records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<Option<BomToolDocument>, RepositoryError>;

    async fn upsert(&self, document: &BomToolDocument) -> Result<(), RepositoryError>;
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, BomToolDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, reference: &str) -> Result<Option<BomToolDocument>, RepositoryError> {
        Ok(self.documents.read().await.get(reference).cloned())
    }

    async fn upsert(&self, document: &BomToolDocument) -> Result<(), RepositoryError> {
        self.documents
            .write()
            .await
            .insert(document.reference.clone(), document.clone());
        Ok(())
    }
}
