use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::models::bom::BomRow;
use crate::models::document::BomToolDocument;
use crate::services::documents::DocumentStore;
use crate::services::RepositoryError;

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, reference: &str) -> Result<Option<BomToolDocument>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT reference, file_name, rows, updated_at
            FROM bom_tool_documents
            WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => {
                let rows: Json<Vec<BomRow>> = r.try_get("rows")?;
                Some(BomToolDocument {
                    reference: r.try_get("reference")?,
                    file_name: r.try_get("file_name")?,
                    rows: rows.0,
                    updated_at: r.try_get("updated_at")?,
                })
            }
            None => None,
        })
    }

    async fn upsert(&self, document: &BomToolDocument) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bom_tool_documents (reference, file_name, rows, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (reference) DO UPDATE
            SET file_name = EXCLUDED.file_name,
                rows = EXCLUDED.rows,
                updated_at = NOW()
            "#,
        )
        .bind(&document.reference)
        .bind(document.file_name.as_deref())
        .bind(Json(&document.rows))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
