use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::models::bom::{BomCreatorRecord, DocStatus, ExistingBom, Item};
use crate::services::inventory::Inventory;
use crate::services::RepositoryError;

pub struct PgInventory {
    pool: PgPool,
}

impl PgInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

fn map_insert_error(e: sqlx::Error, what: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::ConstraintViolation(format!("{what} already exists"))
        }
        _ => RepositoryError::from(e),
    }
}

#[async_trait]
impl Inventory for PgInventory {
    async fn get_item(&self, item_code: &str) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT item_code, item_name, description, item_group, stock_uom, is_stock_item
            FROM items
            WHERE item_code = $1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(Item {
                item_code: r.try_get("item_code")?,
                item_name: r.try_get("item_name")?,
                description: r.try_get("description")?,
                item_group: r.try_get("item_group")?,
                stock_uom: r.try_get("stock_uom")?,
                is_stock_item: r.try_get("is_stock_item")?,
            }),
            None => None,
        })
    }

    async fn insert_item(&self, item: &Item) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO items (item_code, item_name, description, item_group, stock_uom, is_stock_item)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(&item.description)
        .bind(&item.item_group)
        .bind(&item.stock_uom)
        .bind(item.is_stock_item)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("item {}", item.item_code)))?;

        Ok(())
    }

    async fn item_group_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM item_groups WHERE name = $1) AS found")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("found")?)
    }

    async fn operation_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM operations WHERE name = $1) AS found")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("found")?)
    }

    async fn find_bom(&self, item_code: &str) -> Result<Option<ExistingBom>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT name, docstatus
            FROM bom_creators
            WHERE item_code = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(ExistingBom {
                name: r.try_get("name")?,
                docstatus: DocStatus::from_i16(r.try_get("docstatus")?),
            }),
            None => None,
        })
    }

    async fn delete_bom(&self, name: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM bom_creators WHERE name = $1 AND docstatus = 0")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_bom(&self, record: &BomCreatorRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bom_creators (name, item_code, item_name, company, qty, uom, docstatus, items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.name)
        .bind(&record.item_code)
        .bind(&record.item_name)
        .bind(&record.company)
        .bind(record.qty)
        .bind(&record.uom)
        .bind(record.docstatus.as_i16())
        .bind(Json(&record.items))
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("BOM Creator {}", record.name)))?;

        Ok(())
    }
}
