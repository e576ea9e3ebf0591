use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bom::BomRow;

/// A BOM Creator Tool record: the source document a job imports from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomToolDocument {
    pub reference: String,
    /// Name of the attached spreadsheet, if one was uploaded.
    pub file_name: Option<String>,
    pub rows: Vec<BomRow>,
    pub updated_at: DateTime<Utc>,
}

impl BomToolDocument {
    pub fn new(reference: &str, file_name: Option<String>, rows: Vec<BomRow>) -> Self {
        Self {
            reference: reference.to_string(),
            file_name,
            rows,
            updated_at: Utc::now(),
        }
    }
}
