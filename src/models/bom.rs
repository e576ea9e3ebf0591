use serde::{Deserialize, Serialize};

/// One spreadsheet row of a BOM Creator Tool upload, keyed by column header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BomRow {
    #[serde(rename = "SR NO", default)]
    pub sr_no: String,
    #[serde(rename = "Sub-Assembly", default)]
    pub sub_assembly: String,
    #[serde(rename = "REV", default)]
    pub rev: String,
    #[serde(rename = "PART DESCRIPTION", default)]
    pub description: String,
    #[serde(rename = "Parent", default)]
    pub parent: String,
    #[serde(rename = "MATL", default)]
    pub material: String,
    #[serde(rename = "operation", default)]
    pub operation: String,
    #[serde(rename = "Den", default)]
    pub density: String,
    #[serde(rename = "QTY/ SET", default)]
    pub qty_per_set: String,
    #[serde(rename = "L", default)]
    pub length: String,
    #[serde(rename = "W", default)]
    pub width: String,
    #[serde(rename = "T", default)]
    pub thickness: String,
    #[serde(rename = "BL.WT.", default)]
    pub bl_weight: String,
    #[serde(rename = "AREA SQ.FT.", default)]
    pub area_sq_ft: String,
}

impl BomRow {
    /// Item code of the row: the sub-assembly code, falling back to the serial number.
    pub fn item_id(&self) -> &str {
        let sub_assembly = self.sub_assembly.trim();
        if sub_assembly.is_empty() {
            self.sr_no.trim()
        } else {
            sub_assembly
        }
    }
}

/// A node of the BOM hierarchy built from spreadsheet rows.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BomNode {
    /// Spreadsheet row number (header is row 1).
    pub row: usize,
    pub item: String,
    pub rev: String,
    pub description: String,
    pub parent_item: String,
    pub material: String,
    pub operation: String,
    pub density: String,
    pub qty_per_set: String,
    pub length: String,
    pub width: String,
    pub thickness: String,
    pub bl_weight: String,
    pub area_sq_ft: String,
    pub children: Vec<BomNode>,
}

/// Default stock unit for items created by the importer.
pub const DEFAULT_UOM: &str = "Nos";

/// Inventory item master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub item_code: String,
    pub item_name: String,
    pub description: String,
    pub item_group: String,
    pub stock_uom: String,
    pub is_stock_item: bool,
}

/// Document status of a BOM Creator record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Draft,
    Submitted,
}

impl DocStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
        }
    }

    pub fn from_i16(value: i16) -> Self {
        if value == 0 {
            DocStatus::Draft
        } else {
            DocStatus::Submitted
        }
    }
}

/// Identity of a BOM Creator record already stored for an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingBom {
    pub name: String,
    pub docstatus: DocStatus,
}

/// A row of a BOM Creator record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomCreatorItem {
    pub item_code: String,
    pub item_name: String,
    pub description: String,
    pub qty: f64,
    pub uom: String,
    pub is_expandable: bool,
    pub fg_item: String,
    pub parent_row_no: Option<usize>,
}

/// A BOM Creator record for one finished good.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomCreatorRecord {
    pub name: String,
    pub item_code: String,
    pub item_name: String,
    pub company: String,
    pub qty: f64,
    pub uom: String,
    pub docstatus: DocStatus,
    pub items: Vec<BomCreatorItem>,
}
