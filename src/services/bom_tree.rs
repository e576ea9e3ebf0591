use std::collections::HashMap;

use crate::models::bom::{BomNode, BomRow};
use crate::models::document::BomToolDocument;

/// Spreadsheet rows are numbered from 2; row 1 is the header.
const FIRST_DATA_ROW: usize = 2;

/// Deepest parent chain accepted, counting the finished good as level 1.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BomTreeError {
    #[error("Please upload a file first.")]
    MissingFile,

    #[error("The following rows are missing the MATL value in the attached BOM Creator file: {}", format_rows(.0))]
    MissingMaterial(Vec<usize>),

    #[error("No valid BOM structures found in the file.")]
    NoFinishedGoods,

    #[error("Row {row}: BOM nesting is deeper than {limit} levels.")]
    TooDeep { row: usize, limit: usize },
}

fn format_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| format!("Row {r}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a document and build its BOM hierarchy.
///
/// Returns the finished goods (root nodes) in spreadsheet order. Fails when no file
/// is attached, when any item row lacks `MATL`, or when no finished good is found.
pub fn prepare(document: &BomToolDocument) -> Result<Vec<BomNode>, BomTreeError> {
    if document.file_name.as_deref().map_or(true, |f| f.trim().is_empty()) {
        return Err(BomTreeError::MissingFile);
    }
    let tree = build_tree(&document.rows)?;
    if tree.is_empty() {
        return Err(BomTreeError::NoFinishedGoods);
    }
    Ok(tree)
}

/// Build the BOM hierarchy from spreadsheet rows.
///
/// A row is attached to the most recent earlier row whose item code equals its
/// `Parent`; rows without a known parent become finished goods. Rows with neither
/// `Sub-Assembly` nor `SR NO` are skipped. Chains deeper than [`MAX_DEPTH`] are
/// rejected before any node is nested.
pub fn build_tree(rows: &[BomRow]) -> Result<Vec<BomNode>, BomTreeError> {
    let mut slots: Vec<Option<BomNode>> = Vec::with_capacity(rows.len());
    let mut children: Vec<Vec<usize>> = Vec::with_capacity(rows.len());
    let mut depths: Vec<usize> = Vec::with_capacity(rows.len());
    let mut too_deep: Option<usize> = None;
    let mut by_item: HashMap<String, usize> = HashMap::new();
    let mut roots = Vec::new();
    let mut missing_material = Vec::new();

    for (offset, row) in rows.iter().enumerate() {
        let item = row.item_id();
        if item.is_empty() {
            continue;
        }
        let row_no = offset + FIRST_DATA_ROW;
        if row.material.trim().is_empty() {
            missing_material.push(row_no);
        }

        let pos = slots.len();
        let parent = row.parent.trim();
        let depth = match by_item.get(parent) {
            Some(&parent_pos) if !parent.is_empty() => {
                children[parent_pos].push(pos);
                depths[parent_pos] + 1
            }
            _ => {
                roots.push(pos);
                1
            }
        };
        if depth > MAX_DEPTH && too_deep.is_none() {
            too_deep = Some(row_no);
        }
        by_item.insert(item.to_string(), pos);
        slots.push(Some(node_from_row(row, row_no)));
        children.push(Vec::new());
        depths.push(depth);
    }

    if !missing_material.is_empty() {
        return Err(BomTreeError::MissingMaterial(missing_material));
    }
    if let Some(row) = too_deep {
        return Err(BomTreeError::TooDeep { row, limit: MAX_DEPTH });
    }

    Ok(roots
        .into_iter()
        .filter_map(|pos| assemble(pos, &mut *slots, &children))
        .collect())
}

fn node_from_row(row: &BomRow, row_no: usize) -> BomNode {
    let qty = row.qty_per_set.trim();
    BomNode {
        row: row_no,
        item: row.item_id().to_string(),
        rev: row.rev.trim().to_string(),
        description: row.description.trim().to_string(),
        parent_item: row.parent.trim().to_string(),
        material: row.material.trim().to_string(),
        operation: row.operation.trim().to_string(),
        density: row.density.trim().to_string(),
        qty_per_set: if qty.is_empty() { "1".to_string() } else { qty.to_string() },
        length: row.length.trim().to_string(),
        width: row.width.trim().to_string(),
        thickness: row.thickness.trim().to_string(),
        bl_weight: row.bl_weight.trim().to_string(),
        area_sq_ft: row.area_sq_ft.trim().to_string(),
        children: Vec::new(),
    }
}

// Every position is reachable from exactly one root, so each slot is taken once.
// Recursion depth is bounded by MAX_DEPTH.
fn assemble(pos: usize, slots: &mut [Option<BomNode>], children: &[Vec<usize>]) -> Option<BomNode> {
    let mut node = slots[pos].take()?;
    node.children = children[pos]
        .iter()
        .filter_map(|&child| assemble(child, &mut *slots, children))
        .collect();
    Some(node)
}

/// Item codes of the finished goods a document will produce BOMs for.
pub fn finished_goods(tree: &[BomNode]) -> Vec<String> {
    tree.iter()
        .filter(|node| !node.item.is_empty())
        .map(|node| node.item.clone())
        .collect()
}

/// Split a `+`-joined operation list, dropping blanks.
pub fn parse_operations(operations: &str) -> Vec<&str> {
    operations
        .split('+')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sr_no: &str, sub_assembly: &str, parent: &str, matl: &str) -> BomRow {
        BomRow {
            sr_no: sr_no.to_string(),
            sub_assembly: sub_assembly.to_string(),
            parent: parent.to_string(),
            material: matl.to_string(),
            description: format!("{sub_assembly} part"),
            ..Default::default()
        }
    }

    #[test]
    fn test_builds_nested_hierarchy() {
        let rows = vec![
            row("1", "FG-1", "", "Assemblies"),
            row("", "SA-1", "FG-1", "Sheet"),
            row("", "P-1", "SA-1", "Sheet"),
            row("", "P-2", "FG-1", "Rod"),
            row("2", "FG-2", "", "Assemblies"),
        ];

        let tree = build_tree(&rows).unwrap();
        assert_eq!(finished_goods(&tree), vec!["FG-1", "FG-2"]);

        let fg1 = &tree[0];
        assert_eq!(fg1.row, 2);
        assert_eq!(fg1.children.len(), 2);
        assert_eq!(fg1.children[0].item, "SA-1");
        assert_eq!(fg1.children[0].children[0].item, "P-1");
        assert_eq!(fg1.children[0].children[0].row, 4);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_unknown_parent_becomes_root_and_blank_rows_skipped() {
        let rows = vec![
            row("", "", "", ""),
            row("", "P-9", "MISSING", "Rod"),
            row("7", "", "", "Rod"),
        ];

        let tree = build_tree(&rows).unwrap();
        assert_eq!(finished_goods(&tree), vec!["P-9", "7"]);
        assert_eq!(tree[1].qty_per_set, "1");
    }

    #[test]
    fn test_missing_material_lists_rows() {
        let rows = vec![
            row("1", "FG-1", "", "Assemblies"),
            row("", "SA-1", "FG-1", ""),
            row("", "SA-2", "FG-1", "  "),
        ];

        let err = build_tree(&rows).unwrap_err();
        assert_eq!(err, BomTreeError::MissingMaterial(vec![3, 4]));
        assert!(err.to_string().ends_with("Row 3, Row 4"));
    }

    #[test]
    fn test_prepare_requires_file_and_finished_goods() {
        let rows = vec![row("1", "FG-1", "", "Assemblies")];

        let no_file = BomToolDocument::new("doc-1", None, rows.clone());
        assert_eq!(prepare(&no_file).unwrap_err(), BomTreeError::MissingFile);

        let empty = BomToolDocument::new("doc-1", Some("bom.csv".to_string()), vec![]);
        assert_eq!(prepare(&empty).unwrap_err(), BomTreeError::NoFinishedGoods);

        let ok = BomToolDocument::new("doc-1", Some("bom.csv".to_string()), rows);
        assert_eq!(prepare(&ok).unwrap().len(), 1);
    }

    fn chain(len: usize) -> Vec<BomRow> {
        (0..len)
            .map(|i| {
                let parent = if i == 0 { String::new() } else { format!("P{}", i - 1) };
                row("", &format!("P{i}"), &parent, "Sheet")
            })
            .collect()
    }

    #[test]
    fn test_chain_at_max_depth_is_accepted() {
        let tree = build_tree(&chain(MAX_DEPTH)).unwrap();
        assert_eq!(tree.len(), 1);

        let mut depth = 1;
        let mut node = &tree[0];
        while let Some(child) = node.children.first() {
            depth += 1;
            node = child;
        }
        assert_eq!(depth, MAX_DEPTH);
    }

    #[test]
    fn test_deep_chain_is_rejected_without_nesting() {
        let rows = chain(50_000);

        let err = build_tree(&rows).unwrap_err();
        assert_eq!(
            err,
            BomTreeError::TooDeep {
                row: MAX_DEPTH + FIRST_DATA_ROW,
                limit: MAX_DEPTH
            }
        );

        let document = BomToolDocument::new("doc-1", Some("bom.csv".to_string()), rows);
        assert!(matches!(prepare(&document), Err(BomTreeError::TooDeep { .. })));
    }

    #[test]
    fn test_parse_operations() {
        assert_eq!(parse_operations("Cutting + Welding+"), vec!["Cutting", "Welding"]);
        assert!(parse_operations("").is_empty());
    }
}
