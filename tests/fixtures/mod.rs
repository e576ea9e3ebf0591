//! Spreadsheet fixtures shared by the integration and E2E tests

use bom_job_service::models::bom::BomRow;

pub const ITEM_GROUPS: &[&str] = &["Assemblies", "Sheet Metal", "Fasteners"];
pub const OPERATIONS: &[&str] = &["Cutting", "Welding", "Painting"];

fn row(sr_no: &str, sub_assembly: &str, parent: &str, matl: &str, qty: &str) -> BomRow {
    BomRow {
        sr_no: sr_no.to_string(),
        sub_assembly: sub_assembly.to_string(),
        parent: parent.to_string(),
        material: matl.to_string(),
        qty_per_set: qty.to_string(),
        description: format!("{sub_assembly} description"),
        ..Default::default()
    }
}

/// Two finished goods, the first with a nested sub-assembly.
pub fn frame_rows(prefix: &str) -> Vec<BomRow> {
    let fg1 = format!("{prefix}-FRAME");
    let sa1 = format!("{prefix}-SIDE");
    let p1 = format!("{prefix}-PLATE");
    let p2 = format!("{prefix}-BOLT");
    let fg2 = format!("{prefix}-STAND");

    let mut side = row("", &sa1, &fg1, "Sheet Metal", "2");
    side.operation = "Cutting+Welding".to_string();

    vec![
        row("1", &fg1, "", "Assemblies", ""),
        side,
        row("", &p1, &sa1, "Sheet Metal", "4"),
        row("", &p2, &fg1, "Fasteners", "8"),
        row("2", &fg2, "", "Assemblies", ""),
    ]
}

/// A finished good whose item group is not set up.
pub fn unknown_group_rows(prefix: &str) -> Vec<BomRow> {
    vec![row("1", &format!("{prefix}-ODD"), "", "Plastics", "")]
}
