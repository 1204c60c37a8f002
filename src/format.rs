//! Format usage listings and reconciliation reports as text or JSON.

use crate::key::encode_usage_key;
use crate::reconcile::ReconcileReport;
use crate::store::UsageRecord;
use crate::types::DimensionValues;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline. Respects NO_COLOR and TTY.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// JSON-friendly view of a usage record (hex usage key, flattened metadata).
#[derive(Debug, Serialize)]
pub struct UsageRow {
    pub usage_key: String,
    pub asset_id: String,
    pub node_identifier: String,
    pub workspace: String,
    pub dimensions: DimensionValues,
    pub node_type: String,
}

impl From<&UsageRecord> for UsageRow {
    fn from(record: &UsageRecord) -> Self {
        Self {
            usage_key: encode_usage_key(&record.usage_key),
            asset_id: record.asset_id.clone(),
            node_identifier: record.metadata.node_identifier.clone(),
            workspace: record.metadata.workspace.clone(),
            dimensions: record.metadata.dimensions.clone(),
            node_type: record.metadata.node_type.clone(),
        }
    }
}

fn format_dimensions(dimensions: &DimensionValues) -> String {
    if dimensions.is_empty() {
        return "-".to_string();
    }
    dimensions
        .iter()
        .map(|(dimension, values)| format!("{}: {}", dimension, values.join(",")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Format a usage listing as human-readable text.
pub fn format_usages_text(records: &[UsageRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Asset Usages")));
    if records.is_empty() {
        out.push_str("No usages recorded.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Usage key",
        "Asset",
        "Node",
        "Workspace",
        "Dimensions",
        "Node type",
    ]);
    for record in records {
        table.add_row(vec![
            encode_usage_key(&record.usage_key),
            record.asset_id.clone(),
            record.metadata.node_identifier.clone(),
            record.metadata.workspace.clone(),
            format_dimensions(&record.metadata.dimensions),
            record.metadata.node_type.clone(),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Total: {} usages.\n", records.len()));
    out
}

/// Format a usage listing as JSON.
pub fn format_usages_json(records: &[UsageRecord]) -> String {
    let rows: Vec<UsageRow> = records.iter().map(UsageRow::from).collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

/// Format a reconciliation report as human-readable text.
pub fn format_reconcile_report_text(report: &ReconcileReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading("Reconciliation Report")
    ));
    out.push_str(&format!(
        "  Nodes scanned: {}/{}\n\n",
        report.nodes_processed, report.nodes_total
    ));

    if !report.added.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Added")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Usage key", "Asset", "Node", "Workspace"]);
        for change in &report.added {
            table.add_row(vec![
                change.usage_key.clone(),
                change.asset_id.clone(),
                change.node_identifier.clone(),
                change.workspace.clone(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if !report.removed.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Removed")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Usage key", "Asset", "Node", "Workspace"]);
        for change in &report.removed {
            table.add_row(vec![
                change.usage_key.clone(),
                change.asset_id.clone(),
                change.node_identifier.clone(),
                change.workspace.clone(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if !report.errors.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Errors")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Node", "Workspace", "Property", "Reference", "Error"]);
        for error in &report.errors {
            table.add_row(vec![
                error.node_identifier.clone(),
                error.workspace.clone(),
                error.property.clone(),
                error.reference.clone(),
                error.message.clone(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    if !report.changed() && report.errors.is_empty() {
        out.push_str("Index is up to date; nothing changed.\n");
    } else {
        out.push_str(&format!(
            "Total: {} added, {} removed, {} errors.\n",
            report.added.len(),
            report.removed.len(),
            report.errors.len()
        ));
    }
    out
}

/// Format a reconciliation report as JSON.
pub fn format_reconcile_report_json(report: &ReconcileReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
