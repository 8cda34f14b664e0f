//! Machine-readable exports.

use crate::models::AnalysisReport;
use anyhow::Result;

/// Header row of the CSV export.
pub const CSV_HEADER: &str = "Category,Check,Status,Description,Priority,Solution";

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a CSV report: one row per check, every field quoted.
pub fn generate_csv_report(report: &AnalysisReport) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for (category, check) in report.all_checks() {
        let fields = [
            category.title().to_string(),
            check.title.clone(),
            check.status.to_string(),
            check.desc.clone(),
            check.priority.to_string(),
            check.solution.clone(),
        ];
        let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    csv
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
