use std::path::PathBuf;

use thiserror::Error;

/// Failures that halt a session before any dashboard can be produced.
///
/// Empty filter results and missing optional columns are not errors; they
/// surface as notices on the evaluated outcome instead.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("No dates parsed from column '{column}'")]
    NoDatesParsed { column: String },
    #[error("Required column '{column}' not found")]
    MissingColumn { column: String },
    #[error("Column '{column}' row {row}: '{value}' is not a number")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Total {measure} for '{key}' is out of range")]
    TotalOverflow { measure: String, key: String },
    #[error("Workbook {path:?} contains no sheets")]
    EmptyWorkbook { path: PathBuf },
    #[error("Sheet '{sheet}' not found in workbook")]
    UnknownSheet { sheet: String },
}
