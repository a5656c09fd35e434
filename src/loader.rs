use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    data::{Cell, parse_duration_text, parse_naive_date, parse_naive_datetime},
    error::DashboardError,
    io_utils::{self, InputFormat},
};

static EMPTY_CELL: Cell = Cell::Empty;

/// A sheet as loaded from disk: one header row and typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell at `row`/`column`, `Empty` when the row is short.
    pub fn cell<'a>(row: &'a [Cell], column: usize) -> &'a Cell {
        row.get(column).unwrap_or(&EMPTY_CELL)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sheet: Option<&'a str>,
}

pub fn load_table(path: &Path, options: &LoadOptions<'_>) -> Result<RawTable> {
    let table = match io_utils::detect_input_format(path, options.delimiter) {
        InputFormat::Workbook => load_workbook(path, options.sheet)?,
        InputFormat::Delimited { delimiter } => {
            debug!(
                "Reading {:?} as delimited text (delimiter '{}')",
                path,
                crate::printable_delimiter(delimiter)
            );
            load_delimited(path, delimiter, options.encoding)?
        }
    };
    info!(
        "Loaded {} row(s) across {} column(s) from {:?}",
        table.rows.len(),
        table.headers.len(),
        path
    );
    Ok(table)
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let sheet_name = match sheet {
        Some(requested) => sheet_names
            .iter()
            .find(|name| name.as_str() == requested)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownSheet {
                sheet: requested.to_string(),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| DashboardError::EmptyWorkbook {
                path: path.to_path_buf(),
            })?,
    };
    debug!("Reading sheet '{sheet_name}' from {path:?}");
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading worksheet '{sheet_name}'"))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header_row| {
            header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let rows = rows
        .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();
    Ok(RawTable {
        source: path.to_path_buf(),
        headers,
        rows,
    })
}

fn load_delimited(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<RawTable> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        rows.push(decoded.iter().map(|field| Cell::from_text(field)).collect());
    }
    Ok(RawTable {
        source: path.to_path_buf(),
        headers,
        rows,
    })
}

fn convert_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        // calamine applies the workbook's 1900/1904 date system.
        Data::DateTime(dt) if dt.is_duration() => {
            dt.as_duration().map(Cell::Duration).unwrap_or(Cell::Empty)
        }
        Data::DateTime(dt) => dt.as_datetime().map(Cell::DateTime).unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => parse_naive_datetime(s)
            .map(Cell::DateTime)
            .or_else(|| parse_naive_date(s).map(Cell::Date))
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => parse_duration_text(s)
            .map(Cell::Duration)
            .unwrap_or_else(|| Cell::Text(s.clone())),
    }
}
