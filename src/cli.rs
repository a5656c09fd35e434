use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Explore sales and profit in an orders spreadsheet", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render the dashboard once for the given filters
    Report(ReportArgs),
    /// Load once, then re-render the dashboard for each filter line read from stdin
    Explore(ExploreArgs),
    /// Show the first rows of the sheet as loaded
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Orders spreadsheet (.xlsx, .xls, .ods) or delimited text file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet to read (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Delimiter for text input (supports ',', 'tab', ';', '|'); forces text parsing
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// First order date to include (YYYY-MM-DD); defaults to the earliest order
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,
    /// Last order date to include (YYYY-MM-DD); defaults to the latest order
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,
    /// Only orders from this region ('all' for every region)
    #[arg(long)]
    pub region: Option<String>,
    /// Only orders from this state ('all' for every state)
    #[arg(long)]
    pub state: Option<String>,
    /// Include the filtered orders table
    #[arg(long = "show-table")]
    pub show_table: bool,
    /// Skip the per-state map layer
    #[arg(long = "no-map")]
    pub no_map: bool,
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// YAML file with presentation settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Skip the per-state map layer
    #[arg(long = "no-map")]
    pub no_map: bool,
    /// YAML file with presentation settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("Expected a date as YYYY-MM-DD: {err}"))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
