pub mod aggregate;
pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod explore;
pub mod filter;
pub mod geo;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod preview;
pub mod render;
pub mod report;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::{
    cli::{Cli, Commands, SourceArgs},
    loader::LoadOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_dashboard", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => report::execute(&args),
        Commands::Explore(args) => explore::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}

pub(crate) fn load_options(source: &SourceArgs) -> Result<LoadOptions<'_>> {
    Ok(LoadOptions {
        delimiter: source.delimiter,
        encoding: io_utils::resolve_encoding(source.input_encoding.as_deref())?,
        sheet: source.sheet.as_deref(),
    })
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
