use anyhow::{Context, Result};
use log::info;

use crate::{
    clean,
    cli::PreviewArgs,
    data::DateEncoding,
    loader::{self, RawTable},
    table,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let options = crate::load_options(&args.source)?;
    let raw = loader::load_table(&args.source.input, &options)
        .with_context(|| format!("Loading {:?}", args.source.input))?;

    let rows = raw
        .rows
        .iter()
        .take(args.rows)
        .map(|row| {
            (0..raw.headers.len())
                .map(|idx| RawTable::cell(row, idx).as_display())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&raw.headers, &rows));

    match raw.column_index(clean::ORDER_DATE) {
        Some(idx) => {
            let typed = raw
                .rows
                .iter()
                .map(|row| RawTable::cell(row, idx).infer())
                .collect::<Vec<_>>();
            let encoding = DateEncoding::detect(&typed);
            println!("'{}' stored as {encoding}", clean::ORDER_DATE);
        }
        None => println!("'{}' column not found", clean::ORDER_DATE),
    }
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        raw.rows.len(),
        args.source.input
    );
    Ok(())
}
