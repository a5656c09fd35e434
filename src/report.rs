use anyhow::Result;
use log::{info, warn};

use crate::{
    cli::{OutputFormat, ReportArgs},
    config::DashboardConfig,
    filter::Selection,
    pipeline::{DashboardOutcome, PipelineOptions, Session},
    render,
};

pub fn execute(args: &ReportArgs) -> Result<()> {
    let config = DashboardConfig::load_or_default(args.config.as_deref())?;
    let load = crate::load_options(&args.source)?;
    let session = Session::open(&args.source.input, &load, config)?;

    let (criteria, ignored) = session.criteria(
        args.start,
        args.end,
        Selection::parse(args.region.as_deref()),
        Selection::parse(args.state.as_deref()),
    );
    let options = PipelineOptions {
        include_map: !args.no_map,
        include_rows: args.show_table,
    };
    let outcome = session.evaluate(&criteria, options)?;

    match args.format {
        OutputFormat::Text => {
            for message in &ignored {
                println!("info: {message}");
            }
            println!("{}", render::render_clean_report(session.report()));
            print!("{}", render::render_text(&outcome, session.config()));
        }
        OutputFormat::Json => println!("{}", render::render_json(&outcome, session.report())?),
    }

    match &outcome {
        DashboardOutcome::Ready(dashboard) => info!(
            "Rendered dashboard for {} order(s) across {} product(s)",
            dashboard.row_count,
            dashboard.products.len()
        ),
        DashboardOutcome::Empty { range, .. } => {
            warn!("No orders matched the filters for {range}")
        }
    }
    Ok(())
}
