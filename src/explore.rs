//! Line-driven exploration: the sheet is loaded once and the dashboard is
//! re-rendered for every filter change read from the input.

use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use log::{debug, info};

use crate::{
    cli::{ExploreArgs, parse_date},
    config::DashboardConfig,
    filter::Selection,
    pipeline::{PipelineOptions, Session},
    render,
};

pub fn execute(args: &ExploreArgs) -> Result<()> {
    let config = DashboardConfig::load_or_default(args.config.as_deref())?;
    let load = crate::load_options(&args.source)?;
    let session = Session::open(&args.source.input, &load, config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut output = stdout.lock();
    let renders = run_session(&session, !args.no_map, stdin.lock(), &mut output)?;
    info!("Explore session rendered the dashboard {renders} time(s)");
    Ok(())
}

/// Current filter controls. `None` bounds follow the loaded date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub region: Selection,
    pub state: Selection,
    pub show_table: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Update(Vec<Change>),
    Reset,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Start(Option<NaiveDate>),
    End(Option<NaiveDate>),
    Region(Selection),
    State(Selection),
    Table(bool),
}

impl Controls {
    pub fn apply(&mut self, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::Start(date) => self.start = date,
                Change::End(date) => self.end = date,
                Change::Region(selection) => self.region = selection,
                Change::State(selection) => self.state = selection,
                Change::Table(show) => self.show_table = show,
            }
        }
    }
}

/// Parses one input line.
///
/// Assignments look like `key=value`; a value runs until the next token
/// containing `=`, so `state=New York region=East` is two assignments.
pub fn parse_command(line: &str) -> Result<Command> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return Ok(Command::Quit);
    }
    if trimmed.eq_ignore_ascii_case("reset") {
        return Ok(Command::Reset);
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    for token in trimmed.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            pairs.push((key.trim().to_ascii_lowercase(), value.to_string()));
        } else if let Some((_, value)) = pairs.last_mut() {
            value.push(' ');
            value.push_str(token);
        } else {
            bail!("Expected key=value, found '{token}'");
        }
    }

    pairs
        .into_iter()
        .map(|(key, value)| parse_change(&key, value.trim()))
        .collect::<Result<Vec<_>>>()
        .map(Command::Update)
}

fn parse_change(key: &str, value: &str) -> Result<Change> {
    match key {
        "start" => Ok(Change::Start(parse_bound(value)?)),
        "end" => Ok(Change::End(parse_bound(value)?)),
        "region" => Ok(Change::Region(Selection::parse(Some(value)))),
        "state" => Ok(Change::State(Selection::parse(Some(value)))),
        "table" => parse_switch(value).map(Change::Table),
        other => bail!("Unknown control '{other}' (expected start, end, region, state or table)"),
    }
}

fn parse_bound(value: &str) -> Result<Option<NaiveDate>> {
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    parse_date(value).map(Some).map_err(|err| anyhow!(err))
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => bail!("Invalid table switch '{other}' (expected on or off)"),
    }
}

/// Runs the read-render loop until `quit` or end of input, returning how
/// many times the dashboard was rendered.
pub fn run_session<R: BufRead, W: Write>(
    session: &Session,
    include_map: bool,
    input: R,
    output: &mut W,
) -> Result<usize> {
    let table = session.table();
    writeln!(
        output,
        "Loaded {} order(s) from {} to {}",
        table.len(),
        table.first_date(),
        table.last_date()
    )?;
    writeln!(output, "{}", render::render_clean_report(session.report()))?;
    let regions = table.regions();
    if !regions.is_empty() {
        writeln!(output, "Regions: {}", regions.join(", "))?;
    }
    let states = table.states();
    if !states.is_empty() {
        writeln!(output, "States: {}", states.join(", "))?;
    }
    writeln!(
        output,
        "Enter filters as key=value (start, end, region, state, table); 'reset' restores defaults, 'quit' exits."
    )?;

    let mut controls = Controls::default();
    let mut renders = 0;
    render(session, &controls, include_map, output)?;
    renders += 1;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Reset) => controls = Controls::default(),
            Ok(Command::Update(changes)) => controls.apply(changes),
            Err(err) => {
                writeln!(output, "error: {err}")?;
                continue;
            }
        }
        debug!("Controls now {controls:?}");
        render(session, &controls, include_map, output)?;
        renders += 1;
    }
    Ok(renders)
}

fn render<W: Write>(
    session: &Session,
    controls: &Controls,
    include_map: bool,
    output: &mut W,
) -> Result<()> {
    let (criteria, ignored) = session.criteria(
        controls.start,
        controls.end,
        controls.region.clone(),
        controls.state.clone(),
    );
    let outcome = session.evaluate(
        &criteria,
        PipelineOptions {
            include_map,
            include_rows: controls.show_table,
        },
    );
    writeln!(output)?;
    for message in &ignored {
        writeln!(output, "info: {message}")?;
    }
    match outcome {
        Ok(outcome) => write!(output, "{}", render::render_text(&outcome, session.config()))?,
        Err(err) => writeln!(output, "error: {err}")?,
    }
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        clean::{CleanReport, OptionalColumns, OrderRecord, OrderTable},
        data::DateEncoding,
    };

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session() -> Session {
        let mut east = OrderRecord::new(ymd(2021, 6, 1), "Stapler", Decimal::from(100), Decimal::from(10));
        east.region = Some("East".into());
        east.state = Some("New York".into());
        let mut west = OrderRecord::new(ymd(2021, 7, 1), "Chair", Decimal::from(50), Decimal::from(20));
        west.region = Some("West".into());
        west.state = Some("California".into());
        let columns = OptionalColumns {
            region: true,
            state: true,
            ..OptionalColumns::default()
        };
        let table = OrderTable::from_records(vec![east, west], columns).unwrap();
        let report = CleanReport {
            total_rows: 2,
            duplicates_removed: 0,
            discounts_rescaled: 0,
            ship_dates_backfilled: 0,
            undated_rows_dropped: 0,
            order_date_encoding: DateEncoding::NativeDate,
        };
        Session::new(table, report, DashboardConfig::default())
    }

    #[test]
    fn parses_multi_word_values() {
        let command = parse_command("state=New York region=East table=on").unwrap();
        assert_eq!(
            command,
            Command::Update(vec![
                Change::State(Selection::Only("New York".into())),
                Change::Region(Selection::Only("East".into())),
                Change::Table(true),
            ])
        );
    }

    #[test]
    fn parses_reset_quit_and_auto_bounds() {
        assert_eq!(parse_command(" reset ").unwrap(), Command::Reset);
        assert_eq!(parse_command("QUIT").unwrap(), Command::Quit);
        assert_eq!(
            parse_command("start=auto end=2021-06-30").unwrap(),
            Command::Update(vec![Change::Start(None), Change::End(Some(ymd(2021, 6, 30)))])
        );
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(parse_command("colour=red").is_err());
        assert!(parse_command("start=June").is_err());
        assert!(parse_command("table=maybe").is_err());
        assert!(parse_command("East").is_err());
    }

    #[test]
    fn session_renders_once_per_accepted_line() {
        let input = "region=East\nbogus\n\nstate=all region=all\nquit\nregion=West\n";
        let mut output = Vec::new();
        let renders = run_session(&session(), true, input.as_bytes(), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(renders, 3);
        assert!(text.contains("Loaded 2 order(s) from 2021-06-01 to 2021-07-01"));
        assert!(text.contains("Regions: East, West"));
        assert!(text.contains("Data cleaning: 2 row(s) read, 0 duplicate(s) removed"));
        assert!(text.contains("(region: East, state: all)"));
        assert!(text.contains("error: Expected key=value, found 'bogus'"));
        assert!(!text.contains("(region: West"));
    }

    #[test]
    fn empty_selection_warns_and_keeps_running() {
        let input = "region=East state=California\nreset\n";
        let mut output = Vec::new();
        let renders = run_session(&session(), false, input.as_bytes(), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(renders, 3);
        assert!(text.contains("warning: no orders match"));
        assert_eq!(text.matches("2 order(s) matched").count(), 2);
    }
}
