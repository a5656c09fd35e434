//! The report pipeline: filter, aggregate, rank and place on the map.
//!
//! [`evaluate()`] is a pure function of its inputs. A session loads and
//! cleans the sheet once, then calls it again for every change of criteria.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    aggregate::{AggregateRow, GroupKey, Measure, aggregate, top_n},
    clean::{self, CleanReport, OrderRecord, OrderTable},
    config::DashboardConfig,
    error::DashboardError,
    filter::{self, DateRange, FilterCriteria, FilterNotice, FilterOutcome, Selection},
    geo::{self, MapLayer},
    loader::{self, LoadOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub include_map: bool,
    pub include_rows: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_map: true,
            include_rows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MapSection {
    Ready(MapLayer),
    Skipped { reason: String },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub criteria: FilterCriteria,
    pub range: DateRange,
    pub notices: Vec<FilterNotice>,
    pub row_count: usize,
    pub top_sales: Vec<AggregateRow>,
    pub top_profit: Vec<AggregateRow>,
    pub products: Vec<AggregateRow>,
    pub map: MapSection,
    pub rows: Option<Vec<OrderRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardOutcome {
    Ready(Box<Dashboard>),
    Empty {
        criteria: FilterCriteria,
        range: DateRange,
        notices: Vec<FilterNotice>,
    },
}

pub fn evaluate(
    table: &OrderTable,
    criteria: &FilterCriteria,
    config: &DashboardConfig,
    options: PipelineOptions,
) -> Result<DashboardOutcome, DashboardError> {
    let view = match filter::apply(table, criteria) {
        FilterOutcome::Matched(view) => view,
        FilterOutcome::Empty { range, notices } => {
            return Ok(DashboardOutcome::Empty {
                criteria: criteria.clone(),
                range,
                notices,
            });
        }
    };

    let products = aggregate(view.rows.iter().copied(), GroupKey::Product)?;
    let top_sales = top_n(&products, Measure::Sales, config.top_n);
    let top_profit = top_n(&products, Measure::Profit, config.top_n);

    let columns = table.columns();
    let map = if !options.include_map {
        MapSection::Disabled
    } else if !columns.state {
        MapSection::Skipped {
            reason: format!("no '{}' column in the data", clean::STATE),
        }
    } else {
        MapSection::Ready(geo::build_map_layer(
            view.rows.iter().copied(),
            columns.coordinates,
            &config.map,
        )?)
    };

    let rows = options.include_rows.then(|| {
        let mut rows = view.rows.iter().map(|r| (*r).clone()).collect::<Vec<_>>();
        rows.sort_by_key(|r| r.order_date);
        rows
    });

    Ok(DashboardOutcome::Ready(Box::new(Dashboard {
        criteria: criteria.clone(),
        range: view.range,
        notices: view.notices,
        row_count: view.rows.len(),
        top_sales,
        top_profit,
        products,
        map,
        rows,
    })))
}

/// A loaded, cleaned order table plus the settings used to present it.
#[derive(Debug, Clone)]
pub struct Session {
    table: OrderTable,
    report: CleanReport,
    config: DashboardConfig,
}

impl Session {
    pub fn open(path: &Path, load: &LoadOptions<'_>, config: DashboardConfig) -> Result<Self> {
        let raw = loader::load_table(path, load)
            .with_context(|| format!("Loading orders from {path:?}"))?;
        let (table, report) =
            clean::clean(&raw).with_context(|| format!("Cleaning orders from {path:?}"))?;
        info!(
            "Session ready: {} order(s) from {} to {}",
            table.len(),
            table.first_date(),
            table.last_date()
        );
        Ok(Self::new(table, report, config))
    }

    pub fn new(table: OrderTable, report: CleanReport, config: DashboardConfig) -> Self {
        Self {
            table,
            report,
            config,
        }
    }

    pub fn table(&self) -> &OrderTable {
        &self.table
    }

    pub fn report(&self) -> &CleanReport {
        &self.report
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Criteria built from optional user input; missing bounds default to
    /// the observed range. Category filters on columns the sheet lacks are
    /// dropped and described in the returned messages.
    pub fn criteria(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        region: Selection,
        state: Selection,
    ) -> (FilterCriteria, Vec<String>) {
        let columns = self.table.columns();
        let mut ignored = Vec::new();
        let region = usable(region, columns.region, clean::REGION, &mut ignored);
        let state = usable(state, columns.state, clean::STATE, &mut ignored);
        let criteria = FilterCriteria::new(
            start.unwrap_or(self.table.first_date()),
            end.unwrap_or(self.table.last_date()),
            region,
            state,
        );
        debug!("Effective criteria: {criteria:?}");
        (criteria, ignored)
    }

    pub fn evaluate(
        &self,
        criteria: &FilterCriteria,
        options: PipelineOptions,
    ) -> Result<DashboardOutcome, DashboardError> {
        evaluate(&self.table, criteria, &self.config, options)
    }
}

fn usable(
    selection: Selection,
    present: bool,
    column: &str,
    ignored: &mut Vec<String>,
) -> Selection {
    if present || selection == Selection::All {
        return selection;
    }
    warn!("Ignoring {column} filter '{selection}': column not present");
    ignored.push(format!("{column} filter ignored: no '{column}' column in the data"));
    Selection::All
}
