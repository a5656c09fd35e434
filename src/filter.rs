use std::fmt;

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

use crate::clean::{OrderRecord, OrderTable};

/// Equality filter on a categorical column; `All` disables it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// `None`, blank and `all` (any case) select everything.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Selection::All,
            Some(value) if value.eq_ignore_ascii_case("all") => Selection::All,
            Some(value) => Selection::Only(value.to_string()),
        }
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(expected) => value == Some(expected.as_str()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Only(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The same range with its ends in ascending order.
    pub fn ordered(self) -> Self {
        if self.start > self.end {
            Self::new(self.end, self.start)
        } else {
            self
        }
    }

    /// True when the two ranges share at least one day, regardless of the
    /// order their ends were given in.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        let (a, b) = (self.ordered(), other.ordered());
        a.start <= b.end && b.start <= a.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    pub range: DateRange,
    pub region: Selection,
    pub state: Selection,
}

impl FilterCriteria {
    pub fn new(start: NaiveDate, end: NaiveDate, region: Selection, state: Selection) -> Self {
        Self {
            range: DateRange::new(start, end),
            region,
            state,
        }
    }

    /// Every row of `table`: its full observed range, no category filters.
    pub fn full_range(table: &OrderTable) -> Self {
        Self::new(
            table.first_date(),
            table.last_date(),
            Selection::All,
            Selection::All,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterNotice {
    StartClamped {
        requested: NaiveDate,
        effective: NaiveDate,
    },
    EndClamped {
        requested: NaiveDate,
        effective: NaiveDate,
    },
    Swapped {
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl fmt::Display for FilterNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNotice::StartClamped {
                requested,
                effective,
            } => write!(
                f,
                "Start date {requested} is outside the data; using {effective}"
            ),
            FilterNotice::EndClamped {
                requested,
                effective,
            } => write!(
                f,
                "End date {requested} is outside the data; using {effective}"
            ),
            FilterNotice::Swapped { start, end } => write!(
                f,
                "Start date was after end date; swapped to {start} to {end}"
            ),
        }
    }
}

/// Clamps `requested` into `bounds`, then swaps inverted ends.
pub fn resolve_range(requested: DateRange, bounds: DateRange) -> (DateRange, Vec<FilterNotice>) {
    let mut notices = Vec::new();
    let start = requested.start.clamp(bounds.start, bounds.end);
    if start != requested.start {
        notices.push(FilterNotice::StartClamped {
            requested: requested.start,
            effective: start,
        });
    }
    let end = requested.end.clamp(bounds.start, bounds.end);
    if end != requested.end {
        notices.push(FilterNotice::EndClamped {
            requested: requested.end,
            effective: end,
        });
    }
    let range = if start > end {
        notices.push(FilterNotice::Swapped {
            start: end,
            end: start,
        });
        DateRange::new(end, start)
    } else {
        DateRange::new(start, end)
    };
    (range, notices)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView<'a> {
    pub range: DateRange,
    pub notices: Vec<FilterNotice>,
    pub rows: Vec<&'a OrderRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome<'a> {
    Matched(FilteredView<'a>),
    Empty {
        range: DateRange,
        notices: Vec<FilterNotice>,
    },
}

pub fn apply<'a>(table: &'a OrderTable, criteria: &FilterCriteria) -> FilterOutcome<'a> {
    let bounds = DateRange::new(table.first_date(), table.last_date());
    let (range, notices) = resolve_range(criteria.range, bounds);
    if !criteria.range.overlaps(&bounds) {
        let requested = criteria.range.ordered();
        debug!("Requested range {requested} lies outside the data ({bounds})");
        return FilterOutcome::Empty {
            range: requested,
            notices,
        };
    }
    debug!(
        "Filtering {} row(s) to {range} (region: {}, state: {})",
        table.len(),
        criteria.region,
        criteria.state
    );
    let rows = table
        .records()
        .iter()
        .filter(|record| {
            range.contains(record.order_date)
                && criteria.region.matches(record.region.as_deref())
                && criteria.state.matches(record.state.as_deref())
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        FilterOutcome::Empty { range, notices }
    } else {
        FilterOutcome::Matched(FilteredView {
            range,
            notices,
            rows,
        })
    }
}
