use std::collections::BTreeMap;

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{clean::OrderRecord, error::DashboardError};

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Product,
    State,
}

impl GroupKey {
    fn key_of<'a>(&self, record: &'a OrderRecord) -> Option<&'a str> {
        match self {
            GroupKey::Product => Some(record.product_name.as_str()),
            GroupKey::State => record.state.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Sales,
    Profit,
}

impl Measure {
    pub fn of(&self, row: &AggregateRow) -> Decimal {
        match self {
            Measure::Sales => row.sum_sales,
            Measure::Profit => row.sum_profit,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Measure::Sales => "Sales",
            Measure::Profit => "Profit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub sum_sales: Decimal,
    pub sum_profit: Decimal,
}

/// Sums sales and profit per distinct key, in ascending key order.
///
/// Only keys that occur in `rows` are returned; rows without a value for the
/// key (no state) are skipped. A total that leaves the decimal range is an
/// error.
pub fn aggregate<'a, I>(rows: I, key: GroupKey) -> Result<Vec<AggregateRow>, DashboardError>
where
    I: IntoIterator<Item = &'a OrderRecord>,
{
    let mut groups: BTreeMap<&'a str, (Decimal, Decimal)> = BTreeMap::new();
    for record in rows {
        let Some(group) = key.key_of(record) else {
            continue;
        };
        let entry = groups.entry(group).or_default();
        entry.0 = checked_total(entry.0, record.sales, Measure::Sales, group)?;
        entry.1 = checked_total(entry.1, record.profit, Measure::Profit, group)?;
    }
    Ok(groups
        .into_iter()
        .map(|(group, (sum_sales, sum_profit))| AggregateRow {
            key: group.to_string(),
            sum_sales,
            sum_profit,
        })
        .collect())
}

pub(crate) fn checked_total(
    total: Decimal,
    value: Decimal,
    measure: Measure,
    key: &str,
) -> Result<Decimal, DashboardError> {
    total
        .checked_add(value)
        .ok_or_else(|| DashboardError::TotalOverflow {
            measure: measure.label().to_lowercase(),
            key: key.to_string(),
        })
}

/// First `n` rows by `measure`, largest first. Equal values keep their input
/// order.
pub fn top_n(rows: &[AggregateRow], measure: Measure, n: usize) -> Vec<AggregateRow> {
    rows.iter()
        .sorted_by(|a, b| measure.of(b).cmp(&measure.of(a)))
        .take(n)
        .cloned()
        .collect()
}
