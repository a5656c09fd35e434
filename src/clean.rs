//! Turns a loaded sheet into the immutable order table.
//!
//! Cleaning runs once per session: exact-duplicate rows are dropped, discount
//! percentages are rescaled, the two ship-date columns are merged and the
//! order-date column is normalized through its detected [`DateEncoding`].

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    data::{Cell, DateEncoding, normalize_date_column},
    error::DashboardError,
    loader::RawTable,
};

pub const ORDER_DATE: &str = "Order Date";
pub const SALES: &str = "Sales";
pub const PROFIT: &str = "Profit";
pub const PRODUCT_NAME: &str = "Product Name";
pub const REGION: &str = "Region";
pub const STATE: &str = "State";
pub const CITY: &str = "City";
pub const DISCOUNT: &str = "Discount";
pub const SHIP_DATE: &str = "Ship Date";
pub const SHIP_DATE_ALT: &str = "Ship date";
pub const ORDER_ID: &str = "Order ID";
pub const QUANTITY: &str = "Quantity";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub source_row: usize,
    pub order_id: Option<String>,
    pub order_date: NaiveDate,
    pub ship_date: Option<NaiveDate>,
    pub product_name: String,
    pub region: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub sales: Decimal,
    pub profit: Decimal,
    pub discount: Option<Decimal>,
    pub quantity: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl OrderRecord {
    /// Minimal record carrying only the required fields.
    pub fn new(order_date: NaiveDate, product_name: &str, sales: Decimal, profit: Decimal) -> Self {
        Self {
            source_row: 0,
            order_id: None,
            order_date,
            ship_date: None,
            product_name: product_name.to_string(),
            region: None,
            state: None,
            city: None,
            sales,
            profit,
            discount: None,
            quantity: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Optional columns present in the source sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptionalColumns {
    pub region: bool,
    pub state: bool,
    pub city: bool,
    pub discount: bool,
    pub ship_date: bool,
    pub order_id: bool,
    pub quantity: bool,
    pub coordinates: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTable {
    records: Vec<OrderRecord>,
    columns: OptionalColumns,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl OrderTable {
    pub fn from_records(
        records: Vec<OrderRecord>,
        columns: OptionalColumns,
    ) -> Result<Self, DashboardError> {
        let (first_date, last_date) = match records.iter().map(|r| r.order_date).minmax() {
            itertools::MinMaxResult::NoElements => {
                return Err(DashboardError::NoDatesParsed {
                    column: ORDER_DATE.to_string(),
                });
            }
            itertools::MinMaxResult::OneElement(date) => (date, date),
            itertools::MinMaxResult::MinMax(min, max) => (min, max),
        };
        Ok(Self {
            records,
            columns,
            first_date,
            last_date,
        })
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn columns(&self) -> OptionalColumns {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    pub fn regions(&self) -> Vec<String> {
        distinct(self.records.iter().filter_map(|r| r.region.as_deref()))
    }

    pub fn states(&self) -> Vec<String> {
        distinct(self.records.iter().filter_map(|r| r.state.as_deref()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values.unique().sorted().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub total_rows: usize,
    pub duplicates_removed: usize,
    pub discounts_rescaled: usize,
    pub ship_dates_backfilled: usize,
    pub undated_rows_dropped: usize,
    pub order_date_encoding: DateEncoding,
}

/// Rescales whole-percent discounts: `1 < v <= 100` becomes `v / 100`.
pub fn normalize_discount(value: Decimal) -> Decimal {
    if value > Decimal::ONE && value <= Decimal::ONE_HUNDRED {
        value / Decimal::ONE_HUNDRED
    } else {
        value
    }
}

/// Primary value where present, secondary otherwise.
pub fn reconcile_dates(
    primary: &[Option<NaiveDate>],
    secondary: &[Option<NaiveDate>],
) -> Vec<Option<NaiveDate>> {
    primary
        .iter()
        .zip(secondary)
        .map(|(first, second)| first.or(*second))
        .collect()
}

struct ColumnIndexes {
    order_date: usize,
    sales: usize,
    profit: usize,
    product_name: usize,
    region: Option<usize>,
    state: Option<usize>,
    city: Option<usize>,
    discount: Option<usize>,
    ship_date: Option<usize>,
    ship_date_alt: Option<usize>,
    order_id: Option<usize>,
    quantity: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
}

impl ColumnIndexes {
    fn resolve(raw: &RawTable) -> Result<Self, DashboardError> {
        let require = |name: &str| {
            raw.column_index(name)
                .ok_or_else(|| DashboardError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            order_date: require(ORDER_DATE)?,
            sales: require(SALES)?,
            profit: require(PROFIT)?,
            product_name: require(PRODUCT_NAME)?,
            region: raw.column_index(REGION),
            state: raw.column_index(STATE),
            city: raw.column_index(CITY),
            discount: raw.column_index(DISCOUNT),
            ship_date: raw.column_index(SHIP_DATE),
            ship_date_alt: raw.column_index(SHIP_DATE_ALT),
            order_id: raw.column_index(ORDER_ID),
            quantity: raw.column_index(QUANTITY),
            latitude: raw.column_index(LATITUDE),
            longitude: raw.column_index(LONGITUDE),
        })
    }

    fn optional_columns(&self) -> OptionalColumns {
        OptionalColumns {
            region: self.region.is_some(),
            state: self.state.is_some(),
            city: self.city.is_some(),
            discount: self.discount.is_some(),
            ship_date: self.ship_date.is_some() || self.ship_date_alt.is_some(),
            order_id: self.order_id.is_some(),
            quantity: self.quantity.is_some(),
            coordinates: self.latitude.is_some() && self.longitude.is_some(),
        }
    }
}

pub fn clean(raw: &RawTable) -> Result<(OrderTable, CleanReport), DashboardError> {
    let columns = ColumnIndexes::resolve(raw)?;
    let total_rows = raw.rows.len();

    let rows = raw
        .rows
        .iter()
        .enumerate()
        .unique_by(|(_, row)| row.iter().map(Cell::dedup_key).join("\u{1f}"))
        .map(|(idx, row)| (idx + 2, row.as_slice()))
        .collect::<Vec<_>>();
    let duplicates_removed = total_rows - rows.len();

    let (order_date_encoding, order_dates) =
        normalize_date_column(&typed_column(&rows, columns.order_date));
    debug!("Column '{ORDER_DATE}' detected as {order_date_encoding}");
    if order_dates.iter().all(Option::is_none) {
        return Err(DashboardError::NoDatesParsed {
            column: ORDER_DATE.to_string(),
        });
    }

    let date_column = |index: Option<usize>| {
        index.map(|idx| {
            let (encoding, dates) = normalize_date_column(&typed_column(&rows, idx));
            debug!("Column '{}' detected as {encoding}", raw.headers[idx]);
            dates
        })
    };
    let mut ship_dates_backfilled = 0usize;
    let ship_dates = match (date_column(columns.ship_date), date_column(columns.ship_date_alt)) {
        (Some(primary), Some(secondary)) => {
            ship_dates_backfilled = primary
                .iter()
                .zip(&secondary)
                .filter(|(first, second)| first.is_none() && second.is_some())
                .count();
            Some(reconcile_dates(&primary, &secondary))
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    };

    let mut records = Vec::with_capacity(rows.len());
    let mut discounts_rescaled = 0usize;
    let mut undated_rows_dropped = 0usize;
    for (position, (source_row, row)) in rows.iter().enumerate() {
        let Some(order_date) = order_dates[position] else {
            warn!("Dropping row {source_row}: '{ORDER_DATE}' could not be parsed");
            undated_rows_dropped += 1;
            continue;
        };
        let text = |index: Option<usize>| index.and_then(|idx| RawTable::cell(row, idx).as_text());
        let number = |index: Option<usize>| index.and_then(|idx| RawTable::cell(row, idx).as_f64());

        let discount = columns
            .discount
            .and_then(|idx| RawTable::cell(row, idx).as_decimal())
            .map(|value| {
                let normalized = normalize_discount(value);
                if normalized != value {
                    discounts_rescaled += 1;
                }
                normalized
            });

        records.push(OrderRecord {
            source_row: *source_row,
            order_id: text(columns.order_id),
            order_date,
            ship_date: ship_dates.as_ref().and_then(|dates| dates[position]),
            product_name: text(Some(columns.product_name)).unwrap_or_default(),
            region: text(columns.region),
            state: text(columns.state),
            city: text(columns.city),
            sales: measure(row, columns.sales, SALES, *source_row)?,
            profit: measure(row, columns.profit, PROFIT, *source_row)?,
            discount,
            quantity: columns
                .quantity
                .and_then(|idx| RawTable::cell(row, idx).as_i64()),
            latitude: number(columns.latitude),
            longitude: number(columns.longitude),
        });
    }

    let report = CleanReport {
        total_rows,
        duplicates_removed,
        discounts_rescaled,
        ship_dates_backfilled,
        undated_rows_dropped,
        order_date_encoding,
    };
    info!(
        "Cleaned {} row(s): {} duplicate(s) removed, {} undated row(s) dropped, \
         {} discount(s) rescaled, {} ship date(s) backfilled",
        records.len(),
        duplicates_removed,
        undated_rows_dropped,
        discounts_rescaled,
        ship_dates_backfilled
    );
    let table = OrderTable::from_records(records, columns.optional_columns())?;
    Ok((table, report))
}

/// Cells of one column with numbers and durations read out of text.
fn typed_column(rows: &[(usize, &[Cell])], index: usize) -> Vec<Cell> {
    rows.iter()
        .map(|(_, row)| RawTable::cell(row, index).infer())
        .collect()
}

fn measure(
    row: &[Cell],
    index: usize,
    column: &str,
    source_row: usize,
) -> Result<Decimal, DashboardError> {
    let cell = RawTable::cell(row, index);
    if cell.is_empty() {
        return Ok(Decimal::ZERO);
    }
    cell.as_decimal().ok_or_else(|| DashboardError::InvalidNumber {
        column: column.to_string(),
        row: source_row,
        value: cell.as_display(),
    })
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, str::FromStr};

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn raw(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            source: PathBuf::from("orders.csv"),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    const BASE: &[&str] = &[ORDER_DATE, PRODUCT_NAME, SALES, PROFIT];

    #[test]
    fn discount_rule_matches_documented_examples() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(normalize_discount(d("17")), d("0.17"));
        assert_eq!(normalize_discount(d("0.2")), d("0.2"));
        assert_eq!(normalize_discount(d("150")), d("150"));
        assert_eq!(normalize_discount(d("1")), d("1"));
        assert_eq!(normalize_discount(d("100")), d("1"));
    }

    #[test]
    fn reconcile_prefers_primary_and_falls_back() {
        let primary = [Some(ymd(2021, 1, 2)), None, None];
        let secondary = [Some(ymd(2021, 1, 9)), Some(ymd(2021, 1, 3)), None];
        assert_eq!(
            reconcile_dates(&primary, &secondary),
            vec![Some(ymd(2021, 1, 2)), Some(ymd(2021, 1, 3)), None]
        );
    }

    #[test]
    fn duplicates_are_removed_keeping_first_occurrence() {
        let row = |product: &str| {
            vec![
                text("2021-06-01"),
                text(product),
                Cell::Number(10.0),
                Cell::Number(1.0),
            ]
        };
        let table = raw(BASE, vec![row("A"), row("B"), row("A"), row("C")]);
        let (orders, report) = clean(&table).expect("clean");
        let names = orders
            .records()
            .iter()
            .map(|r| r.product_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(orders.records()[2].source_row, 5);
    }

    #[test]
    fn numeric_order_dates_use_spreadsheet_epoch() {
        let table = raw(
            BASE,
            vec![
                vec![Cell::Number(0.0), text("A"), Cell::Number(1.0), Cell::Number(0.0)],
                vec![Cell::Number(1.0), text("B"), Cell::Number(1.0), Cell::Number(0.0)],
            ],
        );
        let (orders, report) = clean(&table).expect("clean");
        assert_eq!(report.order_date_encoding, DateEncoding::NumericOffset);
        assert_eq!(orders.records()[0].order_date, ymd(1899, 12, 30));
        assert_eq!(orders.records()[1].order_date, ymd(1899, 12, 31));
    }

    #[test]
    fn unparseable_order_dates_are_fatal() {
        let table = raw(
            BASE,
            vec![vec![text("soon"), text("A"), Cell::Number(1.0), Cell::Number(0.0)]],
        );
        let err = clean(&table).unwrap_err();
        assert!(matches!(err, DashboardError::NoDatesParsed { .. }));
        assert!(err.to_string().contains("No dates parsed"));
    }

    #[test]
    fn partially_dated_tables_drop_undated_rows() {
        let table = raw(
            BASE,
            vec![
                vec![text("2021-06-01"), text("A"), Cell::Number(1.0), Cell::Number(0.0)],
                vec![text("later"), text("B"), Cell::Number(1.0), Cell::Number(0.0)],
            ],
        );
        let (orders, report) = clean(&table).expect("clean");
        assert_eq!(orders.len(), 1);
        assert_eq!(report.undated_rows_dropped, 1);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let table = raw(&[ORDER_DATE, SALES, PROFIT], vec![]);
        let err = clean(&table).unwrap_err();
        assert!(
            matches!(err, DashboardError::MissingColumn { ref column } if column == PRODUCT_NAME)
        );
    }

    #[test]
    fn invalid_sales_value_names_column_and_row() {
        let table = raw(
            BASE,
            vec![vec![text("2021-06-01"), text("A"), text("lots"), Cell::Number(0.0)]],
        );
        let err = clean(&table).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::InvalidNumber { ref column, row: 2, .. } if column == SALES
        ));
    }

    #[test]
    fn ship_dates_merge_and_discounts_rescale() {
        let headers = [
            ORDER_DATE,
            PRODUCT_NAME,
            SALES,
            PROFIT,
            DISCOUNT,
            SHIP_DATE,
            SHIP_DATE_ALT,
        ];
        let table = raw(
            &headers,
            vec![
                vec![
                    text("2021-06-01"),
                    text("A"),
                    Cell::Number(10.0),
                    Cell::Number(1.0),
                    Cell::Number(17.0),
                    text("2021-06-04"),
                    text("2021-06-09"),
                ],
                vec![
                    text("2021-06-02"),
                    text("B"),
                    Cell::Number(10.0),
                    Cell::Number(1.0),
                    Cell::Number(0.2),
                    text("n/a"),
                    text("2021-06-05"),
                ],
            ],
        );
        let (orders, report) = clean(&table).expect("clean");
        let records = orders.records();
        assert_eq!(records[0].ship_date, Some(ymd(2021, 6, 4)));
        assert_eq!(records[1].ship_date, Some(ymd(2021, 6, 5)));
        assert_eq!(records[0].discount, Decimal::from_str("0.17").ok());
        assert_eq!(records[1].discount, Decimal::from_str("0.2").ok());
        assert_eq!(report.discounts_rescaled, 1);
        assert_eq!(report.ship_dates_backfilled, 1);
        assert!(orders.columns().ship_date);
        assert!(!orders.columns().state);
    }

    #[test]
    fn table_tracks_observed_range_and_choices() {
        let mut first = OrderRecord::new(ymd(2021, 3, 1), "A", Decimal::ONE, Decimal::ZERO);
        first.region = Some("West".into());
        first.state = Some("Utah".into());
        let mut second = OrderRecord::new(ymd(2020, 1, 5), "B", Decimal::ONE, Decimal::ZERO);
        second.region = Some("East".into());
        second.state = Some("Utah".into());
        let table =
            OrderTable::from_records(vec![first, second], OptionalColumns::default()).unwrap();
        assert_eq!(table.first_date(), ymd(2020, 1, 5));
        assert_eq!(table.last_date(), ymd(2021, 3, 1));
        assert_eq!(table.regions(), vec!["East", "West"]);
        assert_eq!(table.states(), vec!["Utah"]);
    }

    #[test]
    fn text_fields_are_typed_only_where_the_column_needs_it() {
        let table = raw(
            &[ORDER_ID, ORDER_DATE, PRODUCT_NAME, SALES, PROFIT, QUANTITY],
            vec![vec![
                text("0042"),
                text("44197"),
                text("3 days"),
                text("12.50"),
                text("-1.25"),
                text("2"),
            ]],
        );
        let (orders, report) = clean(&table).expect("clean");
        let record = &orders.records()[0];
        assert_eq!(report.order_date_encoding, DateEncoding::NumericOffset);
        assert_eq!(record.order_date, ymd(2021, 1, 1));
        assert_eq!(record.order_id.as_deref(), Some("0042"));
        assert_eq!(record.product_name, "3 days");
        assert_eq!(record.sales, Decimal::from_str("12.50").unwrap());
        assert_eq!(record.profit, Decimal::from_str("-1.25").unwrap());
        assert_eq!(record.quantity, Some(2));
    }
}
