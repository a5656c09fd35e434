//! Cell values and the parsing rules shared by the loader and the cleaner.
//!
//! Numeric day offsets and durations found in text input are resolved
//! against [`spreadsheet_epoch()`] (1899-12-30). Workbook serial dates are
//! converted by calamine, which knows the workbook's date system.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
}

impl Cell {
    /// Wraps a field read from delimited text. The value is kept verbatim;
    /// columns that hold numbers or dates are typed later with [`Cell::infer`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    /// Reads numbers and duration literals out of a text cell. Date-looking
    /// text stays text so that date detection sees the column as written.
    pub fn infer(&self) -> Cell {
        let Cell::Text(raw) = self else {
            return self.clone();
        };
        if let Some(number) = parse_plain_number(raw) {
            Cell::Number(number)
        } else if let Some(duration) = parse_duration_text(raw) {
            Cell::Duration(duration)
        } else {
            self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Duration(d) => format!("{}s", d.num_seconds()),
        }
    }

    /// Non-empty textual form, used for categorical fields.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            other => Some(other.as_display()),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Cell::Number(n) => Decimal::from_f64(*n),
            Cell::Text(s) => parse_decimal(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            Cell::Text(s) => s.trim().parse::<i64>().ok().or_else(|| {
                parse_plain_number(s.trim())
                    .filter(|n| n.fract() == 0.0)
                    .map(|n| n as i64)
            }),
            _ => None,
        }
    }

    /// Key under which two cells compare as exact duplicates.
    pub fn dedup_key(&self) -> String {
        match self {
            Cell::Empty => String::from("e:"),
            Cell::Text(s) => format!("t:{s}"),
            Cell::Number(n) => format!("n:{:016x}", n.to_bits()),
            Cell::Bool(b) => format!("b:{b}"),
            Cell::Date(d) => format!("d:{d}"),
            Cell::DateTime(dt) => format!("dt:{dt}"),
            Cell::Duration(d) => format!("p:{}", d.num_milliseconds()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// How a date column is stored, decided once per column at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    NativeDate,
    NumericOffset,
    Duration,
    Text,
}

impl DateEncoding {
    /// Picks the encoding shared by every non-empty cell, or `Text` when the
    /// column is mixed or blank.
    pub fn detect<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        let mut dates = true;
        let mut numbers = true;
        let mut durations = true;
        let mut seen = false;
        for cell in cells {
            match cell {
                Cell::Empty => continue,
                Cell::Date(_) | Cell::DateTime(_) => {
                    numbers = false;
                    durations = false;
                }
                Cell::Number(_) => {
                    dates = false;
                    durations = false;
                }
                Cell::Duration(_) => {
                    dates = false;
                    numbers = false;
                }
                Cell::Text(_) | Cell::Bool(_) => return DateEncoding::Text,
            }
            seen = true;
        }
        if !seen {
            DateEncoding::Text
        } else if dates {
            DateEncoding::NativeDate
        } else if numbers {
            DateEncoding::NumericOffset
        } else if durations {
            DateEncoding::Duration
        } else {
            DateEncoding::Text
        }
    }

    pub fn convert(self, cell: &Cell) -> Option<NaiveDate> {
        match self {
            DateEncoding::NativeDate => cell_date(cell),
            DateEncoding::NumericOffset => match cell {
                Cell::Number(days) => date_from_offset(*days),
                _ => None,
            },
            DateEncoding::Duration => match cell {
                Cell::Duration(delta) => spreadsheet_epoch().checked_add_signed(*delta),
                _ => None,
            },
            DateEncoding::Text => match cell {
                Cell::Text(raw) => parse_text_date(raw),
                other => cell_date(other),
            },
        }
    }
}

impl fmt::Display for DateEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DateEncoding::NativeDate => "native date",
            DateEncoding::NumericOffset => "numeric day offset",
            DateEncoding::Duration => "duration",
            DateEncoding::Text => "text",
        };
        f.write_str(label)
    }
}

fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::DateTime(dt) => Some(dt.date()),
        _ => None,
    }
}

/// Normalizes a whole column with a single detected encoding.
pub fn normalize_date_column<'a, I>(cells: I) -> (DateEncoding, Vec<Option<NaiveDate>>)
where
    I: IntoIterator<Item = &'a Cell>,
    I::IntoIter: Clone,
{
    let iter = cells.into_iter();
    let encoding = DateEncoding::detect(iter.clone());
    let dates = iter.map(|cell| encoding.convert(cell)).collect();
    (encoding, dates)
}

pub fn spreadsheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("1899-12-30 is a valid date")
}

pub fn date_from_offset(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    let whole = TimeDelta::try_days(days.floor() as i64)?;
    spreadsheet_epoch().checked_add_signed(whole)
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%d %B %Y",
        "%d %b %Y",
    ];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Generic text-to-date parsing; `None` when no known layout matches.
pub fn parse_text_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_naive_date(trimmed)
        .or_else(|| parse_naive_datetime(trimmed).map(|dt| dt.date()))
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Accepts ISO 8601 durations (`P3DT4H`, `PT36H`) and day counts written as
/// `45000 days` or `45000 days 06:00:00`.
pub fn parse_duration_text(value: &str) -> Option<TimeDelta> {
    let trimmed = value.trim();
    if let Some(rest) = trimmed.strip_prefix('P') {
        return parse_iso_duration(rest);
    }
    let (count, rest) = trimmed.split_once(' ')?;
    let rest = rest.trim_start();
    let clock = rest
        .strip_prefix("days")
        .or_else(|| rest.strip_prefix("day"))?
        .trim();
    let days: i64 = count.parse().ok()?;
    let mut total = TimeDelta::try_days(days)?;
    if !clock.is_empty() {
        let time = NaiveTime::parse_from_str(clock, "%H:%M:%S").ok()?;
        total = total.checked_add(&(time - NaiveTime::MIN))?;
    }
    Some(total)
}

fn parse_iso_duration(body: &str) -> Option<TimeDelta> {
    const DATE_UNITS: &[(char, f64)] = &[('W', 604_800.0), ('D', 86_400.0)];
    const TIME_UNITS: &[(char, f64)] = &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)];

    let (date_part, time_part) = body.split_once('T').unwrap_or((body, ""));
    let mut seconds = 0.0;
    let mut matched = false;
    for (part, units) in [(date_part, DATE_UNITS), (time_part, TIME_UNITS)] {
        let mut number = String::new();
        for ch in part.chars() {
            if ch.is_ascii_digit() || ch == '.' {
                number.push(ch);
                continue;
            }
            let (_, scale) = units.iter().find(|(unit, _)| *unit == ch)?;
            let amount: f64 = number.parse().ok()?;
            seconds += amount * scale;
            number.clear();
            matched = true;
        }
        if !number.is_empty() {
            return None;
        }
    }
    if !matched {
        return None;
    }
    TimeDelta::try_milliseconds((seconds * 1_000.0).round() as i64)
}

fn parse_plain_number(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses money-like text: thousands separators, a leading currency symbol
/// and accounting parentheses are tolerated.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let mut text = value.trim();
    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim_start();
    }
    let text = text.trim_start_matches(['$', '€', '£']);
    let cleaned: String = text.chars().filter(|c| !matches!(c, ',' | '_')).collect();
    if cleaned.is_empty() {
        return None;
    }
    let parsed = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    Some(if negative { -parsed } else { parsed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn numeric_offsets_count_from_spreadsheet_epoch() {
        assert_eq!(date_from_offset(0.0), Some(ymd(1899, 12, 30)));
        assert_eq!(date_from_offset(1.0), Some(ymd(1899, 12, 31)));
        assert_eq!(date_from_offset(44197.0), Some(ymd(2021, 1, 1)));
        assert_eq!(date_from_offset(44197.75), Some(ymd(2021, 1, 1)));
        assert_eq!(date_from_offset(f64::NAN), None);
    }

    #[test]
    fn detect_prefers_the_single_shared_encoding() {
        let dates = [Cell::Date(ymd(2021, 1, 1)), Cell::Empty];
        assert_eq!(DateEncoding::detect(&dates), DateEncoding::NativeDate);

        let numbers = [Cell::Number(1.0), Cell::Number(2.0)];
        assert_eq!(DateEncoding::detect(&numbers), DateEncoding::NumericOffset);

        let durations = [Cell::Duration(TimeDelta::try_days(3).unwrap())];
        assert_eq!(DateEncoding::detect(&durations), DateEncoding::Duration);

        let mixed = [Cell::Number(1.0), Cell::Text("2021-01-01".into())];
        assert_eq!(DateEncoding::detect(&mixed), DateEncoding::Text);

        let blank = [Cell::Empty, Cell::Empty];
        assert_eq!(DateEncoding::detect(&blank), DateEncoding::Text);
    }

    #[test]
    fn duration_encoding_adds_to_epoch() {
        let cell = Cell::Duration(TimeDelta::try_days(2).unwrap());
        assert_eq!(
            DateEncoding::Duration.convert(&cell),
            Some(ymd(1900, 1, 1))
        );
    }

    #[test]
    fn text_encoding_parses_known_layouts_and_nulls_the_rest() {
        let convert = |raw: &str| DateEncoding::Text.convert(&Cell::Text(raw.into()));
        assert_eq!(convert("2021-06-01"), Some(ymd(2021, 6, 1)));
        assert_eq!(convert("11/8/2016"), Some(ymd(2016, 11, 8)));
        assert_eq!(convert("2021-06-01 13:45:00"), Some(ymd(2021, 6, 1)));
        assert_eq!(convert("2021-06-01T13:45:00+02:00"), Some(ymd(2021, 6, 1)));
        assert_eq!(convert("June 1, 2021"), Some(ymd(2021, 6, 1)));
        assert_eq!(convert("not a date"), None);
    }

    #[test]
    fn from_text_keeps_fields_verbatim() {
        assert_eq!(Cell::from_text(" 0042 "), Cell::Text("0042".into()));
        assert_eq!(Cell::from_text("3 days"), Cell::Text("3 days".into()));
        assert_eq!(Cell::from_text("  "), Cell::Empty);
        assert_ne!(
            Cell::from_text("1.0").dedup_key(),
            Cell::from_text("1").dedup_key()
        );
    }

    #[test]
    fn infer_classifies_numbers_durations_and_text() {
        let infer = |raw: &str| Cell::from_text(raw).infer();
        assert_eq!(infer(" 42 "), Cell::Number(42.0));
        assert_eq!(infer(""), Cell::Empty);
        assert_eq!(infer("PT36H"), Cell::Duration(TimeDelta::try_hours(36).unwrap()));
        assert_eq!(
            infer("3 days 12:00:00"),
            Cell::Duration(TimeDelta::try_hours(84).unwrap())
        );
        assert_eq!(infer("NaN"), Cell::Text("NaN".into()));
        assert_eq!(infer("2021-06-01"), Cell::Text("2021-06-01".into()));
        assert_eq!(Cell::Number(3.0).infer(), Cell::Number(3.0));
    }

    #[test]
    fn integer_text_reads_as_i64() {
        assert_eq!(Cell::from_text("0042").as_i64(), Some(42));
        assert_eq!(Cell::from_text("2.0").as_i64(), Some(2));
        assert_eq!(Cell::from_text("2.5").as_i64(), None);
    }

    #[test]
    fn parse_decimal_handles_money_text() {
        assert_eq!(parse_decimal("1,234.50"), Decimal::from_str("1234.5").ok());
        assert_eq!(parse_decimal("$12"), Some(Decimal::from(12)));
        assert_eq!(parse_decimal("(7.25)"), Decimal::from_str("-7.25").ok());
        assert_eq!(parse_decimal("-3"), Some(Decimal::from(-3)));
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn dedup_key_separates_types() {
        assert_ne!(
            Cell::Number(1.0).dedup_key(),
            Cell::Text("1".into()).dedup_key()
        );
        assert_eq!(Cell::Empty.dedup_key(), Cell::Empty.dedup_key());
    }
}
