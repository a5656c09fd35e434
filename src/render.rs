//! Terminal and JSON presentation of an evaluated dashboard.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    aggregate::{AggregateRow, Measure},
    clean::{CleanReport, OrderRecord},
    config::DashboardConfig,
    geo::MapLayer,
    pipeline::{Dashboard, DashboardOutcome, MapSection},
    table::{Align, render_aligned},
};

/// Greedy word wrap: a word moves to a new line when the current line, the
/// separating spaces and the word together would exceed `width`. Words
/// longer than `width` keep a line of their own.
pub fn wrap_label(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if !current.is_empty() && current_len + current.len() + word_len > width {
            lines.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(word);
        current_len += word_len;
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}

pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

pub fn render_bar_chart(
    title: &str,
    rows: &[AggregateRow],
    measure: Measure,
    config: &DashboardConfig,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
    if rows.is_empty() {
        let _ = writeln!(out, "(no data)");
        return out;
    }

    let labels = rows
        .iter()
        .map(|row| wrap_label(&row.key, config.label_width))
        .collect::<Vec<_>>();
    let label_width = labels
        .iter()
        .flatten()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let max = rows
        .iter()
        .map(|row| measure.of(row).abs())
        .max()
        .filter(|max| !max.is_zero())
        .unwrap_or(Decimal::ONE);

    for (row, lines) in rows.iter().zip(&labels) {
        let value = measure.of(row);
        let length = (value.abs() / max * Decimal::from(config.bar_width))
            .round()
            .to_usize()
            .unwrap_or(0);
        let fill = if value < Decimal::ZERO { "-" } else { "#" };
        let bar = fill.repeat(length);
        for (idx, line) in lines.iter().enumerate() {
            if idx == 0 {
                let _ = writeln!(
                    out,
                    "{line:<label_width$} | {bar} {}",
                    format_amount(value)
                );
            } else {
                let _ = writeln!(out, "{line:<label_width$} |");
            }
        }
    }
    out
}

pub fn render_product_summary(products: &[AggregateRow], limit: usize) -> String {
    let headers = vec![
        "product".to_string(),
        "total_sales".to_string(),
        "total_profit".to_string(),
    ];
    let rows = products
        .iter()
        .take(limit)
        .map(|row| {
            vec![
                row.key.clone(),
                format_amount(row.sum_sales),
                format_amount(row.sum_profit),
            ]
        })
        .collect::<Vec<_>>();
    let mut out = render_aligned(&headers, &rows, &[Align::Left, Align::Right, Align::Right]);
    if products.len() > limit {
        let _ = writeln!(out, "(showing {limit} of {} products)", products.len());
    }
    out
}

pub fn render_map(layer: &MapLayer) -> String {
    let headers = ["state", "latitude", "longitude", "sales", "radius_m", "color"]
        .map(String::from)
        .to_vec();
    let rows = layer
        .points
        .iter()
        .map(|point| {
            let [r, g, b, a] = point.color;
            vec![
                point.state.clone(),
                format!("{:.4}", point.latitude),
                format!("{:.4}", point.longitude),
                format_amount(point.sales),
                format!("{:.0}", point.radius),
                format!("#{r:02x}{g:02x}{b:02x}{a:02x}"),
            ]
        })
        .collect::<Vec<_>>();
    let mut out = render_aligned(
        &headers,
        &rows,
        &[
            Align::Left,
            Align::Right,
            Align::Right,
            Align::Right,
            Align::Right,
            Align::Left,
        ],
    );
    if !layer.omitted_states.is_empty() {
        let _ = writeln!(
            out,
            "Omitted (no coordinates): {}",
            layer.omitted_states.join(", ")
        );
    }
    out
}

pub fn render_orders(rows: &[OrderRecord], limit: usize) -> String {
    let headers = [
        "order_date",
        "order_id",
        "product",
        "region",
        "state",
        "sales",
        "profit",
        "discount",
        "quantity",
    ]
    .map(String::from)
    .to_vec();
    let body = rows
        .iter()
        .take(limit)
        .map(|record| {
            vec![
                record.order_date.format("%Y-%m-%d").to_string(),
                record.order_id.clone().unwrap_or_default(),
                record.product_name.clone(),
                record.region.clone().unwrap_or_default(),
                record.state.clone().unwrap_or_default(),
                format_amount(record.sales),
                format_amount(record.profit),
                record
                    .discount
                    .map(|d| d.normalize().to_string())
                    .unwrap_or_default(),
                record.quantity.map(|q| q.to_string()).unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    let mut aligns = vec![Align::Left; 5];
    aligns.extend([Align::Right; 4]);
    let mut out = render_aligned(&headers, &body, &aligns);
    if rows.len() > limit {
        let _ = writeln!(out, "(showing {limit} of {} orders)", rows.len());
    }
    out
}

pub fn render_text(outcome: &DashboardOutcome, config: &DashboardConfig) -> String {
    match outcome {
        DashboardOutcome::Ready(dashboard) => render_dashboard(dashboard, config),
        DashboardOutcome::Empty {
            criteria,
            range,
            notices,
        } => {
            let mut out = String::new();
            for notice in notices {
                let _ = writeln!(out, "notice: {notice}");
            }
            let _ = writeln!(
                out,
                "warning: no orders match {range} (region: {}, state: {})",
                criteria.region, criteria.state
            );
            out
        }
    }
}

fn render_dashboard(dashboard: &Dashboard, config: &DashboardConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Sales dashboard: {} (region: {}, state: {})",
        dashboard.range, dashboard.criteria.region, dashboard.criteria.state
    );
    for notice in &dashboard.notices {
        let _ = writeln!(out, "notice: {notice}");
    }
    let _ = writeln!(out, "{} order(s) matched\n", dashboard.row_count);

    let top = config.top_n;
    for (measure, rows) in [
        (Measure::Sales, &dashboard.top_sales),
        (Measure::Profit, &dashboard.top_profit),
    ] {
        out.push_str(&render_bar_chart(
            &format!("Top {top} Products by {}", measure.label()),
            rows,
            measure,
            config,
        ));
        out.push('\n');
    }

    let _ = writeln!(out, "Sales vs Profit by Product");
    out.push_str(&render_product_summary(&dashboard.products, config.table_rows));

    match &dashboard.map {
        MapSection::Ready(layer) => {
            let _ = writeln!(out, "\nTotal Sales by State");
            out.push_str(&render_map(layer));
        }
        MapSection::Skipped { reason } => {
            let _ = writeln!(out, "\ninfo: map unavailable: {reason}");
        }
        MapSection::Disabled => {}
    }

    if let Some(rows) = &dashboard.rows {
        let _ = writeln!(out, "\nFiltered Orders");
        out.push_str(&render_orders(rows, config.table_rows));
    }
    out
}

/// One-line summary of what cleaning changed.
pub fn render_clean_report(report: &CleanReport) -> String {
    format!(
        "Data cleaning: {} row(s) read, {} duplicate(s) removed, {} discount(s) rescaled, \
         {} ship date(s) backfilled, {} undated row(s) dropped; order dates stored as {}",
        report.total_rows,
        report.duplicates_removed,
        report.discounts_rescaled,
        report.ship_dates_backfilled,
        report.undated_rows_dropped,
        report.order_date_encoding
    )
}

/// The outcome as pretty JSON with the cleaning summary under `cleaning`.
pub fn render_json(outcome: &DashboardOutcome, cleaning: &CleanReport) -> Result<String> {
    let mut value = serde_json::to_value(outcome).context("Serializing dashboard to JSON")?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "cleaning".to_string(),
            serde_json::to_value(cleaning).context("Serializing cleaning summary")?,
        );
    }
    serde_json::to_string_pretty(&value).context("Serializing dashboard to JSON")
}
