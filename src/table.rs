use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    render_aligned(headers, rows, &[])
}

/// Renders a plain-text grid. Columns without an entry in `aligns` are left
/// aligned; right-aligned columns suit numbers.
pub fn render_aligned(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let align_of = |idx: usize| aligns.get(idx).copied().unwrap_or(Align::Left);
    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &align_of));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &align_of));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &align_of));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], align_of: &dyn Fn(usize) -> Align) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            match align_of(idx) {
                Align::Left => format!("{sanitized}{}", " ".repeat(padding)),
                Align::Right => format!("{}{sanitized}", " ".repeat(padding)),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numeric_columns_align_right() {
        let headers = strings(&["product", "sales"]);
        let rows = vec![strings(&["Pen", "5.00"]), strings(&["Desk", "1200.00"])];
        let rendered = render_aligned(&headers, &rows, &[Align::Left, Align::Right]);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "product    sales",
                "-------  -------",
                "Pen         5.00",
                "Desk     1200.00",
            ]
        );
    }

    #[test]
    fn control_characters_become_spaces() {
        let headers = strings(&["note"]);
        let rows = vec![strings(&["line1\nline2\tvalue"])];
        let rendered = render_table(&headers, &rows);
        assert_eq!(rendered.lines().nth(2), Some("line1 line2 value"));
    }
}
