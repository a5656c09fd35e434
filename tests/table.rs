use sales_dashboard::table::{Align, render_aligned, render_table};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn render_table_pads_to_a_minimum_width() {
    let headers = strings(&["id", "name"]);
    let rows = vec![strings(&["1", "Alice"]), strings(&["2", "Bob"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines, vec!["id   name", "---  -----", "1    Alice", "2    Bob"]);
}

#[test]
fn render_table_measures_characters_not_bytes() {
    let headers = strings(&["résumé", "state"]);
    let rows = vec![strings(&["café", "Texas"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "résumé  state");
    assert_eq!(lines[2], "café    Texas");
}

#[test]
fn short_rows_render_only_their_cells() {
    let headers = strings(&["product", "sales", "profit"]);
    let rows = vec![strings(&["Lamp"])];

    let rendered = render_aligned(&headers, &rows, &[Align::Left, Align::Right, Align::Right]);

    assert_eq!(rendered.lines().nth(2), Some("Lamp"));
}
