use serde_json::Value;

use terminal_size::{terminal_size, Height, Width};

/// Render a JSON array of records as an ASCII table sized to the terminal.
/// Returns `None` when `val` is not a non-empty array.
pub fn render_table(val: &Value) -> Option<String> {
    render_table_width(val, terminal_width())
}

/// Print `val` as a table when it has tabular shape, otherwise as pretty JSON.
pub fn print_value(val: &Value) {
    if std::env::var("TEXTDASH_OUTPUT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false) {
        println!("{}", serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string()));
        return;
    }
    match render_table(val) {
        Some(t) => print!("{}", t),
        None => println!("{}", serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string())),
    }
}

pub fn render_table_width(val: &Value, termw: usize) -> Option<String> {
    let (cols, rows) = table_shape(val)?;
    crate::tprintln!("[cli.outputformatter] rendering {} rows at width {}", rows.len(), termw);

    let mut widths: Vec<usize> = cols.iter().map(|c| visible_len(c).min(termw)).collect();
    for r in &rows {
        for (i, cell) in r.iter().enumerate() {
            widths[i] = widths[i].max(visible_len(cell).min(termw));
        }
    }

    let sep = build_separator(&widths);
    let mut out = String::new();
    let mut line = |s: &str| {
        out.push_str(&fit_line_to_width(s, termw));
        out.push('\n');
    };
    line(&sep);
    line(&build_header(&cols, &widths));
    line(&sep);
    for r in &rows {
        line(&build_row(r, &widths));
    }
    line(&sep);
    line(&format!("rows: {}", rows.len()));
    Some(out)
}

// Objects contribute the union of their keys in first-seen order; anything else
// becomes a single "value" column.
fn table_shape(val: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let arr = val.as_array().filter(|a| !a.is_empty())?;
    if arr.iter().all(Value::is_object) {
        let mut cols: Vec<String> = Vec::new();
        for el in arr.iter().filter_map(Value::as_object) {
            for k in el.keys() {
                if !cols.contains(k) { cols.push(k.clone()); }
            }
        }
        let rows = arr
            .iter()
            .filter_map(Value::as_object)
            .map(|m| cols.iter().map(|c| m.get(c).map(to_cell_string).unwrap_or_default()).collect())
            .collect();
        return Some((cols, rows));
    }
    let rows = arr.iter().map(|v| vec![to_cell_string(v)]).collect();
    Some((vec!["value".to_string()], rows))
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(m) => {
            // populated author references show their email
            match m.get("email").and_then(Value::as_str) {
                Some(e) => e.to_string(),
                None => v.to_string(),
            }
        }
        other => other.to_string(),
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        if is_numeric_like(cell) {
            s.push_str(&format!(" {}{} |", pad, text));
        } else {
            s.push_str(&format!(" {}{} |", text, pad));
        }
    }
    s
}

// Column names in green; padding follows the visible width.
fn build_header(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (cell, w) in cells.iter().zip(widths) {
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        s.push_str(&format!(" \x1b[32m{}\x1b[0m{} |", text, pad));
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().any(|c| c.is_ascii_digit()) && st.chars().all(|c| c.is_ascii_digit() || ".-+".contains(c))
}

fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) => (w as usize).saturating_sub(4).max(20),
        None => 80,
    }
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw { return s.to_string(); }
    // cut on visible characters, keeping escape sequences intact
    let mut out = String::new();
    let mut seen = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            out.push(ch);
            for c in chars.by_ref() {
                out.push(c);
                if c.is_ascii_alphabetic() { break; }
            }
            continue;
        }
        if seen + 1 >= maxw { break; }
        out.push(ch);
        seen += 1;
    }
    out.push('…');
    out.push_str("\x1b[0m");
    out
}

/// Visible characters, skipping ANSI CSI sequences.
fn visible_len(s: &str) -> usize {
    let mut count = 0;
    let mut in_escape = false;
    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() { in_escape = false; }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            count += 1;
        }
    }
    count
}
