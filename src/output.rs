// hepctl - CLI for the HEPIC SIP capture and analysis platform
// Copyright (C) 2025 hepctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Schema-agnostic rendering of decoded API payloads.
//!
//! Commands never know ahead of time whether an endpoint returns one record,
//! a list of records, or an opaque nested value, so the payload shape is
//! classified at render time and dispatched per variant.

use anyhow::Result;
use serde_json::{Map, Value};
use std::io::Write;

/// Cells and column widths are capped at this many characters so endpoints
/// that embed long free-text fields stay readable in a terminal.
const MAX_CELL_WIDTH: usize = 60;

/// Payload shape, determined once per render.
enum Shape<'a> {
    /// A bare scalar (null, bool, number, string).
    Scalar,
    /// A single key/value record.
    Record(&'a Map<String, Value>),
    /// An ordered list of records. May be empty.
    RecordList(Vec<&'a Map<String, Value>>),
    /// Anything that does not decompose into records.
    Opaque,
}

fn classify(value: &Value) -> Shape<'_> {
    match value {
        Value::Object(map) => Shape::Record(map),
        Value::Array(items) => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => records.push(map),
                    _ => return Shape::Opaque,
                }
            }
            Shape::RecordList(records)
        }
        _ => Shape::Scalar,
    }
}

/// Writes `value` to `w` in the named format. `json` and `yaml` serialize the
/// value as-is; `table` renders record-shaped data as aligned columns and
/// falls back to JSON otherwise. Unknown format names render as JSON so
/// command output is never silently empty.
pub fn render(w: &mut dyn Write, format: &str, value: &Value) -> Result<()> {
    match format {
        "table" => render_table_format(w, value),
        "yaml" => {
            serde_yaml::to_writer(&mut *w, value)?;
            Ok(())
        }
        _ => render_json(w, value),
    }
}

/// Renders `value` to stdout in the given format.
pub fn print(format: &str, value: &Value) -> Result<()> {
    render(&mut std::io::stdout().lock(), format, value)
}

/// Writes a single-line structured error to stderr.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{}", error_line(err));
}

fn error_line(err: &anyhow::Error) -> String {
    let obj = serde_json::json!({ "error": format!("{err:#}") });
    obj.to_string()
}

fn render_json(w: &mut dyn Write, value: &Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

fn render_table_format(w: &mut dyn Write, value: &Value) -> Result<()> {
    match classify(value) {
        Shape::RecordList(records) => render_table(w, &records),
        Shape::Record(record) => render_key_value(w, record),
        Shape::Scalar | Shape::Opaque => render_json(w, value),
    }
}

fn render_table(w: &mut dyn Write, records: &[&Map<String, Value>]) -> Result<()> {
    // An empty list renders as nothing at all, not as an error.
    let Some(first) = records.first() else {
        return Ok(());
    };

    // The first record alone defines the columns; keys that only appear in
    // later records are not shown, and missing keys render as empty cells.
    let columns = ordered_keys(first);
    if columns.is_empty() {
        return Ok(());
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for record in records {
        for (i, col) in columns.iter().enumerate() {
            widths[i] = widths[i].max(cell_text(record.get(col.as_str())).chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).min(MAX_CELL_WIDTH);
    }

    for (i, col) in columns.iter().enumerate() {
        write!(w, "{:<width$}", col, width = widths[i] + 2)?;
    }
    writeln!(w)?;

    for width in &widths {
        write!(w, "{}  ", "-".repeat(*width))?;
    }
    writeln!(w)?;

    for record in records {
        for (i, col) in columns.iter().enumerate() {
            let cell = truncate(cell_text(record.get(col.as_str())));
            write!(w, "{:<width$}", cell, width = widths[i] + 2)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn render_key_value(w: &mut dyn Write, record: &Map<String, Value>) -> Result<()> {
    let keys = ordered_keys(record);
    let key_width = keys.iter().map(|k| k.chars().count()).max().unwrap_or(0);
    for key in keys {
        writeln!(
            w,
            "{:<key_width$}  {}",
            key,
            truncate(cell_text(record.get(key.as_str())))
        )?;
    }
    Ok(())
}

/// Keys of a record in stable lexicographic order.
fn ordered_keys(record: &Map<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = record.keys().collect();
    keys.sort();
    keys
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        return text;
    }
    let mut shortened: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
    shortened.push_str("...");
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn render_string(format: &str, value: &Value) -> String {
        let mut buf = Vec::new();
        render(&mut buf, format, value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn json_round_trips_exactly() {
        let value = json!({
            "name": "test",
            "count": 42,
            "nested": {"deep": [1, 2, {"x": null}]},
            "flags": [true, false]
        });
        let out = render_string("json", &value);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, value);
        assert!(out.contains('\n'), "expected pretty-printed JSON");
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        let value = json!({"key": "val"});
        assert_eq!(render_string("xml", &value), render_string("json", &value));
        assert_eq!(render_string("", &value), render_string("json", &value));
    }

    #[test]
    fn yaml_renders_mapping_syntax() {
        let value = json!({"name": "test", "count": 42});
        let out = render_string("yaml", &value);
        assert!(out.contains("name: test"), "got:\n{out}");
        assert!(out.contains("count: 42"), "got:\n{out}");
    }

    #[test]
    fn table_has_header_separator_and_one_line_per_record() {
        let value = json!([
            {"name": "alpha", "status": "ok", "count": 1},
            {"name": "beta", "status": "error", "count": 99},
            {"name": "gamma", "status": "ok", "count": 3}
        ]);
        let out = render_string("table", &value);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5, "header + separator + 3 rows, got:\n{out}");
        assert!(lines[1].contains("---"));
        assert!(lines[2].contains("alpha"));
        assert!(lines[4].contains("gamma"));
    }

    #[test]
    fn table_scenario_pads_columns_to_widest_content() {
        let value = json!([{"id": 1, "name": "a"}, {"id": 2, "name": "bb"}]);
        let out = render_string("table", &value);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0].trim_end(), "id  name");
        assert_eq!(lines[1].trim_end(), "--  ----");
        assert_eq!(lines[2].trim_end(), "1   a");
        assert_eq!(lines[3].trim_end(), "2   bb");
    }

    #[test]
    fn table_columns_come_from_first_record_sorted() {
        let value = json!([
            {"zeta": 1, "alpha": 2},
            {"alpha": 3, "extra": "ignored"}
        ]);
        let out = render_string("table", &value);
        let header = out.lines().next().unwrap();
        assert!(header.trim_end().starts_with("alpha"));
        assert!(header.contains("zeta"));
        assert!(!header.contains("extra"));
    }

    #[test]
    fn table_missing_keys_render_as_empty_cells() {
        let value = json!([
            {"a": "x", "b": "y"},
            {"a": "z"}
        ]);
        let out = render_string("table", &value);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3].trim_end(), "z");
    }

    #[test]
    fn table_truncates_long_cells_to_sixty_chars() {
        let long = "x".repeat(100);
        let value = json!([{"id": 1, "note": long}]);
        let out = render_string("table", &value);
        let expected = format!("{}...", "x".repeat(57));
        assert!(out.contains(&expected), "got:\n{out}");
        assert!(!out.contains(&"x".repeat(58)));
    }

    #[test]
    fn table_null_and_bool_and_number_cells() {
        let value = json!([{"a": null, "b": true, "c": 7}]);
        let out = render_string("table", &value);
        let row = out.lines().nth(2).unwrap();
        assert_eq!(row.trim_end().split_whitespace().collect::<Vec<_>>(), ["true", "7"]);
    }

    #[test]
    fn empty_list_renders_nothing() {
        let out = render_string("table", &json!([]));
        assert!(out.is_empty(), "got:\n{out}");
    }

    #[test]
    fn single_record_renders_key_value_lines() {
        let value = json!({"name": "test", "status": "active", "count": 42});
        let out = render_string("table", &value);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("count"));
        assert!(lines[1].starts_with("name"));
        assert!(lines[2].starts_with("status"));
        assert!(lines[1].contains("test"));
    }

    #[test]
    fn single_record_pads_keys_to_widest() {
        let value = json!({"id": "1", "longer_key": "v"});
        let out = render_string("table", &value);
        let first = out.lines().next().unwrap();
        // "id" padded to the width of "longer_key" plus the two-space gap.
        assert!(first.starts_with("id          1"), "got:\n{out}");
    }

    #[test]
    fn scalar_and_nested_payloads_fall_back_to_json() {
        let scalar = json!(42);
        assert_eq!(render_string("table", &scalar), render_string("json", &scalar));

        let mixed = json!(["a", {"b": 1}]);
        assert_eq!(render_string("table", &mixed), render_string("json", &mixed));
    }

    #[test]
    fn error_line_is_single_line_json() {
        let line = error_line(&anyhow!("boom"));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["error"], "boom");
        assert!(!line.contains('\n'));
    }
}
