//! Plain-text rendering of tables for terminals.

use crate::table::{DataType, Table, TableError, Value};
use std::fmt::Write;

const BAR: char = '█';

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    if right {
        format!("{fill}{text}")
    } else {
        format!("{text}{fill}")
    }
}

/// Draws `table` as aligned columns, showing at most `max_rows` rows.
///
/// Numeric columns are right-aligned and nulls are blank. A footer gives
/// the row count, and says how many rows were left out.
#[must_use]
pub fn table(table: &Table, max_rows: usize) -> String {
    let columns = table.schema().columns();
    let shown: Vec<Vec<String>> = table
        .rows()
        .take(max_rows)
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            shown
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let right: Vec<bool> = columns.iter().map(|c| c.data_type.is_numeric()).collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, &width)| pad(&column.name, width, false))
        .collect();
    let _ = writeln!(out, "{}", header.join(" | ").trim_end());
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));

    for row in &shown {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, text)| pad(text, widths[i], right[i]))
            .collect();
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }

    let total = table.num_rows();
    if shown.len() < total {
        let _ = writeln!(out, "({} of {total} rows)", shown.len());
    } else {
        let _ = writeln!(out, "({total} rows)");
    }
    out
}

/// Draws a horizontal bar per row: `label | ████ value`.
///
/// Bars are scaled so the largest value spans `width` characters. Rows
/// with a null value are skipped; negative values get an empty bar.
///
/// # Errors
///
/// Returns an error if either column is missing or `value_col` is not
/// numeric.
pub fn bar_chart(table: &Table, label_col: &str, value_col: &str, width: usize) -> Result<String, TableError> {
    let label_idx = table.schema().require(label_col)?;
    let value_idx = table.schema().require(value_col)?;
    let value_type = table.schema().columns()[value_idx].data_type;
    if !value_type.is_numeric() {
        return Err(TableError::TypeMismatch {
            column: value_col.to_string(),
            expected: DataType::Float,
            found: value_type.to_string(),
        });
    }

    let points: Vec<(String, f64, String)> = table
        .rows()
        .filter_map(|row| {
            let value = &row[value_idx];
            value.as_f64().map(|v| (cell(&row[label_idx]), v, value.to_string()))
        })
        .collect();

    let label_width = points.iter().map(|(l, _, _)| l.chars().count()).max().unwrap_or(0);
    let max = points.iter().map(|&(_, v, _)| v).fold(0.0_f64, f64::max);

    let mut out = String::new();
    for (label, value, text) in &points {
        let len = if max > 0.0 && *value > 0.0 {
            // bounded by `width`
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let len = ((value / max) * width as f64).round() as usize;
            len.max(1)
        } else {
            0
        };
        let bar: String = std::iter::repeat(BAR).take(len).collect();
        let _ = writeln!(out, "{} | {bar} {text}", pad(label, label_width, false));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn trips() -> Table {
        Table::from_columns(vec![
            ("zone", vec![Value::from("Queens"), Value::from("Bronx"), Value::from("SI")]),
            ("trips", vec![Value::Int(10), Value::Int(5), Value::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_layout() {
        let out = table(&trips(), 10);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "zone   | trips",
                "-------+------",
                "Queens |    10",
                "Bronx  |     5",
                "SI     |",
                "(3 rows)",
            ]
        );
    }

    #[test]
    fn test_table_truncated() {
        let out = table(&trips(), 1);
        assert_eq!(out.lines().count(), 4);
        assert!(out.ends_with("(1 of 3 rows)\n"));
    }

    #[test]
    fn test_bar_chart() {
        let out = bar_chart(&trips(), "zone", "trips", 10).unwrap();
        assert_eq!(out, "Queens | ██████████ 10\nBronx  | █████ 5\n");
    }

    #[test]
    fn test_bar_chart_needs_numbers() {
        assert!(matches!(
            bar_chart(&trips(), "trips", "zone", 10),
            Err(TableError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bar_chart(&trips(), "zone", "fares", 10),
            Err(TableError::ColumnNotFound(_))
        ));
    }
}
