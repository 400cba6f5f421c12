//! Plain-text rendering helpers shared by the read-side commands.

use anyhow::Result;
use atlas_types::ColumnType;

/// Pretty-print any serializable value for `--json` mode.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Short, stable label for a column type.
pub fn type_label(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Text => "text".to_string(),
        ColumnType::Integer => "integer".to_string(),
        ColumnType::Decimal => "decimal".to_string(),
        ColumnType::Boolean => "boolean".to_string(),
        ColumnType::Date => "date".to_string(),
        ColumnType::Geometry { srid } => format!("geometry({})", srid),
    }
}

/// Render rows as a left-aligned text table with a header rule.
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    render_row(&mut out, columns.iter().map(String::as_str), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    render_row(&mut out, rule.iter().map(String::as_str), &widths);
    for row in rows {
        render_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn render_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let rendered: Vec<String> = cells
        .enumerate()
        .map(|(idx, cell)| {
            let width = widths.get(idx).copied().unwrap_or(cell.len());
            format!("{:<width$}", cell, width = width)
        })
        .collect();
    out.push_str(rendered.join("  ").trim_end());
    out.push('\n');
}
