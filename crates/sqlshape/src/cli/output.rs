//! Output formatting for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use sqlshape_db::{FieldSource, ResultSet};

/// Build a table with cyan headers
pub fn build_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    table
}

/// Rows of `#`, name, type, nullable for a result set
pub fn field_rows(fields: &ResultSet) -> Vec<Vec<String>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| {
            vec![
                (i + 1).to_string(),
                f.name.clone(),
                f.db_type.to_string(),
                if f.is_nullable { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect()
}

/// Print a result set as a table
pub fn print_fields(fields: &ResultSet) {
    println!(
        "{}",
        build_table(&["#", "NAME", "TYPE", "NULLABLE"], field_rows(fields))
    );
}

/// One-line explanation of where fields came from
pub fn source_note(source: FieldSource) -> &'static str {
    match source {
        FieldSource::Live => "source: live database",
        FieldSource::Cache => "source: cache (live introspection failed; may be stale)",
        FieldSource::Unavailable => "source: none (introspection failed and nothing was cached)",
    }
}

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
