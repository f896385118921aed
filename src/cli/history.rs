use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::merge_history;
use crate::error::Result;

pub fn run() -> Result<()> {
    let conn = open_db()?;
    let history = merge_history(&conn)?;

    if history.is_empty() {
        println!("No merges yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Merged At", "File", "Shared", "Old Only", "New Only", "Merged", "Delta",
    ]);
    for entry in history {
        table.add_row(vec![
            Cell::new(entry.merged_at.unwrap_or_default()),
            Cell::new(entry.filename),
            Cell::new(entry.shared_rows),
            Cell::new(entry.base_only_rows),
            Cell::new(entry.incoming_only_rows),
            Cell::new(entry.merged_rows),
            Cell::new(entry.delta_rows),
        ]);
    }
    println!("Merge History\n{table}");
    Ok(())
}
