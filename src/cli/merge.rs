use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::{DonorError, Result};
use crate::importer::{merge_file, write_table_file, MergeOptions};
use crate::models::{DonorRecord, CANONICAL_COLUMNS};

const DELTA_PREVIEW_ROWS: usize = 20;

pub fn run(
    file: &str,
    merged_out: Option<String>,
    delta_out: Option<String>,
    dry_run: bool,
    strict: bool,
) -> Result<()> {
    if !Path::new(file).is_file() {
        return Err(DonorError::Other(format!("File not found: {file}")));
    }
    let conn = open_db()?;
    let outcome = merge_file(&conn, Path::new(file), MergeOptions { strict, dry_run })?;

    if outcome.previously_merged {
        println!(
            "{}",
            format!("{file} was merged before; its values replace newer ones.").yellow()
        );
    }

    let p = &outcome.partition;
    println!(
        "Merging {} shared rows, {} rows unique to old dataset, and {} rows unique to new dataset.",
        p.shared, p.base_only, p.incoming_only
    );
    if outcome.duplicates.total() > 0 {
        println!(
            "{}",
            format!(
                "Dropped {} repeated Account ID row(s) ({} old, {} new); first occurrence kept.",
                outcome.duplicates.total(),
                outcome.duplicates.base,
                outcome.duplicates.incoming
            )
            .yellow()
        );
    }

    if !outcome.delta.is_empty() {
        println!("New donors\n{}", preview_table(&outcome.delta));
        if outcome.delta.len() > DELTA_PREVIEW_ROWS {
            println!("... and {} more", outcome.delta.len() - DELTA_PREVIEW_ROWS);
        }
    }

    if let Some(path) = merged_out {
        write_table_file(Path::new(&path), &outcome.merged)?;
        println!("Merged table written to {path}");
    }
    if let Some(path) = delta_out {
        write_table_file(Path::new(&path), &outcome.delta)?;
        println!("Delta written to {path}");
    }

    if outcome.committed {
        println!(
            "{}",
            format!("Saved {} donors.", p.total()).green().bold()
        );
    } else {
        println!("{}", format!("Dry run: {} donors, nothing saved.", p.total()).yellow());
    }
    Ok(())
}

fn preview_table(rows: &[DonorRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(CANONICAL_COLUMNS.iter().map(|c| c.header()).collect::<Vec<_>>());
    for rec in rows.iter().take(DELTA_PREVIEW_ROWS) {
        table.add_row(
            CANONICAL_COLUMNS
                .iter()
                .map(|c| Cell::new(rec.get(*c).unwrap_or("")))
                .collect::<Vec<_>>(),
        );
    }
    table
}
