use crate::db::{donor_count, get_connection, merge_history};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, DB_FILE};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let donors = donor_count(&conn)?;
        let history = merge_history(&conn)?;

        println!();
        println!("Donors:        {donors}");
        println!("Merges:        {}", history.len());
        if let Some(last) = history.last() {
            println!(
                "Last merge:    {} ({})",
                last.filename,
                last.merged_at.as_deref().unwrap_or("unknown time")
            );
        }
    } else {
        println!();
        println!("Database not found. Run `donorbook init` to set up.");
    }

    Ok(())
}
