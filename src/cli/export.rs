use std::path::PathBuf;

use crate::cli::open_db;
use crate::db::load_donors;
use crate::error::Result;
use crate::importer::write_table_file;
use crate::settings::get_data_dir;

pub fn run(output: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let donors = load_donors(&conn)?;

    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            get_data_dir().join("exports").join(format!("donors-{stamp}.csv"))
        }
    };

    write_table_file(&dest_path, &donors)?;
    println!("Exported {} donors to {}", donors.len(), dest_path.display());
    Ok(())
}
