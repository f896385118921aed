pub mod backup;
pub mod export;
pub mod history;
pub mod init;
pub mod load;
pub mod merge;
pub mod report;
pub mod status;

use clap::{Parser, Subcommand};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;

pub(crate) fn open_db() -> Result<rusqlite::Connection> {
    get_connection(&db_path()?)
}

#[derive(Parser)]
#[command(name = "donorbook", about = "Merge donor roster snapshots and report on giving.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the donor database.
    Init {
        /// Path for donorbook data (default: ~/Documents/donorbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Switch to an existing donorbook data directory.
    Load {
        /// Path to data directory containing donors.db
        path: String,
    },
    /// Merge a roster CSV into the canonical donor table.
    Merge {
        /// Path to the roster CSV
        file: String,
        /// Also write the merged table to this CSV
        #[arg(long = "merged-out")]
        merged_out: Option<String>,
        /// Also write the new-donor rows to this CSV
        #[arg(long = "delta-out")]
        delta_out: Option<String>,
        /// Reconcile and validate without saving
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Fail if either table repeats an Account ID
        #[arg(long)]
        strict: bool,
    },
    /// Show a named report. Lists the reports when no name is given.
    Report {
        /// Report key, e.g. basic, top, states, months
        name: Option<String>,
        /// Row limit for ranked reports (default from settings)
        #[arg(long)]
        limit: Option<usize>,
        /// Print CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
    /// Write the canonical donor table to CSV.
    Export {
        /// Output path (default: <data_dir>/exports/donors-YYYYMMDD-HHMMSS.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// List committed merges.
    History,
    /// Show current database and summary counts.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/donors-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}
