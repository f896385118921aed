mod cleaner;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod reconciler;
mod reports;
mod settings;

use clap::Parser;
use env_logger::Env;

use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Load { path } => cli::load::run(&path),
        Commands::Merge {
            file,
            merged_out,
            delta_out,
            dry_run,
            strict,
        } => cli::merge::run(&file, merged_out, delta_out, dry_run, strict),
        Commands::Report { name, limit, csv } => cli::report::run(name, limit, csv),
        Commands::Export { output } => cli::export::run(output),
        Commands::History => cli::history::run(),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
