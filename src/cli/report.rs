use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cleaner::clean;
use crate::cli::open_db;
use crate::db::load_donors;
use crate::error::Result;
use crate::reports::{build_report, get_by_key, ReportTable, ALL_REPORTS};
use crate::settings::load_settings;

pub fn run(name: Option<String>, limit: Option<usize>, csv: bool) -> Result<()> {
    let Some(name) = name else {
        list();
        return Ok(());
    };
    let kind = get_by_key(&name)?;

    let conn = open_db()?;
    let donors = clean(&load_donors(&conn)?)?;
    let limit = limit.unwrap_or_else(|| load_settings().top_n);
    let report = build_report(kind, &donors, limit);

    if csv {
        print_csv(&report)
    } else {
        print_table(&report);
        Ok(())
    }
}

fn list() {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Report"]);
    for kind in ALL_REPORTS {
        table.add_row(vec![Cell::new(kind.key()), Cell::new(kind.name())]);
    }
    println!("Available reports\n{table}");
}

fn print_table(report: &ReportTable) {
    let mut table = Table::new();
    table.set_header(report.headers.clone());
    for row in &report.rows {
        table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }
    println!("{}\n{table}", report.title.bold());
}

fn print_csv(report: &ReportTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout().lock());
    wtr.write_record(&report.headers)?;
    for row in &report.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
