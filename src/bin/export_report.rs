//! export_report - dump the inspection report table to CSV.

use std::fs::File;
use std::io;

use anyhow::{Context, Result};
use clap::Parser;

use beltwatch::report::{write_rows_csv, ReportStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the beltwatch report database.
    #[arg(long, default_value = "beltwatch.db", env = "BELTWATCH_DB_PATH")]
    db_path: String,
    /// Output CSV path ("-" writes to stdout).
    #[arg(long, default_value = "-")]
    output: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let store = ReportStore::open(&args.db_path)?;
    let rows = store.rows()?;

    if args.output == "-" {
        write_rows_csv(&rows, io::stdout().lock())?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output))?;
        write_rows_csv(&rows, file)?;
        eprintln!("wrote {} rows to {}", rows.len(), args.output);
    }
    Ok(())
}
