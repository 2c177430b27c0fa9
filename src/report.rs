//! Inspection report persistence and CSV export.
//!
//! The report is a flat (timestamp, status, details) table in SQLite.
//! The CSV shape is a stable external contract: three columns under the
//! fixed header `Timestamp,Status,Details`, timestamps in RFC 3339,
//! status drawn from the `Damaged`/`Intact` vocabulary.

use std::io::{Read, Write};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Writer};
use rusqlite::{params, Connection};

use crate::detect::ItemClass;
use crate::ClassificationEvent;

pub const CSV_HEADER: [&str; 3] = ["Timestamp", "Status", "Details"];

/// One committed classification as persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub timestamp: DateTime<Utc>,
    pub status: ItemClass,
    pub details: String,
}

impl From<ClassificationEvent> for ReportRow {
    fn from(event: ClassificationEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            status: event.class,
            details: event.detail,
        }
    }
}

/// SQLite-backed report store.
pub struct ReportStore {
    conn: Connection,
}

impl ReportStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open report database {}", db_path))?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS report_rows (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              timestamp TEXT NOT NULL,
              status TEXT NOT NULL,
              details TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_report_timestamp ON report_rows(timestamp);
            "#,
        )?;
        Ok(())
    }

    pub fn append(&mut self, row: &ReportRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO report_rows (timestamp, status, details) VALUES (?1, ?2, ?3)",
            params![row.timestamp.to_rfc3339(), row.status.as_str(), row.details],
        )?;
        Ok(())
    }

    /// All rows in insertion order.
    pub fn rows(&self) -> Result<Vec<ReportRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT timestamp, status, details FROM report_rows ORDER BY id")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let timestamp: String = row.get(0)?;
            let status: String = row.get(1)?;
            let details: String = row.get(2)?;
            out.push(ReportRow {
                timestamp: parse_timestamp(&timestamp)?,
                status: ItemClass::from_str(&status)?,
                details,
            });
        }
        Ok(out)
    }

    pub fn export_csv<W: Write>(&self, out: W) -> Result<usize> {
        let rows = self.rows()?;
        write_rows_csv(&rows, out)?;
        Ok(rows.len())
    }
}

/// Write rows as CSV with the fixed three-column header.
pub fn write_rows_csv<W: Write>(rows: &[ReportRow], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.timestamp.to_rfc3339().as_str(),
            row.status.as_str(),
            row.details.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse rows back from CSV, verifying the header.
pub fn read_rows_csv<R: Read>(input: R) -> Result<Vec<ReportRow>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
    let header = reader.headers().context("report CSV has no header")?;
    if header.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(anyhow!(
            "unexpected report CSV header {:?}, want {:?}",
            header,
            CSV_HEADER
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed report CSV record")?;
        if record.len() != 3 {
            return Err(anyhow!(
                "report CSV rows must have 3 fields, found {}",
                record.len()
            ));
        }
        rows.push(ReportRow {
            timestamp: parse_timestamp(&record[0])?,
            status: ItemClass::from_str(&record[1])?,
            details: record[2].to_string(),
        });
    }
    Ok(rows)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid report timestamp '{}'", raw))?;
    Ok(parsed.with_timezone(&Utc))
}
