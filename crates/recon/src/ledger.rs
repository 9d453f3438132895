//! Ledger spreadsheet as CSV: read a snapshot, append accepted records.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::catalog::LedgerSink;
use crate::config::LedgerColumns;
use crate::error::ReconError;
use crate::model::LedgerEntry;

/// Column name for each [`LedgerEntry`] field, in output order.
fn layout(columns: &LedgerColumns) -> [&str; 8] {
    [
        columns.catalog_number.as_str(),
        columns.title.as_str(),
        columns.author.as_str(),
        columns.publisher.as_str(),
        columns.publication_year.as_str(),
        columns.oclc_number.as_str(),
        columns.lccn.as_str(),
        columns.isbn.as_str(),
    ]
}

/// Header row for a fresh ledger file.
pub fn ledger_headers(columns: &LedgerColumns) -> Vec<String> {
    layout(columns).iter().map(|s| s.to_string()).collect()
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name.trim())))
}

/// Value for `header` out of `entry`, or "" if the header is not one of ours.
fn cell<'e>(entry: &'e LedgerEntry, columns: &LedgerColumns, header: &str) -> &'e str {
    let matches = |name: &str| header == name || header.trim().eq_ignore_ascii_case(name.trim());
    let opt = |v: &'e Option<String>| v.as_deref().unwrap_or("");
    if matches(&columns.catalog_number) {
        entry.catalog_number.as_str()
    } else if matches(&columns.title) {
        opt(&entry.title)
    } else if matches(&columns.author) {
        opt(&entry.author)
    } else if matches(&columns.publisher) {
        opt(&entry.publisher)
    } else if matches(&columns.publication_year) {
        opt(&entry.publication_year)
    } else if matches(&columns.isbn) {
        opt(&entry.isbn)
    } else if matches(&columns.oclc_number) {
        opt(&entry.oclc_number)
    } else if matches(&columns.lccn) {
        opt(&entry.lccn)
    } else {
        ""
    }
}

/// Render `entry` as a row under `headers` (an existing file's header row
/// or [`ledger_headers`]).
pub fn ledger_row(entry: &LedgerEntry, columns: &LedgerColumns, headers: &[String]) -> Vec<String> {
    headers.iter().map(|h| cell(entry, columns, h).to_string()).collect()
}

/// Parse a ledger snapshot. Catalog number and title columns are required;
/// the others are read when present. Blank rows are skipped.
pub fn load_ledger_csv(csv_data: &str, columns: &LedgerColumns) -> Result<Vec<LedgerEntry>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        find_column(&headers, name).ok_or_else(|| ReconError::MissingColumn { column: name.into() })
    };
    let optional = |name: &str| find_column(&headers, name);

    let catalog_idx = idx(&columns.catalog_number)?;
    let title_idx = idx(&columns.title)?;
    let author_idx = optional(&columns.author);
    let publisher_idx = optional(&columns.publisher);
    let year_idx = optional(&columns.publication_year);
    let isbn_idx = optional(&columns.isbn);
    let oclc_idx = optional(&columns.oclc_number);
    let lccn_idx = optional(&columns.lccn);

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Csv(e.to_string()))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let get = |i: Option<usize>| {
            i.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        entries.push(LedgerEntry {
            catalog_number: get(Some(catalog_idx)).unwrap_or_default(),
            title: get(Some(title_idx)),
            author: get(author_idx),
            publisher: get(publisher_idx),
            publication_year: get(year_idx),
            isbn: get(isbn_idx),
            oclc_number: get(oclc_idx),
            lccn: get(lccn_idx),
        });
    }

    Ok(entries)
}

/// Serialize a whole ledger with a fresh header row.
pub fn write_ledger_csv(entries: &[LedgerEntry], columns: &LedgerColumns) -> Result<String, ReconError> {
    let headers = ledger_headers(columns);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&headers)
        .map_err(|e| ReconError::Csv(e.to_string()))?;
    for entry in entries {
        writer
            .write_record(ledger_row(entry, columns, &headers))
            .map_err(|e| ReconError::Csv(e.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| ReconError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Csv(e.to_string()))
}

// ---------------------------------------------------------------------------
// File-backed sink
// ---------------------------------------------------------------------------

/// A ledger CSV file on disk. A missing file is an empty ledger; the first
/// append creates it with a header row. Appends follow the existing file's
/// column order.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    columns: LedgerColumns,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>, columns: LedgerColumns) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, ReconError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReconError::Io(format!("cannot read {}: {e}", self.path.display()))),
        }
    }
}

impl LedgerSink for CsvLedger {
    fn snapshot(&self) -> Result<Vec<LedgerEntry>, ReconError> {
        match self.read()? {
            Some(text) => load_ledger_csv(&text, &self.columns),
            None => Ok(Vec::new()),
        }
    }

    fn append(&mut self, entry: LedgerEntry) -> Result<(), ReconError> {
        let append_err = |e: &dyn std::fmt::Display| {
            ReconError::LedgerAppend(format!("{}: {e}", self.path.display()))
        };

        let existing = self.read()?;
        let (headers, needs_header) = match &existing {
            Some(text) => {
                let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
                let headers = reader
                    .headers()
                    .map_err(|e| append_err(&e))?
                    .iter()
                    .map(String::from)
                    .collect::<Vec<_>>();
                (headers, false)
            }
            None => (ledger_headers(&self.columns), true),
        };

        let needs_newline = existing.as_deref().is_some_and(|t| !t.ends_with('\n'));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| append_err(&e))?;
        if needs_newline {
            std::io::Write::write_all(&mut file, b"\n").map_err(|e| append_err(&e))?;
        }

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(&headers).map_err(|e| append_err(&e))?;
        }
        writer
            .write_record(ledger_row(&entry, &self.columns, &headers))
            .map_err(|e| append_err(&e))?;
        writer.flush().map_err(|e| append_err(&e))?;
        Ok(())
    }
}
