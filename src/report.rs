// 📝 Report Writer - serialize flagged records to the five-column CSV
//
// The report is written next to its final path and renamed into place, so a
// failed run never leaves a half-written file behind.

use crate::error::{ReconcileError, Result};
use crate::ledger::ReconciliationTable;
use crate::record::{AccountRecord, REPORT_HEADER};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Records with at least one empty field, in table order
pub fn select_incomplete(table: &ReconciliationTable) -> Vec<&AccountRecord> {
    table.records().iter().filter(|r| r.is_incomplete()).collect()
}

/// Write `records` to `output`. Returns the number of data rows written.
pub fn write_report<'r, I>(records: I, output: &Path) -> Result<usize>
where
    I: IntoIterator<Item = &'r AccountRecord>,
{
    let tmp = partial_path(output);

    let written = write_rows(records, &tmp).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })?;

    fs::rename(&tmp, output).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ReconcileError::io(output, e)
    })?;

    Ok(written)
}

fn write_rows<'r, I>(records: I, tmp: &Path) -> Result<usize>
where
    I: IntoIterator<Item = &'r AccountRecord>,
{
    let file = File::create(tmp).map_err(|e| ReconcileError::io(tmp, e))?;

    // Header written by hand so an empty report still carries it
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer
        .write_record(REPORT_HEADER)
        .map_err(|e| csv_to_io(tmp, e))?;

    let mut written = 0;
    for record in records {
        writer.serialize(record).map_err(|e| csv_to_io(tmp, e))?;
        written += 1;
    }

    writer.flush().map_err(|e| ReconcileError::io(tmp, e))?;
    Ok(written)
}

/// Parse a report back into records
pub fn read_report(path: &Path) -> Result<Vec<AccountRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_to_io(path, e))?;

    let header = reader.headers().map_err(|e| ReconcileError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let missing: Vec<String> = REPORT_HEADER
        .iter()
        .filter(|col| !header.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReconcileError::Schema {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut records = Vec::new();
    for (line_num, result) in reader.deserialize().enumerate() {
        let record: AccountRecord = result.map_err(|e| ReconcileError::MalformedRow {
            path: path.to_path_buf(),
            line: line_num as u64 + 2, // +2 because: 1-indexed + header row
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Copy a finished report to a user-chosen destination ("save as")
pub fn export_report(report: &Path, destination: &Path) -> Result<u64> {
    let source = fs::canonicalize(report).map_err(|e| ReconcileError::io(report, e))?;
    // Copying a file onto itself truncates it
    if fs::canonicalize(destination).map_or(false, |dest| dest == source) {
        let meta = fs::metadata(&source).map_err(|e| ReconcileError::io(report, e))?;
        return Ok(meta.len());
    }

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReconcileError::io(parent, e))?;
    }
    fs::copy(report, destination).map_err(|e| ReconcileError::io(destination, e))
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

fn csv_to_io(path: &Path, err: csv::Error) -> ReconcileError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => ReconcileError::io(path, source),
        _ => ReconcileError::io(path, std::io::Error::new(std::io::ErrorKind::Other, message)),
    }
}
