// Row-by-row CSV reading with an explicit outcome per row, so callers can tell
// "end of input" apart from "this row is broken".
//
// Rows are read as raw bytes; only the fields a caller actually uses are
// decoded, so stray Latin-1 in unrelated columns never breaks a scan.

use crate::config::RowErrorPolicy;
use crate::error::{ReconcileError, Result};
use crate::observer::{PipelineEvent, PipelineObserver};
use csv::ByteRecord;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RowOutcome {
    Row,
    End,
    /// Row parsed badly (wrong field count, undecodable field)
    Malformed { line: u64, message: String },
    /// Underlying stream failed
    Broken { line: u64, message: String },
}

pub(crate) fn next_row<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    record: &mut ByteRecord,
) -> RowOutcome {
    match reader.read_byte_record(record) {
        Ok(true) => RowOutcome::Row,
        Ok(false) => RowOutcome::End,
        Err(err) => {
            let line = err
                .position()
                .map(|p| p.line())
                .unwrap_or_else(|| reader.position().line());
            let message = err.to_string();
            match err.kind() {
                csv::ErrorKind::Io(_) => RowOutcome::Broken { line, message },
                _ => RowOutcome::Malformed { line, message },
            }
        }
    }
}

/// Decode one field as UTF-8; a failure is a malformed row
pub(crate) fn field_str(row: &ByteRecord, index: usize) -> std::result::Result<&str, RowOutcome> {
    let raw = row.get(index).unwrap_or(b"");
    std::str::from_utf8(raw).map_err(|e| RowOutcome::Malformed {
        line: row.position().map(|p| p.line()).unwrap_or(0),
        message: format!("field {} is not valid UTF-8: {}", index, e),
    })
}

/// Applies the row policy to a failed row. `Ok(())` means "stop scanning,
/// keep what we have".
pub(crate) fn handle_bad_row(
    policy: RowErrorPolicy,
    path: &Path,
    outcome: RowOutcome,
    observer: &mut dyn PipelineObserver,
) -> Result<()> {
    let (line, message, broken) = match outcome {
        RowOutcome::Malformed { line, message } => (line, message, false),
        RowOutcome::Broken { line, message } => (line, message, true),
        RowOutcome::Row | RowOutcome::End => return Ok(()),
    };

    match policy {
        RowErrorPolicy::Lenient => {
            observer.on_event(PipelineEvent::ScanTruncated {
                path: path.to_path_buf(),
                line,
                reason: message,
            });
            Ok(())
        }
        RowErrorPolicy::Strict if broken => Err(ReconcileError::Read {
            path: path.to_path_buf(),
            message,
        }),
        RowErrorPolicy::Strict => Err(ReconcileError::MalformedRow {
            path: path.to_path_buf(),
            line,
            message,
        }),
    }
}
