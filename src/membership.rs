// 🏛️ Membership Loaders - which UCCs each exchange currently allows to trade
//
// NSE: pipe-delimited UCC extract with a header row (CLIENT_CODE, EXCHANGE_STATUS)
// BSE: plain text, one UCC per line

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::exchange::Exchange;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::scan::{field_str, handle_bad_row, next_row, RowOutcome};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const CLIENT_CODE_COLUMN: &str = "CLIENT_CODE";
pub const EXCHANGE_STATUS_COLUMN: &str = "EXCHANGE_STATUS";

// ============================================================================
// MEMBERSHIP SET
// ============================================================================

/// Set of UCCs permitted on one exchange. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    codes: HashSet<String>,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    fn insert(&mut self, code: String) {
        self.codes.insert(code);
    }
}

impl<S: Into<String>> FromIterator<S> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        MembershipSet {
            codes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// BSE LOADER (plain lines)
// ============================================================================

/// Load BSE UCCs: one per line, trimmed, blank lines ignored
pub fn load_bse_uccs(path: &Path, observer: &mut dyn PipelineObserver) -> Result<MembershipSet> {
    let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;

    // Bytes, not lines(): a stray non-UTF-8 line must not abort the load
    let mut reader = BufReader::new(file);
    let mut uccs = MembershipSet::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ReconcileError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if n == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let ucc = line.trim();
        if !ucc.is_empty() {
            uccs.insert(ucc.to_string());
        }
    }

    observer.on_event(PipelineEvent::MembershipLoaded {
        exchange: Exchange::Bse,
        count: uccs.len(),
    });
    Ok(uccs)
}

// ============================================================================
// NSE LOADER (pipe-delimited with header)
// ============================================================================

/// Load NSE UCCs whose EXCHANGE_STATUS is the permitted status
pub fn load_nse_uccs(
    path: &Path,
    config: &ReconcileConfig,
    observer: &mut dyn PipelineObserver,
) -> Result<MembershipSet> {
    let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .from_reader(file);

    let header = reader
        .byte_headers()
        .map_err(|e| ReconcileError::Read {
            path: path.to_path_buf(),
            message: format!("failed to read NSE header: {}", e),
        })?
        .clone();
    let (code_idx, status_idx) = locate_columns(path, &header)?;

    let mut uccs = MembershipSet::new();
    let mut row = ByteRecord::new();
    loop {
        match next_row(&mut reader, &mut row) {
            RowOutcome::Row => {
                // Only the code of a permitted row has to decode
                let code = match field_str(&row, status_idx) {
                    Ok(status) if status.trim() == config.permitted_status => {
                        field_str(&row, code_idx).map(Some)
                    }
                    Ok(_) => Ok(None),
                    Err(bad) => Err(bad),
                };
                match code {
                    Ok(Some(code)) => uccs.insert(code.to_string()),
                    Ok(None) => {}
                    Err(bad) => {
                        handle_bad_row(config.row_error_policy, path, bad, observer)?;
                        break;
                    }
                }
            }
            RowOutcome::End => break,
            bad => {
                handle_bad_row(config.row_error_policy, path, bad, observer)?;
                break;
            }
        }
    }

    observer.on_event(PipelineEvent::MembershipLoaded {
        exchange: Exchange::Nse,
        count: uccs.len(),
    });
    Ok(uccs)
}

/// Header name -> index; a repeated name resolves to its last position
fn locate_columns(path: &Path, header: &ByteRecord) -> Result<(usize, usize)> {
    let cols: HashMap<&[u8], usize> = header.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let code_idx = cols.get(CLIENT_CODE_COLUMN.as_bytes()).copied();
    let status_idx = cols.get(EXCHANGE_STATUS_COLUMN.as_bytes()).copied();

    match (code_idx, status_idx) {
        (Some(code), Some(status)) => Ok((code, status)),
        _ => {
            let mut missing = Vec::new();
            if code_idx.is_none() {
                missing.push(CLIENT_CODE_COLUMN.to_string());
            }
            if status_idx.is_none() {
                missing.push(EXCHANGE_STATUS_COLUMN.to_string());
            }
            Err(ReconcileError::Schema {
                path: path.to_path_buf(),
                missing,
            })
        }
    }
}
