// ❗ Error taxonomy for the reconciliation pipeline
// Every variant carries the file it happened on

use crate::exchange::Exchange;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// File could not be opened, created, written or moved into place
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required header column(s) absent
    #[error("missing expected headers in {}: {}", .path.display(), .missing.join(", "))]
    Schema { path: PathBuf, missing: Vec<String> },

    /// Stream failed mid-scan (not end of input)
    #[error("error reading {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// Row could not be parsed and the strict row policy is active
    #[error("malformed row at line {line} in {}: {message}", .path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error(
        "conflicting {} member codes for BOID {boid}: '{existing}' vs '{incoming}'",
        .exchange.code()
    )]
    MemberCodeConflict {
        boid: String,
        exchange: Exchange,
        existing: String,
        incoming: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ReconcileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconcileError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
