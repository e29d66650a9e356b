// UCC Reconciler - Core Library
// Finds depository accounts (BOIDs) whose exchange client codes are missing
// or not permitted to trade, by joining the CDSL ledger against NSE and BSE
// membership extracts.

pub mod config;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod logging;
pub mod membership;
pub mod observer;
pub mod pipeline;
pub mod record;
pub mod report;
mod scan;

// Re-export commonly used types
pub use config::{MemberCodePolicy, ReconcileConfig, RowErrorPolicy};
pub use error::{ReconcileError, Result};
pub use exchange::Exchange;
pub use ledger::{LedgerReconciler, ReconciliationTable, ScanStats};
pub use membership::{load_bse_uccs, load_nse_uccs, MembershipSet};
pub use observer::{
    NullObserver, PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver,
};
pub use pipeline::{process_files, Pipeline, RunSummary};
pub use record::{AccountRecord, Defect, REPORT_HEADER};
pub use report::{export_report, read_report, select_incomplete, write_report};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
