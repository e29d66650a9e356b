// 🔗 Pipeline - load memberships, reconcile the ledger, write the report
//
// Stages run strictly in order and the first failure aborts the run. The
// report is the last thing written, so a failed run produces no output file.

use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::ledger::LedgerReconciler;
use crate::membership::{load_bse_uccs, load_nse_uccs};
use crate::observer::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::report::{select_incomplete, write_report};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What one run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub nse_uccs: usize,
    pub bse_uccs: usize,
    pub ledger_rows: usize,
    pub short_rows: usize,
    pub other_segment_rows: usize,
    pub boids: usize,
    pub flagged: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} BOIDs flagged ({} NSE UCCs, {} BSE UCCs, {} ledger rows) -> {}",
            self.flagged,
            self.boids,
            self.nse_uccs,
            self.bse_uccs,
            self.ledger_rows,
            self.output_path.display()
        )
    }
}

pub struct Pipeline<'o> {
    config: ReconcileConfig,
    observer: &'o mut dyn PipelineObserver,
}

impl<'o> Pipeline<'o> {
    pub fn new(config: ReconcileConfig, observer: &'o mut dyn PipelineObserver) -> Self {
        Pipeline { config, observer }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run the three stages and write the report
    pub fn process_files(
        &mut self,
        nse_path: &Path,
        bse_path: &Path,
        cdsl_path: &Path,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        self.config.validate()?;

        let nse = load_nse_uccs(nse_path, &self.config, &mut *self.observer)?;
        let bse = load_bse_uccs(bse_path, &mut *self.observer)?;

        let table = LedgerReconciler::new(&nse, &bse, &self.config)
            .reconcile(cdsl_path, &mut *self.observer)?;

        let flagged = select_incomplete(&table);
        self.observer.on_event(PipelineEvent::RecordsFiltered {
            flagged: flagged.len(),
            total: table.len(),
        });

        let output_path = self.config.output_path();
        let rows = write_report(flagged, &output_path)?;
        self.observer.on_event(PipelineEvent::ReportWritten {
            path: output_path.clone(),
            rows,
        });

        let stats = table.stats();
        Ok(RunSummary {
            output_path,
            nse_uccs: nse.len(),
            bse_uccs: bse.len(),
            ledger_rows: stats.rows_read,
            short_rows: stats.short_rows,
            other_segment_rows: stats.other_segment_rows,
            boids: table.len(),
            flagged: rows,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Default configuration, events go to `tracing`. Returns the report path.
pub fn process_files(nse_path: &Path, bse_path: &Path, cdsl_path: &Path) -> Result<PathBuf> {
    let mut observer = TracingObserver;
    let summary = Pipeline::new(ReconcileConfig::default(), &mut observer)
        .process_files(nse_path, bse_path, cdsl_path)?;
    Ok(summary.output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::exchange::Exchange;
    use crate::observer::RecordingObserver;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_event_sequence() {
        let dir = TempDir::new().unwrap();
        let nse = dir.path().join("nse.txt");
        let bse = dir.path().join("bse.txt");
        let cdsl = dir.path().join("cdsl.csv");
        fs::write(&nse, "CLIENT_CODE|EXCHANGE_STATUS\nA|Permitted to Trade\n").unwrap();
        fs::write(&bse, "B\n").unwrap();
        fs::write(&cdsl, "h1,h2\n").unwrap();

        let config = ReconcileConfig {
            output_dir: Some(dir.path().to_path_buf()),
            ..ReconcileConfig::default()
        };
        let mut observer = RecordingObserver::new();
        let summary = Pipeline::new(config, &mut observer)
            .process_files(&nse, &bse, &cdsl)
            .unwrap();

        assert_eq!(summary.flagged, 0);
        assert_eq!(observer.events.len(), 6);
        assert_eq!(
            observer.events[0],
            PipelineEvent::MembershipLoaded {
                exchange: Exchange::Nse,
                count: 1
            }
        );
        assert_eq!(observer.events[2], PipelineEvent::LedgerHeader { columns: 2 });
        assert!(matches!(
            observer.events[5],
            PipelineEvent::ReportWritten { rows: 0, .. }
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let dir = TempDir::new().unwrap();
        let config = ReconcileConfig {
            output_file_name: String::new(),
            ..ReconcileConfig::default()
        };
        let mut observer = RecordingObserver::new();

        let err = Pipeline::new(config, &mut observer)
            .process_files(
                &dir.path().join("a"),
                &dir.path().join("b"),
                &dir.path().join("c"),
            )
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Config(_)));
        assert!(observer.events.is_empty());
    }
}
