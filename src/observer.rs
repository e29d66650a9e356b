// 📡 Pipeline observer - structured progress events
// The pipeline never logs directly; it reports to whatever observer it was given.

use crate::exchange::Exchange;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    MembershipLoaded {
        exchange: Exchange,
        count: usize,
    },

    LedgerHeader {
        columns: usize,
    },

    /// A scan hit a bad row and stopped early (lenient policy)
    ScanTruncated {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    LedgerScanned {
        rows_read: usize,
        short_rows: usize,
        other_segment_rows: usize,
        boids: usize,
    },

    RecordsFiltered {
        flagged: usize,
        total: usize,
    },

    ReportWritten {
        path: PathBuf,
        rows: usize,
    },
}

pub trait PipelineObserver {
    fn on_event(&mut self, event: PipelineEvent);
}

/// Forwards every event to `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::MembershipLoaded { exchange, count } => {
                tracing::info!(exchange = %exchange, count, "Loaded {} {} UCCs", count, exchange);
            }
            PipelineEvent::LedgerHeader { columns } => {
                tracing::info!(columns, "CDSL header has {} columns", columns);
            }
            PipelineEvent::ScanTruncated { path, line, reason } => {
                tracing::warn!(
                    path = %path.display(),
                    line,
                    %reason,
                    "Stopped reading at malformed row; remaining rows ignored"
                );
            }
            PipelineEvent::LedgerScanned {
                rows_read,
                short_rows,
                other_segment_rows,
                boids,
            } => {
                tracing::info!(
                    rows_read,
                    short_rows,
                    other_segment_rows,
                    "Total BOIDs found in CDSL: {}",
                    boids
                );
            }
            PipelineEvent::RecordsFiltered { flagged, total } => {
                tracing::info!(total, "Filtered {} incomplete records", flagged);
            }
            PipelineEvent::ReportWritten { path, rows } => {
                tracing::info!(rows, "Output written to {}", path.display());
            }
        }
    }
}

/// Drops everything
#[derive(Debug, Default)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_event(&mut self, _event: PipelineEvent) {}
}

/// Keeps every event in order; handy for tests and for summaries
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<PipelineEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn truncations(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::ScanTruncated { .. }))
            .count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let mut observer = RecordingObserver::new();
        observer.on_event(PipelineEvent::MembershipLoaded {
            exchange: Exchange::Nse,
            count: 3,
        });
        observer.on_event(PipelineEvent::ScanTruncated {
            path: PathBuf::from("nse.txt"),
            line: 4,
            reason: "bad row".to_string(),
        });

        assert_eq!(observer.events.len(), 2);
        assert_eq!(observer.truncations(), 1);
        assert!(matches!(
            observer.events[0],
            PipelineEvent::MembershipLoaded { count: 3, .. }
        ));
    }
}
