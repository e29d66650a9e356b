// ⚖️ Ledger Reconciler - join the CDSL ledger against both membership sets
//
// The ledger is a wide comma-separated extract whose column positions are
// fixed by the depository. Only cash-market rows take part; each row maps a
// BOID to the UCC one depository member (= one exchange) knows it by.

use crate::config::{MemberCodePolicy, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use crate::exchange::Exchange;
use crate::membership::MembershipSet;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::record::AccountRecord;
use crate::scan::{field_str, handle_bad_row, next_row, RowOutcome};
use csv::{ByteRecord, ReaderBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// Ledger layout (0-based)
pub const BOID_INDEX: usize = 6;
pub const UCC_INDEX: usize = 109;
pub const MEMBER_ID_INDEX: usize = 110;
pub const SEGMENT_INDEX: usize = 111;
pub const MIN_LEDGER_FIELDS: usize = 112;

// ============================================================================
// RECONCILIATION TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Data rows read, header excluded
    pub rows_read: usize,
    pub short_rows: usize,
    pub other_segment_rows: usize,
}

/// BOID -> record, iterated in order of first appearance in the ledger
#[derive(Debug, Clone, Default)]
pub struct ReconciliationTable {
    records: Vec<AccountRecord>,
    index: HashMap<String, usize>,
    stats: ScanStats,
}

impl ReconciliationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, boid: &str) -> Option<&AccountRecord> {
        self.index.get(boid).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn entry(&mut self, boid: &str) -> &mut AccountRecord {
        let i = match self.index.get(boid) {
            Some(&i) => i,
            None => {
                self.records.push(AccountRecord::new(boid));
                let i = self.records.len() - 1;
                self.index.insert(boid.to_string(), i);
                i
            }
        };
        &mut self.records[i]
    }
}

// ============================================================================
// LEDGER ROW
// ============================================================================

/// The four columns a full-width ledger row contributes. Other columns are
/// never decoded.
struct LedgerFields<'r> {
    boid: &'r str,
    ucc: &'r str,
    member_id: &'r str,
    segment: &'r str,
}

impl<'r> LedgerFields<'r> {
    fn decode(row: &'r ByteRecord) -> std::result::Result<Self, RowOutcome> {
        Ok(LedgerFields {
            boid: field_str(row, BOID_INDEX)?,
            ucc: field_str(row, UCC_INDEX)?,
            member_id: field_str(row, MEMBER_ID_INDEX)?,
            segment: field_str(row, SEGMENT_INDEX)?,
        })
    }
}

// ============================================================================
// LEDGER RECONCILER
// ============================================================================

pub struct LedgerReconciler<'a> {
    nse: &'a MembershipSet,
    bse: &'a MembershipSet,
    config: &'a ReconcileConfig,
}

impl<'a> LedgerReconciler<'a> {
    pub fn new(nse: &'a MembershipSet, bse: &'a MembershipSet, config: &'a ReconcileConfig) -> Self {
        LedgerReconciler { nse, bse, config }
    }

    /// Reconcile the ledger file at `path`
    pub fn reconcile(
        &self,
        path: &Path,
        observer: &mut dyn PipelineObserver,
    ) -> Result<ReconciliationTable> {
        let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;
        self.reconcile_reader(file, path, observer)
    }

    /// Reconcile from any reader; `path` only labels errors and events
    pub fn reconcile_reader<R: Read>(
        &self,
        source: R,
        path: &Path,
        observer: &mut dyn PipelineObserver,
    ) -> Result<ReconciliationTable> {
        // Short rows are skipped, not treated as broken
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let columns = reader
            .byte_headers()
            .map_err(|e| ReconcileError::Read {
                path: path.to_path_buf(),
                message: format!("failed to read CDSL header: {}", e),
            })?
            .len();
        if columns == 0 && reader.is_done() {
            return Err(ReconcileError::Read {
                path: path.to_path_buf(),
                message: "failed to read CDSL header: empty file".to_string(),
            });
        }
        observer.on_event(PipelineEvent::LedgerHeader { columns });

        let mut table = ReconciliationTable::new();
        let mut row = ByteRecord::new();
        loop {
            match next_row(&mut reader, &mut row) {
                RowOutcome::Row => {
                    table.stats.rows_read += 1;
                    if row.len() < MIN_LEDGER_FIELDS {
                        table.stats.short_rows += 1;
                        continue;
                    }
                    match LedgerFields::decode(&row) {
                        Ok(fields) => self.apply_row(&mut table, fields)?,
                        Err(bad) => {
                            handle_bad_row(self.config.row_error_policy, path, bad, observer)?;
                            break;
                        }
                    }
                }
                RowOutcome::End => break,
                bad => {
                    handle_bad_row(self.config.row_error_policy, path, bad, observer)?;
                    break;
                }
            }
        }

        let stats = table.stats;
        observer.on_event(PipelineEvent::LedgerScanned {
            rows_read: stats.rows_read,
            short_rows: stats.short_rows,
            other_segment_rows: stats.other_segment_rows,
            boids: table.len(),
        });
        Ok(table)
    }

    fn apply_row(&self, table: &mut ReconciliationTable, fields: LedgerFields<'_>) -> Result<()> {
        if fields.segment != self.config.cash_segment {
            table.stats.other_segment_rows += 1;
            return Ok(());
        }

        let record = table.entry(fields.boid);

        match self.config.exchange_for_member_id(fields.member_id) {
            Some(exchange) if !fields.ucc.is_empty() => self.apply_code(record, exchange, fields.ucc),
            _ => Ok(()),
        }
    }

    fn apply_code(&self, record: &mut AccountRecord, exchange: Exchange, code: &str) -> Result<()> {
        let existing = record.member_code(exchange);
        if !existing.is_empty() {
            match self.config.member_code_policy {
                MemberCodePolicy::LastWriteWins => {}
                MemberCodePolicy::FirstWriteWins => return Ok(()),
                MemberCodePolicy::RejectConflict if existing != code => {
                    return Err(ReconcileError::MemberCodeConflict {
                        boid: record.boid.clone(),
                        exchange,
                        existing: existing.to_string(),
                        incoming: code.to_string(),
                    });
                }
                MemberCodePolicy::RejectConflict => {}
            }
        }

        let registered = self.membership(exchange).contains(code);
        record.assign_code(exchange, code, registered);
        Ok(())
    }

    fn membership(&self, exchange: Exchange) -> &MembershipSet {
        match exchange {
            Exchange::Nse => self.nse,
            Exchange::Bse => self.bse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RowErrorPolicy;
    use crate::observer::{NullObserver, RecordingObserver};

    fn ledger_row(boid: &str, ucc: &str, member_id: &str, segment: &str) -> String {
        let mut fields = vec![String::new(); MIN_LEDGER_FIELDS];
        fields[0] = "DP01".to_string();
        fields[BOID_INDEX] = boid.to_string();
        fields[UCC_INDEX] = ucc.to_string();
        fields[MEMBER_ID_INDEX] = member_id.to_string();
        fields[SEGMENT_INDEX] = segment.to_string();
        fields.join(",")
    }

    fn ledger(rows: &[String]) -> String {
        let header: Vec<String> = (0..MIN_LEDGER_FIELDS).map(|i| format!("COL{}", i)).collect();
        let mut out = header.join(",");
        out.push('\n');
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    /// Replace one field of a comma-joined row with raw bytes
    fn with_raw_field(row: &str, index: usize, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, field) in row.split(',').enumerate() {
            if i > 0 {
                out.push(b',');
            }
            if i == index {
                out.extend_from_slice(value);
            } else {
                out.extend_from_slice(field.as_bytes());
            }
        }
        out
    }

    fn run_with<R: Read>(
        config: &ReconcileConfig,
        source: R,
        observer: &mut dyn PipelineObserver,
    ) -> Result<ReconciliationTable> {
        let nse: MembershipSet = ["ABC123", "N2"].into_iter().collect();
        let bse: MembershipSet = ["XYZ999"].into_iter().collect();
        LedgerReconciler::new(&nse, &bse, config).reconcile_reader(source, Path::new("cdsl.csv"), observer)
    }

    fn run(config: &ReconcileConfig, data: &str) -> Result<ReconciliationTable> {
        run_with(config, data.as_bytes(), &mut NullObserver)
    }

    fn strict() -> ReconcileConfig {
        ReconcileConfig {
            row_error_policy: RowErrorPolicy::Strict,
            ..ReconcileConfig::default()
        }
    }

    /// Serves `data`, then fails every later read
    struct FailingReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl FailingReader {
        fn new(data: impl Into<Vec<u8>>) -> Self {
            FailingReader {
                data: data.into(),
                pos: 0,
            }
        }
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_single_nse_row() {
        let data = ledger(&[ledger_row("BOID1", "ABC123", "90375", "CM")]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        let record = table.get("BOID1").unwrap();
        assert_eq!(record.nse_member_code, "ABC123");
        assert_eq!(record.nse_registered, "ABC123");
        assert_eq!(record.bse_member_code, "");
        assert_eq!(record.bse_registered, "");
    }

    #[test]
    fn test_both_exchanges_registered() {
        let data = ledger(&[
            ledger_row("BOID1", "ABC123", "90375", "CM"),
            ledger_row("BOID1", "XYZ999", "6867", "CM"),
            ledger_row("BOID2", "UNKNOWN", "6867", "CM"),
        ]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        assert_eq!(table.len(), 2);
        assert!(!table.get("BOID1").unwrap().is_incomplete());

        let second = table.get("BOID2").unwrap();
        assert_eq!(second.bse_member_code, "UNKNOWN");
        assert_eq!(second.bse_registered, "");
        assert_eq!(table.records().iter().filter(|r| r.is_incomplete()).count(), 1);
    }

    #[test]
    fn test_non_cash_and_short_rows_create_nothing() {
        let data = ledger(&[
            ledger_row("BOID1", "ABC123", "90375", "FO"),
            "DP01,a,b,c,d,e,BOID2".to_string(),
        ]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        assert!(table.is_empty());
        assert_eq!(
            table.stats(),
            ScanStats {
                rows_read: 2,
                short_rows: 1,
                other_segment_rows: 1
            }
        );
    }

    #[test]
    fn test_unknown_member_or_empty_ucc_only_creates_record() {
        let data = ledger(&[
            ledger_row("BOID1", "ABC123", "11111", "CM"),
            ledger_row("BOID2", "", "90375", "CM"),
        ]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("BOID1").unwrap(), &AccountRecord::new("BOID1"));
        assert_eq!(table.get("BOID2").unwrap(), &AccountRecord::new("BOID2"));
    }

    #[test]
    fn test_order_follows_first_appearance() {
        let data = ledger(&[
            ledger_row("B", "N2", "90375", "CM"),
            ledger_row("A", "N2", "90375", "CM"),
            ledger_row("B", "XYZ999", "6867", "CM"),
        ]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        let boids: Vec<&str> = table.records().iter().map(|r| r.boid.as_str()).collect();
        assert_eq!(boids, vec!["B", "A"]);
    }

    #[test]
    fn test_last_write_wins_rederives_registration() {
        let data = ledger(&[
            ledger_row("BOID1", "ABC123", "90375", "CM"),
            ledger_row("BOID1", "NOTLISTED", "90375", "CM"),
        ]);
        let table = run(&ReconcileConfig::default(), &data).unwrap();

        let record = table.get("BOID1").unwrap();
        assert_eq!(record.nse_member_code, "NOTLISTED");
        assert_eq!(record.nse_registered, "");
    }

    #[test]
    fn test_first_write_wins_keeps_first_code() {
        let config = ReconcileConfig {
            member_code_policy: MemberCodePolicy::FirstWriteWins,
            ..ReconcileConfig::default()
        };
        let data = ledger(&[
            ledger_row("BOID1", "ABC123", "90375", "CM"),
            ledger_row("BOID1", "NOTLISTED", "90375", "CM"),
        ]);
        let table = run(&config, &data).unwrap();

        let record = table.get("BOID1").unwrap();
        assert_eq!(record.nse_member_code, "ABC123");
        assert_eq!(record.nse_registered, "ABC123");
    }

    #[test]
    fn test_reject_conflict() {
        let config = ReconcileConfig {
            member_code_policy: MemberCodePolicy::RejectConflict,
            ..ReconcileConfig::default()
        };

        let same = ledger(&[
            ledger_row("BOID1", "XYZ999", "6867", "CM"),
            ledger_row("BOID1", "XYZ999", "6867", "CM"),
        ]);
        assert!(run(&config, &same).is_ok());

        let differing = ledger(&[
            ledger_row("BOID1", "XYZ999", "6867", "CM"),
            ledger_row("BOID1", "OTHER", "6867", "CM"),
        ]);
        let err = run(&config, &differing).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MemberCodeConflict { exchange: Exchange::Bse, ref incoming, .. }
                if incoming == "OTHER"
        ));
    }

    #[test]
    fn test_latin1_in_unused_column_is_ignored() {
        let mut bytes = ledger(&[]).into_bytes();
        for boid in ["BOID1", "BOID2", "BOID3"] {
            let row = ledger_row(boid, "ABC123", "90375", "CM");
            let name: &[u8] = if boid == "BOID2" { b"Jos\xe9" } else { b"Ann" };
            bytes.extend_from_slice(&with_raw_field(&row, 10, name));
            bytes.push(b'\n');
        }

        let mut observer = RecordingObserver::new();
        let table = run_with(&strict(), bytes.as_slice(), &mut observer).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.get("BOID2").is_some());
        assert_eq!(observer.truncations(), 0);
    }

    #[test]
    fn test_malformed_row_policy() {
        let mut bytes = ledger(&[ledger_row("BOID1", "ABC123", "90375", "CM")]).into_bytes();
        // a BOID that is not UTF-8 cannot become a report key
        let bad = ledger_row("", "ABC123", "90375", "CM");
        bytes.extend_from_slice(&with_raw_field(&bad, BOID_INDEX, b"B\xff\xfe"));
        bytes.push(b'\n');
        bytes.extend_from_slice(ledger_row("BOID2", "ABC123", "90375", "CM").as_bytes());
        bytes.push(b'\n');

        let mut observer = RecordingObserver::new();
        let table = run_with(&ReconcileConfig::default(), bytes.as_slice(), &mut observer).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("BOID2").is_none());
        assert_eq!(observer.truncations(), 1);

        let err = run_with(&strict(), bytes.as_slice(), &mut NullObserver).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn test_empty_ledger_is_read_error() {
        let err = run(&ReconcileConfig::default(), "").unwrap_err();
        assert!(matches!(err, ReconcileError::Read { ref message, .. } if message.contains("empty")));
    }

    #[test]
    fn test_header_only_ledger_yields_empty_table() {
        let table = run(&ReconcileConfig::default(), &ledger(&[])).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.stats().rows_read, 0);
    }

    #[test]
    fn test_header_read_failure_is_read_error() {
        let err = run_with(&ReconcileConfig::default(), FailingReader::new(Vec::new()), &mut NullObserver)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Read { .. }));
    }

    #[test]
    fn test_stream_failure_mid_scan() {
        let data = ledger(&[ledger_row("BOID1", "ABC123", "90375", "CM")]);

        let mut observer = RecordingObserver::new();
        let table = run_with(&ReconcileConfig::default(), FailingReader::new(data.clone()), &mut observer)
            .unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get("BOID1").is_some());
        assert_eq!(observer.truncations(), 1);

        let err = run_with(&strict(), FailingReader::new(data), &mut NullObserver).unwrap_err();
        assert!(matches!(err, ReconcileError::Read { .. }));
    }
}
