// ⚙️ Run configuration
// Defaults reproduce the behaviour of the original desktop tool; a TOML file
// and CLI flags can override individual fields.

use crate::error::{ReconcileError, Result};
use crate::exchange::Exchange;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_NSE_MEMBER_ID: &str = "90375";
pub const DEFAULT_BSE_MEMBER_ID: &str = "6867";
pub const DEFAULT_CASH_SEGMENT: &str = "CM";
pub const DEFAULT_PERMITTED_STATUS: &str = "Permitted to Trade";
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "boid_cm_filtered_output.csv";

// ============================================================================
// POLICIES
// ============================================================================

/// What a scan does when a row cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowErrorPolicy {
    /// Stop reading, keep what was read so far
    #[default]
    Lenient,
    /// Fail the whole load
    Strict,
}

/// What happens when a BOID shows up again with a code for the same exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberCodePolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
    /// Identical repeats are fine, a different code is an error
    RejectConflict,
}

impl FromStr for RowErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(RowErrorPolicy::Lenient),
            "strict" => Ok(RowErrorPolicy::Strict),
            other => Err(format!(
                "unknown row error policy '{}' (expected lenient or strict)",
                other
            )),
        }
    }
}

impl FromStr for MemberCodePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last-write-wins" | "last" => Ok(MemberCodePolicy::LastWriteWins),
            "first-write-wins" | "first" => Ok(MemberCodePolicy::FirstWriteWins),
            "reject-conflict" | "reject" => Ok(MemberCodePolicy::RejectConflict),
            other => Err(format!(
                "unknown member code policy '{}' (expected last-write-wins, first-write-wins or reject-conflict)",
                other
            )),
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub row_error_policy: RowErrorPolicy,
    pub member_code_policy: MemberCodePolicy,

    /// Depository member id that marks a ledger row as an NSE mapping
    pub nse_member_id: String,

    /// Depository member id that marks a ledger row as a BSE mapping
    pub bse_member_id: String,

    pub cash_segment: String,

    /// EXCHANGE_STATUS value that puts a UCC in the NSE membership set
    pub permitted_status: String,

    /// None = process temp dir
    pub output_dir: Option<PathBuf>,
    pub output_file_name: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            row_error_policy: RowErrorPolicy::default(),
            member_code_policy: MemberCodePolicy::default(),
            nse_member_id: DEFAULT_NSE_MEMBER_ID.to_string(),
            bse_member_id: DEFAULT_BSE_MEMBER_ID.to_string(),
            cash_segment: DEFAULT_CASH_SEGMENT.to_string(),
            permitted_status: DEFAULT_PERMITTED_STATUS.to_string(),
            output_dir: None,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReconcileConfig =
            toml::from_str(content).map_err(|e| ReconcileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nse_member_id.trim().is_empty() || self.bse_member_id.trim().is_empty() {
            return Err(ReconcileError::Config(
                "member ids must not be empty".to_string(),
            ));
        }
        if self.nse_member_id == self.bse_member_id {
            return Err(ReconcileError::Config(format!(
                "NSE and BSE member ids must differ (both are '{}')",
                self.nse_member_id
            )));
        }
        if self.output_file_name.trim().is_empty() {
            return Err(ReconcileError::Config(
                "output_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Which exchange a ledger member id belongs to, if any
    pub fn exchange_for_member_id(&self, member_id: &str) -> Option<Exchange> {
        if member_id == self.nse_member_id {
            Some(Exchange::Nse)
        } else if member_id == self.bse_member_id {
            Some(Exchange::Bse)
        } else {
            None
        }
    }

    /// Where the report lands for this run
    pub fn output_path(&self) -> PathBuf {
        let dir = self
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        dir.join(&self.output_file_name)
    }
}
