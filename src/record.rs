// 🧾 Account Record - one BOID and its exchange registrations
//
// Identity: BOID (set once at first sighting)
// Values: member codes as presented to each exchange, plus the registered
// codes derived from the membership sets

use crate::exchange::Exchange;
use serde::{Deserialize, Serialize};

/// Column names of the report, in order
pub const REPORT_HEADER: [&str; 5] = ["BOID", "BOID-NSE", "BOID-BSE", "NSE", "BSE"];

// ============================================================================
// DEFECT
// ============================================================================

/// Why a record ends up in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Defect {
    /// No NSE UCC mapped to the BOID in the ledger
    MissingNseCode,
    MissingBseCode,
    /// Mapped, but not in the NSE permitted list
    NseUnregistered,
    BseUnregistered,
}

impl Defect {
    pub const ALL: [Defect; 4] = [
        Defect::MissingNseCode,
        Defect::MissingBseCode,
        Defect::NseUnregistered,
        Defect::BseUnregistered,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Defect::MissingNseCode => "No NSE code",
            Defect::MissingBseCode => "No BSE code",
            Defect::NseUnregistered => "NSE unregistered",
            Defect::BseUnregistered => "BSE unregistered",
        }
    }

    pub fn exchange(&self) -> Exchange {
        match self {
            Defect::MissingNseCode | Defect::NseUnregistered => Exchange::Nse,
            Defect::MissingBseCode | Defect::BseUnregistered => Exchange::Bse,
        }
    }
}

// ============================================================================
// ACCOUNT RECORD
// ============================================================================

/// One report row. Empty string = field absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "BOID")]
    pub boid: String,

    #[serde(rename = "BOID-NSE")]
    pub nse_member_code: String,

    #[serde(rename = "BOID-BSE")]
    pub bse_member_code: String,

    #[serde(rename = "NSE")]
    pub nse_registered: String,

    #[serde(rename = "BSE")]
    pub bse_registered: String,
}

impl AccountRecord {
    pub fn new(boid: impl Into<String>) -> Self {
        AccountRecord {
            boid: boid.into(),
            ..Default::default()
        }
    }

    pub fn member_code(&self, exchange: Exchange) -> &str {
        match exchange {
            Exchange::Nse => &self.nse_member_code,
            Exchange::Bse => &self.bse_member_code,
        }
    }

    pub fn registered(&self, exchange: Exchange) -> &str {
        match exchange {
            Exchange::Nse => &self.nse_registered,
            Exchange::Bse => &self.bse_registered,
        }
    }

    /// Sets the member code and re-derives the registered code from it
    pub(crate) fn assign_code(&mut self, exchange: Exchange, code: &str, registered: bool) {
        let derived = if registered { code.to_string() } else { String::new() };
        match exchange {
            Exchange::Nse => {
                self.nse_member_code = code.to_string();
                self.nse_registered = derived;
            }
            Exchange::Bse => {
                self.bse_member_code = code.to_string();
                self.bse_registered = derived;
            }
        }
    }

    pub fn defects(&self) -> Vec<Defect> {
        Defect::ALL
            .into_iter()
            .filter(|d| self.has_defect(*d))
            .collect()
    }

    pub fn has_defect(&self, defect: Defect) -> bool {
        match defect {
            Defect::MissingNseCode => self.nse_member_code.is_empty(),
            Defect::MissingBseCode => self.bse_member_code.is_empty(),
            Defect::NseUnregistered => self.nse_registered.is_empty(),
            Defect::BseUnregistered => self.bse_registered.is_empty(),
        }
    }

    /// Any of the four fields empty
    pub fn is_incomplete(&self) -> bool {
        Defect::ALL.iter().any(|d| self.has_defect(*d))
    }
}
