use serde::{Deserialize, Serialize};

/// Exchange - which membership list a ledger row is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Exchange A, membership comes as a pipe-delimited UCC extract
    Nse,
    /// Exchange B, membership comes as one UCC per line
    Bse,
}

impl Exchange {
    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Nse => "National Stock Exchange",
            Exchange::Bse => "Bombay Stock Exchange",
        }
    }

    /// Short code, also used as the report column prefix
    pub fn code(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
