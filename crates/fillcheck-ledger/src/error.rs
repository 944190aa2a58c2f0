use thiserror::Error;

use fillcheck_core::ValidationError;

/// Errors surfaced by ledger ingestion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Missing or malformed fields on a fill; fail fast, never retried.
    #[error(transparent)]
    InvalidRequest(#[from] ValidationError),

    /// Exit fill with nothing open to match against.
    #[error("no open position for owner '{owner}' in '{symbol}'")]
    NoOpenPosition { owner: String, symbol: String },
}

impl LedgerError {
    /// Stable machine-readable code for API collaborators.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "ledger.invalid_request",
            Self::NoOpenPosition { .. } => "ledger.no_open_position",
        }
    }
}
