//! Price oracle error types.

use cryptoledger_common::{Asset, LedgerError};
use thiserror::Error;

/// Errors that can occur while quoting a price.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The HTTP request failed or timed out.
    #[error("Price request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream service answered with an error status or message.
    #[error("Price service error: {0}")]
    Upstream(String),

    /// The response could not be understood.
    #[error("Malformed price response: {0}")]
    Malformed(String),

    /// The response carried no price for the asset.
    #[error("No {currency} quote for {asset}")]
    MissingQuote { asset: Asset, currency: String },
}

impl OracleError {
    /// Surface this failure as the ledger's retryable price error.
    pub fn into_ledger_error(self, asset: Asset) -> LedgerError {
        LedgerError::PriceUnavailable {
            asset,
            reason: self.to_string(),
        }
    }
}

/// Result type for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;
