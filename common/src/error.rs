//! Error types for CryptoLedger operations.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::{Asset, PrincipalId};

/// Why an account name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    /// Nothing was given.
    Empty,
    /// Something other than ASCII letters, digits and hyphens.
    InvalidCharacters,
    /// Longer than the allowed maximum.
    TooLong { excess: usize },
    /// The reserved context name.
    Reserved,
}

impl fmt::Display for NameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRejection::Empty => f.write_str("Name can't be empty!"),
            NameRejection::InvalidCharacters => {
                f.write_str("Only letters, numbers, and hyphens allowed!")
            }
            NameRejection::TooLong { excess } => {
                write!(f, "Name is {} character(s) too long!", excess)
            }
            NameRejection::Reserved => f.write_str("That name cannot be used!"),
        }
    }
}

/// Main error type for ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Account name failed validation.
    #[error("Invalid account name: {0}")]
    InvalidName(NameRejection),

    /// Account name already taken.
    #[error("Account {name} is already owned by {owner}")]
    NameConflict { name: String, owner: PrincipalId },

    /// No account with that name.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Caller does not own the account.
    #[error("Principal {principal} does not own account {account}")]
    NotOwner {
        account: String,
        principal: PrincipalId,
    },

    /// Amount not a positive decimal, or arithmetic overflowed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Duration token could not be parsed.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Asset not in the catalog.
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Not enough cash for a purchase.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Not enough of an asset for a sale.
    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        required: Decimal,
        available: Decimal,
    },

    /// The price oracle could not quote the asset.
    #[error("Price unavailable for {asset}: {reason}")]
    PriceUnavailable { asset: Asset, reason: String },

    /// Verb not recognised.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// No scheduled order with that ID for the account.
    #[error("Unknown scheduled order: {0}")]
    UnknownOrder(u64),

    /// Storage could not be read or written.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Chat transport refused a request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The engine is no longer accepting work.
    #[error("Engine is shutting down")]
    ShuttingDown,
}

impl LedgerError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::PriceUnavailable { .. } | LedgerError::Transport(_)
        )
    }

    /// Expected business outcomes that are reported to the user verbatim.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            LedgerError::PersistenceFailure(_)
                | LedgerError::Transport(_)
                | LedgerError::ShuttingDown
        )
    }

    /// Stable error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidName(_) => "INVALID_NAME",
            LedgerError::NameConflict { .. } => "NAME_CONFLICT",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::NotOwner { .. } => "NOT_OWNER",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InvalidDuration(_) => "INVALID_DURATION",
            LedgerError::UnknownAsset(_) => "UNKNOWN_ASSET",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::PriceUnavailable { .. } => "PRICE_UNAVAILABLE",
            LedgerError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            LedgerError::UnknownOrder(_) => "UNKNOWN_ORDER",
            LedgerError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            LedgerError::Transport(_) => "TRANSPORT_ERROR",
            LedgerError::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::PersistenceFailure(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::PersistenceFailure(err.to_string())
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
