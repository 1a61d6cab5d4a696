//! CryptoLedger Ledger
//!
//! Per-account ledgers with an append-only audit trail, the pure trade and
//! loan engine, and the file-backed account directory.

pub mod account;
pub mod balance;
pub mod engine;
pub mod journal;
pub mod store;

pub use account::Account;
pub use balance::AssetBalances;
pub use engine::{Fill, TransactionEngine};
pub use journal::{Loan, Transaction};
pub use store::{write_json_atomic, AccountDirectory, DirectoryEntry};
