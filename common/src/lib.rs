//! CryptoLedger Common Types
//!
//! Shared types used across the ledger engine: the asset catalog,
//! identifiers, decimal rounding rules, schedule durations and the error
//! taxonomy.

pub mod asset;
pub mod identifiers;
pub mod monetary;
pub mod order;
pub mod error;
pub mod time;

pub use asset::*;
pub use identifiers::*;
pub use monetary::*;
pub use order::*;
pub use error::*;
pub use time::*;
