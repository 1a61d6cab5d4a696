//! CryptoLedger Price Oracle
//!
//! Current unit prices for catalog assets.
//!
//! # Features
//!
//! - HTTP oracle backed by the CryptoCompare price endpoint
//! - Quote caching with configurable TTL
//! - Mock oracle for tests (`test-utils` feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use cryptoledger_oracle::{with_cache, CryptoCompareOracle, OracleConfig, PriceOracle};
//!
//! let config = OracleConfig::default();
//! let oracle = with_cache(Arc::new(CryptoCompareOracle::new(&config)?), config.cache_ttl);
//! let quote = oracle.quote(Asset::Bitcoin).await?;
//! ```

pub mod cache;
pub mod error;
pub mod provider;

pub use cache::{with_cache, CachedOracle, QuoteCache};
pub use error::{OracleError, OracleResult};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockPriceOracle;
pub use provider::{parse_price_response, CryptoCompareOracle, OracleConfig, PriceOracle, Quote};
