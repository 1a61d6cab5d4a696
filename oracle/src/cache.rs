//! Quote caching with TTL support.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cryptoledger_common::Asset;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::error::OracleResult;
use crate::provider::{PriceOracle, Quote};

/// Cached quote entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    quote: Quote,
    cached_at: Instant,
}

/// Thread-safe quote cache with a single TTL.
pub struct QuoteCache {
    entries: DashMap<Asset, CacheEntry>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a quote if it is younger than the TTL.
    pub fn get(&self, asset: Asset) -> Option<Quote> {
        if let Some(entry) = self.entries.get(&asset) {
            if entry.cached_at.elapsed() < self.ttl {
                debug!(asset = %asset, "Cache hit");
                return Some(entry.quote.clone());
            }
            drop(entry);
            self.entries.remove(&asset);
        }
        None
    }

    pub fn insert(&self, quote: Quote) {
        let entry = CacheEntry {
            quote,
            cached_at: Instant::now(),
        };
        self.entries.insert(entry.quote.asset, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// An oracle that reuses recent quotes from an inner oracle.
///
/// Failures are never cached.
pub struct CachedOracle {
    inner: Arc<dyn PriceOracle>,
    cache: QuoteCache,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn PriceOracle>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: QuoteCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }
}

#[async_trait]
impl PriceOracle for CachedOracle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn quote(&self, asset: Asset) -> OracleResult<Quote> {
        if let Some(quote) = self.cache.get(asset) {
            return Ok(quote);
        }
        let quote = self.inner.quote(asset).await?;
        self.cache.insert(quote.clone());
        Ok(quote)
    }
}

/// Wrap `oracle` in a cache unless `ttl` is zero.
pub fn with_cache(oracle: Arc<dyn PriceOracle>, ttl: Duration) -> Arc<dyn PriceOracle> {
    if ttl.is_zero() {
        oracle
    } else {
        Arc::new(CachedOracle::new(oracle, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockPriceOracle;
    use rust_decimal_macros::dec;

    #[tokio::test(start_paused = true)]
    async fn test_cached_quote_expires() {
        let mock = Arc::new(MockPriceOracle::new());
        mock.set_price(Asset::Bitcoin, dec!(30000));
        let oracle = CachedOracle::new(mock.clone(), Duration::from_secs(5));

        assert_eq!(oracle.quote(Asset::Bitcoin).await.unwrap().price, dec!(30000));
        mock.set_price(Asset::Bitcoin, dec!(31000));
        assert_eq!(oracle.quote(Asset::Bitcoin).await.unwrap().price, dec!(30000));
        assert_eq!(mock.calls(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(oracle.quote(Asset::Bitcoin).await.unwrap().price, dec!(31000));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock = Arc::new(MockPriceOracle::new());
        let oracle = CachedOracle::new(mock.clone(), Duration::from_secs(5));

        assert!(oracle.quote(Asset::Solana).await.is_err());
        assert!(oracle.cache().is_empty());

        mock.set_price(Asset::Solana, dec!(40));
        assert_eq!(oracle.quote(Asset::Solana).await.unwrap().price, dec!(40));
    }

    #[test]
    fn test_zero_ttl_skips_cache() {
        let mock: Arc<dyn PriceOracle> = Arc::new(MockPriceOracle::new());
        let oracle = with_cache(mock.clone(), Duration::ZERO);
        assert!(Arc::ptr_eq(&oracle, &mock));
    }
}
