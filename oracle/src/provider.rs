//! Price oracle trait and implementations.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use cryptoledger_common::{now, Asset, Timestamp};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{OracleError, OracleResult};

/// A unit price for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub asset: Asset,
    /// Price of one unit, in `currency`.
    pub price: Decimal,
    /// Reference currency code, e.g. `USD`.
    pub currency: String,
    pub quoted_at: Timestamp,
}

impl Quote {
    pub fn new(asset: Asset, price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            asset,
            price,
            currency: currency.into(),
            quoted_at: now(),
        }
    }
}

/// Source of current asset prices.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Get the oracle name.
    fn name(&self) -> &str;

    /// Quote the current unit price of `asset`. Failures are not retried.
    async fn quote(&self, asset: Asset) -> OracleResult<Quote>;
}

/// Configuration for the HTTP price oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Service root; the price endpoint is `{base_url}/data/price`.
    pub base_url: String,
    /// Reference currency for every quote.
    pub quote_currency: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How long a quote is reused. Zero disables caching.
    pub cache_ttl: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://min-api.cryptocompare.com".to_string(),
            quote_currency: "USD".to_string(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(5),
        }
    }
}

/// Quotes prices from the CryptoCompare single-symbol price endpoint.
#[derive(Clone)]
pub struct CryptoCompareOracle {
    client: reqwest::Client,
    base_url: String,
    currency: String,
}

impl CryptoCompareOracle {
    pub fn new(config: &OracleConfig) -> OracleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            currency: config.quote_currency.clone(),
        })
    }

    fn price_url(&self) -> String {
        format!("{}/data/price", self.base_url)
    }
}

#[async_trait]
impl PriceOracle for CryptoCompareOracle {
    fn name(&self) -> &str {
        "cryptocompare"
    }

    async fn quote(&self, asset: Asset) -> OracleResult<Quote> {
        let response = self
            .client
            .get(self.price_url())
            .query(&[("fsym", asset.symbol()), ("tsyms", self.currency.as_str())])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(asset = %asset, status = %status, "Price service returned an error status");
            return Err(OracleError::Upstream(format!("HTTP {}", status)));
        }

        let price = parse_price_response(&text, asset, &self.currency)?;
        debug!(asset = %asset, price = %price, "Quoted price");
        Ok(Quote::new(asset, price, self.currency.clone()))
    }
}

/// In-band failure report, e.g. `{"Response": "Error", "Message": "..."}`.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

/// Extract the price from a body such as `{"USD": 30123.45}`.
///
/// The service reports failures in-band as
/// `{"Response": "Error", "Message": "..."}`.
pub fn parse_price_response(body: &str, asset: Asset, currency: &str) -> OracleResult<Decimal> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;

    if let Ok(report) = ServiceError::deserialize(&value) {
        if report.response == "Error" {
            let message = report.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(OracleError::Upstream(message));
        }
    }

    let raw = value.get(currency).ok_or_else(|| OracleError::MissingQuote {
        asset,
        currency: currency.to_string(),
    })?;

    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(OracleError::Malformed(format!("unexpected price {}", other))),
    };

    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| OracleError::Malformed(format!("unparseable price {}", text)))?;

    if price < Decimal::ZERO {
        return Err(OracleError::Malformed(format!("negative price {}", price)));
    }
    Ok(price)
}

/// Mock price oracle for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockPriceOracle {
    prices: dashmap::DashMap<Asset, Decimal>,
    latency: dashmap::DashMap<Asset, Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockPriceOracle {
    /// Create a mock with no prices; every quote fails until one is set.
    pub fn new() -> Self {
        Self {
            prices: dashmap::DashMap::new(),
            latency: dashmap::DashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the price returned for an asset.
    pub fn set_price(&self, asset: Asset, price: Decimal) {
        self.prices.insert(asset, price);
    }

    /// Make quotes for an asset fail.
    pub fn clear_price(&self, asset: Asset) {
        self.prices.remove(&asset);
    }

    /// Delay every quote of an asset, on tokio time.
    pub fn set_latency(&self, asset: Asset, delay: Duration) {
        self.latency.insert(asset, delay);
    }

    /// Number of quotes requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockPriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PriceOracle for MockPriceOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn quote(&self, asset: Asset) -> OracleResult<Quote> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let delay = self.latency.get(&asset).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.prices
            .get(&asset)
            .map(|price| Quote::new(asset, *price, "USD"))
            .ok_or_else(|| OracleError::Upstream(format!("no price for {}", asset.symbol())))
    }
}
