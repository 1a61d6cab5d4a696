//! Per-asset balance tracking.

use std::collections::BTreeMap;

use cryptoledger_common::{normalize_quantity, Asset};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Asset quantities held by one account.
///
/// A zero quantity is never stored: setting an asset to zero removes it, so
/// an empty map means the account holds no assets at all. Stored values have
/// trailing zeros stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetBalances(BTreeMap<Asset, Decimal>);

impl AssetBalances {
    /// Create an empty balance map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity held, zero if absent.
    pub fn get(&self, asset: Asset) -> Decimal {
        self.0.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Set the quantity held; zero removes the entry.
    pub fn set(&mut self, asset: Asset, quantity: Decimal) {
        if quantity.is_zero() {
            self.0.remove(&asset);
        } else {
            self.0.insert(asset, normalize_quantity(quantity));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Held assets in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (Asset, Decimal)> + '_ {
        self.0.iter().map(|(asset, qty)| (*asset, *qty))
    }
}

impl FromIterator<(Asset, Decimal)> for AssetBalances {
    fn from_iter<I: IntoIterator<Item = (Asset, Decimal)>>(iter: I) -> Self {
        let mut balances = AssetBalances::new();
        for (asset, quantity) in iter {
            balances.set(asset, quantity);
        }
        balances
    }
}

impl Serialize for AssetBalances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AssetBalances {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<Asset, Decimal>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}
