//! The closed catalog of tradable assets.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

macro_rules! catalog {
    ($($variant:ident => ($symbol:literal, $name:literal)),+ $(,)?) => {
        /// A tradable asset.
        ///
        /// Variants are declared in catalog order, which is also the iteration
        /// order of balance maps keyed by `Asset`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Asset {
            $($variant),+
        }

        impl Asset {
            /// Every asset, in catalog order.
            pub const ALL: &'static [Asset] = &[$(Asset::$variant),+];

            /// Canonical ticker symbol.
            pub fn symbol(self) -> &'static str {
                match self {
                    $(Asset::$variant => $symbol),+
                }
            }

            /// Lower-case display name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Asset::$variant => $name),+
                }
            }
        }
    };
}

catalog! {
    Bitcoin => ("BTC", "bitcoin"),
    Ethereum => ("ETH", "ethereum"),
    Terra => ("LUNA", "terra"),
    BinanceCoin => ("BNB", "binance coin"),
    Solana => ("SOL", "solana"),
    Xrp => ("XRP", "xrp"),
    Avalanche => ("AVAX", "avalanche"),
    Busd => ("BUSD", "busd"),
    ShibaInu => ("SHIB", "shiba inu"),
    Cardano => ("ADA", "cardano"),
    Cosmos => ("ATOM", "cosmos"),
    Tether => ("USDT", "tether"),
    Polkadot => ("DOT", "polkadot"),
    Fantom => ("FTM", "fantom"),
    Waves => ("WAVES", "waves"),
    Near => ("NEAR", "near"),
    Polygon => ("MATIC", "polygon"),
    Uma => ("UMA", "uma"),
    Chainlink => ("LINK", "chainlink"),
    TheSandbox => ("SAND", "the sandbox"),
    Litecoin => ("LTC", "litecoin"),
    Dogecoin => ("DOGE", "dogecoin"),
    Decentraland => ("MANA", "decentraland"),
    UsdCoin => ("USDC", "usd coin"),
    AxieInfinityShards => ("AXS", "axie infinity shards"),
    Tron => ("TRX", "tron"),
    Theta => ("THETA", "theta"),
    TerraUsd => ("UST", "terrausd"),
    KyberNetwork => ("KNC", "kyber network"),
    Filecoin => ("FIL", "filecoin"),
    Stellar => ("XLM", "stellar"),
    EthereumClassic => ("ETC", "ethereum classic"),
    Algorand => ("ALGO", "algorand"),
    BitcoinCash => ("BCH", "bitcoin cash"),
}

impl Asset {
    /// Find an asset by its exact canonical symbol.
    pub fn from_symbol(symbol: &str) -> Option<Asset> {
        Self::ALL.iter().copied().find(|a| a.symbol() == symbol)
    }

    /// Resolve user input to an asset.
    ///
    /// Display names win over symbols. Both comparisons ignore case, and
    /// underscores in the input are treated as spaces.
    pub fn lookup(query: &str) -> Result<Asset, LedgerError> {
        let wanted = query.trim().replace('_', " ").to_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == wanted)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|a| a.symbol().eq_ignore_ascii_case(query.trim()))
            })
            .ok_or_else(|| LedgerError::UnknownAsset(query.trim().to_string()))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Asset::lookup(s)
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        Asset::from_symbol(&symbol)
            .ok_or_else(|| de::Error::custom(format!("unknown asset symbol: {}", symbol)))
    }
}
