//! Trade side and trigger origin.

use std::fmt;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse `buy` or `sell`, ignoring case.
    pub fn parse(input: &str) -> Option<Side> {
        if input.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if input.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn is_buy(self) -> bool {
        self == Side::Buy
    }

    pub fn from_buy_flag(buy: bool) -> Self {
        if buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// What caused a trade to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Issued directly by the account owner.
    Manual,
    /// Fired by the scheduler.
    Scheduled,
}

impl Trigger {
    pub fn is_automatic(self) -> bool {
        self == Trigger::Scheduled
    }

    pub fn from_automatic_flag(automatic: bool) -> Self {
        if automatic {
            Trigger::Scheduled
        } else {
            Trigger::Manual
        }
    }
}

/// Serde adapter storing a [`Side`] as a `buy` boolean.
pub mod side_flag {
    use super::Side;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(side: &Side, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(side.is_buy())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Side, D::Error> {
        bool::deserialize(deserializer).map(Side::from_buy_flag)
    }
}

/// Serde adapter storing a [`Trigger`] as an `automatic` boolean.
pub mod trigger_flag {
    use super::Trigger;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(trigger: &Trigger, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(trigger.is_automatic())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Trigger, D::Error> {
        bool::deserialize(deserializer).map(Trigger::from_automatic_flag)
    }
}
