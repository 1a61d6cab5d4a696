//! Audit records: executed trades and granted loans.

use cryptoledger_common::{side_flag, trigger_flag, Asset, Side, Timestamp, Trigger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable record of one completed buy or sell.
///
/// Field names are kept short because every account file carries its full
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// When the trade executed.
    #[serde(rename = "ts", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    /// Cash before the trade.
    #[serde(rename = "pm")]
    pub previous_money: Decimal,
    /// Cash after the trade.
    #[serde(rename = "nm")]
    pub new_money: Decimal,
    /// Total cash that changed hands.
    #[serde(rename = "p")]
    pub total_price: Decimal,
    /// Asset balance before the trade.
    #[serde(rename = "pb")]
    pub previous_balance: Decimal,
    /// Asset balance after the trade.
    #[serde(rename = "nb")]
    pub new_balance: Decimal,
    /// Quantity traded.
    #[serde(rename = "amt")]
    pub amount: Decimal,
    /// Quoted unit price.
    #[serde(rename = "up")]
    pub unit_price: Decimal,
    #[serde(rename = "c")]
    pub asset: Asset,
    #[serde(rename = "b", with = "side_flag")]
    pub side: Side,
    #[serde(rename = "a", with = "trigger_flag")]
    pub trigger: Trigger,
}

impl Transaction {
    /// Cash delta of this trade: negative for a buy.
    pub fn cash_delta(&self) -> Decimal {
        self.new_money - self.previous_money
    }
}

/// A loan granted to an account. Loans are never repaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loan {
    pub timestamp: Timestamp,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptoledger_common::from_epoch_millis;
    use rust_decimal_macros::dec;

    fn sample() -> Transaction {
        Transaction {
            timestamp: from_epoch_millis(1_650_000_000_123).unwrap(),
            previous_money: dec!(1000.00),
            new_money: dec!(970.00),
            total_price: dec!(30.00),
            previous_balance: Decimal::ZERO,
            new_balance: dec!(0.001),
            amount: dec!(0.001),
            unit_price: dec!(30000),
            asset: Asset::Bitcoin,
            side: Side::Buy,
            trigger: Trigger::Manual,
        }
    }

    #[test]
    fn test_transaction_uses_compact_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ts"], 1_650_000_000_123i64);
        assert_eq!(json["pm"], "1000.00");
        assert_eq!(json["c"], "BTC");
        assert_eq!(json["b"], true);
        assert_eq!(json["a"], false);
    }

    #[test]
    fn test_transaction_decodes_compact_keys() {
        let decoded: Transaction = serde_json::from_str(
            r#"{"ts":1650000000123,"pm":"1000.00","nm":"970.00","p":"30.00",
                "pb":"0","nb":"0.001","amt":"0.001","up":"30000","c":"BTC",
                "b":true,"a":false}"#,
        )
        .unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(decoded.cash_delta(), dec!(-30.00));
    }
}
