//! The per-account ledger.

use cryptoledger_common::{floor_cash, AccountName, Asset, ChannelId, PrincipalId};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::balance::AssetBalances;
use crate::journal::{Loan, Transaction};

/// One account's financial state: cash, asset holdings, loans and trade history.
///
/// Cash is always held at two decimal places, floored on assignment. Loans and
/// transactions are append-only; only this crate appends to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Principal that created the account.
    pub owner: PrincipalId,
    /// Channel bound to the account.
    pub channel: ChannelId,
    /// Account name, fixed at creation.
    pub name: AccountName,
    #[serde(default = "zero_cash", deserialize_with = "deserialize_cash")]
    money: Decimal,
    #[serde(default, skip_serializing_if = "AssetBalances::is_empty")]
    balances: AssetBalances,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "loan_map")]
    loans: Vec<Loan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    transactions: Vec<Transaction>,
}

impl Account {
    /// Create an empty account with no cash.
    pub fn new(name: AccountName, owner: PrincipalId, channel: ChannelId) -> Self {
        Self {
            owner,
            channel,
            name,
            money: zero_cash(),
            balances: AssetBalances::new(),
            loans: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn money(&self) -> Decimal {
        self.money
    }

    /// Set cash, floored to two decimal places.
    pub fn set_money(&mut self, money: Decimal) {
        self.money = floor_cash(money);
    }

    /// Quantity of `asset` held, zero if none.
    pub fn balance(&self, asset: Asset) -> Decimal {
        self.balances.get(asset)
    }

    /// Set the quantity of `asset` held. Zero removes the entry.
    pub fn set_balance(&mut self, asset: Asset, quantity: Decimal) {
        self.balances.set(asset, quantity);
    }

    /// Whether the account holds any asset at all.
    pub fn has_balances(&self) -> bool {
        !self.balances.is_empty()
    }

    pub fn balances(&self) -> &AssetBalances {
        &self.balances
    }

    /// Loans in the order they were granted.
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    /// Sum of every loan ever granted.
    pub fn total_borrowed(&self) -> Decimal {
        self.loans.iter().map(|loan| loan.amount).sum()
    }

    /// Trades in execution order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Append a loan. Loans are keyed by grant millisecond on disk, so a grant
    /// at or before the latest one is moved one millisecond past it.
    pub(crate) fn add_loan(&mut self, mut loan: Loan) -> Loan {
        if let Some(latest) = self.loans.iter().map(|l| l.timestamp).max() {
            if loan.timestamp <= latest {
                loan.timestamp = latest + chrono::Duration::milliseconds(1);
            }
        }
        self.loans.push(loan);
        loan
    }

    pub(crate) fn record(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }
}

fn zero_cash() -> Decimal {
    floor_cash(Decimal::ZERO)
}

fn deserialize_cash<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    <Decimal as Deserialize>::deserialize(deserializer).map(floor_cash)
}

/// Loans are stored as an object keyed by epoch-millis grant time. Key order
/// is grant order.
mod loan_map {
    use std::fmt;

    use cryptoledger_common::{epoch_millis, from_epoch_millis};
    use rust_decimal::Decimal;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use crate::journal::Loan;

    pub fn serialize<S: Serializer>(loans: &[Loan], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(loans.len()))?;
        for loan in loans {
            map.serialize_entry(&epoch_millis(loan.timestamp).to_string(), &loan.amount)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Loan>, D::Error> {
        deserializer.deserialize_map(LoanVisitor)
    }

    struct LoanVisitor;

    impl<'de> Visitor<'de> for LoanVisitor {
        type Value = Vec<Loan>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of epoch milliseconds to loan amounts")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut loans = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, amount)) = access.next_entry::<String, Decimal>()? {
                let timestamp = key
                    .parse::<i64>()
                    .ok()
                    .and_then(from_epoch_millis)
                    .ok_or_else(|| de::Error::custom(format!("invalid loan timestamp: {}", key)))?;
                loans.push(Loan { timestamp, amount });
            }
            Ok(loans)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptoledger_common::from_epoch_millis;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account::new(
            AccountName::parse("alice").unwrap(),
            PrincipalId::new(42),
            ChannelId::new(7),
        )
    }

    #[test]
    fn test_new_account_is_empty() {
        let account = account();
        assert_eq!(account.money().to_string(), "0.00");
        assert!(!account.has_balances());
        assert!(account.loans().is_empty());
        assert!(account.transactions().is_empty());
    }

    #[test]
    fn test_money_is_floored() {
        let mut account = account();
        account.set_money(dec!(10.999));
        assert_eq!(account.money().to_string(), "10.99");
        account.set_money(dec!(5));
        assert_eq!(account.money().to_string(), "5.00");
    }

    #[test]
    fn test_empty_collections_are_omitted() {
        let json = serde_json::to_value(account()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object["money"], "0.00");
        assert!(!object.contains_key("balances"));
        assert!(!object.contains_key("loans"));
        assert!(!object.contains_key("transactions"));
    }

    #[test]
    fn test_loans_keep_grant_order() {
        let mut account = account();
        let later = from_epoch_millis(1_700_000_000_000).unwrap();
        let earlier = from_epoch_millis(1_600_000_000_000).unwrap();
        account.add_loan(Loan { timestamp: later, amount: dec!(10.00) });
        account.add_loan(Loan { timestamp: earlier, amount: dec!(20.00) });

        let text = serde_json::to_string(&account).unwrap();
        let restored: Account = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.loans(), account.loans());
        assert_eq!(restored.total_borrowed(), dec!(30.00));
    }

    #[test]
    fn test_same_millisecond_loans_survive_save() {
        let mut account = account();
        let at = from_epoch_millis(1_700_000_000_000).unwrap();
        let first = account.add_loan(Loan { timestamp: at, amount: dec!(5.00) });
        let second = account.add_loan(Loan { timestamp: at, amount: dec!(7.00) });
        assert_eq!(first.timestamp, at);
        assert!(second.timestamp > first.timestamp);

        let text = serde_json::to_string(&account).unwrap();
        let restored: Account = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.loans().len(), 2);
        assert_eq!(restored.total_borrowed(), dec!(12.00));
    }

    #[test]
    fn test_fractional_cash_round_trips() {
        let mut account = account();
        account.set_money(dec!(1234.56));
        account.set_balance(Asset::Bitcoin, dec!(0.5));

        let text = serde_json::to_string(&account).unwrap();
        assert!(text.contains(r#""money":"1234.56""#));
        let restored: Account = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.money().to_string(), "1234.56");
        assert_eq!(restored, account);
    }

    #[test]
    fn test_legacy_money_is_floored_on_load() {
        let restored: Account = serde_json::from_str(
            r#"{"owner":1,"channel":2,"name":"bob","money":"12.345"}"#,
        )
        .unwrap();
        assert_eq!(restored.money().to_string(), "12.34");
        assert!(!restored.has_balances());
    }
}
