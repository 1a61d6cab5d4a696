//! Pure trade and loan computation.

use cryptoledger_common::{
    buy_total, loan_principal, now, sell_total, Asset, LedgerError, Result, Side, Trigger,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::account::Account;
use crate::journal::{Loan, Transaction};

/// An accepted trade, not yet applied to the account it was priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub asset: Asset,
    pub side: Side,
    pub amount: Decimal,
    pub unit_price: Decimal,
    /// Cash that changes hands, already rounded.
    pub total: Decimal,
    pub previous_money: Decimal,
    pub new_money: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
}

/// Computes trade outcomes and loan grants.
///
/// The engine never performs I/O and never keeps state. Callers serialize
/// access to an account and persist it after [`TransactionEngine::apply`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionEngine;

impl TransactionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Price a trade against the account's current state.
    ///
    /// Buys round the total up to the cent and sells round it down, so the
    /// account never gains from rounding. There are no partial fills.
    pub fn attempt(
        &self,
        account: &Account,
        asset: Asset,
        amount: Decimal,
        side: Side,
        unit_price: Decimal,
    ) -> Result<Fill> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        if unit_price < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!("negative price {}", unit_price)));
        }

        let previous_money = account.money();
        let previous_balance = account.balance(asset);

        let (total, new_money, new_balance) = match side {
            Side::Buy => {
                let total = buy_total(unit_price, amount)?;
                let new_money = previous_money - total;
                if new_money < Decimal::ZERO {
                    return Err(LedgerError::InsufficientFunds {
                        required: total,
                        available: previous_money,
                    });
                }
                let new_balance = previous_balance
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::InvalidAmount(amount.to_string()))?;
                (total, new_money, new_balance)
            }
            Side::Sell => {
                let new_balance = previous_balance - amount;
                if new_balance < Decimal::ZERO {
                    return Err(LedgerError::InsufficientBalance {
                        asset,
                        required: amount,
                        available: previous_balance,
                    });
                }
                let total = sell_total(unit_price, amount)?;
                let new_money = previous_money
                    .checked_add(total)
                    .ok_or_else(|| LedgerError::InvalidAmount(total.to_string()))?;
                (total, new_money, new_balance)
            }
        };

        Ok(Fill {
            asset,
            side,
            amount,
            unit_price,
            total,
            previous_money,
            new_money,
            previous_balance,
            new_balance,
        })
    }

    /// Commit a fill: update cash and balance together and append the audit
    /// record.
    pub fn apply(&self, account: &mut Account, fill: &Fill, trigger: Trigger) -> Transaction {
        account.set_money(fill.new_money);
        account.set_balance(fill.asset, fill.new_balance);

        let transaction = Transaction {
            timestamp: now(),
            previous_money: fill.previous_money,
            new_money: account.money(),
            total_price: fill.total,
            previous_balance: fill.previous_balance,
            new_balance: account.balance(fill.asset),
            amount: fill.amount,
            unit_price: fill.unit_price,
            asset: fill.asset,
            side: fill.side,
            trigger,
        };
        account.record(transaction.clone());

        debug!(
            account = %account.name,
            asset = %fill.asset,
            side = %fill.side,
            total = %fill.total,
            "Fill applied"
        );
        transaction
    }

    /// Grant a loan. The amount is rounded half-up to the cent and must stay
    /// positive after rounding.
    pub fn grant_loan(&self, account: &mut Account, amount: Decimal) -> Result<Loan> {
        let principal = loan_principal(amount);
        if principal <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        let new_money = account
            .money()
            .checked_add(principal)
            .ok_or_else(|| LedgerError::InvalidAmount(amount.to_string()))?;

        account.set_money(new_money);
        Ok(account.add_loan(Loan {
            timestamp: now(),
            amount: principal,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptoledger_common::{AccountName, ChannelId, PrincipalId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn account(name: &str) -> Account {
        Account::new(
            AccountName::parse(name).unwrap(),
            PrincipalId::new(1),
            ChannelId::new(2),
        )
    }

    #[test]
    fn test_alice_loan_then_buy() {
        let engine = TransactionEngine::new();
        let mut alice = account("alice");

        let loan = engine.grant_loan(&mut alice, dec!(1000)).unwrap();
        assert_eq!(loan.amount, dec!(1000.00));
        assert_eq!(alice.money(), dec!(1000.00));

        let fill = engine
            .attempt(&alice, Asset::Bitcoin, dec!(0.001), Side::Buy, dec!(30000))
            .unwrap();
        let tx = engine.apply(&mut alice, &fill, Trigger::Manual);

        assert_eq!(alice.money().to_string(), "970.00");
        assert_eq!(alice.balance(Asset::Bitcoin), dec!(0.001));
        assert_eq!(tx.total_price, dec!(30.00));
        assert_eq!(tx.previous_money, dec!(1000.00));
        assert_eq!(alice.transactions().len(), 1);
        assert_eq!(alice.loans().len(), 1);
    }

    #[test]
    fn test_buy_rounds_up_sell_rounds_down() {
        let engine = TransactionEngine::new();
        let mut acct = account("rounding");
        acct.set_money(dec!(100));
        acct.set_balance(Asset::Ethereum, dec!(1));

        let buy = engine
            .attempt(&acct, Asset::Ethereum, dec!(1), Side::Buy, dec!(10.001))
            .unwrap();
        assert_eq!(buy.total, dec!(10.01));

        let sell = engine
            .attempt(&acct, Asset::Ethereum, dec!(1), Side::Sell, dec!(10.009))
            .unwrap();
        assert_eq!(sell.total, dec!(10.00));
    }

    #[test]
    fn test_buy_rejected_without_funds() {
        let engine = TransactionEngine::new();
        let mut acct = account("poor");
        acct.set_money(dec!(29.99));

        let err = engine
            .attempt(&acct, Asset::Bitcoin, dec!(0.001), Side::Buy, dec!(30000))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(acct.money(), dec!(29.99));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn test_sell_rejected_without_balance() {
        let engine = TransactionEngine::new();
        let mut acct = account("seller");
        acct.set_balance(Asset::Bitcoin, dec!(0.5));

        let err = engine
            .attempt(&acct, Asset::Bitcoin, dec!(1), Side::Sell, dec!(30000))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_selling_everything_clears_balance() {
        let engine = TransactionEngine::new();
        let mut acct = account("clear");
        acct.set_balance(Asset::Solana, dec!(2));

        let fill = engine
            .attempt(&acct, Asset::Solana, dec!(2), Side::Sell, dec!(50))
            .unwrap();
        engine.apply(&mut acct, &fill, Trigger::Scheduled);

        assert!(!acct.has_balances());
        assert_eq!(acct.money(), dec!(100.00));
        assert!(acct.transactions()[0].trigger.is_automatic());
    }

    #[test]
    fn test_loan_rounds_half_up() {
        let engine = TransactionEngine::new();
        let mut acct = account("borrower");

        let loan = engine.grant_loan(&mut acct, dec!(0.005)).unwrap();
        assert_eq!(loan.amount, dec!(0.01));

        let err = engine.grant_loan(&mut acct, dec!(0.004)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(acct.loans().len(), 1);
    }

    #[test]
    fn test_back_to_back_loans_keep_distinct_keys() {
        let engine = TransactionEngine::new();
        let mut acct = account("burst");
        for _ in 0..5 {
            engine.grant_loan(&mut acct, dec!(1)).unwrap();
        }

        let text = serde_json::to_string(&acct).unwrap();
        let restored: Account = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.loans().len(), 5);
        assert_eq!(restored.total_borrowed(), dec!(5.00));
        assert_eq!(restored.money(), dec!(5.00));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let engine = TransactionEngine::new();
        let acct = account("zero");
        assert!(engine
            .attempt(&acct, Asset::Bitcoin, Decimal::ZERO, Side::Buy, dec!(1))
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_buy_then_sell_loses_at_most_two_cents(
            cents in 1_000i64..100_000_000,
            price_millis in 1i64..10_000_000,
            amount_micros in 1i64..10_000_000,
        ) {
            let engine = TransactionEngine::new();
            let mut acct = account("roundtrip");
            let start = Decimal::new(cents, 2);
            acct.set_money(start);
            let price = Decimal::new(price_millis, 3);
            let amount = Decimal::new(amount_micros, 6);

            if let Ok(buy) = engine.attempt(&acct, Asset::Bitcoin, amount, Side::Buy, price) {
                engine.apply(&mut acct, &buy, Trigger::Manual);
                prop_assert!(acct.money() >= Decimal::ZERO);

                let sell = engine
                    .attempt(&acct, Asset::Bitcoin, amount, Side::Sell, price)
                    .unwrap();
                engine.apply(&mut acct, &sell, Trigger::Manual);

                prop_assert!(!acct.has_balances());
                prop_assert!(acct.money() <= start);
                prop_assert!(start - acct.money() <= dec!(0.02));
            }
        }
    }
}
