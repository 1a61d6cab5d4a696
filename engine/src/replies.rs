//! Chat reply rendering.
//!
//! Replies use the chat's light markdown: `_italic_`, `**bold**` and inline
//! code spans. Wording is not part of any contract.

use std::fmt::Write;

use cryptoledger_common::{
    format_cash, format_price, Asset, ChannelId, LedgerError, PrincipalId, Side, Timestamp,
};
use cryptoledger_ledger::{Account, Fill, Loan};
use cryptoledger_oracle::Quote;
use rust_decimal::Decimal;

use crate::scheduler::{Cadence, ScheduledOrder};

pub const NOT_YOUR_ACCOUNT: &str = "**This isn't your account!**";
pub const NEEDS_ACCOUNT: &str = "_You can't use this outside an account channel!_";
pub const OUTSIDE_ACCOUNT: &str = "_Use this outside an account channel._";
pub const SAVED: &str = "**Saved!**";
const BAD_AMOUNT: &str =
    "_Expected amount to be a positive decimal number! ex._ `1`, `0.5`, `414.4859`, `0.27297441`";
const GENERIC_FAILURE: &str = "_Something went wrong and nothing was changed. Try again later._";

fn timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %I:%M %p").to_string()
}

/// Usage hint for a verb that was given the wrong arguments.
pub fn usage(prefix: &str, verb: &str) -> String {
    let p = prefix;
    match verb {
        "price" => format!("_Use it like_ `{p}price <crypto>` _ex._ `{p}price BTC` _or_ `{p}price dogecoin`"),
        "account" => format!("_Use it like_ `{p}account <name>` _ex._ `{p}account Chris` _or_ `{p}account Moon-Fund`"),
        "buy" | "sell" => format!(
            "_Use it like_ `{p}{verb} <amount> <crypto>` _ex._ `{p}{verb} 10000 DOGE` _or_ `{p}{verb} 0.27297441 ethereum`"
        ),
        "in" | "every" => format!(
            "_Use it like_ `{p}{verb} <time> <buy/sell> <amount> <crypto>` _ex._ `{p}{verb} 20m sell 10000 DOGE` _or_ `{p}{verb} 3h buy 0.27297441 ethereum`"
        ),
        "loan" => format!("_Use it like_ `{p}loan <amount>` _ex._ `{p}loan 100000` _or_ `{p}loan 0.01`"),
        "cancel" => format!("_Use it like_ `{p}cancel <order>` _ex._ `{p}cancel 3`, see `{p}orders`"),
        _ => format!("_See_ `{p}help`"),
    }
}

pub fn expected_side(verb: &str) -> String {
    format!("_Expected_ `buy` _or_ `sell` _after_ `{}`", verb)
}

/// Render a business error for the user.
pub fn error(prefix: &str, err: &LedgerError) -> String {
    match err {
        LedgerError::InvalidName(reason) => format!("_{}_", reason),
        LedgerError::NameConflict { owner, .. } => {
            format!("_It seems this account is already owned by_ {}_!_", owner.mention())
        }
        LedgerError::AccountNotFound(name) => format!("_No such account..._ `{}`", name),
        LedgerError::NotOwner { .. } => NOT_YOUR_ACCOUNT.to_string(),
        LedgerError::InvalidAmount(_) => BAD_AMOUNT.to_string(),
        LedgerError::InvalidDuration(_) => {
            format!("_Expected a time to perform transaction, see 'time' in_ `{}help`", prefix)
        }
        LedgerError::UnknownAsset(query) => format!(
            "_No such crypto..._ `{}`. _It might not be registered in the bot._",
            query
        ),
        LedgerError::InsufficientFunds { required, available } => format!(
            "_You can't afford this! You need_ `{}` _and you have_ `{}`",
            format_cash(*required),
            format_cash(*available)
        ),
        LedgerError::InsufficientBalance { asset, required, available } => format!(
            "_You can't afford this! You need_ `{}` _{} and you have_ `{}`",
            required,
            asset.symbol(),
            available
        ),
        LedgerError::PriceUnavailable { asset, .. } => format!(
            "_Couldn't get a price for_ `{}` _right now, try again._",
            asset.symbol()
        ),
        LedgerError::UnknownCommand(verb) => {
            format!("_No such command..._ `{}`\ntry `{}help`", verb, prefix)
        }
        LedgerError::UnknownOrder(id) => {
            format!("_No scheduled order_ `#{}` _on this account. See_ `{}orders`", id, prefix)
        }
        LedgerError::PersistenceFailure(_) | LedgerError::Transport(_) | LedgerError::ShuttingDown => {
            GENERIC_FAILURE.to_string()
        }
    }
}

pub fn price(quote: &Quote) -> String {
    format!("**{}**: `{}`", quote.asset.symbol(), format_price(quote.price))
}

pub fn assets() -> String {
    let mut out = String::from("_Current Coins:_\n```\n");
    let lines: Vec<String> = Asset::ALL
        .iter()
        .map(|asset| format!("{}: {}", asset.name(), asset.symbol()))
        .collect();
    out.push_str(&lines.join("\n"));
    out.push_str("```");
    out
}

pub fn owned_accounts(prefix: &str, channels: &[ChannelId]) -> String {
    if channels.is_empty() {
        return format!("_You don't have any accounts! Try:_ `{}account <name>`", prefix);
    }
    channels
        .iter()
        .map(ChannelId::mention)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn account_created(channel: ChannelId) -> String {
    format!("**ACCOUNT AND CHANNEL CREATED!** {}", channel.mention())
}

pub fn already_yours(channel: ChannelId) -> String {
    format!("_You already own this account:_ {}", channel.mention())
}

pub fn owner_ping(owner: PrincipalId) -> String {
    owner.mention()
}

pub fn trade(fill: &Fill) -> String {
    let verb = match fill.side {
        Side::Buy => "Purchasing",
        Side::Sell => "Selling",
    };
    format!(
        "_{}_ `{}` _{} for_ `{}`\n**Money:** `{}` -> `{}`",
        verb,
        fill.amount,
        fill.asset.symbol(),
        format_cash(fill.total),
        format_cash(fill.previous_money),
        format_cash(fill.new_money)
    )
}

pub fn scheduled(order: &ScheduledOrder, token: &str) -> String {
    let when = match order.cadence {
        Cadence::Once => "in",
        Cadence::Every { .. } => "every",
    };
    format!(
        "_Scheduled to_ **{} `{} {}`** _{}_ `{}` _(order_ `#{}`_)_",
        order.side.to_string().to_uppercase(),
        order.amount,
        order.asset.symbol(),
        when,
        token,
        order.id
    )
}

pub fn trades(account: &Account) -> String {
    let mut out = String::from("**All Transactions:**");
    for tx in account.transactions() {
        let verb = match tx.side {
            Side::Buy => "Bought",
            Side::Sell => "Sold",
        };
        let _ = write!(
            out,
            "\n`{}` {} `{}` _{} for_ `{}` _ea. total_ `{}` Money: `{}` to `{}`",
            timestamp(&tx.timestamp),
            verb,
            tx.amount,
            tx.asset.symbol(),
            format_price(tx.unit_price),
            format_cash(tx.total_price),
            format_cash(tx.previous_money),
            format_cash(tx.new_money)
        );
        if tx.trigger.is_automatic() {
            out.push_str(" `AUTO`");
        }
    }
    out
}

/// One held asset, valued at the current price when one could be quoted.
pub struct Holding {
    pub asset: Asset,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

pub fn balance(account: &Account, holdings: &[Holding]) -> String {
    let mut out = format!("**Account Money:** `{}`", format_cash(account.money()));
    if holdings.is_empty() {
        return out;
    }

    out.push_str("\n**Crypto Balances:**");
    let mut crypto_total = Some(Decimal::ZERO);
    let mut complete = true;
    for holding in holdings {
        let value = holding
            .unit_price
            .and_then(|unit| unit.checked_mul(holding.quantity).map(|value| (unit, value)));
        match value {
            Some((unit, value)) => {
                crypto_total = crypto_total.and_then(|total| total.checked_add(value));
                let _ = write!(
                    out,
                    "\n_{}_: `{} / 1` _USD:_ `{} / {}`",
                    holding.asset.symbol(),
                    holding.quantity,
                    format_cash(value),
                    format_price(unit)
                );
            }
            None => {
                complete = false;
                let _ = write!(
                    out,
                    "\n_{}_: `{}` _USD:_ `{}`",
                    holding.asset.symbol(),
                    holding.quantity,
                    if holding.unit_price.is_some() { "value unavailable" } else { "price unavailable" }
                );
            }
        }
    }

    let Some(crypto_total) = crypto_total else {
        out.push_str("\n**Total Cash Amount:** `value unavailable`");
        return out;
    };
    match account.money().checked_add(crypto_total) {
        Some(total) => {
            let _ = write!(out, "\n**Total Cash Amount:** `{}`", format_cash(total));
        }
        None => out.push_str("\n**Total Cash Amount:** `value unavailable`"),
    }
    if !account.money().is_zero() {
        let _ = write!(out, " _without money:_ `{}`", format_cash(crypto_total));
    }
    if !complete {
        out.push_str(" _(excluding unpriced assets)_");
    }
    out
}

pub fn loan_granted(loan: &Loan, previous: Decimal, current: Decimal) -> String {
    format!(
        "_Loan approved for_ `{}`_! Balance from_ `{}` _to_ `{}`",
        format_cash(loan.amount),
        format_cash(previous),
        format_cash(current)
    )
}

pub fn loans(prefix: &str, account: &Account) -> String {
    if account.loans().is_empty() {
        return format!(
            "_No loans taken out by this account! Try_ `{}loan 20` _to borrow $20, then try this_",
            prefix
        );
    }
    let mut out = String::from("**Loans:**\n```");
    for loan in account.loans() {
        let _ = write!(out, "\n{} -> {}", timestamp(&loan.timestamp), format_cash(loan.amount));
    }
    let _ = write!(out, "\nTotal: {}\n```", format_cash(account.total_borrowed()));
    out
}

pub fn orders(prefix: &str, orders: &[ScheduledOrder]) -> String {
    if orders.is_empty() {
        return format!(
            "_No scheduled orders. Try_ `{}in 30m buy 1 DOGE` _or_ `{}every 1d sell 0.1 ETH`",
            prefix, prefix
        );
    }
    let mut out = String::from("**Scheduled Orders:**");
    for order in orders {
        let cadence = match order.cadence {
            Cadence::Once => "once".to_string(),
            Cadence::Every { period_minutes } => format!("every {}m", period_minutes),
        };
        let _ = write!(
            out,
            "\n`#{}` {} `{} {}` {} _next_ `{}`",
            order.id,
            order.side,
            order.amount,
            order.asset.symbol(),
            cadence,
            timestamp(&order.next_fire_at)
        );
    }
    out
}

pub fn cancelled(order: &ScheduledOrder) -> String {
    format!(
        "_Cancelled order_ `#{}` _({} {} {})_",
        order.id,
        order.side,
        order.amount,
        order.asset.symbol()
    )
}

pub fn help(prefix: &str, in_account: bool) -> String {
    let p = prefix;
    let mut out = String::from("**Commands:**\n```\n");
    let _ = writeln!(out, "{p}price <crypto> - Get current price of some crypto currency.");
    let _ = writeln!(out, "{p}coins - Get all registered cryptos with this bot.");
    let _ = writeln!(out, "{p}accounts - List all of your accounts");
    if in_account {
        let _ = writeln!(out, "{p}buy <amount> <crypto> - Buy an amount of crypto using account money.");
        let _ = writeln!(out, "{p}sell <amount> <crypto> - Sell an amount of crypto from the account balance.");
        let _ = writeln!(out, "{p}in <time> <buy/sell> <amount> <crypto> - Buy/Sell after a certain amount of time (see time)");
        let _ = writeln!(out, "{p}every <time> <buy/sell> <amount> <crypto> - Buy/Sell every period of time (see time)");
        let _ = writeln!(out, "{p}orders - List scheduled orders on this account.");
        let _ = writeln!(out, "{p}cancel <order> - Cancel a scheduled order.");
        let _ = writeln!(out, "{p}balance - Show your current cash and crypto balances.");
        let _ = writeln!(out, "{p}loan <amount> - Loan a certain amount of money from the 'bank'.");
        let _ = writeln!(out, "{p}loans - List all loans taken by this account.");
        let _ = writeln!(out, "{p}trades - List all buy/sell trades performed by this account.");
    } else {
        let _ = writeln!(out, "{p}account <name> - Create a new fake crypto account with a given name");
    }
    let _ = writeln!(out, "{p}save - Save all accounts");
    let _ = writeln!(out, "{p}help - Print this message");
    if in_account {
        out.push_str("\ntime:\n");
        out.push_str("Time can be specified as an amount of minutes, hours, or days.\n");
        out.push_str("\tSome Examples:\n");
        out.push_str("\t\t'10' = 10 minutes, '2h' = 2 hours, '12h' = 12 hours\n");
        out.push_str("\t\t'30m' = 30 minutes, '5d' = 5 days, '1hour' = one hour\n");
        out.push_str("Minutes can be specified using m, ms, min, or mins\n");
        out.push_str("Hours can be specified using h, hs, hr, hrs, hour, or hours\n");
        out.push_str("Days can be specified using d, ds, day, days\n");
    }
    out.push_str("```");
    out
}
