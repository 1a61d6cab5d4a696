//! Command parsing and dispatch.

use std::sync::Arc;

use cryptoledger_common::{
    parse_amount, parse_minutes, AccountName, Asset, LedgerError, PrincipalId, Result, Side,
    Trigger,
};
use tracing::{debug, instrument, warn};

use crate::context::Context;
use crate::replies::{self, Holding};
use crate::scheduler::{Cadence, OrderRequest, SchedulerHandle};
use crate::transport::InboundMessage;

/// Why a command stopped before producing its own reply.
enum Refusal {
    Text(&'static str),
    Error(LedgerError),
}

impl From<LedgerError> for Refusal {
    fn from(err: LedgerError) -> Self {
        Refusal::Error(err)
    }
}

/// The account bound to the channel a command arrived in.
struct Bound {
    name: AccountName,
    owner: PrincipalId,
}

/// Turns inbound messages into replies.
pub struct CommandRouter {
    ctx: Arc<Context>,
    scheduler: SchedulerHandle,
}

impl CommandRouter {
    pub fn new(ctx: Arc<Context>, scheduler: SchedulerHandle) -> Self {
        Self { ctx, scheduler }
    }

    /// Handle one message. Returns the reply text, or `None` when the message
    /// is not a command.
    #[instrument(skip_all, fields(author = %msg.author, channel = %msg.channel))]
    pub async fn route(&self, msg: &InboundMessage) -> Option<String> {
        let body = msg.text.trim_start().strip_prefix(&self.ctx.config.command_prefix)?;
        let mut words = body.split_whitespace();
        let verb = words.next()?.to_lowercase();
        let args: Vec<&str> = words.collect();

        self.ctx.metrics.command_received();
        debug!(verb = %verb, args = args.len(), "Command received");

        let bound = self
            .ctx
            .directory
            .account_for_channel(msg.channel)
            .and_then(|name| {
                let entry = self.ctx.directory.entry(name.as_str())?;
                Some(Bound {
                    name,
                    owner: entry.owner,
                })
            });

        let reply = match self.dispatch(msg, &verb, &args, bound.as_ref()).await {
            Ok(text) => text,
            Err(Refusal::Text(text)) => text.to_string(),
            Err(Refusal::Error(e)) => {
                if !e.is_user_error() {
                    warn!(verb = %verb, code = e.error_code(), error = %e, "Command failed");
                }
                replies::error(self.prefix(), &e)
            }
        };
        Some(reply)
    }

    async fn dispatch(
        &self,
        msg: &InboundMessage,
        verb: &str,
        args: &[&str],
        bound: Option<&Bound>,
    ) -> std::result::Result<String, Refusal> {
        let text = match verb {
            "price" => self.price(args).await?,
            "coins" | "assets" => replies::assets(),
            "accounts" => self.accounts(msg.author),
            "account" => self.account(msg, args, bound).await?,
            "buy" | "sell" => self.trade(owned(msg, bound)?, verb, args).await?,
            "in" | "every" => self.schedule(msg, owned(msg, bound)?, verb, args).await?,
            "loan" => self.loan(owned(msg, bound)?, args).await?,
            "cancel" => self.cancel(owned(msg, bound)?, args).await?,
            "trades" => replies::trades(&self.ctx.read(&context(bound)?.name).await?),
            "loans" => replies::loans(self.prefix(), &self.ctx.read(&context(bound)?.name).await?),
            "balance" => self.balance(context(bound)?).await?,
            "orders" => {
                let orders = self.scheduler.orders_for(&context(bound)?.name).await?;
                replies::orders(self.prefix(), &orders)
            }
            "save" => {
                self.ctx.save_all().await?;
                replies::SAVED.to_string()
            }
            "help" => match bound {
                Some(b) if b.owner != msg.author => replies::NOT_YOUR_ACCOUNT.to_string(),
                _ => replies::help(self.prefix(), bound.is_some()),
            },
            other => return Err(LedgerError::UnknownCommand(other.to_string()).into()),
        };
        Ok(text)
    }

    fn prefix(&self) -> &str {
        &self.ctx.config.command_prefix
    }

    async fn price(&self, args: &[&str]) -> Result<String> {
        if args.is_empty() {
            return Ok(replies::usage(self.prefix(), "price"));
        }
        let asset = Asset::lookup(&args.join(" "))?;
        let quote = self.ctx.quote(asset).await?;
        Ok(replies::price(&quote))
    }

    fn accounts(&self, author: PrincipalId) -> String {
        let channels: Vec<_> = self
            .ctx
            .directory
            .accounts_owned_by(author)
            .into_iter()
            .map(|(_, channel)| channel)
            .collect();
        replies::owned_accounts(self.prefix(), &channels)
    }

    async fn account(
        &self,
        msg: &InboundMessage,
        args: &[&str],
        bound: Option<&Bound>,
    ) -> Result<String> {
        if bound.is_some() {
            return Ok(replies::OUTSIDE_ACCOUNT.to_string());
        }
        if args.is_empty() {
            return Ok(replies::usage(self.prefix(), "account"));
        }
        // A name with spaces is rejected by validation, not treated as missing.
        let name = args.join(" ");
        let name = name.as_str();

        if let Some(entry) = self.ctx.directory.entry(name) {
            if entry.owner != msg.author {
                return Err(LedgerError::NameConflict {
                    name: name.to_string(),
                    owner: entry.owner,
                });
            }
            self.ctx
                .transport
                .send(entry.channel, &replies::owner_ping(entry.owner))
                .await?;
            return Ok(replies::already_yours(entry.channel));
        }

        let channel = self.ctx.create_account(name, msg.author).await?;
        Ok(replies::account_created(channel))
    }

    async fn trade(&self, bound: &Bound, verb: &str, args: &[&str]) -> Result<String> {
        let Some((amount, asset)) = split_order(args) else {
            return Ok(replies::usage(self.prefix(), verb));
        };
        let side = if verb == "buy" { Side::Buy } else { Side::Sell };
        let amount = parse_amount(amount)?;
        let asset = Asset::lookup(&asset)?;

        let outcome = self
            .ctx
            .execute_trade(&bound.name, asset, amount, side, Trigger::Manual)
            .await?;
        Ok(replies::trade(&outcome.fill))
    }

    async fn schedule(
        &self,
        msg: &InboundMessage,
        bound: &Bound,
        verb: &str,
        args: &[&str],
    ) -> Result<String> {
        let [token, side, rest @ ..] = args else {
            return Ok(replies::usage(self.prefix(), verb));
        };
        let Some((amount, asset)) = split_order(rest) else {
            return Ok(replies::usage(self.prefix(), verb));
        };

        let minutes = parse_minutes(token)?;
        let Some(side) = Side::parse(side) else {
            return Ok(replies::expected_side(verb));
        };
        let amount = parse_amount(amount)?;
        let asset = Asset::lookup(&asset)?;

        let cadence = match verb {
            "every" => Cadence::Every {
                period_minutes: minutes,
            },
            _ => Cadence::Once,
        };
        let order = self
            .scheduler
            .schedule(OrderRequest {
                account: bound.name.clone(),
                asset,
                amount,
                side,
                origin: msg.reference(),
                cadence,
                delay_minutes: minutes,
            })
            .await?;
        Ok(replies::scheduled(&order, token))
    }

    async fn loan(&self, bound: &Bound, args: &[&str]) -> Result<String> {
        let [amount] = args else {
            return Ok(replies::usage(self.prefix(), "loan"));
        };
        let amount = parse_amount(amount)?;
        let outcome = self.ctx.grant_loan(&bound.name, amount).await?;
        Ok(replies::loan_granted(
            &outcome.loan,
            outcome.previous_money,
            outcome.new_money,
        ))
    }

    async fn cancel(&self, bound: &Bound, args: &[&str]) -> Result<String> {
        let id = match args {
            [id] => id.trim_start_matches('#').parse::<u64>().ok(),
            _ => None,
        };
        let Some(id) = id else {
            return Ok(replies::usage(self.prefix(), "cancel"));
        };
        let order = self.scheduler.cancel(&bound.name, id).await?;
        Ok(replies::cancelled(&order))
    }

    async fn balance(&self, bound: &Bound) -> Result<String> {
        let account = self.ctx.read(&bound.name).await?;
        let mut holdings = Vec::with_capacity(account.balances().len());
        for (asset, quantity) in account.balances().iter() {
            let unit_price = self.ctx.quote(asset).await.ok().map(|q| q.price);
            holdings.push(Holding {
                asset,
                quantity,
                unit_price,
            });
        }
        Ok(replies::balance(&account, &holdings))
    }
}

/// The bound account, for commands that only read it.
fn context(bound: Option<&Bound>) -> std::result::Result<&Bound, Refusal> {
    bound.ok_or(Refusal::Text(replies::NEEDS_ACCOUNT))
}

/// The bound account, if the author owns it.
fn owned<'a>(msg: &InboundMessage, bound: Option<&'a Bound>) -> std::result::Result<&'a Bound, Refusal> {
    let bound = context(bound)?;
    if bound.owner != msg.author {
        return Err(LedgerError::NotOwner {
            account: bound.name.to_string(),
            principal: msg.author,
        }
        .into());
    }
    Ok(bound)
}

/// Split `<amount> <asset words...>`. Multi-word asset names are joined.
fn split_order<'a>(args: &[&'a str]) -> Option<(&'a str, String)> {
    match args {
        [amount, asset @ ..] if !asset.is_empty() => Some((*amount, asset.join(" "))),
        _ => None,
    }
}
