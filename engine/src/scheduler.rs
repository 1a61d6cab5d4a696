//! Delayed and recurring orders.
//!
//! A single task owns the order book. Handles talk to it over a bounded
//! channel. Due orders run on their own tasks, so a slow quote or a held
//! account lock never delays commands for other accounts. Periodic orders run
//! at a fixed rate: each deadline is the previous deadline plus the period,
//! regardless of how long a firing took.
//!
//! When persistence is enabled the book is written to `_schedules.json` after
//! every change and restored at startup. An order whose fire time passed while
//! the process was down fires once immediately.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cryptoledger_common::{
    minutes, now, AccountName, Asset, LedgerError, MessageRef, Result, Side, Timestamp, Trigger,
};
use cryptoledger_ledger::write_json_atomic;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::replies;

/// File holding the persisted order book. The underscore keeps it apart from
/// account files.
pub const SCHEDULE_FILE: &str = "_schedules.json";

pub type OrderId = u64;

/// How often an order fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    Once,
    Every { period_minutes: u64 },
}

/// A pending order as listed to users and stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    pub id: OrderId,
    pub account: AccountName,
    pub asset: Asset,
    pub amount: Decimal,
    #[serde(with = "cryptoledger_common::side_flag", rename = "buy")]
    pub side: Side,
    /// Message that created the order; firings reply to it.
    pub origin: MessageRef,
    pub cadence: Cadence,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub next_fire_at: Timestamp,
}

/// What a caller asks the scheduler to register.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub account: AccountName,
    pub asset: Asset,
    pub amount: Decimal,
    pub side: Side,
    pub origin: MessageRef,
    pub cadence: Cadence,
    /// Minutes until the first firing.
    pub delay_minutes: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleBook {
    next_id: OrderId,
    orders: Vec<ScheduledOrder>,
}

enum SchedulerCommand {
    Schedule {
        request: OrderRequest,
        reply: oneshot::Sender<ScheduledOrder>,
    },
    Cancel {
        account: AccountName,
        id: OrderId,
        reply: oneshot::Sender<Result<ScheduledOrder>>,
    },
    List {
        account: AccountName,
        reply: oneshot::Sender<Vec<ScheduledOrder>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the scheduler task.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Register an order. Fails only when the scheduler has stopped.
    pub async fn schedule(&self, request: OrderRequest) -> Result<ScheduledOrder> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Schedule { request, reply }).await?;
        rx.await.map_err(|_| LedgerError::ShuttingDown)
    }

    /// Remove a pending order of `account`.
    pub async fn cancel(&self, account: &AccountName, id: OrderId) -> Result<ScheduledOrder> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Cancel {
            account: account.clone(),
            id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LedgerError::ShuttingDown)?
    }

    /// Pending orders of `account`, by id.
    pub async fn orders_for(&self, account: &AccountName) -> Result<Vec<ScheduledOrder>> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::List {
            account: account.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| LedgerError::ShuttingDown)
    }

    /// Stop firing, flush the book and wait for the task to acknowledge.
    /// In-flight firings complete first.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Shutdown { reply }).await?;
        rx.await.map_err(|_| LedgerError::ShuttingDown)
    }

    async fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| LedgerError::ShuttingDown)
    }
}

struct Pending {
    order: ScheduledOrder,
    deadline: Instant,
}

/// The scheduler task state.
pub struct Scheduler {
    ctx: Arc<Context>,
    path: Option<PathBuf>,
    next_id: OrderId,
    book: BTreeMap<OrderId, Pending>,
    /// Deadlines in firing order. Entries whose order was cancelled or
    /// rescheduled are skipped when popped.
    queue: BinaryHeap<Reverse<(Instant, OrderId)>>,
    /// Firings in progress.
    firings: JoinSet<()>,
}

impl Scheduler {
    /// Restore the persisted book (if enabled) and spawn the scheduler task.
    pub fn spawn(ctx: Arc<Context>, config: &SchedulerConfig) -> Result<(SchedulerHandle, JoinHandle<()>)> {
        let path = config
            .persist
            .then(|| ctx.directory.root().join(SCHEDULE_FILE));

        let mut scheduler = Scheduler {
            ctx,
            path,
            next_id: 1,
            book: BTreeMap::new(),
            queue: BinaryHeap::new(),
            firings: JoinSet::new(),
        };
        scheduler.restore()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let task = tokio::spawn(scheduler.run(rx));
        Ok((SchedulerHandle { tx }, task))
    }

    fn restore(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let book: ScheduleBook = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let wall_now = now();
        let start = Instant::now();
        self.next_id = book.next_id.max(1);
        for mut order in book.orders {
            if !self.ctx.directory.contains(order.account.as_str()) {
                warn!(order = order.id, account = %order.account, "Dropping order for unknown account");
                continue;
            }
            let deadline = match (order.next_fire_at - wall_now).to_std() {
                Ok(remaining) => start + remaining,
                Err(_) => {
                    order.next_fire_at = wall_now;
                    start
                }
            };
            self.next_id = self.next_id.max(order.id + 1);
            self.insert(order, deadline);
        }

        info!(orders = self.book.len(), "Scheduled orders restored");
        Ok(())
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SchedulerCommand>) {
        loop {
            let next = self.queue.peek().map(|Reverse((deadline, _))| *deadline);

            tokio::select! {
                command = rx.recv() => match command {
                    Some(SchedulerCommand::Shutdown { reply }) => {
                        self.drain().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.drain().await;
                        break;
                    }
                },
                _ = sleep_until(next.unwrap_or_else(far_future)), if next.is_some() => {
                    self.dispatch_due();
                }
                Some(joined) = self.firings.join_next(), if !self.firings.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Scheduled firing task failed");
                    }
                }
            }
        }
        info!("Scheduler stopped");
    }

    /// Wait for in-flight firings, then flush the book.
    async fn drain(&mut self) {
        while let Some(joined) = self.firings.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Scheduled firing task failed");
            }
        }
        self.persist();
    }

    fn handle(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Schedule { request, reply } => {
                let order = self.register(request);
                let _ = reply.send(order);
            }
            SchedulerCommand::Cancel { account, id, reply } => {
                let result = match self.book.get(&id) {
                    Some(pending) if pending.order.account.key() == account.key() => {
                        let removed = self.book.remove(&id).map(|p| p.order);
                        self.persist();
                        removed.ok_or(LedgerError::UnknownOrder(id))
                    }
                    _ => Err(LedgerError::UnknownOrder(id)),
                };
                if let Ok(order) = &result {
                    info!(order = order.id, account = %order.account, "Scheduled order cancelled");
                }
                let _ = reply.send(result);
            }
            SchedulerCommand::List { account, reply } => {
                let orders = self
                    .book
                    .values()
                    .filter(|p| p.order.account.key() == account.key())
                    .map(|p| p.order.clone())
                    .collect();
                let _ = reply.send(orders);
            }
            // Served by the run loop.
            SchedulerCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn register(&mut self, request: OrderRequest) -> ScheduledOrder {
        let id = self.next_id;
        self.next_id += 1;

        let delay = minutes(request.delay_minutes);
        let order = ScheduledOrder {
            id,
            account: request.account,
            asset: request.asset,
            amount: request.amount,
            side: request.side,
            origin: request.origin,
            cadence: request.cadence,
            next_fire_at: now() + wall_duration(delay),
        };

        info!(
            order = id,
            account = %order.account,
            asset = %order.asset,
            side = %order.side,
            delay_minutes = request.delay_minutes,
            "Order scheduled"
        );

        self.insert(order.clone(), Instant::now() + delay);
        self.persist();
        order
    }

    fn insert(&mut self, order: ScheduledOrder, deadline: Instant) {
        self.queue.push(Reverse((deadline, order.id)));
        self.book.insert(order.id, Pending { order, deadline });
    }

    /// Start a firing for every order whose deadline has passed, earliest
    /// first. One-shot orders leave the book and periodic ones are re-armed
    /// before their firing runs.
    fn dispatch_due(&mut self) {
        let mut changed = false;
        while let Some(Reverse((deadline, id))) = self.queue.peek().copied() {
            if deadline > Instant::now() {
                break;
            }
            self.queue.pop();

            let order = match self.book.get(&id) {
                Some(pending) if pending.deadline == deadline => pending.order.clone(),
                _ => continue,
            };

            match order.cadence {
                Cadence::Once => {
                    self.book.remove(&id);
                }
                Cadence::Every { period_minutes } => {
                    let period = minutes(period_minutes);
                    let mut next = order.clone();
                    next.next_fire_at = next.next_fire_at + wall_duration(period);
                    self.insert(next, deadline + period);
                }
            }
            changed = true;

            self.firings.spawn(fire(self.ctx.clone(), order));
        }
        if changed {
            self.persist();
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let book = ScheduleBook {
            next_id: self.next_id,
            orders: self.book.values().map(|p| p.order.clone()).collect(),
        };
        if let Err(e) = write_json_atomic(path, &book) {
            self.ctx.metrics.persistence_failure();
            error!(error = %e, "Saving scheduled orders failed");
        }
    }
}

#[instrument(skip_all, fields(order = order.id, account = %order.account))]
async fn fire(ctx: Arc<Context>, order: ScheduledOrder) {
    ctx.metrics.order_fired();
    debug!(asset = %order.asset, side = %order.side, "Firing scheduled order");

    let text = match ctx
        .execute_trade(&order.account, order.asset, order.amount, order.side, Trigger::Scheduled)
        .await
    {
        Ok(outcome) => replies::trade(&outcome.fill),
        Err(e) => replies::error(&ctx.config.command_prefix, &e),
    };

    if let Err(e) = ctx.transport.reply(&order.origin, &text).await {
        warn!(error = %e, "Could not deliver scheduled order result");
    }
}

fn wall_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}
