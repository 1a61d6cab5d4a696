//! CryptoLedger Engine
//!
//! Chat-driven paper trading: commands arrive through a [`Transport`], are
//! parsed by the [`CommandRouter`], and mutate per-account ledgers under a
//! per-account lock. Delayed and recurring orders run on the [`Scheduler`].

pub mod config;
pub mod context;
pub mod engine;
pub mod lock_manager;
pub mod metrics;
pub mod replies;
pub mod router;
pub mod scheduler;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, SchedulerConfig};
pub use context::{Context, LoanOutcome, TradeOutcome};
pub use engine::Engine;
pub use router::CommandRouter;
pub use scheduler::{Cadence, OrderId, OrderRequest, ScheduledOrder, Scheduler, SchedulerHandle};
pub use state::EngineState;
pub use transport::{InboundMessage, Transport};
