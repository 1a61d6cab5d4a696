//! Engine runtime: owns the shared context, the router and the scheduler task.

use std::sync::Arc;

use cryptoledger_common::{LedgerError, Result};
use cryptoledger_ledger::AccountDirectory;
use cryptoledger_oracle::PriceOracle;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::context::Context;
use crate::router::CommandRouter;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::state::EngineState;
use crate::transport::{InboundMessage, Transport};

/// The ledger engine.
pub struct Engine {
    /// Shared with the router and the scheduler.
    ctx: Arc<Context>,
    /// Command parsing and dispatch.
    router: CommandRouter,
    /// Handle to the scheduler task.
    scheduler: SchedulerHandle,
    /// Scheduler task, taken on shutdown.
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
    /// Current lifecycle state.
    state: RwLock<EngineState>,
    /// Held shared by every command in flight; `stop` takes it exclusively.
    inflight: tokio::sync::RwLock<()>,
}

impl Engine {
    /// Open the data directory, restore scheduled orders and spawn the
    /// scheduler. Commands are ignored until [`Engine::start`].
    pub fn new(
        config: EngineConfig,
        oracle: Arc<dyn PriceOracle>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let directory = AccountDirectory::open(&config.data_dir)?;
        info!(
            data_dir = %config.data_dir.display(),
            accounts = directory.len(),
            oracle = oracle.name(),
            "Account directory opened"
        );

        let scheduler_config = config.scheduler.clone();
        let ctx = Arc::new(Context::new(config, directory, oracle, transport));
        let (scheduler, task) = Scheduler::spawn(ctx.clone(), &scheduler_config)?;

        Ok(Self {
            router: CommandRouter::new(ctx.clone(), scheduler.clone()),
            ctx,
            scheduler,
            scheduler_task: Mutex::new(Some(task)),
            state: RwLock::new(EngineState::Starting),
            inflight: tokio::sync::RwLock::new(()),
        })
    }

    /// Start accepting commands.
    #[instrument(skip(self))]
    pub fn start(&self) {
        *self.state.write() = EngineState::Running;
        info!(prefix = %self.ctx.config.command_prefix, "Engine started");
    }

    /// Handle one inbound message and deliver the reply, if any.
    #[instrument(skip_all, fields(channel = %msg.channel, message = %msg.id.get()))]
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<()> {
        let _inflight = self.inflight.read().await;
        if !self.state().accepts_commands() {
            debug!(state = ?self.state(), "Message ignored");
            return Ok(());
        }

        let Some(text) = self.router.route(msg).await else {
            return Ok(());
        };
        self.ctx.transport.reply(&msg.reference(), &text).await
    }

    /// Stop gracefully: finish commands in flight, stop firing, flush the
    /// schedule book and index.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if matches!(*state, EngineState::ShuttingDown | EngineState::Stopped) {
                return Ok(());
            }
            *state = EngineState::ShuttingDown;
        }
        info!("Stopping engine");

        // Commands that arrive from here on see ShuttingDown.
        drop(self.inflight.write().await);

        match self.scheduler.shutdown().await {
            Ok(()) | Err(LedgerError::ShuttingDown) => {}
            Err(e) => warn!(error = %e, "Scheduler shutdown failed"),
        }
        let task = self.scheduler_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Scheduler task panicked");
            }
        }

        let saved = self.ctx.save_all().await;
        self.ctx.metrics.log_summary();
        *self.state.write() = EngineState::Stopped;

        info!("Engine stopped");
        saved
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, RecordingTransport};
    use cryptoledger_common::{Asset, ChannelId, MessageId, PrincipalId};
    use cryptoledger_oracle::MockPriceOracle;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn engine(dir: &TempDir, transport: Arc<RecordingTransport>) -> Engine {
        let oracle = Arc::new(MockPriceOracle::new());
        oracle.set_price(Asset::Dogecoin, dec!(0.0625));
        Engine::new(test_config(dir.path()), oracle, transport).unwrap()
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage::new(PrincipalId::new(5), ChannelId::new(1), MessageId::new(10), text)
    }

    #[tokio::test]
    async fn test_commands_ignored_until_started() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let engine = engine(&dir, transport.clone());
        assert_eq!(engine.state(), EngineState::Starting);

        let msg = message("!price DOGE");
        assert_ok!(engine.handle_message(&msg).await);
        assert!(transport.outbound().is_empty());

        engine.start();
        assert_ok!(engine.handle_message(&msg).await);
        assert_eq!(
            transport.replies_to(msg.reference()),
            vec!["**DOGE**: `$0.0625`".to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_commands_get_no_reply() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let engine = engine(&dir, transport.clone());
        engine.start();

        assert_ok!(engine.handle_message(&message("hello there")).await);
        assert!(transport.outbound().is_empty());
    }

    #[tokio::test]
    async fn test_stop_flushes_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let engine = engine(&dir, transport.clone());
        engine.start();

        let msg = message("!account dogefund");
        assert_ok!(engine.handle_message(&msg).await);
        assert!(dir.path().join("dogefund.json").exists());

        assert_ok!(engine.stop().await);
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(dir.path().join("main.json").exists());
        assert!(dir.path().join("_schedules.json").exists());
        assert_ok!(engine.stop().await);

        let before = transport.outbound().len();
        assert_ok!(engine.handle_message(&message("!coins")).await);
        assert_eq!(transport.outbound().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_command_in_flight() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let oracle = Arc::new(MockPriceOracle::new());
        oracle.set_price(Asset::Dogecoin, dec!(0.0625));
        let engine = Arc::new(
            Engine::new(test_config(dir.path()), oracle.clone(), transport.clone()).unwrap(),
        );
        engine.start();

        assert_ok!(engine.handle_message(&message("!account dogefund")).await);
        let desk = ChannelId::new(1000);
        let in_desk = |id: u64, text: &str| {
            InboundMessage::new(PrincipalId::new(5), desk, MessageId::new(id), text)
        };
        assert_ok!(engine.handle_message(&in_desk(11, "!loan 100")).await);

        oracle.set_latency(Asset::Dogecoin, Duration::from_secs(5));
        let buy = in_desk(12, "!buy 100 DOGE");
        let pending = {
            let engine = engine.clone();
            let buy = buy.clone();
            tokio::spawn(async move { engine.handle_message(&buy).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_ok!(engine.stop().await);
        assert_eq!(transport.replies_to(buy.reference()).len(), 1);
        assert_ok!(pending.await.unwrap());

        let name = cryptoledger_common::AccountName::parse("dogefund").unwrap();
        let stored = engine.context().directory.load(&name).unwrap();
        assert_eq!(stored.balance(Asset::Dogecoin), dec!(100));
        assert_eq!(stored.money(), dec!(93.75));
    }

    #[tokio::test]
    async fn test_engine_restarts_with_accounts() {
        let dir = TempDir::new().unwrap();
        {
            let engine = engine(&dir, Arc::new(RecordingTransport::new()));
            engine.start();
            assert_ok!(engine.handle_message(&message("!account keeper")).await);
            assert_ok!(engine.stop().await);
        }

        let engine = engine(&dir, Arc::new(RecordingTransport::new()));
        assert!(engine.context().directory.contains("keeper"));
        assert_eq!(
            engine.context().directory.owner_of("keeper"),
            Some(PrincipalId::new(5))
        );
    }

    #[tokio::test]
    async fn test_new_fails_on_unusable_data_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let result = Engine::new(
            test_config(&file),
            Arc::new(MockPriceOracle::new()),
            Arc::new(RecordingTransport::new()),
        );
        assert_err!(result.map(|_| ()));
    }
}
