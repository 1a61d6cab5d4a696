//! Shared engine context and the locked mutation paths.

use std::sync::Arc;

use cryptoledger_common::{
    AccountName, Asset, ChannelId, LedgerError, PrincipalId, Result, Side, Trigger,
};
use cryptoledger_ledger::{Account, AccountDirectory, Fill, Loan, Transaction, TransactionEngine};
use cryptoledger_oracle::{PriceOracle, Quote};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::lock_manager::AccountLocks;
use crate::metrics::Metrics;
use crate::replies;
use crate::transport::Transport;

/// A committed trade.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub fill: Fill,
    pub transaction: Transaction,
}

/// A committed loan.
#[derive(Debug, Clone, Copy)]
pub struct LoanOutcome {
    pub loan: Loan,
    pub previous_money: Decimal,
    pub new_money: Decimal,
}

/// Everything the router and scheduler share. Created once at startup.
pub struct Context {
    pub config: EngineConfig,
    pub directory: Arc<AccountDirectory>,
    pub locks: AccountLocks,
    pub oracle: Arc<dyn PriceOracle>,
    pub transport: Arc<dyn Transport>,
    pub metrics: Metrics,
    pub engine: TransactionEngine,
}

impl Context {
    pub fn new(
        config: EngineConfig,
        directory: AccountDirectory,
        oracle: Arc<dyn PriceOracle>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            directory: Arc::new(directory),
            locks: AccountLocks::new(),
            oracle,
            transport,
            metrics: Metrics::new(),
            engine: TransactionEngine::new(),
        }
    }

    /// Quote an asset, mapping oracle failures to the retryable ledger error.
    pub async fn quote(&self, asset: Asset) -> Result<Quote> {
        self.oracle.quote(asset).await.map_err(|e| {
            self.metrics.price_failure();
            warn!(asset = %asset, oracle = self.oracle.name(), error = %e, "Price unavailable");
            e.into_ledger_error(asset)
        })
    }

    /// Read an account without taking its lock. Files are replaced
    /// atomically, so the snapshot is always whole.
    pub async fn read(&self, name: &AccountName) -> Result<Account> {
        let directory = self.directory.clone();
        let name = name.clone();
        blocking(move || directory.load(&name)).await
    }

    /// Price and commit a trade under the account lock.
    ///
    /// The quote is fetched before the lock is taken. Nothing is written
    /// unless the trade is accepted, and a failed write leaves the stored
    /// ledger unchanged.
    #[instrument(skip_all, fields(account = %name, asset = %asset, side = %side))]
    pub async fn execute_trade(
        &self,
        name: &AccountName,
        asset: Asset,
        amount: Decimal,
        side: Side,
        trigger: Trigger,
    ) -> Result<TradeOutcome> {
        let quote = self.quote(asset).await?;

        let _guard = self.locks.acquire(name.as_str()).await;
        let mut account = self.read(name).await?;

        let fill = match self.engine.attempt(&account, asset, amount, side, quote.price) {
            Ok(fill) => fill,
            Err(e) => {
                self.metrics.trade_rejected();
                info!(error = %e, code = e.error_code(), "Trade rejected");
                return Err(e);
            }
        };

        let transaction = self.engine.apply(&mut account, &fill, trigger);
        self.persist(&account).await?;
        self.metrics.trade_executed();

        info!(
            amount = %amount,
            unit_price = %quote.price,
            total = %fill.total,
            automatic = trigger.is_automatic(),
            "Trade executed"
        );

        Ok(TradeOutcome { fill, transaction })
    }

    /// Grant a loan under the account lock.
    #[instrument(skip_all, fields(account = %name))]
    pub async fn grant_loan(&self, name: &AccountName, amount: Decimal) -> Result<LoanOutcome> {
        let _guard = self.locks.acquire(name.as_str()).await;
        let mut account = self.read(name).await?;

        let previous_money = account.money();
        let loan = self.engine.grant_loan(&mut account, amount)?;
        self.persist(&account).await?;
        self.metrics.loan_granted();

        info!(amount = %loan.amount, "Loan granted");
        Ok(LoanOutcome {
            loan,
            previous_money,
            new_money: account.money(),
        })
    }

    /// Create an account, its channel and its files, then greet the owner.
    ///
    /// Creates of the same name are serialized on the name's lock, so at most
    /// one of them can succeed.
    #[instrument(skip_all, fields(name = raw_name, owner = %owner))]
    pub async fn create_account(&self, raw_name: &str, owner: PrincipalId) -> Result<ChannelId> {
        let name = AccountName::parse(raw_name)?;
        let _guard = self.locks.acquire(name.as_str()).await;

        if let Some(existing) = self.directory.owner_of(name.as_str()) {
            return Err(LedgerError::NameConflict {
                name: name.to_string(),
                owner: existing,
            });
        }

        let channel = self
            .transport
            .create_channel(&self.config.account_category, name.as_str())
            .await?;

        let account = Account::new(name.clone(), owner, channel);
        let directory = self.directory.clone();
        if let Err(e) = blocking(move || directory.register(&account)).await {
            self.metrics.persistence_failure();
            error!(account = %name, channel = %channel, error = %e, "Account registration failed; channel left orphaned");
            return Err(e);
        }
        self.metrics.account_created();

        if let Err(e) = self.transport.send(channel, &replies::owner_ping(owner)).await {
            warn!(account = %name, error = %e, "Could not greet account owner");
        }

        info!(account = %name, channel = %channel, "Account created");
        Ok(channel)
    }

    /// Flush the directory index. Ledgers are written at commit time.
    pub async fn save_all(&self) -> Result<()> {
        let directory = self.directory.clone();
        blocking(move || directory.save_index()).await.map_err(|e| {
            self.metrics.persistence_failure();
            error!(error = %e, "Saving account index failed");
            e
        })
    }

    async fn persist(&self, account: &Account) -> Result<()> {
        let directory = self.directory.clone();
        let snapshot = account.clone();
        blocking(move || directory.save(&snapshot)).await.map_err(|e| {
            self.metrics.persistence_failure();
            error!(account = %account.name, error = %e, "Saving account failed; change discarded");
            e
        })
    }
}

/// Run directory file I/O on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LedgerError::PersistenceFailure(e.to_string()))?
}
