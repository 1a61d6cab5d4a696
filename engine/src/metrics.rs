//! Counters for engine activity.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Engine metrics.
pub struct Metrics {
    /// Commands routed.
    pub commands_received: AtomicU64,
    /// Trades committed, manual or scheduled.
    pub trades_executed: AtomicU64,
    /// Trades refused for funds, balance or amount.
    pub trades_rejected: AtomicU64,
    /// Loans granted.
    pub loans_granted: AtomicU64,
    /// Accounts created.
    pub accounts_created: AtomicU64,
    /// Scheduled order firings.
    pub orders_fired: AtomicU64,
    /// Quotes the oracle failed to provide.
    pub price_failures: AtomicU64,
    /// Writes that failed and were discarded.
    pub persistence_failures: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            commands_received: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            trades_rejected: AtomicU64::new(0),
            loans_granted: AtomicU64::new(0),
            accounts_created: AtomicU64::new(0),
            orders_fired: AtomicU64::new(0),
            price_failures: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
        }
    }

    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trade_executed(&self) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trade_rejected(&self) {
        self.trades_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn loan_granted(&self) {
        self.loans_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn account_created(&self) {
        self.accounts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_fired(&self) {
        self.orders_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn price_failure(&self) {
        self.price_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_received: self.commands_received.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            trades_rejected: self.trades_rejected.load(Ordering::Relaxed),
            loans_granted: self.loans_granted.load(Ordering::Relaxed),
            accounts_created: self.accounts_created.load(Ordering::Relaxed),
            orders_fired: self.orders_fired.load(Ordering::Relaxed),
            price_failures: self.price_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit the current counters as one structured log line.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            commands = s.commands_received,
            trades_executed = s.trades_executed,
            trades_rejected = s.trades_rejected,
            loans = s.loans_granted,
            accounts_created = s.accounts_created,
            orders_fired = s.orders_fired,
            price_failures = s.price_failures,
            persistence_failures = s.persistence_failures,
            "Engine metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub commands_received: u64,
    pub trades_executed: u64,
    pub trades_rejected: u64,
    pub loans_granted: u64,
    pub accounts_created: u64,
    pub orders_fired: u64,
    pub price_failures: u64,
    pub persistence_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.command_received();
        metrics.command_received();
        metrics.trade_executed();
        metrics.trade_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commands_received, 2);
        assert_eq!(snapshot.trades_executed, 1);
        assert_eq!(snapshot.trades_rejected, 1);
        assert_eq!(snapshot.orders_fired, 0);
    }
}
