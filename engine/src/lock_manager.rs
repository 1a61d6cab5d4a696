//! Per-account mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Guard held for the whole load, mutate, save sequence of one account.
pub type AccountGuard = OwnedMutexGuard<()>;

/// Lazily created async mutexes keyed by case-folded account name.
///
/// Two mutations of the same account never overlap; mutations of different
/// accounts never wait on each other. Nothing ever holds two guards.
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn acquire(&self, name: &str) -> AccountGuard {
        let key = name.to_ascii_lowercase();
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        trace!(account = %key, "Account lock acquired");
        guard
    }

    /// Number of accounts that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_exclusive_ignoring_case() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire("Alice").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("alice").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = AccountLocks::new();
        let _a = locks.acquire("alice").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("bob"))
            .await
            .expect("independent account should not block");
        assert_eq!(locks.len(), 2);
    }
}
