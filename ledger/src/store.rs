//! File-backed account directory.
//!
//! Layout of the data directory:
//! - `main.json`: index of account name to owner and channel
//! - `<name>.json`: one file per account
//!
//! Every write goes to a temporary file that is renamed over the target, so a
//! reader never observes a partially written file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cryptoledger_common::{
    AccountName, ChannelId, LedgerError, PrincipalId, Result, RESERVED_ACCOUNT_NAME,
};

use crate::account::Account;

/// Owner and channel of an account, as recorded in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub owner: PrincipalId,
    pub channel: ChannelId,
}

/// Maps account names to owners and channels and loads and stores ledgers.
///
/// Names compare case-insensitively; the spelling used at creation is kept
/// for display and for the file name.
pub struct AccountDirectory {
    root: PathBuf,
    /// Keyed by [`AccountName::key`].
    index: RwLock<BTreeMap<String, (AccountName, DirectoryEntry)>>,
    /// Serializes writers of the index file.
    index_writer: Mutex<()>,
}

impl AccountDirectory {
    /// Open (creating if needed) the directory rooted at `root`.
    ///
    /// Index entries whose account file is missing or whose name is not a
    /// valid account name are skipped with a warning.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let index_path = root.join(index_file_name());
        let raw: BTreeMap<String, DirectoryEntry> = match fs::read_to_string(&index_path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut index = BTreeMap::new();
        for (name, entry) in raw {
            let name = match AccountName::parse(name.clone()) {
                Ok(name) => name,
                Err(e) => {
                    warn!(account = %name, error = %e, "Skipping invalid index entry");
                    continue;
                }
            };
            if !account_path(&root, &name).exists() {
                warn!(account = %name, "Skipping index entry without an account file");
                continue;
            }
            index.insert(name.key(), (name, entry));
        }

        info!(root = %root.display(), accounts = index.len(), "Account directory opened");

        Ok(Self {
            root,
            index: RwLock::new(index),
            index_writer: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an account with this name exists, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.index.read().contains_key(&name.to_ascii_lowercase())
    }

    /// The registered spelling of `name`, if it exists.
    pub fn resolve(&self, name: &str) -> Option<AccountName> {
        self.index
            .read()
            .get(&name.to_ascii_lowercase())
            .map(|(name, _)| name.clone())
    }

    pub fn entry(&self, name: &str) -> Option<DirectoryEntry> {
        self.index
            .read()
            .get(&name.to_ascii_lowercase())
            .map(|(_, entry)| *entry)
    }

    pub fn owner_of(&self, name: &str) -> Option<PrincipalId> {
        self.entry(name).map(|entry| entry.owner)
    }

    pub fn channel_of(&self, name: &str) -> Option<ChannelId> {
        self.entry(name).map(|entry| entry.channel)
    }

    /// The account bound to `channel`, if any.
    pub fn account_for_channel(&self, channel: ChannelId) -> Option<AccountName> {
        self.index
            .read()
            .values()
            .find(|(_, entry)| entry.channel == channel)
            .map(|(name, _)| name.clone())
    }

    /// All account names, sorted case-insensitively.
    pub fn list(&self) -> Vec<AccountName> {
        self.index.read().values().map(|(name, _)| name.clone()).collect()
    }

    /// Accounts created by `owner`, with their channels.
    pub fn accounts_owned_by(&self, owner: PrincipalId) -> Vec<(AccountName, ChannelId)> {
        self.index
            .read()
            .values()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(name, entry)| (name.clone(), entry.channel))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Add a freshly created account: persist its ledger, then the index.
    ///
    /// Either both files are written and the entry is visible, or the
    /// directory is left as it was. The index writer is held throughout, so a
    /// concurrent [`save_index`](Self::save_index) never persists an entry
    /// that is later rolled back.
    pub fn register(&self, account: &Account) -> Result<()> {
        let _writer = self.index_writer.lock();
        let key = account.name.key();
        let entry = DirectoryEntry {
            owner: account.owner,
            channel: account.channel,
        };

        {
            let mut index = self.index.write();
            if let Some((_, existing)) = index.get(&key) {
                return Err(LedgerError::NameConflict {
                    name: account.name.to_string(),
                    owner: existing.owner,
                });
            }
            index.insert(key.clone(), (account.name.clone(), entry));
        }

        let persisted = self.save(account).and_then(|_| self.write_index());
        if let Err(e) = persisted {
            self.index.write().remove(&key);
            let path = account_path(&self.root, &account.name);
            if let Err(cleanup) = fs::remove_file(&path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %cleanup, "Rollback could not remove account file");
                }
            }
            return Err(e);
        }

        info!(account = %account.name, owner = %account.owner, "Account registered");
        Ok(())
    }

    /// Read an account's ledger from storage.
    pub fn load(&self, name: &AccountName) -> Result<Account> {
        let path = account_path(&self.root, name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LedgerError::AccountNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Write an account's ledger to storage.
    pub fn save(&self, account: &Account) -> Result<()> {
        write_json_atomic(&account_path(&self.root, &account.name), account)?;
        debug!(account = %account.name, "Account saved");
        Ok(())
    }

    /// Write the index file.
    pub fn save_index(&self) -> Result<()> {
        let _writer = self.index_writer.lock();
        self.write_index()
    }

    /// Callers hold `index_writer`.
    fn write_index(&self) -> Result<()> {
        let snapshot: BTreeMap<String, DirectoryEntry> = self
            .index
            .read()
            .values()
            .map(|(name, entry)| (name.to_string(), *entry))
            .collect();
        write_json_atomic(&self.root.join(index_file_name()), &snapshot)
    }
}

fn index_file_name() -> String {
    format!("{}.json", RESERVED_ACCOUNT_NAME)
}

fn account_path(root: &Path, name: &AccountName) -> PathBuf {
    root.join(format!("{}.json", name.as_str()))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TransactionEngine;
    use cryptoledger_common::{Asset, Side, Trigger};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn new_account(name: &str, owner: u64, channel: u64) -> Account {
        Account::new(
            AccountName::parse(name).unwrap(),
            PrincipalId::new(owner),
            ChannelId::new(channel),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        assert!(directory.is_empty());

        directory.register(&new_account("Alice", 1, 100)).unwrap();

        assert!(directory.contains("alice"));
        assert_eq!(directory.resolve("ALICE").unwrap().as_str(), "Alice");
        assert_eq!(directory.owner_of("alice"), Some(PrincipalId::new(1)));
        assert_eq!(directory.channel_of("Alice"), Some(ChannelId::new(100)));
        assert_eq!(
            directory.account_for_channel(ChannelId::new(100)).unwrap().as_str(),
            "Alice"
        );
        assert_eq!(directory.accounts_owned_by(PrincipalId::new(1)).len(), 1);
        assert!(directory.accounts_owned_by(PrincipalId::new(2)).is_empty());
        assert!(dir.path().join("main.json").exists());
        assert!(dir.path().join("Alice.json").exists());
    }

    #[test]
    fn test_register_conflict_ignores_case() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        directory.register(&new_account("bob", 1, 100)).unwrap();

        let err = directory.register(&new_account("BOB", 2, 200)).unwrap_err();
        match err {
            LedgerError::NameConflict { owner, .. } => assert_eq!(owner, PrincipalId::new(1)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.channel_of("bob"), Some(ChannelId::new(100)));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        let engine = TransactionEngine::new();

        let mut account = new_account("carol", 3, 300);
        directory.register(&account).unwrap();
        engine.grant_loan(&mut account, dec!(500)).unwrap();
        let fill = engine
            .attempt(&account, Asset::Ethereum, dec!(0.25), Side::Buy, dec!(1999.99))
            .unwrap();
        engine.apply(&mut account, &fill, Trigger::Manual);
        directory.save(&account).unwrap();

        let loaded = directory.load(&account.name).unwrap();
        assert_eq!(loaded, account);
        assert_eq!(loaded.money(), account.money());
        assert_eq!(loaded.balance(Asset::Ethereum), dec!(0.25));
        assert_eq!(loaded.loans(), account.loans());
        assert_eq!(loaded.transactions(), account.transactions());
    }

    #[test]
    fn test_reopen_restores_index() {
        let dir = TempDir::new().unwrap();
        {
            let directory = AccountDirectory::open(dir.path()).unwrap();
            directory.register(&new_account("dave", 4, 400)).unwrap();
            directory.register(&new_account("erin", 5, 500)).unwrap();
        }

        let reopened = AccountDirectory::open(dir.path()).unwrap();
        let names: Vec<String> = reopened.list().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["dave", "erin"]);
        assert_eq!(reopened.owner_of("erin"), Some(PrincipalId::new(5)));
    }

    #[test]
    fn test_index_entry_without_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        {
            let directory = AccountDirectory::open(dir.path()).unwrap();
            directory.register(&new_account("frank", 6, 600)).unwrap();
            directory.register(&new_account("grace", 7, 700)).unwrap();
        }
        fs::remove_file(dir.path().join("frank.json")).unwrap();

        let reopened = AccountDirectory::open(dir.path()).unwrap();
        assert!(!reopened.contains("frank"));
        assert!(reopened.contains("grace"));
    }

    #[test]
    fn test_load_missing_account() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        let err = directory
            .load(&AccountName::parse("ghost").unwrap())
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_failed_register_rolls_back() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        // A directory squatting on the index path makes the index rename fail.
        fs::create_dir(dir.path().join("main.json")).unwrap();
        fs::write(dir.path().join("main.json").join("keep"), b"x").unwrap();

        let err = directory.register(&new_account("heidi", 8, 800)).unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure(_)));
        assert!(!directory.contains("heidi"));
        assert!(!dir.path().join("heidi.json").exists());
    }

    #[test]
    fn test_concurrent_index_save_never_sees_rolled_back_entry() {
        let dir = TempDir::new().unwrap();
        let directory = AccountDirectory::open(dir.path()).unwrap();
        directory.register(&new_account("ivan", 9, 900)).unwrap();
        // A directory squatting on the account path makes the ledger rename fail.
        fs::create_dir(dir.path().join("judy.json")).unwrap();
        fs::write(dir.path().join("judy.json").join("keep"), b"x").unwrap();

        std::thread::scope(|scope| {
            let saver = scope.spawn(|| {
                for _ in 0..200 {
                    directory.save_index().unwrap();
                    let text = fs::read_to_string(dir.path().join("main.json")).unwrap();
                    assert!(!text.contains("judy"));
                }
            });
            for _ in 0..200 {
                assert!(directory.register(&new_account("judy", 10, 1000)).is_err());
            }
            saver.join().unwrap();
        });

        assert!(!directory.contains("judy"));
        let reopened = AccountDirectory::open(dir.path()).unwrap();
        let names: Vec<String> = reopened.list().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["ivan"]);
    }
}
