//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use cryptoledger_oracle::OracleConfig;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Persist pending orders and restore them at startup.
    pub persist: bool,
    /// Capacity of the scheduler command queue.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            persist: true,
            queue_capacity: 256,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the index, account files and schedule book.
    pub data_dir: PathBuf,
    /// Text every command starts with.
    pub command_prefix: String,
    /// Category new account channels are created under.
    pub account_category: String,
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Price oracle configuration.
    pub oracle: OracleConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("accounts"),
            command_prefix: "!".to_string(),
            account_category: "accounts".to_string(),
            scheduler: SchedulerConfig::default(),
            oracle: OracleConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CRYPTOLEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(prefix) = std::env::var("CRYPTOLEDGER_COMMAND_PREFIX") {
            config.command_prefix = prefix;
        }

        if let Ok(category) = std::env::var("CRYPTOLEDGER_ACCOUNT_CATEGORY") {
            config.account_category = category;
        }

        if let Ok(persist) = std::env::var("CRYPTOLEDGER_PERSIST_SCHEDULES") {
            if let Some(persist) = parse_flag(&persist) {
                config.scheduler.persist = persist;
            }
        }

        if let Ok(url) = std::env::var("CRYPTOLEDGER_ORACLE_URL") {
            config.oracle.base_url = url;
        }

        if let Ok(ms) = std::env::var("CRYPTOLEDGER_QUOTE_CACHE_MS") {
            if let Ok(ms) = ms.parse() {
                config.oracle.cache_ttl = Duration::from_millis(ms);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory cannot be empty".to_string());
        }

        if self.command_prefix.is_empty() || self.command_prefix.chars().any(char::is_whitespace) {
            return Err("Command prefix must be non-empty and contain no whitespace".to_string());
        }

        if self.account_category.trim().is_empty() {
            return Err("Account category cannot be empty".to_string());
        }

        if self.scheduler.queue_capacity == 0 {
            return Err("Scheduler queue capacity cannot be 0".to_string());
        }

        if !(self.oracle.base_url.starts_with("http://") || self.oracle.base_url.starts_with("https://")) {
            return Err("Oracle URL must be http or https".to_string());
        }

        if self.oracle.request_timeout.is_zero() {
            return Err("Oracle request timeout cannot be 0".to_string());
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
