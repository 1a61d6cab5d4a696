//! CryptoLedger console binary.
//!
//! Reads `<principal-id> <channel-id> <text>` lines from stdin and prints the
//! engine's replies. Ctrl-C or end of input shuts down gracefully.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cryptoledger_common::{ChannelId, MessageId, PrincipalId};
use cryptoledger_engine::{Engine, EngineConfig, InboundMessage};
use cryptoledger_oracle::{with_cache, CryptoCompareOracle};

mod console;

use console::ConsoleTransport;

/// CryptoLedger CLI
#[derive(Parser, Debug)]
#[command(name = "cryptoledger")]
#[command(about = "Paper trading ledger driven by chat commands")]
struct Args {
    /// Directory holding account files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Command prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Category new account channels are created under
    #[arg(long)]
    category: Option<String>,

    /// Price API base URL
    #[arg(long)]
    oracle_url: Option<String>,

    /// Quote cache TTL in milliseconds (0 disables caching)
    #[arg(long)]
    quote_cache_ms: Option<u64>,

    /// Do not persist scheduled orders
    #[arg(long)]
    no_persist_schedules: bool,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Log level, used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut EngineConfig) {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(prefix) = self.prefix {
            config.command_prefix = prefix;
        }
        if let Some(category) = self.category {
            config.account_category = category;
        }
        if let Some(url) = self.oracle_url {
            config.oracle.base_url = url;
        }
        if let Some(ms) = self.quote_cache_ms {
            config.oracle.cache_ttl = Duration::from_millis(ms);
        }
        if self.no_persist_schedules {
            config.scheduler.persist = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

/// Parse `<principal-id> <channel-id> <text>`.
fn parse_line(line: &str, id: MessageId) -> Option<InboundMessage> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let author = parts.next()?.parse().ok()?;
    let channel = parts.next()?.parse().ok()?;
    let text = parts.next()?.trim();
    Some(InboundMessage::new(
        PrincipalId::new(author),
        ChannelId::new(channel),
        id,
        text,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let json_logs = args.json_logs;

    let mut config = EngineConfig::from_env();
    args.apply(&mut config);

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    info!("Starting CryptoLedger");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let oracle = CryptoCompareOracle::new(&config.oracle)?;
    let oracle = with_cache(Arc::new(oracle), config.oracle.cache_ttl);
    let transport = Arc::new(ConsoleTransport::new());

    let engine = Engine::new(config, oracle, transport)?;
    engine.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_id = 1u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(msg) = parse_line(&line, MessageId::new(next_id)) else {
                    warn!(line = %line, "Expected <principal-id> <channel-id> <text>");
                    continue;
                };
                next_id += 1;
                if let Err(e) = engine.handle_message(&msg).await {
                    warn!(error = %e, "Reply not delivered");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    engine.stop().await?;
    info!("CryptoLedger shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let msg = parse_line("42 7 !buy 1 binance coin", MessageId::new(3)).unwrap();
        assert_eq!(msg.author, PrincipalId::new(42));
        assert_eq!(msg.channel, ChannelId::new(7));
        assert_eq!(msg.text, "!buy 1 binance coin");

        assert!(parse_line("42 !help", MessageId::new(1)).is_none());
        assert!(parse_line("x 1 !help", MessageId::new(1)).is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "cryptoledger",
            "--prefix",
            "$",
            "--quote-cache-ms",
            "0",
            "--no-persist-schedules",
        ]);
        let mut config = EngineConfig::default();
        args.apply(&mut config);
        assert_eq!(config.command_prefix, "$");
        assert_eq!(config.oracle.cache_ttl, Duration::ZERO);
        assert!(!config.scheduler.persist);
        assert_eq!(config.data_dir, PathBuf::from("accounts"));
    }
}
