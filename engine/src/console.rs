//! Console transport for running the engine from a terminal.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cryptoledger_common::{ChannelId, LedgerError, MessageRef, Result};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::debug;

use cryptoledger_engine::Transport;

/// Prints everything the engine says to stdout, one block per message.
pub struct ConsoleTransport {
    out: Mutex<Stdout>,
    next_channel: AtomicU64,
}

impl ConsoleTransport {
    /// Channel ids are seeded from the clock so they stay unique across runs.
    pub fn new() -> Self {
        let seed = cryptoledger_common::epoch_millis(cryptoledger_common::now()).unsigned_abs();
        Self {
            out: Mutex::new(tokio::io::stdout()),
            next_channel: AtomicU64::new(seed),
        }
    }

    async fn print(&self, header: String, text: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        let block = format!("{}\n{}\n\n", header, text);
        let written = match out.write_all(block.as_bytes()).await {
            Ok(()) => out.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| LedgerError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn reply(&self, to: &MessageRef, text: &str) -> Result<()> {
        self.print(format!("[{}] re {}:", to.channel, to.message.get()), text)
            .await
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.print(format!("[{}]:", channel), text).await
    }

    async fn create_channel(&self, category: &str, name: &str) -> Result<ChannelId> {
        let channel = ChannelId::new(self.next_channel.fetch_add(1, Ordering::SeqCst));
        debug!(category, name, channel = %channel, "Channel created");
        Ok(channel)
    }
}
