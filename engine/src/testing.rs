//! Test doubles shared by the engine's unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cryptoledger_common::{ChannelId, MessageRef, Result};
use cryptoledger_ledger::AccountDirectory;
use cryptoledger_oracle::PriceOracle;
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::transport::Transport;

/// Something the engine sent through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reply { to: MessageRef, text: String },
    Send { channel: ChannelId, text: String },
}

/// Transport that records everything and allocates channel ids from 1000.
pub struct RecordingTransport {
    outbound: Mutex<Vec<Outbound>>,
    next_channel: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            outbound: Mutex::new(Vec::new()),
            next_channel: AtomicU64::new(1000),
        }
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().clone()
    }

    /// Texts of replies to `to`, in order.
    pub fn replies_to(&self, to: MessageRef) -> Vec<String> {
        self.outbound
            .lock()
            .iter()
            .filter_map(|o| match o {
                Outbound::Reply { to: r, text } if *r == to => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Texts posted to `channel` without a reply reference.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.outbound
            .lock()
            .iter()
            .filter_map(|o| match o {
                Outbound::Send { channel: c, text } if *c == channel => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn channels_created(&self) -> u64 {
        self.next_channel.load(Ordering::SeqCst) - 1000
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn reply(&self, to: &MessageRef, text: &str) -> Result<()> {
        self.outbound.lock().push(Outbound::Reply {
            to: *to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.outbound.lock().push(Outbound::Send {
            channel,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn create_channel(&self, _category: &str, _name: &str) -> Result<ChannelId> {
        Ok(ChannelId::new(self.next_channel.fetch_add(1, Ordering::SeqCst)))
    }
}

pub fn test_config(data_dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.data_dir = data_dir.to_path_buf();
    config
}

pub fn context_with(
    data_dir: &Path,
    oracle: Arc<dyn PriceOracle>,
    transport: Arc<dyn Transport>,
) -> Context {
    let directory = AccountDirectory::open(data_dir).unwrap();
    Context::new(test_config(data_dir), directory, oracle, transport)
}
