//! Chat transport boundary.

use async_trait::async_trait;
use cryptoledger_common::{ChannelId, MessageId, MessageRef, PrincipalId, Result};

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author: PrincipalId,
    pub channel: ChannelId,
    pub id: MessageId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(author: PrincipalId, channel: ChannelId, id: MessageId, text: impl Into<String>) -> Self {
        Self {
            author,
            channel,
            id,
            text: text.into(),
        }
    }

    /// Reference to this message, for threaded replies.
    pub fn reference(&self) -> MessageRef {
        MessageRef::new(self.channel, self.id)
    }
}

/// Outbound side of the chat transport.
///
/// Implementations report delivery failures as `LedgerError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reply to a message, in its channel.
    async fn reply(&self, to: &MessageRef, text: &str) -> Result<()>;

    /// Post a message in a channel.
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()>;

    /// Create a text channel named `name` under `category`.
    async fn create_channel(&self, category: &str, name: &str) -> Result<ChannelId>;
}
