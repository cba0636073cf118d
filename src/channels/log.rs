//! A sender that only logs the message.
//!
//! Stands in for a real provider in development and demos: every attempt is
//! recorded as a structured log line and reported as delivered.

use crate::core::{ChannelId, ChannelSender, SendError};
use async_trait::async_trait;
use tracing::info;

pub struct LogSender {
    channel: ChannelId,
}

impl LogSender {
    pub fn new(channel: ChannelId) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn attempt_send(&self, destination: &str, message: &str) -> Result<bool, SendError> {
        info!(channel = %self.channel, destination, message, "Delivering notification");
        Ok(true)
    }
}
