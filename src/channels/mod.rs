//! Channel senders and the registry that maps channels onto them.
//!
//! Every channel has exactly one sender. Which implementation backs a channel
//! is decided by configuration (`log` or `webhook`); tests register their own
//! through [`ChannelRegistryBuilder`].

pub mod log;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod webhook;

use crate::config::{ChannelConfig, ChannelsConfig, SenderKind};
use crate::core::{ChannelId, ChannelSender, DestinationField, SendError};
use crate::formatting::formatter_for;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use self::log::LogSender;
pub use self::webhook::WebhookSender;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no sender registered for channel '{0}'")]
    MissingSender(ChannelId),

    #[error("channel '{channel}' has no webhook_url configured")]
    MissingWebhookUrl { channel: ChannelId },

    #[error("failed to build sender for channel '{channel}': {source}")]
    Sender {
        channel: ChannelId,
        #[source]
        source: SendError,
    },
}

/// Maps each channel to its sender and its required destination field.
#[derive(Clone)]
pub struct ChannelRegistry {
    email: Arc<dyn ChannelSender>,
    sms: Arc<dyn ChannelSender>,
    telegram: Arc<dyn ChannelSender>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("email", &self.email.name())
            .field("sms", &self.sms.name())
            .field("telegram", &self.telegram.name())
            .finish()
    }
}

impl ChannelRegistry {
    pub fn builder() -> ChannelRegistryBuilder {
        ChannelRegistryBuilder::default()
    }

    /// Builds one sender per channel from the configuration.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, RegistryError> {
        let mut builder = Self::builder();
        for channel in ChannelId::ALL {
            let sender = build_sender(channel, config.get(channel))?;
            info!(%channel, sender = sender.name(), "Registered channel sender");
            builder = builder.register(channel, sender);
        }
        builder.build()
    }

    /// The request field that must be populated to use `channel`.
    pub fn required_field(&self, channel: ChannelId) -> DestinationField {
        channel.destination_field()
    }

    pub fn sender_for(&self, channel: ChannelId) -> Arc<dyn ChannelSender> {
        match channel {
            ChannelId::Email => self.email.clone(),
            ChannelId::Sms => self.sms.clone(),
            ChannelId::Telegram => self.telegram.clone(),
        }
    }
}

/// Collects senders and refuses to build unless every channel has one.
#[derive(Default)]
pub struct ChannelRegistryBuilder {
    senders: HashMap<ChannelId, Arc<dyn ChannelSender>>,
}

impl ChannelRegistryBuilder {
    /// Registers `sender` for `channel`, replacing any earlier registration.
    pub fn register(mut self, channel: ChannelId, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(channel, sender);
        self
    }

    pub fn build(mut self) -> Result<ChannelRegistry, RegistryError> {
        let mut take = |channel| {
            self.senders
                .remove(&channel)
                .ok_or(RegistryError::MissingSender(channel))
        };
        Ok(ChannelRegistry {
            email: take(ChannelId::Email)?,
            sms: take(ChannelId::Sms)?,
            telegram: take(ChannelId::Telegram)?,
        })
    }
}

/// Creates the sender a channel's configuration asks for.
pub fn build_sender(
    channel: ChannelId,
    config: &ChannelConfig,
) -> Result<Arc<dyn ChannelSender>, RegistryError> {
    match config.kind {
        SenderKind::Log => Ok(Arc::new(LogSender::new(channel))),
        SenderKind::Webhook => {
            let url = config
                .webhook_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .ok_or(RegistryError::MissingWebhookUrl { channel })?;
            let sender = WebhookSender::new(
                channel,
                url,
                formatter_for(channel, config.subject.clone()),
                Duration::from_millis(config.timeout_ms),
            )
            .map_err(|source| RegistryError::Sender { channel, source })?;
            Ok(Arc::new(sender))
        }
    }
}
