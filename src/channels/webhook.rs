//! A sender that hands messages to an HTTP provider.

use crate::core::{ChannelId, ChannelSender, SendError};
use crate::formatting::PayloadFormatter;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// POSTs a channel-specific JSON payload to a webhook URL.
pub struct WebhookSender {
    channel: ChannelId,
    webhook_url: String,
    formatter: Box<dyn PayloadFormatter>,
    client: reqwest::Client,
}

impl WebhookSender {
    /// Creates a new `WebhookSender` whose requests give up after `timeout`.
    pub fn new(
        channel: ChannelId,
        webhook_url: String,
        formatter: Box<dyn PayloadFormatter>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            channel,
            webhook_url,
            formatter,
            client,
        })
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, destination, message), fields(channel = %self.channel))]
    async fn attempt_send(&self, destination: &str, message: &str) -> Result<bool, SendError> {
        let payload = self.formatter.format(destination, message);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to provider failed");
                SendError::Http(e)
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Provider accepted message");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Provider rejected message");
        Err(SendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
