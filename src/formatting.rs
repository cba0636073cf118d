// src/formatting.rs

use crate::core::ChannelId;
use serde_json::{json, Value};

/// Builds the JSON body a webhook provider receives for one message.
pub trait PayloadFormatter: Send + Sync {
    fn format(&self, destination: &str, message: &str) -> Value;
}

/// `{"to", "subject", "body"}` for email gateways.
pub struct EmailPayloadFormatter {
    subject: String,
}

impl EmailPayloadFormatter {
    pub const DEFAULT_SUBJECT: &'static str = "Notification";

    pub fn new(subject: Option<String>) -> Self {
        Self {
            subject: subject.unwrap_or_else(|| Self::DEFAULT_SUBJECT.to_string()),
        }
    }
}

impl PayloadFormatter for EmailPayloadFormatter {
    fn format(&self, destination: &str, message: &str) -> Value {
        json!({
            "to": destination,
            "subject": self.subject,
            "body": message,
        })
    }
}

/// `{"to", "text"}` for SMS gateways.
pub struct SmsPayloadFormatter;

impl PayloadFormatter for SmsPayloadFormatter {
    fn format(&self, destination: &str, message: &str) -> Value {
        json!({ "to": destination, "text": message })
    }
}

/// `{"chat_id", "text"}`, the shape of the Telegram Bot API `sendMessage` call.
pub struct TelegramPayloadFormatter;

impl PayloadFormatter for TelegramPayloadFormatter {
    fn format(&self, destination: &str, message: &str) -> Value {
        json!({ "chat_id": destination, "text": message })
    }
}

/// Returns the formatter for a channel.
pub fn formatter_for(channel: ChannelId, subject: Option<String>) -> Box<dyn PayloadFormatter> {
    match channel {
        ChannelId::Email => Box::new(EmailPayloadFormatter::new(subject)),
        ChannelId::Sms => Box::new(SmsPayloadFormatter),
        ChannelId::Telegram => Box::new(TelegramPayloadFormatter),
    }
}
