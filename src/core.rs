//! Core domain types and service traits for notifyd
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies a delivery channel.
///
/// The set is closed: every identifier that survives deserialization has a
/// sender registered for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    Email,
    Sms,
    Telegram,
}

impl ChannelId {
    /// All channels, in the default priority order.
    pub const ALL: [ChannelId; 3] = [ChannelId::Email, ChannelId::Sms, ChannelId::Telegram];

    /// The wire name of the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::Email => "email",
            ChannelId::Sms => "sms",
            ChannelId::Telegram => "telegram",
        }
    }

    /// The request field that must carry this channel's destination.
    pub fn destination_field(&self) -> DestinationField {
        match self {
            ChannelId::Email => DestinationField::Email,
            ChannelId::Sms => DestinationField::Phone,
            ChannelId::Telegram => DestinationField::TelegramId,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelId {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelId::Email),
            "sms" => Ok(ChannelId::Sms),
            "telegram" => Ok(ChannelId::Telegram),
            _ => Err(UnknownChannel(s.trim().to_string())),
        }
    }
}

/// A destination field on a [`NotificationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationField {
    Email,
    Phone,
    TelegramId,
}

impl DestinationField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationField::Email => "email",
            DestinationField::Phone => "phone",
            DestinationField::TelegramId => "telegram_id",
        }
    }
}

impl fmt::Display for DestinationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to deliver one message to one user over any of several channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationRequest {
    pub user_id: String,
    pub message: String,
    /// Requested channels. Duplicates are allowed and treated as a set.
    pub channels: Vec<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<String>,
}

impl NotificationRequest {
    /// Returns the populated value of a destination field, if any.
    ///
    /// Empty and whitespace-only values count as absent.
    pub fn destination(&self, field: DestinationField) -> Option<&str> {
        let value = match field {
            DestinationField::Email => self.email.as_deref(),
            DestinationField::Phone => self.phone.as_deref(),
            DestinationField::TelegramId => self.telegram_id.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Whether `channel` was requested at least once.
    pub fn requests(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel)
    }
}

/// The result of a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_used: Option<ChannelId>,
}

impl DispatchOutcome {
    pub fn delivered(channel: ChannelId) -> Self {
        Self {
            success: true,
            message: format!("delivered via {}", channel),
            channel_used: Some(channel),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Errors a sender may raise while attempting delivery.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Delivers a message to a destination over one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// A short name for the concrete provider, used in logs.
    fn name(&self) -> &str;

    /// Attempts delivery.
    ///
    /// # Returns
    /// * `Ok(true)` if the message was delivered
    /// * `Ok(false)` if the provider reported a failure
    /// * `Err` if the attempt itself failed (network error, bad status, etc.)
    async fn attempt_send(&self, destination: &str, message: &str) -> Result<bool, SendError>;
}

// =============================================================================
// Incidents
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    New,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::New => "new",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(IncidentStatus::New),
            "in_progress" => Ok(IncidentStatus::InProgress),
            "resolved" => Ok(IncidentStatus::Resolved),
            "closed" => Ok(IncidentStatus::Closed),
            other => Err(format!("unknown incident status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSource {
    Operator,
    Monitoring,
    Partner,
}

impl IncidentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSource::Operator => "operator",
            IncidentSource::Monitoring => "monitoring",
            IncidentSource::Partner => "partner",
        }
    }
}

impl FromStr for IncidentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(IncidentSource::Operator),
            "monitoring" => Ok(IncidentSource::Monitoring),
            "partner" => Ok(IncidentSource::Partner),
            other => Err(format!("unknown incident source '{}'", other)),
        }
    }
}

/// A tracked incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentRecord {
    pub id: i64,
    pub description: String,
    pub status: IncidentStatus,
    pub source: IncidentSource,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIncident {
    pub description: String,
    pub source: IncidentSource,
}

#[derive(Debug, Error)]
pub enum IncidentError {
    #[error("incident {0} not found")]
    NotFound(i64),

    #[error("invalid incident: {0}")]
    InvalidInput(String),

    #[error("incident storage error: {0}")]
    Storage(String),
}

/// Durable storage for incident records.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Creates an incident with status `new`.
    async fn create(&self, incident: NewIncident) -> Result<IncidentRecord, IncidentError>;

    /// Lists incidents ordered by id, optionally filtered by status.
    async fn list(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<IncidentRecord>, IncidentError>;

    async fn get(&self, id: i64) -> Result<Option<IncidentRecord>, IncidentError>;

    /// Sets the status of an incident. Any transition is allowed.
    async fn update_status(
        &self,
        id: i64,
        status: IncidentStatus,
    ) -> Result<IncidentRecord, IncidentError>;
}
