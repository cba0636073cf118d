//! Checks a notification request before any delivery is attempted.
//!
//! Every requested channel must have its destination populated, even channels
//! the dispatcher would never reach. A request for `[email, sms]` with only an
//! email address fails here rather than silently skipping SMS.

use crate::channels::ChannelRegistry;
use crate::core::{ChannelId, DestinationField, NotificationRequest};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one channel must be requested")]
    NoChannels,

    #[error("field '{field}' is required for {channel} notifications")]
    MissingDestination {
        channel: ChannelId,
        field: DestinationField,
    },
}

/// Validates `request` against the registry's destination requirements.
pub fn validate(
    request: &NotificationRequest,
    registry: &ChannelRegistry,
) -> Result<(), ValidationError> {
    if request.channels.is_empty() {
        return Err(ValidationError::NoChannels);
    }

    for &channel in &request.channels {
        let field = registry.required_field(channel);
        if request.destination(field).is_none() {
            return Err(ValidationError::MissingDestination { channel, field });
        }
    }

    Ok(())
}
