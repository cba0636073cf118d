//! The fallback dispatcher.
//!
//! A dispatch validates the request, then walks the configured priority list,
//! restricted to the channels the request asked for, and tries each one in
//! turn until a sender delivers. Channels are never tried concurrently. A
//! failed attempt (rejection, error, panic or timeout) is logged and absorbed;
//! only exhausting every candidate is reported to the caller.

use crate::channels::ChannelRegistry;
use crate::core::{
    ChannelId, DispatchOutcome, IncidentSource, IncidentStore, NewIncident, NotificationRequest,
};
use crate::internal_metrics::Metrics;
use crate::validation::{validate, ValidationError};
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriorityError {
    #[error("priority list must name at least one channel")]
    Empty,

    #[error("priority list names '{0}' more than once")]
    Duplicate(ChannelId),
}

/// The order in which channels are tried. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPriority(Arc<[ChannelId]>);

impl ChannelPriority {
    pub fn new(channels: Vec<ChannelId>) -> Result<Self, PriorityError> {
        if channels.is_empty() {
            return Err(PriorityError::Empty);
        }
        let mut seen = HashSet::new();
        for &channel in &channels {
            if !seen.insert(channel) {
                return Err(PriorityError::Duplicate(channel));
            }
        }
        Ok(Self(channels.into()))
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.0
    }

    /// The requested channels in priority order, each at most once.
    ///
    /// Requested channels missing from the priority list are left out.
    pub fn candidates(&self, request: &NotificationRequest) -> Vec<ChannelId> {
        self.0
            .iter()
            .copied()
            .filter(|&channel| request.requests(channel))
            .collect()
    }
}

impl Default for ChannelPriority {
    fn default() -> Self {
        Self(ChannelId::ALL.to_vec().into())
    }
}

/// Why a single delivery attempt did not deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The sender returned `false`.
    Rejected,
    /// The sender returned an error.
    Error(String),
    Panicked,
    TimedOut(Duration),
}

impl AttemptFailure {
    /// The `outcome` label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptFailure::Rejected => "rejected",
            AttemptFailure::Error(_) => "error",
            AttemptFailure::Panicked => "panicked",
            AttemptFailure::TimedOut(_) => "timeout",
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Rejected => f.write_str("sender reported failure"),
            AttemptFailure::Error(e) => write!(f, "sender error: {}", e),
            AttemptFailure::Panicked => f.write_str("sender panicked"),
            AttemptFailure::TimedOut(d) => write!(f, "no response within {}ms", d.as_millis()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to deliver notification on any channel")]
    AllChannelsExhausted { attempted: Vec<ChannelId> },
}

/// Delivers notifications over the first channel that works.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ChannelRegistry>,
    priority: ChannelPriority,
    attempt_timeout: Duration,
    metrics: Arc<Metrics>,
    incidents: Option<Arc<dyn IncidentStore>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("priority", &self.priority)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("records_incidents", &self.incidents.is_some())
            .finish()
    }
}

impl Dispatcher {
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(registry: Arc<ChannelRegistry>, priority: ChannelPriority) -> Self {
        Self {
            registry,
            priority,
            attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
            metrics: Arc::new(Metrics::disabled()),
            incidents: None,
        }
    }

    /// Bounds every delivery attempt. A timed-out attempt counts as a failure.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Opens a `monitoring` incident whenever a dispatch exhausts every channel.
    pub fn with_incident_store(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.incidents = Some(store);
        self
    }

    /// Validates `request` and delivers it over the first working channel.
    #[instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn dispatch(
        &self,
        request: &NotificationRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.metrics.notifications_requested_total.increment(1);

        if let Err(e) = validate(request, &self.registry) {
            self.metrics.notifications_rejected_total.increment(1);
            warn!(error = %e, "Rejected notification request");
            return Err(e.into());
        }

        let start = Instant::now();
        let candidates = self.priority.candidates(request);
        debug!(?candidates, "Dispatching notification");

        let mut attempted = Vec::with_capacity(candidates.len());
        for channel in candidates {
            let field = self.registry.required_field(channel);
            let Some(destination) = request.destination(field) else {
                // Validation guarantees the field; skip rather than fail the dispatch.
                error!(%channel, %field, "Destination missing after validation");
                continue;
            };
            attempted.push(channel);

            match self.attempt(channel, destination, &request.message).await {
                Ok(()) => {
                    self.metrics.record_attempt(channel, "delivered");
                    self.metrics.increment_delivered(channel);
                    self.metrics
                        .dispatch_duration_seconds
                        .record(start.elapsed().as_secs_f64());
                    info!(%channel, "Notification delivered");
                    return Ok(DispatchOutcome::delivered(channel));
                }
                Err(failure) => {
                    self.metrics.record_attempt(channel, failure.label());
                    warn!(
                        %channel,
                        reason = %failure,
                        "Delivery attempt failed, trying next channel"
                    );
                }
            }
        }

        self.metrics.notifications_exhausted_total.increment(1);
        self.metrics
            .dispatch_duration_seconds
            .record(start.elapsed().as_secs_f64());
        error!(?attempted, "Notification failed on all channels");
        self.record_exhausted(request, &attempted).await;

        Err(DispatchError::AllChannelsExhausted { attempted })
    }

    /// Runs one sender call behind a panic boundary and the attempt timeout,
    /// so that errors, panics and hangs all come back as an `AttemptFailure`.
    async fn attempt(
        &self,
        channel: ChannelId,
        destination: &str,
        message: &str,
    ) -> Result<(), AttemptFailure> {
        let sender = self.registry.sender_for(channel);
        debug!(%channel, sender = sender.name(), "Attempting delivery");

        // Runs inline so that dropping the dispatch also drops the send.
        let send = AssertUnwindSafe(sender.attempt_send(destination, message)).catch_unwind();

        match tokio::time::timeout(self.attempt_timeout, send).await {
            Err(_) => Err(AttemptFailure::TimedOut(self.attempt_timeout)),
            Ok(Err(_panic)) => Err(AttemptFailure::Panicked),
            Ok(Ok(Ok(true))) => Ok(()),
            Ok(Ok(Ok(false))) => Err(AttemptFailure::Rejected),
            Ok(Ok(Err(e))) => Err(AttemptFailure::Error(e.to_string())),
        }
    }

    async fn record_exhausted(&self, request: &NotificationRequest, attempted: &[ChannelId]) {
        let Some(store) = &self.incidents else {
            return;
        };

        let channels = if attempted.is_empty() {
            "none attempted".to_string()
        } else {
            attempted
                .iter()
                .map(ChannelId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let incident = NewIncident {
            description: format!(
                "Notification for user {} failed on all channels ({})",
                request.user_id, channels
            ),
            source: IncidentSource::Monitoring,
        };

        match store.create(incident).await {
            Ok(record) => info!(incident_id = record.id, "Opened incident for failed notification"),
            Err(e) => warn!(error = %e, "Failed to record incident for failed notification"),
        }
    }
}
