//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing
//! dispatch metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder, binds the metrics listener, and
//!   constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A lightweight, cloneable struct that serves as the public
//!   API for the rest of the application to interact with the metrics system.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::core::ChannelId;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

pub mod server;

/// The public API for the metrics system.
///
/// This struct holds cloneable handles to the metrics collectors.
#[derive(Clone)]
pub struct Metrics {
    pub notifications_requested_total: Counter,
    pub notifications_rejected_total: Counter,
    pub notifications_exhausted_total: Counter,
    pub dispatch_duration_seconds: Histogram,
    enabled: bool,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!(
            "notifications_requested_total",
            Unit::Count,
            "Total number of notification requests received by the dispatcher."
        );
        metrics::describe_counter!(
            "notifications_rejected_total",
            Unit::Count,
            "Total number of notification requests rejected by validation."
        );
        metrics::describe_counter!(
            "notifications_delivered_total",
            Unit::Count,
            "Total number of notifications delivered, labeled by channel."
        );
        metrics::describe_counter!(
            "notifications_exhausted_total",
            Unit::Count,
            "Total number of notifications that failed on every candidate channel."
        );
        metrics::describe_counter!(
            "channel_attempts_total",
            Unit::Count,
            "Total number of delivery attempts, labeled by channel and outcome."
        );
        metrics::describe_histogram!(
            "dispatch_duration_seconds",
            Unit::Seconds,
            "Time from the first delivery attempt to the final outcome."
        );

        Self {
            notifications_requested_total: metrics::counter!("notifications_requested_total"),
            notifications_rejected_total: metrics::counter!("notifications_rejected_total"),
            notifications_exhausted_total: metrics::counter!("notifications_exhausted_total"),
            dispatch_duration_seconds: metrics::histogram!("dispatch_duration_seconds"),
            enabled: true,
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            notifications_requested_total: Counter::noop(),
            notifications_rejected_total: Counter::noop(),
            notifications_exhausted_total: Counter::noop(),
            dispatch_duration_seconds: Histogram::noop(),
            enabled: false,
        }
    }

    /// Records the outcome of a single delivery attempt.
    pub fn record_attempt(&self, channel: ChannelId, outcome: &'static str) {
        if !self.enabled {
            return;
        }
        metrics::counter!(
            "channel_attempts_total",
            "channel" => channel.as_str(),
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Increments the delivered counter for the channel that succeeded.
    pub fn increment_delivered(&self, channel: ChannelId) {
        if !self.enabled {
            return;
        }
        metrics::counter!("notifications_delivered_total", "channel" => channel.as_str())
            .increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for initializing the `PrometheusRecorder`,
/// creating the `MetricsServer`, and creating the `Metrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` with the address it is bound to.
    ///
    /// If metrics are disabled, or the recorder cannot be installed, this
    /// returns a disabled `Metrics` instance and `None` for the server.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let recorder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        ) {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                error!("Failed to configure Prometheus recorder: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let handle = recorder.handle();

        // Bind before installing the recorder so a taken port leaves the
        // global recorder untouched.
        let listener = match TcpListener::bind(self.config.listen_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        (metrics, Some((server, addr)))
    }
}
