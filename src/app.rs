//! The main application logic, decoupled from the entry point.

use crate::{
    channels::ChannelRegistry,
    config::Config,
    core::IncidentStore,
    dispatcher::{ChannelPriority, Dispatcher},
    http::{ApiServer, AppState},
    incidents::SqliteIncidentStore,
    internal_metrics::MetricsBuilder,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// How long running servers get to drain once shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    local_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the HTTP API is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown(SHUTDOWN_GRACE).await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// The senders and the incident store can be overridden so tests can run the
/// full HTTP stack against scripted senders and an in-memory database.
pub struct AppBuilder {
    config: Config,
    registry_override: Option<ChannelRegistry>,
    incident_store_override: Option<Arc<dyn IncidentStore>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry_override: None,
            incident_store_override: None,
        }
    }

    /// Overrides the channel senders for testing.
    pub fn registry_override(mut self, registry: ChannelRegistry) -> Self {
        self.registry_override = Some(registry);
        self
    }

    /// Overrides the incident store for testing.
    pub fn incident_store_override(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.incident_store_override = Some(store);
        self
    }

    /// Builds and starts all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let (metrics, metrics_server_info) = MetricsBuilder::new(config.metrics.clone())
            .build(task_manager.get_shutdown_rx())
            .await;
        let metrics = Arc::new(metrics);

        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            info!("Metrics server listening on http://{}/metrics", addr);
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        // =========================================================================
        // 2. Channels, incident store and dispatcher
        // =========================================================================
        let registry = match self.registry_override {
            Some(registry) => registry,
            None => ChannelRegistry::from_config(&config.channels)
                .context("failed to build channel senders")?,
        };

        let incidents: Arc<dyn IncidentStore> = match self.incident_store_override {
            Some(store) => store,
            None => Arc::new(
                SqliteIncidentStore::open(&config.incidents.database_path).with_context(|| {
                    format!(
                        "failed to open incident database at {}",
                        config.incidents.database_path.display()
                    )
                })?,
            ),
        };

        let priority = ChannelPriority::new(config.dispatch.priority.clone())
            .context("invalid dispatch priority")?;
        let mut dispatcher = Dispatcher::new(Arc::new(registry), priority)
            .with_attempt_timeout(config.dispatch.attempt_timeout())
            .with_metrics(metrics);
        if config.dispatch.record_exhausted_incidents {
            dispatcher = dispatcher.with_incident_store(incidents.clone());
        }
        let dispatcher = Arc::new(dispatcher);

        // =========================================================================
        // 3. HTTP API
        // =========================================================================
        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| {
                format!(
                    "failed to bind API server to {}",
                    config.server.listen_address
                )
            })?;
        let local_addr = listener.local_addr()?;
        info!("API server listening on http://{}", local_addr);

        let state = AppState {
            dispatcher,
            incidents,
        };
        let server = ApiServer::new(listener, state, task_manager.get_shutdown_rx());
        task_manager.spawn("ApiServer", server.run());

        Ok(App {
            task_manager,
            local_addr,
            metrics_addr,
        })
    }
}
