//! # HTTP API
//!
//! The `axum` router exposing the dispatcher and the incident store:
//!
//! - `POST /notify/` delivers a notification with fallback.
//! - `GET /health` is a liveness probe.
//! - `POST /incidents/`, `GET /incidents/?status=`, `GET /incidents/{id}` and
//!   `PATCH /incidents/{id}` manage incident records.
//!
//! Routes accept both the slash-terminated and the bare path.

pub mod error;
pub mod routes;

use crate::core::IncidentStore;
use crate::dispatcher::Dispatcher;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub incidents: Arc<dyn IncidentStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/notify", post(routes::notify))
        .route("/notify/", post(routes::notify))
        .route(
            "/incidents",
            post(routes::create_incident).get(routes::list_incidents),
        )
        .route(
            "/incidents/",
            post(routes::create_incident).get(routes::list_incidents),
        )
        .route(
            "/incidents/{id}",
            get(routes::get_incident).patch(routes::update_incident),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on an already-bound listener.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    pub fn new(listener: TcpListener, state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router: build_router(state),
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until the shutdown signal fires.
    /// In-flight requests are allowed to finish.
    pub fn run(self) -> impl Future<Output = ()> {
        let mut shutdown_rx = self.shutdown_rx;
        let listener = self.listener;
        let router = self.router;

        async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
                info!("API server received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {}", e);
            }
            info!("API server finished.");
        }
    }
}
