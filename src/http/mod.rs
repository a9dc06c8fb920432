//! HTTP surface of the exporter.
//!
//! * `GET <telemetry_path>` runs a scrape and returns the text exposition.
//! * `GET /health` reports readiness.
//! * `GET /` is a short landing page.

use std::{io, sync::Arc};

use axum::{routing::get, Router};
use tokio::{net::TcpListener, sync::Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::web::WebConfig,
    core::{collectors::registry::Registry, executor::Executor, readiness::Readiness},
};

pub mod handlers;

/// Header carrying the scraper's own timeout, in seconds.
pub const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

/// Everything a request needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Initialized collectors. Requests narrow it, never change it.
    pub registry: Arc<Registry>,
    pub executor: Arc<Executor>,
    /// Admission gate with `web.max_requests` permits.
    pub gate: Arc<Semaphore>,
    pub web: Arc<WebConfig>,
    pub readiness: Readiness,
}

impl AppState {
    pub fn new(registry: Registry, executor: Executor, web: WebConfig, readiness: Readiness) -> Self {
        Self {
            registry: Arc::new(registry),
            executor: Arc::new(executor),
            gate: Arc::new(Semaphore::new(web.max_requests)),
            web: Arc::new(web),
            readiness,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let telemetry_path = state.web.telemetry_path.clone();
    Router::new()
        .route("/", get(handlers::landing))
        .route("/health", get(handlers::health))
        .route(&telemetry_path, get(handlers::metrics))
        .with_state(state)
}

/// Serves `app` until `shutdown` is cancelled, then lets in-flight requests
/// finish.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
