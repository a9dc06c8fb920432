use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::{AppState, SCRAPE_TIMEOUT_HEADER};
use crate::core::{
    collectors::error::CollectorError,
    encoder::{self, EncodeError, CONTENT_TYPE},
    executor::ScrapeError,
    readiness::{HealthReport, ReadinessState},
};

/// Query parameter restricting a scrape to the named collectors. May repeat.
const COLLECT_PARAM: &str = "collect[]";

/// Reasons a scrape request is answered without an exposition.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Exporter is not ready: {0}")]
    NotReady(ReadinessState),

    #[error("Limit of concurrent requests reached ({0}), try again later.")]
    Busy(usize),

    #[error("Couldn't create filtered metrics handler: {0}")]
    Filter(#[source] CollectorError),

    #[error("{0}")]
    Scrape(#[from] ScrapeError),

    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] EncodeError),
}

impl HandlerError {
    fn status(&self) -> StatusCode {
        match self {
            HandlerError::NotReady(_) | HandlerError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Filter(_) => StatusCode::BAD_REQUEST,
            HandlerError::Scrape(_) | HandlerError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// `GET <telemetry_path>`
pub async fn metrics(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let request_id = Uuid::new_v4();
    let result = scrape(&state, &params, &headers)
        .instrument(info_span!("scrape", %request_id))
        .await;

    if let Err(e) = &result {
        match e {
            HandlerError::Scrape(_) | HandlerError::Encode(_) => {
                error!(%request_id, "Scrape failed: {}", e)
            }
            _ => warn!(%request_id, "Scrape refused: {}", e),
        }
    }
    result
}

async fn scrape(
    state: &AppState,
    params: &[(String, String)],
    headers: &HeaderMap,
) -> Result<Response, HandlerError> {
    let readiness = state.readiness.current_state();
    if !readiness.is_ready() {
        return Err(HandlerError::NotReady(readiness));
    }

    let _permit = state
        .gate
        .try_acquire()
        .map_err(|_| HandlerError::Busy(state.web.max_requests))?;

    let names: Vec<&str> = params
        .iter()
        .filter(|(key, _)| key == COLLECT_PARAM)
        .map(|(_, value)| value.as_str())
        .collect();
    let registry = state.registry.select(&names).map_err(HandlerError::Filter)?;

    let advertised = headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok());
    let timeout = state.web.scrape_timeout(advertised);
    debug!(
        "Scraping {} collector(s) with a timeout of {:?}",
        registry.len(),
        timeout
    );

    let scrape = state.executor.scrape(&registry, timeout).await?;
    let body = encoder::encode(&scrape.measurements)?;
    debug!(
        "Scrape finished after {:?}, {} measurements in {} bytes",
        scrape.duration,
        scrape.measurements.len(),
        body.len()
    );

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let current = state.readiness.current_state();
    let status = if current.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(current.report()))
}

/// `GET /`
pub async fn landing(State(state): State<AppState>) -> String {
    format!(
        "blazebee-exporter {}\n\nMetrics: {}\nHealth:  /health\n",
        env!("CARGO_PKG_VERSION"),
        state.web.telemetry_path
    )
}
