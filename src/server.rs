//! HTTP surface of the receipt service.
//!
//! Two domain routes plus the operational endpoints:
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | POST | `/receipts/process` | `{"id": "..."}` or 400 |
//! | GET | `/receipts/{id}/points` | `{"points": n}` or 404 |
//! | GET | `/health`, `/ready`, `/health/components` | health JSON |
//! | GET | `/metrics` | Prometheus text |

use crate::error::ReceiptError;
use crate::health::{self, HealthChecker};
use crate::logging::request_span;
use crate::metrics::{METRICS, RequestMetrics};
use crate::model::{PointsResponse, ProcessReceiptResponse};
use crate::state::AppState;
use crate::validation::ValidationError;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, FromRef, Path, State,
        rejection::{BytesRejection, PathRejection},
    },
    http::{StatusCode, Uri, header},
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const PROCESS_RECEIPT_ROUTE: &str = "process_receipt";
pub const GET_POINTS_ROUTE: &str = "get_points";

/// Router state: the application state and its health checker.
#[derive(Clone)]
pub struct ReceiptServer {
    state: Arc<AppState>,
    health: Arc<HealthChecker>,
}

impl ReceiptServer {
    /// Readiness turns unhealthy once `shutdown` is cancelled.
    pub fn new(state: Arc<AppState>, shutdown: CancellationToken) -> Self {
        let health = Arc::new(HealthChecker::new(state.clone(), shutdown));
        Self { state, health }
    }

    pub fn from_state(state: Arc<AppState>) -> Self {
        Self::new(state, CancellationToken::new())
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(self) -> Router {
        let max_body_bytes = self.state.config().max_body_bytes;

        Router::new()
            .route("/receipts/process", post(process_receipt))
            .route("/receipts/{id}/points", get(get_points))
            .route("/health", get(health::liveness_handler))
            .route("/ready", get(health::readiness_handler))
            .route("/health/components", get(health::components_handler))
            .route("/metrics", get(metrics_handler))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .with_state(self)
    }
}

impl FromRef<ReceiptServer> for Arc<AppState> {
    fn from_ref(server: &ReceiptServer) -> Self {
        server.state.clone()
    }
}

impl FromRef<ReceiptServer> for Arc<HealthChecker> {
    fn from_ref(server: &ReceiptServer) -> Self {
        server.health.clone()
    }
}

/// Build the complete router for a fresh application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    ReceiptServer::from_state(state).router()
}

/// `POST /receipts/process`
///
/// The body is read as raw bytes so that a missing or wrong content type
/// is not itself a rejection. A body that cannot be read at all, for
/// instance one over the size limit, is an invalid receipt.
async fn process_receipt(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ProcessReceiptResponse>, ReceiptError> {
    let span = request_span(PROCESS_RECEIPT_ROUTE);
    let metrics = RequestMetrics::new(PROCESS_RECEIPT_ROUTE);

    span.in_scope(|| {
        let outcome = match body {
            Ok(body) => state.process_receipt(&body),
            Err(rejection) => Err(ReceiptError::invalid(
                ValidationError::MalformedBody {
                    reason: rejection.body_text(),
                },
                state.config().validation_errors,
            )),
        };

        match outcome {
            Ok(processed) => {
                span.record("receipt.id", processed.id.as_str());
                metrics.success();
                Ok(Json(ProcessReceiptResponse { id: processed.id }))
            }
            Err(error) => {
                info!(check = error.metric_label(), reason = %error, "receipt rejected");
                metrics.error(error.metric_label());
                Err(error)
            }
        }
    })
}

/// `GET /receipts/{id}/points`
///
/// An id segment that does not decode to UTF-8 was never issued.
async fn get_points(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<PointsResponse>, ReceiptError> {
    let span = request_span(GET_POINTS_ROUTE);
    let metrics = RequestMetrics::new(GET_POINTS_ROUTE);

    span.in_scope(|| {
        let outcome = match id {
            Ok(Path(id)) => {
                span.record("receipt.id", id.as_str());
                state.points(&id)
            }
            Err(rejection) => {
                debug!(path = %uri.path(), reason = %rejection.body_text(), "undecodable receipt id");
                Err(ReceiptError::not_found(uri.path()))
            }
        };

        match outcome {
            Ok(points) => {
                debug!(points, "points looked up");
                metrics.success();
                Ok(Json(PointsResponse { points }))
            }
            Err(error) => {
                debug!("unknown receipt id");
                metrics.error(error.metric_label());
                Err(error)
            }
        }
    })
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        METRICS.encode(),
    )
}
