//! Liveness and readiness endpoints.
//!
//! `/health` answers as long as the process serves HTTP. `/ready` and
//! `/health/components` report each component; the service stops being ready
//! once shutdown has begun so load balancers drain it.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    fn from_ok(ok: bool) -> Self {
        if ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub status: HealthStatus,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_ready: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentsResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub components: BTreeMap<&'static str, ComponentReport>,
}

impl ComponentsResponse {
    fn unhealthy(&self) -> Vec<&'static str> {
        self.components
            .iter()
            .filter(|(_, report)| report.status == HealthStatus::Unhealthy)
            .map(|(name, _)| *name)
            .collect()
    }
}

macro_rules! json_with_status {
    ($ty:ty) => {
        impl IntoResponse for $ty {
            fn into_response(self) -> Response {
                (self.status.status_code(), Json(self)).into_response()
            }
        }
    };
}

json_with_status!(LivenessResponse);
json_with_status!(ReadinessResponse);
json_with_status!(ComponentsResponse);

#[derive(Clone)]
pub struct HealthChecker {
    state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl HealthChecker {
    pub fn new(state: Arc<AppState>, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    pub fn liveness(&self) -> LivenessResponse {
        LivenessResponse {
            status: HealthStatus::Healthy,
            timestamp: now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn components(&self) -> ComponentsResponse {
        let mut components = BTreeMap::new();
        components.insert("score_store", self.score_store());
        components.insert("lifecycle", self.lifecycle());

        let healthy = components
            .values()
            .all(|report| report.status == HealthStatus::Healthy);

        ComponentsResponse {
            status: HealthStatus::from_ok(healthy),
            timestamp: now(),
            components,
        }
    }

    pub fn readiness(&self) -> ReadinessResponse {
        let report = self.components();
        let not_ready = report.unhealthy();

        ReadinessResponse {
            ready: not_ready.is_empty(),
            status: report.status,
            timestamp: report.timestamp,
            not_ready,
        }
    }

    fn score_store(&self) -> ComponentReport {
        ComponentReport {
            status: HealthStatus::Healthy,
            error: None,
            details: serde_json::json!({
                "stored_receipts": self.state.store().len(),
                "quarter_check": self.state.engine().quarter_check().to_string(),
            }),
        }
    }

    fn lifecycle(&self) -> ComponentReport {
        let draining = self.shutdown.is_cancelled();
        ComponentReport {
            status: HealthStatus::from_ok(!draining),
            error: draining.then(|| "shutdown in progress".to_string()),
            details: serde_json::json!({ "draining": draining }),
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub async fn liveness_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.liveness()
}

pub async fn readiness_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.readiness()
}

pub async fn components_handler(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    checker.components()
}
