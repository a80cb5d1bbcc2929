#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use receipt_processor::state::AppState;
use receipt_processor::{ReceiptServer, ServerConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Scenario A: one item, odd day, 13:01 purchase. Scores 14.
pub fn target_single_item() -> Value {
    json!({
        "retailer": "Target",
        "purchaseDate": "2022-01-01",
        "purchaseTime": "13:01",
        "items": [
            {"shortDescription": "Item 1", "price": "6.49"}
        ],
        "total": "6.49"
    })
}

/// Scenario B: five items with padded descriptions. Scores 28.
pub fn target_five_items() -> Value {
    json!({
        "retailer": "Target",
        "purchaseDate": "2022-01-01",
        "purchaseTime": "13:01",
        "items": [
            {"shortDescription": "Mountain Dew 12PK", "price": "6.49"},
            {"shortDescription": "Emils Cheese Pizza", "price": "12.25"},
            {"shortDescription": "Knorr Creamy Chicken", "price": "1.26"},
            {"shortDescription": "Doritos Nacho Cheese", "price": "3.35"},
            {"shortDescription": "   Klarbrunn 12-PK 12 FL OZ  ", "price": "12.00"}
        ],
        "total": "35.35"
    })
}

/// Round total in the afternoon window. Scores 109.
pub fn corner_market() -> Value {
    json!({
        "retailer": "M&M Corner Market",
        "purchaseDate": "2022-03-20",
        "purchaseTime": "14:33",
        "items": [
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"}
        ],
        "total": "9.00"
    })
}

pub struct TestServer {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// Router whose readiness follows `shutdown`.
    pub fn with_shutdown(config: ServerConfig, shutdown: CancellationToken) -> Self {
        let state = Arc::new(AppState::new(Arc::new(config)));
        let router = ReceiptServer::new(state.clone(), shutdown).router();
        Self { router, state }
    }

    pub async fn post_raw(&self, path: &str, body: impl Into<Body>) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("build request");
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let (status, bytes) = self.post_raw(path, body.to_string()).await;
        (status, parse_json(&bytes))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("build request");
        self.send(request).await
    }

    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let (status, bytes) = self.get(path).await;
        (status, parse_json(&bytes))
    }

    /// Submit a receipt and return the issued id.
    pub async fn submit(&self, receipt: &Value) -> String {
        let (status, body) = self.post_json("/receipts/process", receipt).await;
        assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
        body["id"].as_str().expect("id is a string").to_string()
    }

    pub async fn points(&self, id: &str) -> (StatusCode, Value) {
        self.get_json(&format!("/receipts/{id}/points")).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        (status, bytes)
    }
}

pub fn parse_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("response body is JSON")
}
