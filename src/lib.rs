pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod scoring;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod validation;

pub use config::{CliArgs, ServerConfig};
pub use error::{ErrorCode, ReceiptError, ValidationErrorMode};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use scoring::{QuarterCheck, ScoringEngine, compute_score};
pub use server::{ReceiptServer, build_router};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};
pub use store::ScoreStore;

use anyhow::{Context, Result};
use state::AppState;
use std::{future::IntoFuture, sync::Arc};
use tokio::net::TcpListener;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone()));

    tracing::info!(
        bind = %config.http_bind_address,
        quarter_check = %config.quarter_check,
        validation_errors = %config.validation_errors,
        max_body_bytes = config.max_body_bytes,
        "starting receipt processor",
    );

    let shutdown_config =
        ShutdownConfig::default().with_drain_timeout(config.graceful_shutdown_timeout_secs);
    let coordinator = Arc::new(ShutdownCoordinator::new(shutdown_config));
    coordinator.clone().listen_for_signals();

    let router = ReceiptServer::new(state.clone(), coordinator.token()).router();
    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(transport = "http", bind = %actual_addr, "listening");

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(coordinator.token().cancelled_owned())
        .into_future();

    let result = coordinator.drain(server).await;

    shutdown::report_final_state(&state);
    result
}
