//! Graceful shutdown coordination
//!
//! A [`ShutdownCoordinator`] owns a cancellation token that is cancelled on
//! SIGINT or SIGTERM (or programmatically). The HTTP server stops accepting
//! connections once the token fires, and in-flight requests get up to the
//! configured drain timeout to finish.
//!
//! # Example
//!
//! ```rust,no_run
//! use receipt_processor::shutdown::{ShutdownConfig, ShutdownCoordinator};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let coordinator = Arc::new(ShutdownCoordinator::new(ShutdownConfig::default()));
//! coordinator.clone().listen_for_signals();
//!
//! let token = coordinator.token();
//! let server = async move {
//!     token.cancelled().await;
//!     Ok::<(), std::io::Error>(())
//! };
//! coordinator.drain(server).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::AppState;

const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// How long in-flight requests may run after shutdown starts
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }
}

impl ShutdownConfig {
    pub fn with_drain_timeout(mut self, timeout_secs: u64) -> Self {
        self.drain_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Serving traffic
    Running,
    /// No new connections; waiting for in-flight requests
    Draining,
    /// All requests finished within the drain timeout
    Complete,
    /// Drain timeout elapsed with requests still running
    Forced,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Draining => write!(f, "draining"),
            ShutdownPhase::Complete => write!(f, "complete"),
            ShutdownPhase::Forced => write!(f, "forced"),
        }
    }
}

pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    phase: RwLock<ShutdownPhase>,
    shutdown_token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            phase: RwLock::new(ShutdownPhase::Running),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token cancelled when shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.read()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Begin shutdown without waiting for a signal.
    pub fn initiate(&self) {
        if !self.shutdown_token.is_cancelled() {
            *self.phase.write() = ShutdownPhase::Draining;
            self.shutdown_token.cancel();
        }
    }

    /// Wait for a shutdown signal (SIGTERM or SIGINT)
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(?error, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    error!(?error, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            },
            _ = self.shutdown_token.cancelled() => {}
        }
    }

    /// Spawn a task that initiates shutdown on the first OS signal.
    pub fn listen_for_signals(self: Arc<Self>) {
        tokio::spawn(async move {
            self.wait_for_signal().await;
            self.initiate();
        });
    }

    /// Drive `server` to completion, giving it at most the drain timeout
    /// once shutdown has been initiated.
    pub async fn drain<F, E>(&self, server: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), E>>,
        E: Into<anyhow::Error>,
    {
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                self.finish(ShutdownPhase::Complete);
                return result.map_err(Into::into);
            }
            _ = self.shutdown_token.cancelled() => {}
        }

        info!(
            timeout_secs = self.config.drain_timeout.as_secs(),
            "draining in-flight requests"
        );

        match timeout(self.config.drain_timeout, &mut server).await {
            Ok(result) => {
                self.finish(ShutdownPhase::Complete);
                result.map_err(Into::into)
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.drain_timeout.as_secs(),
                    "drain timeout exceeded, abandoning in-flight requests"
                );
                self.finish(ShutdownPhase::Forced);
                Ok(())
            }
        }
    }

    fn finish(&self, phase: ShutdownPhase) {
        *self.phase.write() = phase;
        info!(phase = %phase, "shutdown finished");
    }
}

/// Log what the service held when it stopped. Scores are not persisted.
pub fn report_final_state(state: &AppState) {
    info!(
        stored_receipts = state.store().len(),
        "receipt store discarded at shutdown"
    );
}
