//! Tracing subscriber setup.
//!
//! Environment variables read by [`LoggingConfig::from_env`]:
//!
//! | Variable | Values | Default |
//! |---|---|---|
//! | `ENVIRONMENT` / `ENV` | free text | `development` |
//! | `LOG_FORMAT` | `json`, `pretty` | `json` in production, else `pretty` |
//! | `LOG_OUTPUT` | `stdout`, `stderr`, `file` | `stderr` |
//! | `LOG_DIR` | path, used with `file` | `logs` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` / `OTLP_ENDPOINT` | gRPC endpoint | unset |
//! | `OTEL_SAMPLING_RATE` | 0.0 to 1.0 | `0.1` in production, else `1.0` |
//!
//! `RUST_LOG` overrides the level filter.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::TraceError;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, Tracer},
};
use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

const SERVICE_NAME: &str = "receipt-processor";
const LOG_FILE_PREFIX: &str = "receipt-processor.log";
const OTLP_EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedFmtLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily-rotated file under `log_dir`
    File,
}

impl LogOutput {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stdout" => Some(LogOutput::Stdout),
            "stderr" => Some(LogOutput::Stderr),
            "file" => Some(LogOutput::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub log_dir: PathBuf,
    /// Traces are exported only when this is set
    pub otlp_endpoint: Option<String>,
    pub otel_sampling_rate: f64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_environment("development")
    }
}

impl LoggingConfig {
    fn for_environment(environment: &str) -> Self {
        let production = is_production(environment);
        Self {
            environment: environment.to_string(),
            format: if production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            otlp_endpoint: None,
            otel_sampling_rate: if production { 0.1 } else { 1.0 },
        }
    }

    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let mut config = Self::for_environment(&environment);

        if let Some(format) = env::var("LOG_FORMAT").ok().as_deref().and_then(LogFormat::parse) {
            config.format = format;
        }
        if let Some(output) = env::var("LOG_OUTPUT").ok().as_deref().and_then(LogOutput::parse) {
            config.output = output;
        }
        if let Ok(dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        config.otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .or_else(|_| env::var("OTLP_ENDPOINT"))
            .ok()
            .filter(|endpoint| !endpoint.is_empty());

        if let Some(rate) = env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|raw| raw.parse::<f64>().ok())
        {
            config.otel_sampling_rate = rate.clamp(0.0, 1.0);
        }

        config
    }

    fn default_filter(&self) -> String {
        let level = if is_production(&self.environment) {
            "info"
        } else {
            "debug"
        };
        format!("{level},hyper=info,tower=info")
    }

    fn sampler(&self) -> Sampler {
        match self.otel_sampling_rate {
            rate if rate >= 1.0 => Sampler::AlwaysOn,
            rate if rate <= 0.0 => Sampler::AlwaysOff,
            rate => Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(rate))),
        }
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                SERVICE_NAME,
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ),
            KeyValue::new("environment", self.environment.clone()),
        ])
    }
}

fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit so buffered lines are flushed. Fails
/// if a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let (writer, guard) = match config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).with_context(|| {
                format!("failed to create log directory {}", config.log_dir.display())
            })?;
            let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
            tracing_appender::non_blocking(appender)
        }
    };

    let fmt_layer: BoxedFmtLayer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    // Export failures degrade to local logging only
    let mut otel_error = None;
    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match otlp_tracer(&config, endpoint) {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(error) => {
                otel_error = Some(error);
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    if let Some(error) = otel_error {
        tracing::warn!(%error, "OTLP exporter unavailable, traces stay local");
    }
    tracing::info!(
        environment = %config.environment,
        format = ?config.format,
        output = ?config.output,
        otlp = config.otlp_endpoint.is_some(),
        "logging initialized"
    );

    Ok(guard)
}

fn otlp_tracer(config: &LoggingConfig, endpoint: &str) -> Result<Tracer, TraceError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(OTLP_EXPORT_TIMEOUT);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(config.sampler())
                .with_resource(config.resource()),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Flush and stop the global tracer provider.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Span wrapping one request to a receipt route.
pub fn request_span(route: &'static str) -> tracing::Span {
    tracing::info_span!(
        "receipt_request",
        http.route = route,
        receipt.id = tracing::field::Empty,
    )
}
