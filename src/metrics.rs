/// Prometheus metrics for the receipt routes
///
/// Exposed in text format on `/metrics`.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets, linear_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// Route name ("process_receipt", "get_points")
    pub route: String,
    /// "success" or "error"
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub route: String,
    /// Error classification, e.g. the failed validation check
    pub error_type: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub route: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,

    /// Requests by route and status
    pub requests_total: Family<RequestLabels, Counter>,

    /// Request latency by route
    pub request_duration_seconds: Family<RouteLabels, Histogram>,

    /// Requests currently being processed
    pub active_requests: Family<RouteLabels, Gauge>,

    /// Errors by route and error type
    pub errors_total: Family<ErrorLabels, Counter>,

    /// Receipts held by the score store
    pub receipts_stored: Gauge,

    /// Distribution of awarded points
    pub points_awarded: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("receipts");

        let requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "requests",
            "Total number of receipt requests",
            requests_total.clone(),
        );

        let request_duration_seconds =
            Family::<RouteLabels, Histogram>::new_with_constructor(|| {
                // 0.1ms .. ~1.6s
                Histogram::new(exponential_buckets(0.0001, 2.5, 12))
            });
        registry.register(
            "request_duration_seconds",
            "Request latency histogram in seconds",
            request_duration_seconds.clone(),
        );

        let active_requests = Family::<RouteLabels, Gauge>::default();
        registry.register(
            "active_requests",
            "Number of requests currently being processed",
            active_requests.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "errors",
            "Total number of errors by route and error type",
            errors_total.clone(),
        );

        let receipts_stored = Gauge::default();
        registry.register(
            "stored",
            "Number of receipts held in the score store",
            receipts_stored.clone(),
        );

        let points_awarded = Histogram::new(linear_buckets(0.0, 25.0, 12));
        registry.register(
            "points_awarded",
            "Points awarded per accepted receipt",
            points_awarded.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            requests_total,
            request_duration_seconds,
            active_requests,
            errors_total,
            receipts_stored,
            points_awarded,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(error) = encode(&mut buffer, &registry) {
            tracing::error!(?error, "failed to encode metrics");
        }
        buffer
    }

    pub fn record_request_success(&self, route: &str, duration: Duration) {
        self.requests_total
            .get_or_create(&RequestLabels {
                route: route.to_string(),
                status: "success".to_string(),
            })
            .inc();

        self.observe_duration(route, duration);
    }

    pub fn record_request_error(&self, route: &str, duration: Duration, error_type: &str) {
        self.requests_total
            .get_or_create(&RequestLabels {
                route: route.to_string(),
                status: "error".to_string(),
            })
            .inc();

        self.observe_duration(route, duration);

        self.errors_total
            .get_or_create(&ErrorLabels {
                route: route.to_string(),
                error_type: error_type.to_string(),
            })
            .inc();
    }

    /// Record an accepted receipt. The store never shrinks, so the stored
    /// gauge only moves up.
    pub fn record_receipt_scored(&self, points: i64) {
        self.points_awarded.observe(points as f64);
        self.receipts_stored.inc();
    }

    fn observe_duration(&self, route: &str, duration: Duration) {
        self.request_duration_seconds
            .get_or_create(&RouteLabels {
                route: route.to_string(),
            })
            .observe(duration.as_secs_f64());
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for request timing
///
/// Dropping the guard without calling [`RequestMetrics::success`] or
/// [`RequestMetrics::error`] records the request as an error.
pub struct RequestMetrics {
    route: &'static str,
    start: Instant,
    completed: bool,
}

impl RequestMetrics {
    pub fn new(route: &'static str) -> Self {
        METRICS.active_requests.get_or_create(&route_labels(route)).inc();

        Self {
            route,
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn success(mut self) {
        METRICS.record_request_success(self.route, self.start.elapsed());
        self.finish();
    }

    pub fn error(mut self, error_type: &str) {
        METRICS.record_request_error(self.route, self.start.elapsed(), error_type);
        self.finish();
    }

    fn finish(&mut self) {
        self.completed = true;
        METRICS.active_requests.get_or_create(&route_labels(self.route)).dec();
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.completed {
            METRICS.record_request_error(self.route, self.start.elapsed(), "unknown");
            METRICS.active_requests.get_or_create(&route_labels(self.route)).dec();
        }
    }
}

fn route_labels(route: &str) -> RouteLabels {
    RouteLabels {
        route: route.to_string(),
    }
}
