use prometheus::{HistogramOpts, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Arc::new(Metrics::new())
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Fetch metrics
    pub fetch_requests: IntCounter,
    pub fetch_failures: IntCounterVec,
    pub fetch_duration: Histogram,

    // Lifecycle metrics
    pub forced_refreshes: IntCounterVec,
    pub token_expiry_unix: IntGauge,
    pub scheduled_delay_ms: IntGauge,

    // Config/runtime
    pub config_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new_custom(Some("wechattoken".into()), None)
            .expect("metrics registry prefix is valid");

        let metrics = Self {
            fetch_requests: IntCounter::new("fetch_requests_total", "Total token fetch attempts")
                .expect("valid metric"),
            fetch_failures: IntCounterVec::new(
                Opts::new("fetch_failures_total", "Token fetch failures by reason"),
                &["reason"],
            )
            .expect("valid metric"),
            fetch_duration: Histogram::with_opts(
                HistogramOpts::new("fetch_duration_seconds", "Token fetch duration seconds")
                    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            )
            .expect("valid metric"),

            forced_refreshes: IntCounterVec::new(
                Opts::new("forced_refreshes_total", "Forced refresh requests by outcome"),
                &["outcome"],
            )
            .expect("valid metric"),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Current token expiry timestamp")
                .expect("valid metric"),
            scheduled_delay_ms: IntGauge::new("scheduled_delay_ms", "Delay until the next scheduled fetch")
                .expect("valid metric"),

            config_errors: IntCounter::new("config_errors_total", "Config parse and validation errors")
                .expect("valid metric"),
            up: IntGauge::new("up", "1 if service is healthy").expect("valid metric"),

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.fetch_requests.clone()),
            Box::new(metrics.fetch_failures.clone()),
            Box::new(metrics.fetch_duration.clone()),
            Box::new(metrics.forced_refreshes.clone()),
            Box::new(metrics.token_expiry_unix.clone()),
            Box::new(metrics.scheduled_delay_ms.clone()),
            Box::new(metrics.config_errors.clone()),
            Box::new(metrics.up.clone()),
        ];
        for collector in collectors {
            reg.register(collector).expect("metric registered once");
        }

        metrics
    }
}
