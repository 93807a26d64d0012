//! Discovery metrics.
//!
//! Metrics are registered against an explicit [`Registry`] instead of a
//! process-wide default so tests can inspect a private registry.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, IntGaugeVec, Opts, Registry};

const NAMESPACE: &str = "prometheus_lightsail_sd";

/// Latency buckets for provider API requests, in seconds.
const REQUEST_DURATION_BUCKETS: &[f64] = &[0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Metrics recorded by a [`Fetcher`](crate::Fetcher).
///
/// Cloning is cheap and clones share the underlying atomics.
#[derive(Clone)]
pub struct DiscoveryMetrics {
    /// Latency of provider API requests.
    pub request_duration: Histogram,
    /// Failed provider API requests.
    pub request_failures: IntCounter,
    /// Targets discovered by the most recent successful poll.
    pub discovered_targets: IntGauge,
}

impl DiscoveryMetrics {
    /// Create the discovery metrics and register them with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::unregistered()?;

        registry.register(Box::new(metrics.request_duration.clone()))?;
        registry.register(Box::new(metrics.request_failures.clone()))?;
        registry.register(Box::new(metrics.discovered_targets.clone()))?;

        Ok(metrics)
    }

    /// Create the discovery metrics without registering them anywhere.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        let request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "request_duration_seconds",
                "Histogram of latencies for requests to the AWS Lightsail API.",
            )
            .namespace(NAMESPACE)
            .buckets(REQUEST_DURATION_BUCKETS.to_vec()),
        )?;

        let request_failures = IntCounter::with_opts(
            Opts::new(
                "request_failures_total",
                "Total number of failed requests to the AWS Lightsail API.",
            )
            .namespace(NAMESPACE),
        )?;

        let discovered_targets = IntGauge::with_opts(
            Opts::new("discovered_targets", "Number of discovered lightsail targets")
                .namespace(NAMESPACE),
        )?;

        Ok(Self {
            request_duration,
            request_failures,
            discovered_targets,
        })
    }
}

impl std::fmt::Debug for DiscoveryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryMetrics")
            .field("requests", &self.request_duration.get_sample_count())
            .field("request_failures", &self.request_failures.get())
            .field("discovered_targets", &self.discovered_targets.get())
            .finish()
    }
}

/// Register process-level collectors: build info and, on Linux, process stats.
pub fn register_process_collectors(registry: &Registry) -> Result<(), prometheus::Error> {
    let build_info = IntGaugeVec::new(
        Opts::new(
            "build_info",
            "A metric with a constant '1' value labeled by the version of the binary.",
        )
        .namespace(NAMESPACE),
        &["version"],
    )?;
    build_info
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1);
    registry.register(Box::new(build_info))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;

    Ok(())
}
