//! Prometheus metrics registry for the notification service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the dispatcher and the reminder scanner.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{Counter, CounterVec, Gauge, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Completed reminder scan cycles.
    pub scans_total: Counter,
    /// Individual scans (scheduled / appointment / vaccination / prune) that failed.
    pub scan_errors_total: CounterVec,
    /// Notification rows created, labelled by notification type.
    pub notifications_created_total: CounterVec,
    /// Successful outbound deliveries, labelled by channel.
    pub deliveries_total: CounterVec,
    /// Failed outbound deliveries, labelled by channel. Not retried.
    pub delivery_failures_total: CounterVec,
    /// Read notifications removed by retention pruning.
    pub notifications_pruned_total: Counter,
    /// Wall-clock duration of the most recent scan cycle.
    pub last_scan_duration_seconds: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let scans_total = Counter::with_opts(Opts::new(
            "vet_notifier_scans_total",
            "Completed reminder scan cycles",
        ))?;

        let scan_errors_total = CounterVec::new(
            Opts::new("vet_notifier_scan_errors_total", "Failed scans by kind"),
            &["scan"],
        )?;

        let notifications_created_total = CounterVec::new(
            Opts::new(
                "vet_notifier_notifications_created_total",
                "Notification rows created by type",
            ),
            &["type"],
        )?;

        let deliveries_total = CounterVec::new(
            Opts::new("vet_notifier_deliveries_total", "Successful deliveries by channel"),
            &["channel"],
        )?;

        let delivery_failures_total = CounterVec::new(
            Opts::new(
                "vet_notifier_delivery_failures_total",
                "Failed deliveries by channel",
            ),
            &["channel"],
        )?;

        let notifications_pruned_total = Counter::with_opts(Opts::new(
            "vet_notifier_notifications_pruned_total",
            "Read notifications deleted by retention",
        ))?;

        let last_scan_duration_seconds = Gauge::with_opts(Opts::new(
            "vet_notifier_last_scan_duration_seconds",
            "Duration of the most recent scan cycle in seconds",
        ))?;

        registry.register(Box::new(scans_total.clone()))?;
        registry.register(Box::new(scan_errors_total.clone()))?;
        registry.register(Box::new(notifications_created_total.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;
        registry.register(Box::new(notifications_pruned_total.clone()))?;
        registry.register(Box::new(last_scan_duration_seconds.clone()))?;

        Ok(Self {
            scans_total,
            scan_errors_total,
            notifications_created_total,
            deliveries_total,
            delivery_failures_total,
            notifications_pruned_total,
            last_scan_duration_seconds,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
