//! Operational HTTP surface: liveness and Prometheus scraping.

pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::metrics::AppMetrics;

/// Assemble the service router.
pub fn router(app_metrics: Arc<AppMetrics>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .with_state(app_metrics)
        .layer(TraceLayer::new_for_http())
}
