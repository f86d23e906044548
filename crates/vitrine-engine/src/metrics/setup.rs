//! Metrics setup and initialization.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use super::register_cache_metrics;
use crate::error::EngineError;

/// Histogram buckets in seconds, from 100us to 10s.
const OPERATION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the Prometheus recorder with a scrape endpoint on `listen`.
///
/// Must run inside a tokio runtime; the exporter serves from a spawned task.
pub fn init_metrics(listen: SocketAddr) -> Result<(), EngineError> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .set_buckets(OPERATION_BUCKETS)
        .map_err(|e| EngineError::Metrics(e.to_string()))?
        .install()
        .map_err(|e| EngineError::Metrics(e.to_string()))?;

    register_cache_metrics();
    info!(listen = %listen, "Metrics exporter listening");
    Ok(())
}
