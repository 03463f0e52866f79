//! Prometheus metrics for annotation retention.
//!
//! Recording functions compile to no-ops without the `prometheus` feature,
//! so callers never need to gate on it.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle, set when metrics are recorded without a listener.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
///
/// With `listen` set, an HTTP scrape endpoint is started on that address
/// (must be called from within a Tokio runtime). Otherwise the recorder is
/// installed and metrics can be rendered through [`get_prometheus_handle`].
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new();

    match config.listen {
        Some(addr) => {
            builder
                .with_http_listener(addr)
                .install()
                .map_err(MetricsError::Install)?;
            tracing::info!(listen = %addr, "Prometheus metrics endpoint started");
        }
        None => {
            let handle = builder.install_recorder().map_err(MetricsError::Install)?;
            PROMETHEUS_HANDLE
                .set(handle)
                .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;
        }
    }

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record rows deleted by a cleanup run.
///
/// # Arguments
/// * `table` - The table rows were deleted from (e.g. "annotation")
/// * `count` - The number of rows deleted
pub fn record_retention_deletion(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "annotation_retention_deletions_total",
            "table" => table.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, count);
    }
}

/// Record the end of a cleanup run.
///
/// `status` is one of "success", "dry_run", "error", "cancelled", "timeout".
pub fn record_retention_run(status: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "annotation_retention_runs_total",
            "status" => status.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = status;
    }
}

/// Record how many expired annotations remain after a run.
///
/// A backlog that keeps growing means the cap is too small for the
/// insertion rate.
pub fn record_expired_backlog(remaining: i64) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("annotation_retention_expired_backlog").set(remaining as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = remaining;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Failed to set up metrics: {0}")]
    Setup(String),
}

#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use super::*;

    #[test]
    fn test_retention_metrics_rendered() {
        // Local recorder: cleanup tests running in parallel record too.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            record_retention_deletion("annotation", 9);
            record_retention_run("success");
            record_expired_backlog(3);
        });

        let rendered = handle.render();
        assert!(rendered.contains("annotation_retention_deletions_total{table=\"annotation\"} 9"));
        assert!(rendered.contains("annotation_retention_runs_total{status=\"success\"} 1"));
        assert!(rendered.contains("annotation_retention_expired_backlog 3"));
    }

    #[test]
    fn test_disabled_metrics_install_nothing() {
        let config = MetricsConfig {
            enabled: false,
            listen: None,
        };
        init_metrics(&config).unwrap();
        assert!(get_prometheus_handle().is_none());
    }
}
