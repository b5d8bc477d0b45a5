//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_loads_total` (counter): startup pipeline runs by `result`
//! - `config_reloads_total` (counter): reloads and applied edits by `result`
//! - `admission_rejected_total` (counter): rejected requests by `reason`
//! - `running_jobs` (gauge): jobs in flight by `kind`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus recorder is installed once by the binary and rendered on `/metrics`

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_config_load(success: bool) {
    metrics::counter!("config_loads_total", "result" => result_label(success)).increment(1);
}

pub fn record_config_reload(success: bool) {
    metrics::counter!("config_reloads_total", "result" => result_label(success)).increment(1);
}

pub fn record_admission_rejected(reason: &'static str) {
    metrics::counter!("admission_rejected_total", "reason" => reason).increment(1);
}

pub fn set_running_jobs(kind: &'static str, count: usize) {
    metrics::gauge!("running_jobs", "kind" => kind).set(count as f64);
}
