use anyhow::{Context, Result};
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::outcome::{PassResult, VmActionError};

// Per-VM outcomes, labelled skipped / powered_off / destroyed / failed / cancelled
pub static VMS_TOTAL: OnceLock<CounterVec> = OnceLock::new();
// Passes, labelled ok / error
pub static PASSES_TOTAL: OnceLock<CounterVec> = OnceLock::new();
pub static PASS_DURATION: OnceLock<Histogram> = OnceLock::new();

// Thread-safe initialization result
static INIT_RESULT: OnceLock<Result<()>> = OnceLock::new();

/// Register the janitor metrics with the default registry. Idempotent.
pub fn init_metrics() -> Result<()> {
    match INIT_RESULT.get_or_init(init_metrics_internal) {
        Ok(()) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Metrics initialization failed: {}", e)),
    }
}

fn init_metrics_internal() -> Result<()> {
    let vms_total = register_counter_vec!(
        "vsphere_janitor_vms_total",
        "VMs processed by cleanup passes, by outcome",
        &["outcome"]
    )
    .context("Failed to register VMS_TOTAL metric")?;

    let passes_total = register_counter_vec!(
        "vsphere_janitor_passes_total",
        "Cleanup passes, by status",
        &["status"]
    )
    .context("Failed to register PASSES_TOTAL metric")?;

    let pass_duration = register_histogram!(
        "vsphere_janitor_pass_duration_seconds",
        "Cleanup pass duration in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    )
    .context("Failed to register PASS_DURATION metric")?;

    let _ = VMS_TOTAL.set(vms_total);
    let _ = PASSES_TOTAL.set(passes_total);
    let _ = PASS_DURATION.set(pass_duration);

    Ok(())
}

/// Record a completed pass. Does nothing if metrics were never initialized.
pub fn record_pass(result: &PassResult, duration: Duration) {
    if let Some(vms_total) = VMS_TOTAL.get() {
        for outcome in &result.outcomes {
            let label = match &outcome.error {
                Some(VmActionError::Cancelled) => "cancelled",
                Some(_) => "failed",
                None => outcome.action.as_str(),
            };
            vms_total.with_label_values(&[label]).inc();
        }
    }
    observe_pass("ok", duration);
}

/// Record a pass that failed before any VM was processed.
pub fn record_pass_error(duration: Duration) {
    observe_pass("error", duration);
}

fn observe_pass(status: &str, duration: Duration) {
    if let Some(passes_total) = PASSES_TOTAL.get() {
        passes_total.with_label_values(&[status]).inc();
    }
    if let Some(pass_duration) = PASS_DURATION.get() {
        pass_duration.observe(duration.as_secs_f64());
    }
}

/// Encode the default registry in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    // If encoding fails, return empty metrics rather than panic
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Periodically log the current metrics until `cancel` fires.
pub async fn log_metrics_loop(interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for line in get_metrics().lines().filter(|l| !l.starts_with('#')) {
                    tracing::info!(component = "metrics", "{}", line);
                }
            }
        }
    }
}
