// Prometheus metrics for the trigger executor
//
// Exposed on the /metrics endpoint of the HTTP server:
// - Trigger invocations by trigger and outcome (counter)
// - Missing tools by tool name (counter)
// - External command durations (histogram)
// - Command timeouts (counter)
// - Batch runs by platform (counter)
// - Audit write failures (counter)

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref TRIGGER_INVOCATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("trigger_invocations_total", "Total number of trigger operations executed"),
        &["trigger", "outcome"]
    ).expect("Failed to create trigger invocations metric");

    pub static ref TOOL_MISSING_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("tool_missing_total", "Trigger calls short-circuited by a missing tool"),
        &["tool"]
    ).expect("Failed to create tool missing metric");

    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("command_duration_seconds", "Duration of external probe commands")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        &["trigger"]
    ).expect("Failed to create command duration metric");

    pub static ref COMMAND_TIMEOUTS_TOTAL: IntCounter = IntCounter::new(
        "command_timeouts_total",
        "Total number of probe commands killed by their timeout"
    ).expect("Failed to create command timeouts metric");

    pub static ref BATCH_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("batch_runs_total", "Total number of batch trigger runs"),
        &["platform"]
    ).expect("Failed to create batch runs metric");

    pub static ref AUDIT_WRITE_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "audit_write_errors_total",
        "Total number of audit entries that could not be written"
    ).expect("Failed to create audit write errors metric");
}

/// Register all metrics with the registry
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRIGGER_INVOCATIONS_TOTAL.clone()),
        Box::new(TOOL_MISSING_TOTAL.clone()),
        Box::new(COMMAND_DURATION_SECONDS.clone()),
        Box::new(COMMAND_TIMEOUTS_TOTAL.clone()),
        Box::new(BATCH_RUNS_TOTAL.clone()),
        Box::new(AUDIT_WRITE_ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
