//! Batch Trigger Runner
//!
//! Runs every catalog trigger of one platform against a device, one after
//! another. A trigger that errors or panics becomes a failed entry; the
//! remaining triggers still run.

use super::catalog::{Platform, TriggerId};
use super::result::TriggerResult;
use super::AuthorizationTriggers;
use crate::error::TriggerError;
use crate::metrics;
use crate::tools::DeviceId;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

/// Runs a single trigger by id
#[async_trait]
pub trait TriggerDispatch: Send + Sync {
    async fn dispatch(&self, trigger: TriggerId, device_id: &str) -> Result<TriggerResult, TriggerError>;
}

#[async_trait]
impl TriggerDispatch for AuthorizationTriggers {
    async fn dispatch(&self, trigger: TriggerId, device_id: &str) -> Result<TriggerResult, TriggerError> {
        self.run(trigger, device_id).await
    }
}

/// Outcome of one trigger inside a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    /// The trigger returned a result (successful or not)
    Completed(TriggerResult),
    /// The trigger raised an error or panicked
    Failed { success: bool, error: String },
}

impl BatchOutcome {
    fn failed(error: impl Into<String>) -> Self {
        BatchOutcome::Failed {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            BatchOutcome::Completed(result) => result.success,
            BatchOutcome::Failed { .. } => false,
        }
    }
}

/// One row of a batch report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub trigger_id: &'static str,
    pub trigger_name: &'static str,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// Aggregate result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_triggers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_triggers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_triggers: Option<usize>,
    pub results: Vec<BatchEntry>,
}

impl BatchReport {
    fn no_triggers(platform: &str) -> Self {
        Self {
            success: false,
            message: format!("No triggers available for platform: {}", platform),
            device_id: None,
            platform: None,
            total_triggers: None,
            successful_triggers: None,
            failed_triggers: None,
            results: Vec::new(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("Trigger panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("Trigger panicked: {}", message)
    } else {
        "Trigger panicked".to_string()
    }
}

/// Run every trigger of `platform` against `device_id`, sequentially
///
/// # Errors
///
/// Returns `TriggerError::InvalidInput` if the identifier is empty or has
/// no safe characters. An unknown platform is not an error: the report has
/// `success: false` and no results.
pub async fn trigger_all_available_authorizations(
    dispatch: &dyn TriggerDispatch,
    device_id: &str,
    platform: &str,
) -> Result<BatchReport, TriggerError> {
    let device = DeviceId::parse(device_id)?;

    let Ok(parsed) = platform.parse::<Platform>() else {
        metrics::BATCH_RUNS_TOTAL.with_label_values(&["unknown"]).inc();
        return Ok(BatchReport::no_triggers(platform));
    };
    metrics::BATCH_RUNS_TOTAL
        .with_label_values(&[parsed.as_str()])
        .inc();

    let mut results = Vec::new();
    for descriptor in parsed.triggers() {
        let trigger = descriptor.trigger;
        let call = AssertUnwindSafe(dispatch.dispatch(trigger, device.as_str())).catch_unwind();

        let outcome = match call.await {
            Ok(Ok(result)) => BatchOutcome::Completed(result),
            Ok(Err(e)) => {
                warn!("Trigger {} failed: {}", trigger, e);
                BatchOutcome::failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload);
                warn!("Trigger {} aborted: {}", trigger, message);
                BatchOutcome::failed(message)
            }
        };

        results.push(BatchEntry {
            trigger_id: descriptor.id,
            trigger_name: descriptor.name,
            outcome,
        });
    }

    let total = results.len();
    let successful = results.iter().filter(|r| r.outcome.is_success()).count();
    info!(
        "Batch on {} for {}: {}/{} succeeded",
        parsed, device, successful, total
    );

    Ok(BatchReport {
        success: true,
        message: format!("Executed {} triggers for {} platform", total, platform),
        device_id: Some(device.to_string()),
        platform: Some(platform.to_string()),
        total_triggers: Some(total),
        successful_triggers: Some(successful),
        failed_triggers: Some(total - successful),
        results,
    })
}
