//! Bobby's Workshop Authorization Triggers
//!
//! Provokes, detects and records device authorization prompts (ADB
//! debugging, iOS trust, bootloader and flash modes) by running external
//! device tools under a hard timeout. Every trigger call appends one line
//! to a daily audit log.
//!
//! - `triggers`: the trigger catalog, operations and batch runner
//! - `tools`: sanitization, tool resolution and bounded shell execution
//! - `audit`: append-only JSON-lines audit trail
//! - `server`: HTTP API over the triggers

pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod tools;
pub mod triggers;

pub use error::TriggerError;
pub use triggers::{AuthorizationTriggers, TriggerId, TriggerResult};
