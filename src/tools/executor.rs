//! Command Runner
//!
//! Runs a shell command string with a hard timeout and normalizes every
//! outcome (success, non-zero exit, timeout, spawn failure) into one
//! `CommandOutput` shape. Nothing here returns an error to the caller.

use super::timeout::ExecutionTimeout;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

/// Maximum output size in bytes (1MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Exit code reported when the command hit its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the shell could not be spawned
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Exit code reported when the process ended without one (signal)
const UNKNOWN_EXIT_CODE: i32 = 1;

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// Whether the command exited with status 0
    pub success: bool,

    /// Trimmed standard output (truncated if too large)
    pub stdout: String,

    /// Trimmed standard error; on failure falls back to the error text
    pub stderr: String,

    /// Exit code (0 on success)
    pub exit_code: i32,

    /// Failure description, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether the command was killed by the timeout
    #[serde(default)]
    pub timed_out: bool,

    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: f64,
}

impl CommandOutput {
    /// Create a success result
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: 0,
            error: None,
            timed_out: false,
            duration_ms: 0.0,
        }
    }

    /// Create a failure result
    ///
    /// An empty `stderr` is replaced with the error text so callers always
    /// have something to match against.
    pub fn failure(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        let stderr = stderr.into();
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: if stderr.is_empty() { error.clone() } else { stderr },
            exit_code,
            error: Some(error),
            timed_out: false,
            duration_ms: 0.0,
        }
    }

    /// Create a timeout result
    pub fn timeout(timeout: ExecutionTimeout) -> Self {
        let mut output = Self::failure(
            "",
            "",
            TIMEOUT_EXIT_CODE,
            format!("Command timed out after {:?}", timeout.duration()),
        );
        output.timed_out = true;
        output
    }

    /// Create a spawn-failure result
    pub fn spawn_failure(error: impl Into<String>) -> Self {
        Self::failure("", "", SPAWN_FAILURE_EXIT_CODE, error)
    }

    fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.timed_out {
            format!("Timeout after {:.0}ms", self.duration_ms)
        } else if self.success {
            format!(
                "Success (exit code: {}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len()
            )
        } else {
            format!(
                "Failed (exit code: {}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len() + self.stderr.len()
            )
        }
    }
}

/// Something that can run a shell command string under a timeout
///
/// Trigger operations only talk to this trait, so tests can substitute a
/// scripted runner and count spawns.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the platform shell
    async fn run(&self, command: &str, timeout: ExecutionTimeout) -> CommandOutput;
}

/// Configuration for the shell runner
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum output size per stream in bytes (default: 1MB)
    pub max_output_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
        }
    }
}

/// Runs commands through `sh -c` (or `cmd /C` on Windows)
///
/// The child is spawned with `kill_on_drop`, so a timed-out process is
/// killed when its wait future is dropped.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    config: ExecutorConfig,
}

impl ShellRunner {
    /// Create a new runner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new runner with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn shell_command(command: &str) -> TokioCommand {
        if cfg!(windows) {
            let mut process = TokioCommand::new("cmd");
            process.arg("/C").arg(command);
            process
        } else {
            let mut process = TokioCommand::new("sh");
            process.arg("-c").arg(command);
            process
        }
    }

    fn capture(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        truncate_string(text.trim().to_string(), self.config.max_output_size)
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: ExecutionTimeout) -> CommandOutput {
        let start = Instant::now();
        info!("Executing: {}", command);

        let mut process = Self::shell_command(command);
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn shell for '{}': {}", command, e);
                return CommandOutput::spawn_failure(format!("Failed to spawn process: {}", e))
                    .with_duration(elapsed_ms(start));
            }
        };

        let output = match tokio::time::timeout(timeout.duration(), child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Failed to collect output for '{}': {}", command, e);
                return CommandOutput::failure("", "", UNKNOWN_EXIT_CODE, e.to_string())
                    .with_duration(elapsed_ms(start));
            }
            Err(_) => {
                warn!("Command timed out after {:?}: {}", timeout.duration(), command);
                return CommandOutput::timeout(timeout).with_duration(elapsed_ms(start));
            }
        };

        let stdout = self.capture(&output.stdout);
        let stderr = self.capture(&output.stderr);
        let duration_ms = elapsed_ms(start);

        if output.status.success() {
            debug!("Command succeeded in {:.0}ms", duration_ms);
            CommandOutput::success(stdout, stderr).with_duration(duration_ms)
        } else {
            let exit_code = output.status.code().unwrap_or(UNKNOWN_EXIT_CODE);
            warn!("Command failed: {} (exit code: {})", command, exit_code);
            let error = if stderr.is_empty() {
                format!("Command failed: {}", command)
            } else {
                format!("Command failed: {}\n{}", command, stderr)
            };
            CommandOutput::failure(stdout, stderr, exit_code, error).with_duration(duration_ms)
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Truncate a string to a maximum length, adding ellipsis if truncated
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_echo() {
        let runner = ShellRunner::new();
        let result = runner.run("echo hello world", ExecutionTimeout::default()).await;

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello world");
        assert!(result.error.is_none());
        assert!(!result.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failing_command_captures_stderr() {
        let runner = ShellRunner::new();
        let result = runner
            .run("echo partial; echo 'error: device unauthorized' 1>&2; exit 3", ExecutionTimeout::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.stderr, "error: device unauthorized");
        assert!(result.error.unwrap().contains("Command failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_without_stderr_uses_error_text() {
        let runner = ShellRunner::new();
        let result = runner.run("exit 1", ExecutionTimeout::default()).await;

        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Command failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let runner = ShellRunner::new();
        let start = Instant::now();
        let result = runner
            .run("sleep 10", ExecutionTimeout::from_millis(200))
            .await;

        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.error.unwrap().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_truncation() {
        let runner = ShellRunner::with_config(ExecutorConfig::with_max_output_size(100));
        let result = runner.run("seq 1000", ExecutionTimeout::default()).await;

        assert!(result.success);
        assert!(result.stdout.len() <= 100);
        assert!(result.stdout.ends_with("..."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_missing_binary_is_normalized() {
        let runner = ShellRunner::new();
        let result = runner
            .run("this-command-does-not-exist-12345 --version", ExecutionTimeout::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.exit_code, 127);
        assert!(!result.stderr.is_empty());
    }

    #[test]
    fn test_command_output_constructors() {
        let ok = CommandOutput::success("out", "");
        assert!(ok.success);
        assert_eq!(ok.exit_code, 0);

        let failed = CommandOutput::failure("", "", 2, "boom");
        assert_eq!(failed.stderr, "boom");
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let timed_out = CommandOutput::timeout(ExecutionTimeout::from_secs(30));
        assert!(timed_out.timed_out);
        assert_eq!(timed_out.exit_code, TIMEOUT_EXIT_CODE);

        let spawn = CommandOutput::spawn_failure("no shell");
        assert_eq!(spawn.exit_code, SPAWN_FAILURE_EXIT_CODE);
    }

    #[test]
    fn test_command_output_summary() {
        assert!(CommandOutput::success("output", "").summary().contains("Success"));
        assert!(CommandOutput::failure("", "err", 1, "err").summary().contains("Failed"));
        assert!(CommandOutput::timeout(ExecutionTimeout::default())
            .summary()
            .contains("Timeout"));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello".to_string(), 10), "hello");
        assert_eq!(truncate_string("hello".to_string(), 5), "hello");
        assert_eq!(truncate_string("hello world".to_string(), 5), "he...");
        assert_eq!(truncate_string(String::new(), 10), "");
        // Never splits a multi-byte character
        assert_eq!(truncate_string("ééééé".to_string(), 6), "é...");
    }

    #[test]
    fn test_executor_config_builder() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_output_size, MAX_OUTPUT_SIZE);

        let config = ExecutorConfig::with_max_output_size(2048);
        assert_eq!(config.max_output_size, 2048);
    }
}
