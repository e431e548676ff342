//! Execution Timeout Management
//!
//! Every external command runs under one of these bounds. No probe can
//! block indefinitely.

use std::time::Duration;
use tokio::time;

/// Default bound for probe commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound for OS tool lookups (`where` / `command -v`)
pub const LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Execution timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use workshop_triggers::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Bound for the iOS backup info query (15 seconds)
    pub fn medium() -> Self {
        Self::new(Duration::from_secs(15))
    }

    /// Bound for the Android backup prompt (10 seconds)
    pub fn short() -> Self {
        Self::new(Duration::from_secs(10))
    }

    /// Bound for executable lookups (2 seconds)
    pub fn lookup() -> Self {
        Self::new(LOOKUP_TIMEOUT)
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Create a timeout from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Execute a future with a timeout
    ///
    /// Returns the future's result if it completes in time, or an error if
    /// the timeout expires first. The future is dropped on expiry.
    pub async fn run<F, T>(&self, future: F) -> anyhow::Result<T>
    where
        F: std::future::Future<Output = anyhow::Result<T>>,
    {
        match time::timeout(self.duration, future).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Command execution timed out after {:?}",
                self.duration
            )),
        }
    }
}

impl From<Duration> for ExecutionTimeout {
    fn from(duration: Duration) -> Self {
        Self::new(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_default() {
        let timeout = ExecutionTimeout::default();
        assert_eq!(timeout.duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_timeout_presets() {
        assert_eq!(ExecutionTimeout::short().duration(), Duration::from_secs(10));
        assert_eq!(ExecutionTimeout::medium().duration(), Duration::from_secs(15));
        assert_eq!(ExecutionTimeout::lookup().duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_timeout_constructors() {
        assert_eq!(ExecutionTimeout::from_secs(45).duration(), Duration::from_secs(45));
        assert_eq!(
            ExecutionTimeout::from_millis(250).duration(),
            Duration::from_millis(250)
        );
        let from: ExecutionTimeout = Duration::from_secs(3).into();
        assert_eq!(from.duration(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_timeout_run_success() {
        let result = ExecutionTimeout::short()
            .run(async { Ok::<String, anyhow::Error>("done".to_string()) })
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_timeout_run_expires() {
        let result = ExecutionTimeout::from_millis(50)
            .run(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<(), anyhow::Error>(())
            })
            .await;

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_run_future_error() {
        let result = ExecutionTimeout::short()
            .run(async { Err::<(), anyhow::Error>(anyhow::anyhow!("lookup failed")) })
            .await;

        assert!(result.unwrap_err().to_string().contains("lookup failed"));
    }
}
