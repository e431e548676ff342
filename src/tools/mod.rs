//! Tool Execution Subsystem
//!
//! Everything needed to run an external device tool safely:
//!
//! - `sanitize.rs`: device identifier sanitization and shell quoting
//! - `resolver.rs`: locating `adb`, `fastboot`, `idevice*` and friends
//! - `executor.rs`: shell execution with a hard timeout and normalized output
//! - `timeout.rs`: timeout presets
//!
//! # Example
//!
//! ```no_run
//! use workshop_triggers::tools::{CommandRunner, ExecutionTimeout, ShellRunner, ToolLocator, ToolResolver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = ToolResolver::new();
//!     let adb = resolver.command_for("adb").await;
//!
//!     let runner = ShellRunner::new();
//!     let output = runner.run(&format!("\"{}\" devices -l", adb), ExecutionTimeout::default()).await;
//!     println!("{}", output.summary());
//! }
//! ```

mod executor;
mod resolver;
mod sanitize;
mod timeout;

pub use executor::{
    CommandOutput, CommandRunner, ExecutorConfig, ShellRunner, SPAWN_FAILURE_EXIT_CODE,
    TIMEOUT_EXIT_CODE,
};
pub use resolver::{
    data_root_dir, env_var_for, managed_platform_tools_dir, EnvLookup, ToolLocator, ToolResolver,
    DATA_DIR_ENV,
};
pub use sanitize::{quote_for_shell, sanitize_input, DeviceId};
pub use timeout::{ExecutionTimeout, DEFAULT_COMMAND_TIMEOUT, LOOKUP_TIMEOUT};
