//! Tool Resolution
//!
//! Locates external executables in a fixed order:
//!
//! 1. `<TOOL>_PATH` environment variable, if it names an existing file
//! 2. For `adb` and `fastboot`, the app-managed platform-tools directory
//! 3. `where` (Windows) or `command -v` (elsewhere), bounded at 2 seconds
//! 4. Nothing; callers fall back to the bare command name

use super::timeout::ExecutionTimeout;
use anyhow::Context;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Environment variable that overrides the app data root
pub const DATA_DIR_ENV: &str = "BOBBYS_WORKSHOP_DATA_DIR";

/// Folder name used under `%LOCALAPPDATA%` / `%APPDATA%`
const APP_FOLDER: &str = "Bobbys-Workshop";

/// Tools that may be shipped in the managed platform-tools directory
const MANAGED_TOOLS: [&str; 2] = ["adb", "fastboot"];

/// Environment lookup function (injectable for tests)
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Locates external tools
#[async_trait]
pub trait ToolLocator: Send + Sync {
    /// Absolute path to the tool, or `None` if it cannot be found
    async fn resolve(&self, tool: &str) -> Option<PathBuf>;

    /// Whether the tool can be found at all
    async fn exists(&self, tool: &str) -> bool {
        self.resolve(tool).await.is_some()
    }

    /// Command to invoke the tool: the resolved path, or the bare name so
    /// the shell's own `PATH` lookup gets a try
    async fn command_for(&self, tool: &str) -> String {
        match self.resolve(tool).await {
            Some(path) => path.display().to_string(),
            None => tool.to_string(),
        }
    }

    /// Python interpreter, preferring `python3` over `python`
    async fn python(&self) -> Option<PathBuf> {
        if let Some(path) = self.resolve("python3").await {
            return Some(path);
        }
        self.resolve("python").await
    }
}

/// Name of the environment variable that overrides a tool's location
pub fn env_var_for(tool: &str) -> String {
    format!("{}_PATH", tool.to_uppercase())
}

/// Executable file name for the current OS
fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

/// Root directory for app-managed data
///
/// `BOBBYS_WORKSHOP_DATA_DIR`, then `%LOCALAPPDATA%`, then `%APPDATA%`,
/// then `~/.bobbys-workshop`.
pub fn data_root_dir(env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = env("LOCALAPPDATA") {
        return Path::new(&dir).join(APP_FOLDER);
    }
    if let Some(dir) = env("APPDATA") {
        return Path::new(&dir).join(APP_FOLDER);
    }
    let home = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".bobbys-workshop")
}

/// Managed Android platform-tools directory under a data root
pub fn managed_platform_tools_dir(data_root: &Path) -> PathBuf {
    data_root.join("tools").join("android").join("platform-tools")
}

/// Default tool resolver backed by the process environment and the OS
#[derive(Clone)]
pub struct ToolResolver {
    env: EnvLookup,
    platform_tools_dir: PathBuf,
    lookup_timeout: ExecutionTimeout,
    system_lookup: bool,
}

impl fmt::Debug for ToolResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolResolver")
            .field("platform_tools_dir", &self.platform_tools_dir)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("system_lookup", &self.system_lookup)
            .finish()
    }
}

impl Default for ToolResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolResolver {
    /// Create a resolver reading the real process environment
    pub fn new() -> Self {
        let env: EnvLookup = Arc::new(|key: &str| std::env::var(key).ok());
        let platform_tools_dir = managed_platform_tools_dir(&data_root_dir(env.as_ref()));
        Self {
            env,
            platform_tools_dir,
            lookup_timeout: ExecutionTimeout::lookup(),
            system_lookup: true,
        }
    }

    /// Replace the environment lookup
    ///
    /// The managed platform-tools directory is recomputed from the new
    /// environment.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.platform_tools_dir = managed_platform_tools_dir(&data_root_dir(env.as_ref()));
        self.env = env;
        self
    }

    /// Use an explicit data root instead of the environment-derived one
    pub fn with_data_root(mut self, data_root: impl AsRef<Path>) -> Self {
        self.platform_tools_dir = managed_platform_tools_dir(data_root.as_ref());
        self
    }

    /// Change the bound on OS lookups
    pub fn with_lookup_timeout(mut self, timeout: ExecutionTimeout) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Disable the `where` / `command -v` step
    pub fn without_system_lookup(mut self) -> Self {
        self.system_lookup = false;
        self
    }

    /// The managed platform-tools directory in use
    pub fn platform_tools_dir(&self) -> &Path {
        &self.platform_tools_dir
    }

    fn from_env_override(&self, tool: &str) -> Option<PathBuf> {
        let var = env_var_for(tool);
        let path = PathBuf::from((self.env)(&var)?);
        if path.is_file() {
            debug!("Resolved {} from {}", tool, var);
            Some(path)
        } else {
            debug!("{} points to a missing file: {}", var, path.display());
            None
        }
    }

    fn from_managed_dir(&self, tool: &str) -> Option<PathBuf> {
        if !MANAGED_TOOLS.contains(&tool) {
            return None;
        }
        let candidate = self.platform_tools_dir.join(executable_name(tool));
        if candidate.is_file() {
            debug!("Resolved {} from managed platform-tools", tool);
            Some(candidate)
        } else {
            None
        }
    }

    async fn from_system_lookup(&self, tool: &str) -> Option<PathBuf> {
        if !self.system_lookup {
            return None;
        }
        let lookup = self
            .lookup_timeout
            .run(async {
                let mut cmd = if cfg!(windows) {
                    let mut cmd = Command::new("where");
                    cmd.arg(tool);
                    cmd
                } else {
                    // Tool name is passed as $1, never interpolated
                    let mut cmd = Command::new("sh");
                    cmd.arg("-c").arg("command -v \"$1\"").arg("sh").arg(tool);
                    cmd
                };
                let output = cmd
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .output()
                    .await
                    .context("Failed to run tool lookup")?;
                Ok(output)
            })
            .await;

        match lookup {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let first = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
                debug!("Resolved {} via system lookup: {}", tool, first);
                Some(PathBuf::from(first))
            }
            Ok(_) => None,
            Err(e) => {
                debug!("Lookup for {} failed: {}", tool, e);
                None
            }
        }
    }
}

#[async_trait]
impl ToolLocator for ToolResolver {
    async fn resolve(&self, tool: &str) -> Option<PathBuf> {
        if let Some(path) = self.from_env_override(tool) {
            return Some(path);
        }
        if let Some(path) = self.from_managed_dir(tool) {
            return Some(path);
        }
        self.from_system_lookup(tool).await
    }
}
