//! Device Authorization Triggers
//!
//! Each trigger provokes (or checks for) an authorization prompt or mode
//! change on a connected device by running an external tool. Every call
//! follows the same pipeline:
//!
//! 1. Sanitize the device identifier (the only hard failure)
//! 2. Check the required tool; if missing, report `toolMissing` and run nothing
//! 3. Run one or two bounded probe commands
//! 4. Classify the output into a `TriggerResult`
//! 5. Append one audit entry and return
//!
//! Operations live in `android.rs`, `ios.rs` and `flash.rs`; the batch
//! runner in `batch.rs` drives them from the catalog.

/// Unwrap a located tool command, or return the tool-missing result
macro_rules! require {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self.$method($($arg),*).await {
            Ok(command) => command,
            Err(missing) => return Ok(missing),
        }
    };
}

mod android;
mod batch;
mod catalog;
mod classifier;
mod flash;
mod ios;
mod result;

pub use batch::{
    trigger_all_available_authorizations, BatchEntry, BatchOutcome, BatchReport, TriggerDispatch,
};
pub use catalog::{
    get_all_available_triggers, CatalogEntry, IdentifierKind, Platform, PlatformCatalog,
    TriggerDescriptor, TriggerId, TriggerListing,
};
pub use classifier::{OutcomeClassifier, Probe, ProbeOutcome, Signatures};
pub use result::{
    AuthorizationType, DownloadModeInfo, TriggerDetails, TriggerResult, UsbDebuggingStatus,
};

use crate::audit::{AuditEntry, AuditSink, FileAuditLog};
use crate::config::Config;
use crate::error::TriggerError;
use crate::metrics;
use crate::tools::{
    quote_for_shell, CommandOutput, CommandRunner, DeviceId, ExecutionTimeout, ExecutorConfig,
    ShellRunner, ToolLocator, ToolResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// External tools a trigger may require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Adb,
    Fastboot,
    Heimdall,
    IdeviceInfo,
    IdevicePair,
    IdeviceBackup2,
    IdeviceEnterRecovery,
    IdeviceInstaller,
}

impl Tool {
    /// Executable base name
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Adb => "adb",
            Tool::Fastboot => "fastboot",
            Tool::Heimdall => "heimdall",
            Tool::IdeviceInfo => "ideviceinfo",
            Tool::IdevicePair => "idevicepair",
            Tool::IdeviceBackup2 => "idevicebackup2",
            Tool::IdeviceEnterRecovery => "ideviceenterrecovery",
            Tool::IdeviceInstaller => "ideviceinstaller",
        }
    }

    fn missing_message(&self) -> &'static str {
        match self {
            Tool::Adb => "ADB not installed on system",
            Tool::Fastboot => "Fastboot not installed on system",
            Tool::Heimdall => "Heimdall not installed on system",
            Tool::IdeviceInfo
            | Tool::IdevicePair
            | Tool::IdeviceBackup2
            | Tool::IdeviceEnterRecovery => "libimobiledevice not installed on system",
            Tool::IdeviceInstaller => "ideviceinstaller not installed on system",
        }
    }

    fn install_guide(&self) -> Option<&'static str> {
        match self {
            Tool::Adb => Some("https://developer.android.com/studio/command-line/adb"),
            Tool::Fastboot => None,
            Tool::Heimdall => Some("Install Heimdall: https://github.com/Benjamin-Dobell/Heimdall"),
            Tool::IdeviceInfo
            | Tool::IdevicePair
            | Tool::IdeviceBackup2
            | Tool::IdeviceEnterRecovery => {
                Some("Install libimobiledevice: brew install libimobiledevice")
            }
            Tool::IdeviceInstaller => Some("Install: brew install ideviceinstaller"),
        }
    }
}

/// Runtime settings for trigger operations
#[derive(Debug, Clone)]
pub struct TriggerSettings {
    /// Directory holding `edl/edl.py` and `mtkclient/`
    pub libs_dir: PathBuf,

    /// Where the file-transfer probe writes its scratch file
    pub temp_dir: PathBuf,

    /// Bound for probes without a dedicated timeout
    pub command_timeout: ExecutionTimeout,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            libs_dir: PathBuf::from("libs"),
            temp_dir: std::env::temp_dir(),
            command_timeout: ExecutionTimeout::default(),
        }
    }
}

/// Executes authorization triggers against connected devices
///
/// Cheap to share behind an `Arc`; holds no per-device state.
pub struct AuthorizationTriggers {
    runner: Arc<dyn CommandRunner>,
    tools: Arc<dyn ToolLocator>,
    audit: Arc<dyn AuditSink>,
    classifier: OutcomeClassifier,
    settings: TriggerSettings,
}

impl AuthorizationTriggers {
    /// Create an executor with default classifier and settings
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tools: Arc<dyn ToolLocator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            runner,
            tools,
            audit,
            classifier: OutcomeClassifier::default(),
            settings: TriggerSettings::default(),
        }
    }

    /// Build the production executor from configuration
    pub fn from_config(config: &Config) -> Self {
        let runner = ShellRunner::with_config(ExecutorConfig::with_max_output_size(
            config.execution.max_output_bytes,
        ));

        let mut resolver = ToolResolver::new()
            .with_lookup_timeout(ExecutionTimeout::from_millis(config.execution.lookup_timeout_ms));
        if let Some(ref data_dir) = config.tools.data_dir {
            resolver = resolver.with_data_root(data_dir);
        }

        let settings = TriggerSettings {
            libs_dir: config.tools.libs_dir.clone(),
            command_timeout: ExecutionTimeout::from_secs(config.execution.command_timeout_secs),
            ..TriggerSettings::default()
        };

        Self::new(
            Arc::new(runner),
            Arc::new(resolver),
            Arc::new(FileAuditLog::new(config.audit.log_dir.clone())),
        )
        .with_classifier(OutcomeClassifier::new(config.signatures.clone()))
        .with_settings(settings)
    }

    pub fn with_classifier(mut self, classifier: OutcomeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_settings(mut self, settings: TriggerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run a trigger by id
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidInput` if the identifier is empty or
    /// has no safe characters. Every other outcome is a `TriggerResult`.
    pub async fn run(&self, trigger: TriggerId, device_id: &str) -> Result<TriggerResult, TriggerError> {
        match trigger {
            TriggerId::AdbUsbDebugging => self.trigger_adb_usb_debugging(device_id).await,
            TriggerId::FileTransfer => self.trigger_file_transfer_auth(device_id).await,
            TriggerId::BackupAuth => self.trigger_backup_auth(device_id).await,
            TriggerId::ScreenCapture => self.trigger_screen_capture_auth(device_id).await,
            TriggerId::InstallAuth => self.trigger_adb_install_auth(device_id).await,
            TriggerId::WifiAdb => self.trigger_wifi_adb_auth(device_id).await,
            TriggerId::DeveloperOptions => self.verify_developer_options(device_id).await,
            TriggerId::UsbDebuggingStatus => self.check_usb_debugging_status(device_id).await,
            TriggerId::RebootRecovery => self.reboot_to_recovery(device_id).await,
            TriggerId::RebootBootloader => self.reboot_to_bootloader(device_id).await,
            TriggerId::RebootEdl => self.reboot_to_edl(device_id).await,
            TriggerId::IosTrust => self.trigger_ios_trust_computer(device_id).await,
            TriggerId::IosPairing => self.trigger_ios_pairing(device_id).await,
            TriggerId::IosBackup => self.trigger_ios_backup_encryption(device_id).await,
            TriggerId::IosDfu => self.trigger_dfu_recovery_mode(device_id).await,
            TriggerId::IosAppInstall => self.trigger_ios_app_install_auth(device_id).await,
            TriggerId::IosDeveloper => self.trigger_ios_developer_trust(device_id).await,
            TriggerId::FastbootUnlock => self.verify_fastboot_unlock(device_id).await,
            TriggerId::FastbootOemUnlock => self.trigger_fastboot_oem_unlock(device_id).await,
            TriggerId::SamsungDownload => self.trigger_samsung_download_mode(device_id).await,
            TriggerId::QualcommEdl => self.verify_qualcomm_edl(device_id).await,
            TriggerId::MediatekFlash => self.verify_mediatek_flash(device_id).await,
        }
    }

    /// Run every trigger of a platform against one device
    pub async fn trigger_all_available_authorizations(
        &self,
        device_id: &str,
        platform: &str,
    ) -> Result<BatchReport, TriggerError> {
        trigger_all_available_authorizations(self, device_id, platform).await
    }

    /// Start a result for `trigger`
    fn result(&self, trigger: TriggerId, success: bool, message: impl Into<String>) -> TriggerResult {
        TriggerResult::new(trigger.authorization_type(), success, message)
    }

    /// Quoted command for a tool, or the audited tool-missing result
    async fn require_tool(
        &self,
        trigger: TriggerId,
        device: &DeviceId,
        tool: Tool,
    ) -> Result<String, TriggerResult> {
        match self.tools.resolve(tool.binary()).await {
            Some(path) => Ok(quote_for_shell(&path.display().to_string())),
            None => {
                let mut result = TriggerResult::tool_missing(
                    trigger.authorization_type(),
                    tool.missing_message(),
                    format!("Command not found: {}", tool.binary()),
                );
                if let Some(guide) = tool.install_guide() {
                    result = result.with_install_guide(guide);
                }
                Err(self.missing(trigger, device, tool.binary(), result).await)
            }
        }
    }

    /// Python interpreter, or the audited tool-missing result
    async fn require_python(&self, trigger: TriggerId, device: &DeviceId) -> Result<String, TriggerResult> {
        match self.tools.python().await {
            Some(path) => Ok(quote_for_shell(&path.display().to_string())),
            None => {
                let result = TriggerResult::tool_missing(
                    trigger.authorization_type(),
                    "Python3 not installed on system",
                    "Command not found: python3 (or python)",
                );
                Err(self.missing(trigger, device, "python3", result).await)
            }
        }
    }

    async fn missing(
        &self,
        trigger: TriggerId,
        device: &DeviceId,
        tool: &str,
        result: TriggerResult,
    ) -> TriggerResult {
        debug!("{} skipped: {} not found", trigger.method(), tool);
        metrics::TOOL_MISSING_TOTAL.with_label_values(&[tool]).inc();
        self.finish(trigger, device, result).await
    }

    /// Run a probe command, recording duration and timeouts
    async fn exec(&self, trigger: TriggerId, command: &str, timeout: ExecutionTimeout) -> CommandOutput {
        let output = self.runner.run(command, timeout).await;
        metrics::COMMAND_DURATION_SECONDS
            .with_label_values(&[trigger.id()])
            .observe(output.duration_ms / 1000.0);
        if output.timed_out {
            metrics::COMMAND_TIMEOUTS_TOTAL.inc();
        }
        output
    }

    /// Record the outcome and write the audit entry
    ///
    /// Audit failures are logged and counted; the result is returned either way.
    async fn finish(&self, trigger: TriggerId, device: &DeviceId, result: TriggerResult) -> TriggerResult {
        metrics::TRIGGER_INVOCATIONS_TOTAL
            .with_label_values(&[trigger.id(), result.outcome()])
            .inc();

        let entry = AuditEntry::new(
            trigger.method(),
            trigger.identifier_kind(),
            device.as_str(),
            result,
        );
        if let Err(e) = self.audit.record(&entry).await {
            warn!("Failed to write audit entry for {}: {}", trigger.method(), e);
            metrics::AUDIT_WRITE_ERRORS_TOTAL.inc();
        }
        entry.result
    }
}

/// First `max` characters of `s`
fn prefix(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_messages() {
        assert_eq!(Tool::IdevicePair.missing_message(), "libimobiledevice not installed on system");
        assert_eq!(Tool::IdeviceInstaller.binary(), "ideviceinstaller");
        assert!(Tool::Fastboot.install_guide().is_none());
    }

    #[test]
    fn test_prefix_counts_characters() {
        assert_eq!(prefix("abcdef", 3), "abc");
        assert_eq!(prefix("ab", 3), "ab");
        assert_eq!(prefix("ééé", 2), "éé");
    }

    #[test]
    fn test_default_settings() {
        let settings = TriggerSettings::default();
        assert_eq!(settings.libs_dir, PathBuf::from("libs"));
        assert_eq!(settings.command_timeout, ExecutionTimeout::default());
    }
}
