//! Trigger Result Model
//!
//! Every trigger operation returns a `TriggerResult`: a shared base that
//! all operations fill in, plus an optional category payload
//! (`TriggerDetails`) flattened into the same JSON object.

use crate::tools::{CommandOutput, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authorization category reported with every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationType {
    AdbUsbDebugging,
    FileTransferPermission,
    BackupAuthorization,
    ScreenCapturePermission,
    IosTrustComputer,
    IosPairing,
    IosBackupEncryption,
    DfuRecoveryMode,
    FastbootUnlockVerification,
    FastbootOemUnlock,
    SamsungDownloadMode,
    QualcommEdlMode,
    MediatekSpFlash,
    AdbInstallPermission,
    RebootRecovery,
    RebootBootloader,
    RebootEdl,
    WifiAdbDebugging,
    DeveloperOptionsCheck,
    UsbDebuggingStatus,
    IosAppInstallTrust,
    IosDeveloperTrust,
}

impl AuthorizationType {
    /// Wire name (`adb_usb_debugging`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationType::AdbUsbDebugging => "adb_usb_debugging",
            AuthorizationType::FileTransferPermission => "file_transfer_permission",
            AuthorizationType::BackupAuthorization => "backup_authorization",
            AuthorizationType::ScreenCapturePermission => "screen_capture_permission",
            AuthorizationType::IosTrustComputer => "ios_trust_computer",
            AuthorizationType::IosPairing => "ios_pairing",
            AuthorizationType::IosBackupEncryption => "ios_backup_encryption",
            AuthorizationType::DfuRecoveryMode => "dfu_recovery_mode",
            AuthorizationType::FastbootUnlockVerification => "fastboot_unlock_verification",
            AuthorizationType::FastbootOemUnlock => "fastboot_oem_unlock",
            AuthorizationType::SamsungDownloadMode => "samsung_download_mode",
            AuthorizationType::QualcommEdlMode => "qualcomm_edl_mode",
            AuthorizationType::MediatekSpFlash => "mediatek_sp_flash",
            AuthorizationType::AdbInstallPermission => "adb_install_permission",
            AuthorizationType::RebootRecovery => "reboot_recovery",
            AuthorizationType::RebootBootloader => "reboot_bootloader",
            AuthorizationType::RebootEdl => "reboot_edl",
            AuthorizationType::WifiAdbDebugging => "wifi_adb_debugging",
            AuthorizationType::DeveloperOptionsCheck => "developer_options_check",
            AuthorizationType::UsbDebuggingStatus => "usb_debugging_status",
            AuthorizationType::IosAppInstallTrust => "ios_app_install_trust",
            AuthorizationType::IosDeveloperTrust => "ios_developer_trust",
        }
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// USB debugging state of an Android device as seen by `adb devices -l`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsbDebuggingStatus {
    Unauthorized,
    Authorized,
    Offline,
    NotFound,
    Unknown,
}

impl UsbDebuggingStatus {
    /// Whether the host is authorized for debugging
    pub fn is_authorized(&self) -> bool {
        matches!(self, UsbDebuggingStatus::Authorized)
    }

    /// Wire name (`not_found`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            UsbDebuggingStatus::Unauthorized => "unauthorized",
            UsbDebuggingStatus::Authorized => "authorized",
            UsbDebuggingStatus::Offline => "offline",
            UsbDebuggingStatus::NotFound => "not_found",
            UsbDebuggingStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UsbDebuggingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Samsung Download Mode detection payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadModeInfo {
    pub detected: bool,
    pub mode: String,
    pub command_output: String,
}

/// Category-specific payload, flattened into the result object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerDetails {
    DownloadMode {
        #[serde(rename = "deviceInfo")]
        device_info: DownloadModeInfo,
    },
    DebuggingStatus {
        authorized: bool,
        status: UsbDebuggingStatus,
    },
    BootloaderState {
        unlocked: bool,
    },
    DeveloperOptions {
        #[serde(rename = "developerOptionsEnabled")]
        developer_options_enabled: bool,
    },
    AndroidVersion {
        #[serde(rename = "androidVersion")]
        android_version: String,
    },
    ManualCommand {
        #[serde(rename = "manualCommand")]
        manual_command: String,
        #[serde(
            rename = "alternativeCommand",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        alternative_command: Option<String>,
    },
    ManualSteps {
        #[serde(rename = "manualSteps")]
        manual_steps: Vec<String>,
    },
    ToolPath {
        #[serde(rename = "toolPath")]
        tool_path: String,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of a single trigger operation
///
/// Built once per call through the `with_*` methods and never mutated after
/// it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    /// Whether the probe achieved its goal
    pub success: bool,

    /// Human-readable outcome
    pub message: String,

    /// Whether an on-device prompt or state change was provoked
    pub triggered: bool,

    /// Whether a human must act on the device
    pub requires_user_action: bool,

    pub authorization_type: AuthorizationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_udid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Required external tool was not found; no command was run
    #[serde(default, skip_serializing_if = "is_false")]
    pub tool_missing: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_guide: Option<String>,

    #[serde(flatten)]
    pub details: Option<TriggerDetails>,
}

impl TriggerResult {
    /// Start a result with `triggered` and `requires_user_action` unset
    pub fn new(
        authorization_type: AuthorizationType,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success,
            message: message.into(),
            triggered: false,
            requires_user_action: false,
            authorization_type,
            command_output: None,
            stderr: None,
            exit_code: None,
            device_serial: None,
            device_udid: None,
            error: None,
            note: None,
            warning: None,
            tool_missing: false,
            install_guide: None,
            details: None,
        }
    }

    /// Result for a missing external tool
    ///
    /// `error` names the command that could not be found.
    pub fn tool_missing(
        authorization_type: AuthorizationType,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(authorization_type, false, message);
        result.error = Some(error.into());
        result.tool_missing = true;
        result
    }

    pub fn triggered(mut self, triggered: bool) -> Self {
        self.triggered = triggered;
        self
    }

    pub fn requires_user_action(mut self, requires: bool) -> Self {
        self.requires_user_action = requires;
        self
    }

    /// Attach stdout, stderr and exit code of a finished command
    pub fn with_output(mut self, output: &CommandOutput) -> Self {
        self.command_output = Some(output.stdout.clone());
        self.stderr = Some(output.stderr.clone());
        self.exit_code = Some(output.exit_code);
        self
    }

    /// Attach a failed command: stdout, exit code and its error text
    ///
    /// The error is stderr when present, otherwise the runner's error.
    pub fn with_failure(mut self, output: &CommandOutput) -> Self {
        self.command_output = Some(output.stdout.clone());
        self.exit_code = Some(output.exit_code);
        self.error = if output.stderr.is_empty() {
            output.error.clone()
        } else {
            Some(output.stderr.clone())
        };
        self
    }

    pub fn with_serial(mut self, serial: &DeviceId) -> Self {
        self.device_serial = Some(serial.to_string());
        self
    }

    pub fn with_udid(mut self, udid: &DeviceId) -> Self {
        self.device_udid = Some(udid.to_string());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_install_guide(mut self, guide: impl Into<String>) -> Self {
        self.install_guide = Some(guide.into());
        self
    }

    pub fn with_details(mut self, details: TriggerDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Outcome label used for metrics
    pub fn outcome(&self) -> &'static str {
        if self.tool_missing {
            "tool_missing"
        } else if self.success {
            "success"
        } else if self.requires_user_action {
            "awaiting_user"
        } else {
            "failed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authorization_type_wire_names() {
        let all = [
            AuthorizationType::AdbUsbDebugging,
            AuthorizationType::FastbootOemUnlock,
            AuthorizationType::MediatekSpFlash,
            AuthorizationType::IosDeveloperTrust,
            AuthorizationType::UsbDebuggingStatus,
        ];
        for auth in all {
            let json = serde_json::to_value(auth).unwrap();
            assert_eq!(json, json!(auth.as_str()));
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(UsbDebuggingStatus::NotFound).unwrap(),
            json!("not_found")
        );
        assert!(UsbDebuggingStatus::Authorized.is_authorized());
        assert!(!UsbDebuggingStatus::Offline.is_authorized());
    }

    #[test]
    fn test_tool_missing_serialization() {
        let result = TriggerResult::tool_missing(
            AuthorizationType::AdbUsbDebugging,
            "ADB not installed on system",
            "Command not found: adb",
        )
        .with_install_guide("https://developer.android.com/studio/command-line/adb");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["triggered"], json!(false));
        assert_eq!(json["requiresUserAction"], json!(false));
        assert_eq!(json["toolMissing"], json!(true));
        assert_eq!(json["authorizationType"], json!("adb_usb_debugging"));
        assert_eq!(json["error"], json!("Command not found: adb"));
        assert!(json.get("commandOutput").is_none());
    }

    #[test]
    fn test_tool_missing_omitted_when_false() {
        let result = TriggerResult::new(AuthorizationType::RebootEdl, true, "ok");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("toolMissing").is_none());
        assert!(json.get("note").is_none());
    }

    #[test]
    fn test_details_flattened() {
        let result = TriggerResult::new(
            AuthorizationType::UsbDebuggingStatus,
            true,
            "Device status: unauthorized",
        )
        .with_details(TriggerDetails::DebuggingStatus {
            authorized: false,
            status: UsbDebuggingStatus::Unauthorized,
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["authorized"], json!(false));
        assert_eq!(json["status"], json!("unauthorized"));

        let result = TriggerResult::new(AuthorizationType::FastbootOemUnlock, false, "gate")
            .with_details(TriggerDetails::ManualCommand {
                manual_command: "fastboot -s X oem unlock".to_string(),
                alternative_command: Some("fastboot -s X flashing unlock".to_string()),
            });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["manualCommand"], json!("fastboot -s X oem unlock"));
        assert_eq!(json["alternativeCommand"], json!("fastboot -s X flashing unlock"));
    }

    #[test]
    fn test_details_read_back() {
        let result = TriggerResult::new(AuthorizationType::SamsungDownloadMode, true, "found")
            .with_details(TriggerDetails::DownloadMode {
                device_info: DownloadModeInfo {
                    detected: true,
                    mode: "Download Mode (Odin)".to_string(),
                    command_output: "PIT".to_string(),
                },
            });

        let text = serde_json::to_string(&result).unwrap();
        let parsed: TriggerResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_with_failure_prefers_stderr() {
        let output = CommandOutput::failure("", "error: device unauthorized", 1, "Command failed");
        let result =
            TriggerResult::new(AuthorizationType::AdbUsbDebugging, false, "x").with_failure(&output);
        assert_eq!(result.error.as_deref(), Some("error: device unauthorized"));
        assert_eq!(result.exit_code, Some(1));
        assert!(result.stderr.is_none());
    }

    #[test]
    fn test_outcome_labels() {
        let base = TriggerResult::new(AuthorizationType::IosPairing, false, "x");
        assert_eq!(base.outcome(), "failed");
        assert_eq!(base.clone().requires_user_action(true).outcome(), "awaiting_user");
        assert_eq!(
            TriggerResult::new(AuthorizationType::IosPairing, true, "x").outcome(),
            "success"
        );
        assert_eq!(
            TriggerResult::tool_missing(AuthorizationType::IosPairing, "x", "y").outcome(),
            "tool_missing"
        );
    }
}
