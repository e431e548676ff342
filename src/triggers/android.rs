//! Android (ADB) triggers

use super::classifier::{OutcomeClassifier, Probe, ProbeOutcome};
use super::result::{TriggerDetails, TriggerResult};
use super::{AuthorizationTriggers, Tool, TriggerId};
use crate::error::TriggerError;
use crate::tools::{quote_for_shell, DeviceId, ExecutionTimeout};
use chrono::Utc;
use tracing::debug;

/// Device-side path the file-transfer probe pushes to
const TRANSFER_TARGET: &str = "/sdcard/Download/pandora_auth_test.txt";

/// Device-side path the screen-capture probe writes to
const SCREENSHOT_TARGET: &str = "/sdcard/pandora_screen_test.png";

const TRANSFER_CONTENT: &str = "Pandora Codex authorization test\n";

/// Port used by `adb tcpip`
const WIFI_ADB_PORT: u16 = 5555;

impl AuthorizationTriggers {
    /// Provoke the "Allow USB debugging?" dialog with a harmless shell query
    pub async fn trigger_adb_usb_debugging(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::AdbUsbDebugging;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!("{} -s {} shell getprop ro.build.version.release", adb, serial);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let result = match self.classifier.classify(Probe::AdbShell, &output) {
            ProbeOutcome::Succeeded => self
                .result(trigger, true, "ADB authorization dialog triggered on device")
                .triggered(true)
                .requires_user_action(true)
                .with_output(&output)
                .with_details(TriggerDetails::AndroidVersion {
                    android_version: output.stdout.clone(),
                }),
            ProbeOutcome::AwaitingUser => self
                .result(trigger, false, "Device unauthorized - waiting for user approval")
                .triggered(true)
                .requires_user_action(true)
                .with_failure(&output),
            ProbeOutcome::Failed => self
                .result(trigger, false, "Failed to trigger ADB authorization")
                .with_failure(&output),
        };

        Ok(self.finish(trigger, &serial, result.with_serial(&serial)).await)
    }

    /// Push a scratch file to provoke the file-transfer (MTP) permission
    pub async fn trigger_file_transfer_auth(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::FileTransfer;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let scratch = self.settings.temp_dir.join(format!(
            "pandora_auth_test_{}_{}.txt",
            serial,
            Utc::now().timestamp_millis()
        ));
        if let Err(e) = tokio::fs::write(&scratch, TRANSFER_CONTENT).await {
            let result = self
                .result(trigger, false, "Failed to create test file")
                .with_error(e.to_string());
            return Ok(self.finish(trigger, &serial, result).await);
        }

        let command = format!(
            "{} -s {} push {} {}",
            adb,
            serial,
            quote_for_shell(&scratch.display().to_string()),
            TRANSFER_TARGET
        );
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            debug!("Could not remove {}: {}", scratch.display(), e);
        }

        let result = if output.success {
            let cleanup = format!("{} -s {} shell rm {}", adb, serial, TRANSFER_TARGET);
            self.exec(trigger, &cleanup, self.settings.command_timeout).await;

            self.result(trigger, true, "File transfer authorization triggered successfully")
                .triggered(true)
                .requires_user_action(true)
                .with_output(&output)
        } else {
            self.result(trigger, false, "File transfer authorization required")
                .triggered(true)
                .requires_user_action(true)
                .with_failure(&output)
        };

        Ok(self.finish(trigger, &serial, result.with_serial(&serial)).await)
    }

    /// Start an `adb backup` to bring up the backup confirmation screen
    pub async fn trigger_backup_auth(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::BackupAuth;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!("{} -s {} backup -noapk -noshared com.android.settings", adb, serial);
        let output = self.exec(trigger, &command, ExecutionTimeout::short()).await;

        let prompted = self.classifier.classify(Probe::AdbBackup, &output).is_success();
        let message = if prompted {
            "Backup authorization dialog triggered on device"
        } else {
            "Failed to trigger backup authorization"
        };

        let result = self
            .result(trigger, prompted, message)
            .triggered(true)
            .requires_user_action(true)
            .with_output(&output)
            .with_serial(&serial)
            .with_note("Backup authorization may require device screen to be unlocked");

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Take (and delete) a screenshot to check screen capture permission
    pub async fn trigger_screen_capture_auth(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::ScreenCapture;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!("{} -s {} shell screencap -p {}", adb, serial, SCREENSHOT_TARGET);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let result = if output.success {
            let cleanup = format!("{} -s {} shell rm {}", adb, serial, SCREENSHOT_TARGET);
            self.exec(trigger, &cleanup, self.settings.command_timeout).await;

            self.result(trigger, true, "Screen capture permission verified")
                .triggered(true)
                .with_output(&output)
                .with_note("May trigger screen recording permission on Android 10+")
        } else {
            self.result(trigger, false, "Screen capture permission required")
                .triggered(true)
                .requires_user_action(true)
                .with_failure(&output)
        };

        Ok(self.finish(trigger, &serial, result.with_serial(&serial)).await)
    }

    /// Install permission needs a real APK; returns the command to run by hand
    pub async fn trigger_adb_install_auth(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::InstallAuth;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let result = self
            .result(trigger, false, "Install authorization test not implemented")
            .requires_user_action(true)
            .with_serial(&serial)
            .with_note("Requires actual APK file to trigger installation prompt")
            .with_details(TriggerDetails::ManualCommand {
                manual_command: format!("{} -s {} install <path_to_apk>", adb, serial),
                alternative_command: None,
            });

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Switch adbd to TCP mode on port 5555
    pub async fn trigger_wifi_adb_auth(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::WifiAdb;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!("{} -s {} tcpip {}", adb, serial, WIFI_ADB_PORT);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let message = if output.success {
            format!("WiFi ADB enabled on port {}", WIFI_ADB_PORT)
        } else {
            "Failed to enable WiFi ADB".to_string()
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(output.success)
            .requires_user_action(output.success)
            .with_output(&output)
            .with_serial(&serial)
            .with_note(format!("Connect with: adb connect <device_ip>:{}", WIFI_ADB_PORT));

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Read `development_settings_enabled`
    pub async fn verify_developer_options(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::DeveloperOptions;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!(
            "{} -s {} shell settings get global development_settings_enabled",
            adb, serial
        );
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let enabled = OutcomeClassifier::developer_options_enabled(&output);
        let message = if enabled {
            "Developer options are enabled"
        } else {
            "Developer options are disabled"
        };
        let mut result = self
            .result(trigger, true, message)
            .triggered(true)
            .with_output(&output)
            .with_serial(&serial)
            .with_details(TriggerDetails::DeveloperOptions {
                developer_options_enabled: enabled,
            });
        if !enabled {
            result = result.with_note("User must enable Developer Options in Settings");
        }

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Look the serial up in `adb devices -l`
    pub async fn check_usb_debugging_status(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::UsbDebuggingStatus;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let command = format!("{} devices -l", adb);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let status = self
            .classifier
            .usb_debugging_status(&output.stdout, serial.as_str());
        let authorized = status.is_authorized();

        let result = self
            .result(trigger, true, format!("Device status: {}", status))
            .triggered(true)
            .requires_user_action(!authorized)
            .with_output(&output)
            .with_serial(&serial)
            .with_details(TriggerDetails::DebuggingStatus { authorized, status });

        Ok(self.finish(trigger, &serial, result).await)
    }

    pub async fn reboot_to_recovery(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::RebootRecovery;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let output = self
            .exec(trigger, &format!("{} -s {} reboot recovery", adb, serial), self.settings.command_timeout)
            .await;

        let message = if output.success {
            "Device rebooting to recovery mode"
        } else {
            "Failed to reboot device"
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(output.success)
            .with_output(&output)
            .with_serial(&serial)
            .with_warning("Device will display recovery menu");

        Ok(self.finish(trigger, &serial, result).await)
    }

    pub async fn reboot_to_bootloader(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::RebootBootloader;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let output = self
            .exec(trigger, &format!("{} -s {} reboot bootloader", adb, serial), self.settings.command_timeout)
            .await;

        let message = if output.success {
            "Device rebooting to fastboot mode"
        } else {
            "Failed to reboot device"
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(output.success)
            .with_output(&output)
            .with_serial(&serial)
            .with_note("Device will enter fastboot mode");

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Reboot into Qualcomm Emergency Download Mode
    pub async fn reboot_to_edl(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::RebootEdl;
        let serial = DeviceId::parse(serial)?;
        let adb = require!(self.require_tool(trigger, &serial, Tool::Adb));

        let output = self
            .exec(trigger, &format!("{} -s {} reboot edl", adb, serial), self.settings.command_timeout)
            .await;

        let message = if output.success {
            "Device rebooting to EDL mode"
        } else {
            "Failed to reboot to EDL mode"
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(output.success)
            .with_output(&output)
            .with_serial(&serial)
            .with_warning("Device will enter Emergency Download Mode (Qualcomm only)")
            .with_note("Screen will appear black - device is in EDL mode");

        Ok(self.finish(trigger, &serial, result).await)
    }
}
