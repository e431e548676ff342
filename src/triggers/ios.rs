//! iOS (libimobiledevice) triggers

use super::classifier::{Probe, ProbeOutcome};
use super::result::{TriggerDetails, TriggerResult};
use super::{AuthorizationTriggers, Tool, TriggerId};
use crate::error::TriggerError;
use crate::tools::{DeviceId, ExecutionTimeout};

/// Steps for trusting an enterprise developer profile by hand
const DEVELOPER_TRUST_STEPS: [&str; 5] = [
    "1. Open Settings app",
    "2. Go to General",
    "3. Tap Device Management (or Profiles)",
    "4. Select the developer profile",
    "5. Tap Trust",
];

impl AuthorizationTriggers {
    /// Query lockdownd; an untrusted device shows "Trust This Computer?"
    pub async fn trigger_ios_trust_computer(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosTrust;
        let udid = DeviceId::parse(udid)?;
        let ideviceinfo = require!(self.require_tool(trigger, &udid, Tool::IdeviceInfo));

        let command = format!("{} -u {}", ideviceinfo, udid);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let result = match self.classifier.classify(Probe::IosLockdown, &output) {
            ProbeOutcome::Succeeded => self
                .result(trigger, true, "iOS device trusted and connected")
                .with_output(&output)
                .with_note("Device already trusted"),
            ProbeOutcome::AwaitingUser => self
                .result(trigger, false, "iOS trust computer dialog triggered on device")
                .triggered(true)
                .requires_user_action(true)
                .with_failure(&output)
                .with_note("User must tap \"Trust\" and enter device passcode"),
            ProbeOutcome::Failed => self
                .result(trigger, false, "Failed to connect to iOS device")
                .with_failure(&output),
        };

        Ok(self.finish(trigger, &udid, result.with_udid(&udid)).await)
    }

    /// Pair with the device; needs the passcode on first pairing
    pub async fn trigger_ios_pairing(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosPairing;
        let udid = DeviceId::parse(udid)?;
        let idevicepair = require!(self.require_tool(trigger, &udid, Tool::IdevicePair));

        let command = format!("{} -u {} pair", idevicepair, udid);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let paired = self.classifier.classify(Probe::IosPair, &output).is_success();
        let message = if paired {
            format!("SUCCESS: Paired with device {}", udid)
        } else {
            "Pairing failed - user action required".to_string()
        };

        let result = self
            .result(trigger, paired, message)
            .triggered(true)
            .requires_user_action(!paired)
            .with_output(&output)
            .with_udid(&udid)
            .with_note("User must enter device passcode to complete pairing");

        Ok(self.finish(trigger, &udid, result).await)
    }

    /// Query backup settings, which may prompt for an encryption password
    pub async fn trigger_ios_backup_encryption(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosBackup;
        let udid = DeviceId::parse(udid)?;
        let idevicebackup2 = require!(self.require_tool(trigger, &udid, Tool::IdeviceBackup2));

        let command = format!("{} -u {} info", idevicebackup2, udid);
        let output = self.exec(trigger, &command, ExecutionTimeout::medium()).await;

        let message = if output.success {
            "Backup encryption authorization queried"
        } else {
            "Backup authorization required"
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(true)
            .requires_user_action(!output.success)
            .with_output(&output)
            .with_udid(&udid)
            .with_note("May prompt for backup encryption password setup");

        Ok(self.finish(trigger, &udid, result).await)
    }

    /// Put the device into recovery mode
    pub async fn trigger_dfu_recovery_mode(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosDfu;
        let udid = DeviceId::parse(udid)?;
        let enter_recovery = require!(self.require_tool(trigger, &udid, Tool::IdeviceEnterRecovery));

        let command = format!("{} {}", enter_recovery, udid);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let message = if output.success {
            "Device entering recovery mode"
        } else {
            "Failed to enter recovery mode"
        };
        let result = self
            .result(trigger, output.success, message)
            .triggered(output.success)
            .requires_user_action(output.success)
            .with_output(&output)
            .with_udid(&udid)
            .with_warning("Device will display recovery mode screen")
            .with_note("User must manually exit recovery mode or restore device");

        Ok(self.finish(trigger, &udid, result).await)
    }

    /// App install trust needs a real IPA; returns the command to run by hand
    pub async fn trigger_ios_app_install_auth(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosAppInstall;
        let udid = DeviceId::parse(udid)?;
        let installer = require!(self.require_tool(trigger, &udid, Tool::IdeviceInstaller));

        let result = self
            .result(trigger, false, "App installation requires IPA file")
            .requires_user_action(true)
            .with_udid(&udid)
            .with_note("Requires actual IPA file to trigger installation prompt")
            .with_details(TriggerDetails::ManualCommand {
                manual_command: format!("{} -u {} -i <path_to_ipa>", installer, udid),
                alternative_command: None,
            });

        Ok(self.finish(trigger, &udid, result).await)
    }

    /// Developer profile trust is settings-only; returns the steps
    pub async fn trigger_ios_developer_trust(&self, udid: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::IosDeveloper;
        let udid = DeviceId::parse(udid)?;

        let result = self
            .result(trigger, false, "Developer trust must be configured manually")
            .requires_user_action(true)
            .with_udid(&udid)
            .with_note("User must: Settings > General > Device Management > Trust Developer")
            .with_details(TriggerDetails::ManualSteps {
                manual_steps: DEVELOPER_TRUST_STEPS.iter().map(|s| s.to_string()).collect(),
            });

        Ok(self.finish(trigger, &udid, result).await)
    }
}
