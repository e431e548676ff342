//! Bootloader and flash-mode triggers (fastboot, Samsung, Qualcomm, MediaTek)

use super::classifier::{OutcomeClassifier, Probe};
use super::result::{DownloadModeInfo, TriggerDetails, TriggerResult};
use super::{prefix, AuthorizationTriggers, Tool, TriggerId};
use crate::error::TriggerError;
use crate::tools::{quote_for_shell, DeviceId};

/// Characters of `print-pit` output kept in `deviceInfo`
const PIT_PREVIEW_CHARS: usize = 500;

/// Characters of `edl.py --help` output kept in `commandOutput`
const EDL_PREVIEW_CHARS: usize = 300;

impl AuthorizationTriggers {
    /// Read the bootloader lock state with `fastboot getvar unlocked`
    pub async fn verify_fastboot_unlock(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::FastbootUnlock;
        let serial = DeviceId::parse(serial)?;
        let fastboot = require!(self.require_tool(trigger, &serial, Tool::Fastboot));

        let command = format!("{} -s {} getvar unlocked 2>&1", fastboot, serial);
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let unlocked = self.classifier.classify(Probe::FastbootGetvar, &output).is_success();
        let message = if unlocked {
            "Bootloader is unlocked"
        } else {
            "Bootloader is locked"
        };

        let mut result = self
            .result(trigger, true, message)
            .triggered(true)
            .with_serial(&serial)
            .with_details(TriggerDetails::BootloaderState { unlocked });
        result.command_output = Some(OutcomeClassifier::fastboot_output(&output));
        result.exit_code = Some(output.exit_code);

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Never unlocks. Returns the commands for the user to run after an
    /// explicit confirmation, since unlocking wipes the device.
    pub async fn trigger_fastboot_oem_unlock(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::FastbootOemUnlock;
        let serial = DeviceId::parse(serial)?;
        let fastboot = require!(self.require_tool(trigger, &serial, Tool::Fastboot));

        let result = self
            .result(trigger, false, "DESTRUCTIVE OPERATION - Manual confirmation required")
            .requires_user_action(true)
            .with_serial(&serial)
            .with_warning("This will ERASE ALL DATA on the device")
            .with_note(
                "This endpoint returns the command for manual execution only. \
                 User must type UNLOCK to confirm.",
            )
            .with_details(TriggerDetails::ManualCommand {
                manual_command: format!("{} -s {} oem unlock", fastboot, serial),
                alternative_command: Some(format!("{} -s {} flashing unlock", fastboot, serial)),
            });

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Detect a Samsung device in Download Mode, then read its PIT
    pub async fn trigger_samsung_download_mode(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::SamsungDownload;
        let serial = DeviceId::parse(serial)?;
        let heimdall = require!(self.require_tool(trigger, &serial, Tool::Heimdall));

        let detect = self
            .exec(trigger, &format!("{} detect", heimdall), self.settings.command_timeout)
            .await;

        if !self.classifier.classify(Probe::HeimdallDetect, &detect).is_success() {
            let mut result = self
                .result(trigger, false, "No Samsung device detected in Download Mode")
                .requires_user_action(true)
                .with_error("Device not in Download Mode")
                .with_note("User must manually enter Download Mode: Power off, then hold Vol Down + Power");
            result.command_output = Some(detect.stdout.clone());
            result.stderr = Some(detect.stderr.clone());
            return Ok(self.finish(trigger, &serial, result).await);
        }

        let pit = self
            .exec(
                trigger,
                &format!("{} print-pit --no-reboot --verbose", heimdall),
                self.settings.command_timeout,
            )
            .await;

        let result = self
            .result(trigger, pit.success, "Samsung device detected in Download Mode")
            .triggered(true)
            .with_output(&pit)
            .with_serial(&serial)
            .with_details(TriggerDetails::DownloadMode {
                device_info: DownloadModeInfo {
                    detected: true,
                    mode: "Download Mode (Odin)".to_string(),
                    command_output: prefix(&pit.stdout, PIT_PREVIEW_CHARS),
                },
            });

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Check the Qualcomm EDL toolkit is installed and runnable
    pub async fn verify_qualcomm_edl(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::QualcommEdl;
        let serial = DeviceId::parse(serial)?;
        let python = require!(self.require_python(trigger, &serial));

        let edl_script = self.settings.libs_dir.join("edl").join("edl.py");
        if !edl_script.is_file() {
            let mut result = self
                .result(trigger, false, "EDL tools not found")
                .with_error("EDL toolkit not installed")
                .with_note("EDL tools must be installed in libs/edl/");
            result.tool_missing = true;
            return Ok(self.finish(trigger, &serial, result).await);
        }

        let command = format!(
            "{} {} --help 2>&1",
            python,
            quote_for_shell(&edl_script.display().to_string())
        );
        let output = self.exec(trigger, &command, self.settings.command_timeout).await;

        let message = if output.success {
            "EDL tools available - device probe ready"
        } else {
            "EDL tools verification failed"
        };
        let mut result = self
            .result(trigger, output.success, message)
            .triggered(true)
            .with_output(&output)
            .with_serial(&serial)
            .with_note("Use python (or python3) edl.py printgpt to detect EDL device");
        result.command_output = Some(prefix(&output.stdout, EDL_PREVIEW_CHARS));

        Ok(self.finish(trigger, &serial, result).await)
    }

    /// Check the MediaTek toolkit directory is present
    pub async fn verify_mediatek_flash(&self, serial: &str) -> Result<TriggerResult, TriggerError> {
        let trigger = TriggerId::MediatekFlash;
        let serial = DeviceId::parse(serial)?;
        let _python = require!(self.require_python(trigger, &serial));

        let mtk_dir = self.settings.libs_dir.join("mtkclient");
        if !mtk_dir.is_dir() {
            let mut result = self
                .result(trigger, false, "MTKClient not found")
                .with_error("MTKClient toolkit not installed")
                .with_note("MTKClient must be installed in libs/mtkclient/");
            result.tool_missing = true;
            return Ok(self.finish(trigger, &serial, result).await);
        }

        let result = self
            .result(trigger, true, "MTKClient tools available - device probe ready")
            .triggered(true)
            .with_serial(&serial)
            .with_note("Use python (or python3) mtk_cli.py printgpt to detect MediaTek device")
            .with_details(TriggerDetails::ToolPath {
                tool_path: mtk_dir.display().to_string(),
            });

        Ok(self.finish(trigger, &serial, result).await)
    }
}
