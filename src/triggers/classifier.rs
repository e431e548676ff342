//! Outcome Classifier for Device Tool Output
//!
//! External tools report authorization state only through free-form text
//! (`error: device unauthorized`, `Now unlock your device`, ...). All of
//! that substring matching lives here, keyed by `Probe`, and every
//! signature list can be replaced from the `[signatures]` config section.
//!
//! # Classification Strategy
//!
//! 1. Exit status of the probe (primary)
//! 2. Per-probe stdout/stderr signatures (secondary)
//! 3. Anything unmatched is `Failed`

use super::result::UsbDebuggingStatus;
use crate::tools::CommandOutput;
use serde::{Deserialize, Serialize};

/// Kind of probe whose output is being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// `adb -s S shell ...` and other plain adb commands
    AdbShell,
    /// `adb backup` (succeeds if the unlock prompt appeared)
    AdbBackup,
    /// `ideviceinfo` lockdown query
    IosLockdown,
    /// `idevicepair pair`
    IosPair,
    /// `fastboot getvar unlocked`
    FastbootGetvar,
    /// `heimdall detect`
    HeimdallDetect,
}

/// Classified outcome of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The probe did what it was asked to
    Succeeded,
    /// The device is waiting for a human (prompt shown, not yet approved)
    AwaitingUser,
    /// Anything else
    Failed,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Succeeded)
    }

    pub fn awaiting_user(&self) -> bool {
        matches!(self, ProbeOutcome::AwaitingUser)
    }
}

/// Substrings that identify tool states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signatures {
    /// adb stderr when the host key has not been accepted
    pub adb_unauthorized: Vec<String>,

    /// adb backup stderr when the confirmation screen is up
    pub adb_backup_prompt: Vec<String>,

    /// ideviceinfo stderr when the device does not trust the host
    pub ios_not_trusted: Vec<String>,

    /// idevicepair stdout on success
    pub ios_paired: Vec<String>,

    /// fastboot getvar output when the bootloader is unlocked
    pub fastboot_unlocked: Vec<String>,

    /// heimdall detect stdout when a device is in Download Mode
    pub heimdall_detected: Vec<String>,

    /// `adb devices -l` line states, checked in this order
    pub device_line_unauthorized: Vec<String>,
    pub device_line_authorized: Vec<String>,
    pub device_line_offline: Vec<String>,
}

impl Default for Signatures {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            adb_unauthorized: list(&["unauthorized", "device unauthorized"]),
            adb_backup_prompt: list(&["Now unlock"]),
            ios_not_trusted: list(&["lockdownd", "not trusted", "pair"]),
            ios_paired: list(&["SUCCESS"]),
            fastboot_unlocked: list(&["unlocked: yes"]),
            heimdall_detected: list(&["Device detected"]),
            device_line_unauthorized: list(&["unauthorized"]),
            device_line_authorized: list(&["device"]),
            device_line_offline: list(&["offline"]),
        }
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

/// Classifier for device tool output
#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    signatures: Signatures,
}

impl OutcomeClassifier {
    /// Create a classifier with custom signatures
    pub fn new(signatures: Signatures) -> Self {
        Self { signatures }
    }

    /// Classify the output of a probe
    ///
    /// # Examples
    ///
    /// ```
    /// use workshop_triggers::tools::CommandOutput;
    /// use workshop_triggers::triggers::{OutcomeClassifier, Probe, ProbeOutcome};
    ///
    /// let classifier = OutcomeClassifier::default();
    /// let output = CommandOutput::failure("", "error: device unauthorized", 1, "Command failed");
    /// assert_eq!(classifier.classify(Probe::AdbShell, &output), ProbeOutcome::AwaitingUser);
    /// ```
    pub fn classify(&self, probe: Probe, output: &CommandOutput) -> ProbeOutcome {
        let sig = &self.signatures;
        match probe {
            Probe::AdbShell => {
                if output.success {
                    ProbeOutcome::Succeeded
                } else if contains_any(&output.stderr, &sig.adb_unauthorized) {
                    ProbeOutcome::AwaitingUser
                } else {
                    ProbeOutcome::Failed
                }
            }
            Probe::AdbBackup => {
                if output.success || contains_any(&output.stderr, &sig.adb_backup_prompt) {
                    ProbeOutcome::Succeeded
                } else {
                    ProbeOutcome::Failed
                }
            }
            Probe::IosLockdown => {
                if output.success {
                    ProbeOutcome::Succeeded
                } else if contains_any(&output.stderr, &sig.ios_not_trusted) {
                    ProbeOutcome::AwaitingUser
                } else {
                    ProbeOutcome::Failed
                }
            }
            Probe::IosPair => {
                if output.success || contains_any(&output.stdout, &sig.ios_paired) {
                    ProbeOutcome::Succeeded
                } else {
                    // Pairing only fails for lack of a passcode on the device
                    ProbeOutcome::AwaitingUser
                }
            }
            Probe::FastbootGetvar => {
                if self.bootloader_unlocked(output) {
                    ProbeOutcome::Succeeded
                } else {
                    ProbeOutcome::Failed
                }
            }
            Probe::HeimdallDetect => {
                if output.success && contains_any(&output.stdout, &sig.heimdall_detected) {
                    ProbeOutcome::Succeeded
                } else {
                    ProbeOutcome::Failed
                }
            }
        }
    }

    /// Combined fastboot output as reported back to the caller
    pub fn fastboot_output(output: &CommandOutput) -> String {
        format!("{}\n{}", output.stdout, output.stderr)
    }

    /// Whether `fastboot getvar unlocked` reported an unlocked bootloader
    pub fn bootloader_unlocked(&self, output: &CommandOutput) -> bool {
        contains_any(
            &Self::fastboot_output(output),
            &self.signatures.fastboot_unlocked,
        )
    }

    /// Whether `settings get global development_settings_enabled` said `1`
    pub fn developer_options_enabled(output: &CommandOutput) -> bool {
        output.stdout.trim() == "1"
    }

    /// USB debugging state of `serial` from `adb devices -l` output
    ///
    /// Uses the first line mentioning the serial. No such line means
    /// `NotFound`; a line matching none of the states is `Unknown`.
    pub fn usb_debugging_status(&self, devices_output: &str, serial: &str) -> UsbDebuggingStatus {
        let sig = &self.signatures;
        let Some(line) = devices_output.lines().find(|line| line.contains(serial)) else {
            return UsbDebuggingStatus::NotFound;
        };

        if contains_any(line, &sig.device_line_unauthorized) {
            UsbDebuggingStatus::Unauthorized
        } else if contains_any(line, &sig.device_line_authorized) {
            UsbDebuggingStatus::Authorized
        } else if contains_any(line, &sig.device_line_offline) {
            UsbDebuggingStatus::Offline
        } else {
            UsbDebuggingStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput::success(stdout, "")
    }

    fn failed(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput::failure(stdout, stderr, 1, "Command failed")
    }

    #[test]
    fn test_adb_shell() {
        let c = OutcomeClassifier::default();
        assert_eq!(c.classify(Probe::AdbShell, &ok("14")), ProbeOutcome::Succeeded);
        assert_eq!(
            c.classify(Probe::AdbShell, &failed("", "error: device unauthorized.")),
            ProbeOutcome::AwaitingUser
        );
        assert_eq!(
            c.classify(Probe::AdbShell, &failed("", "error: device 'X' not found")),
            ProbeOutcome::Failed
        );
    }

    #[test]
    fn test_adb_backup_prompt_counts_as_success() {
        let c = OutcomeClassifier::default();
        assert!(c
            .classify(
                Probe::AdbBackup,
                &failed("", "Now unlock your device and confirm the backup operation.")
            )
            .is_success());
        assert_eq!(c.classify(Probe::AdbBackup, &failed("", "timeout")), ProbeOutcome::Failed);
    }

    #[test]
    fn test_ios_lockdown() {
        let c = OutcomeClassifier::default();
        assert!(c.classify(Probe::IosLockdown, &ok("DeviceName: iPhone")).is_success());
        for stderr in [
            "ERROR: Could not connect to lockdownd, error code -19",
            "Device not trusted",
            "Please pair the device",
        ] {
            assert!(c.classify(Probe::IosLockdown, &failed("", stderr)).awaiting_user());
        }
        assert_eq!(
            c.classify(Probe::IosLockdown, &failed("", "No device found.")),
            ProbeOutcome::Failed
        );
    }

    #[test]
    fn test_ios_pair() {
        let c = OutcomeClassifier::default();
        assert!(c
            .classify(Probe::IosPair, &failed("SUCCESS: Paired with device X", ""))
            .is_success());
        assert!(c
            .classify(Probe::IosPair, &failed("", "ERROR: Please enter the passcode"))
            .awaiting_user());
    }

    #[test]
    fn test_fastboot_unlocked_in_either_stream() {
        let c = OutcomeClassifier::default();
        assert!(c.bootloader_unlocked(&ok("unlocked: yes\nFinished.")));
        assert!(c.bootloader_unlocked(&failed("", "unlocked: yes")));
        assert!(!c.bootloader_unlocked(&ok("unlocked: no")));
        assert_eq!(
            OutcomeClassifier::fastboot_output(&CommandOutput::success("a", "b")),
            "a\nb"
        );
    }

    #[test]
    fn test_heimdall_requires_success_and_signature() {
        let c = OutcomeClassifier::default();
        assert!(c.classify(Probe::HeimdallDetect, &ok("Device detected")).is_success());
        assert!(!c.classify(Probe::HeimdallDetect, &ok("ERROR: Failed to detect")).is_success());
        assert!(!c
            .classify(Probe::HeimdallDetect, &failed("Device detected", ""))
            .is_success());
    }

    #[test]
    fn test_developer_options() {
        assert!(OutcomeClassifier::developer_options_enabled(&ok("1")));
        assert!(OutcomeClassifier::developer_options_enabled(&ok(" 1\n")));
        assert!(!OutcomeClassifier::developer_options_enabled(&ok("0")));
        assert!(!OutcomeClassifier::developer_options_enabled(&ok("null")));
    }

    #[test]
    fn test_usb_debugging_status() {
        let c = OutcomeClassifier::default();
        let devices = "List of devices attached\n\
                       R58M123 unauthorized usb:1-1 transport_id:1\n\
                       emulator-5554 device product:sdk model:Pixel transport_id:2\n\
                       ZX1G22 offline usb:1-2";

        assert_eq!(c.usb_debugging_status(devices, "R58M123"), UsbDebuggingStatus::Unauthorized);
        assert_eq!(
            c.usb_debugging_status(devices, "emulator-5554"),
            UsbDebuggingStatus::Authorized
        );
        assert_eq!(c.usb_debugging_status(devices, "ZX1G22"), UsbDebuggingStatus::Offline);
        assert_eq!(c.usb_debugging_status(devices, "MISSING"), UsbDebuggingStatus::NotFound);
        assert_eq!(
            c.usb_debugging_status("ABC123 recovery", "ABC123"),
            UsbDebuggingStatus::Unknown
        );
    }

    #[test]
    fn test_custom_signatures() {
        let signatures = Signatures {
            adb_unauthorized: vec!["nicht autorisiert".to_string()],
            ..Default::default()
        };
        let c = OutcomeClassifier::new(signatures);
        assert!(c
            .classify(Probe::AdbShell, &failed("", "Fehler: Gerät nicht autorisiert"))
            .awaiting_user());
        assert_eq!(
            c.classify(Probe::AdbShell, &failed("", "error: device unauthorized")),
            ProbeOutcome::Failed
        );
    }

    #[test]
    fn test_signatures_partial_toml() {
        let signatures: Signatures = toml::from_str("ios_paired = [\"OK\"]").unwrap();
        assert_eq!(signatures.ios_paired, vec!["OK".to_string()]);
        assert_eq!(signatures.adb_backup_prompt, Signatures::default().adb_backup_prompt);
    }
}
