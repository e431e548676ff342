//! Trigger Catalog
//!
//! Static registry of every trigger operation, grouped by platform. The
//! catalog drives listing, batch runs, CLI dispatch and HTTP routing.

use super::result::AuthorizationType;
use crate::error::TriggerError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Device platform a trigger belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Fastboot,
    Samsung,
    Qualcomm,
    Mediatek,
}

impl Platform {
    /// All platforms in catalog order
    pub const ALL: [Platform; 6] = [
        Platform::Android,
        Platform::Ios,
        Platform::Fastboot,
        Platform::Samsung,
        Platform::Qualcomm,
        Platform::Mediatek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Fastboot => "fastboot",
            Platform::Samsung => "samsung",
            Platform::Qualcomm => "qualcomm",
            Platform::Mediatek => "mediatek",
        }
    }

    /// Catalog entries for this platform, in catalog order
    pub fn triggers(&self) -> impl Iterator<Item = &'static TriggerDescriptor> + '_ {
        DESCRIPTORS.iter().filter(move |d| d.platform == *self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| TriggerError::UnknownPlatform(s.to_string()))
    }
}

/// Which identifier a trigger expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// ADB / fastboot serial (`serial` in requests and audit lines)
    Serial,
    /// iOS UDID (`udid` in requests and audit lines)
    Udid,
}

impl IdentifierKind {
    pub fn field(&self) -> &'static str {
        match self {
            IdentifierKind::Serial => "serial",
            IdentifierKind::Udid => "udid",
        }
    }

    /// Validation message when the identifier is missing
    pub fn missing_message(&self) -> &'static str {
        match self {
            IdentifierKind::Serial => "Device serial required",
            IdentifierKind::Udid => "Device UDID required",
        }
    }
}

/// Every trigger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerId {
    AdbUsbDebugging,
    FileTransfer,
    BackupAuth,
    ScreenCapture,
    InstallAuth,
    WifiAdb,
    DeveloperOptions,
    UsbDebuggingStatus,
    RebootRecovery,
    RebootBootloader,
    RebootEdl,
    IosTrust,
    IosPairing,
    IosBackup,
    IosDfu,
    IosAppInstall,
    IosDeveloper,
    FastbootUnlock,
    FastbootOemUnlock,
    SamsungDownload,
    QualcommEdl,
    MediatekFlash,
}

/// Static description of a trigger
#[derive(Debug, PartialEq, Eq)]
pub struct TriggerDescriptor {
    pub trigger: TriggerId,
    /// Catalog id (`adb_usb_debugging`, `ios_trust`, ...)
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Operation name, also used as the audit `action`
    pub method: &'static str,
    /// HTTP route under `/api/v1/authorization/`
    pub route: &'static str,
    pub platform: Platform,
}

macro_rules! descriptor {
    ($trigger:ident, $id:literal, $name:literal, $method:literal, $route:literal, $platform:ident) => {
        TriggerDescriptor {
            trigger: TriggerId::$trigger,
            id: $id,
            name: $name,
            method: $method,
            route: $route,
            platform: Platform::$platform,
        }
    };
}

/// Catalog, indexed by `TriggerId` discriminant
static DESCRIPTORS: [TriggerDescriptor; 22] = [
    descriptor!(AdbUsbDebugging, "adb_usb_debugging", "ADB USB Debugging Authorization", "trigger_adb_usb_debugging", "adb/trigger-usb-debugging", Android),
    descriptor!(FileTransfer, "file_transfer", "File Transfer Permission", "trigger_file_transfer_auth", "adb/trigger-file-transfer", Android),
    descriptor!(BackupAuth, "backup_auth", "Backup Authorization", "trigger_backup_auth", "adb/trigger-backup", Android),
    descriptor!(ScreenCapture, "screen_capture", "Screen Capture Permission", "trigger_screen_capture_auth", "adb/trigger-screen-capture", Android),
    descriptor!(InstallAuth, "install_auth", "Install from Computer", "trigger_adb_install_auth", "adb/trigger-install", Android),
    descriptor!(WifiAdb, "wifi_adb", "WiFi ADB Debugging", "trigger_wifi_adb_auth", "adb/trigger-wifi-adb", Android),
    descriptor!(DeveloperOptions, "developer_options", "Developer Options Check", "verify_developer_options", "adb/verify-developer-options", Android),
    descriptor!(UsbDebuggingStatus, "usb_debugging_status", "USB Debugging Status", "check_usb_debugging_status", "adb/check-debugging-status", Android),
    descriptor!(RebootRecovery, "reboot_recovery", "Reboot to Recovery", "reboot_to_recovery", "adb/reboot-recovery", Android),
    descriptor!(RebootBootloader, "reboot_bootloader", "Reboot to Bootloader", "reboot_to_bootloader", "adb/reboot-bootloader", Android),
    descriptor!(RebootEdl, "reboot_edl", "Reboot to EDL", "reboot_to_edl", "adb/reboot-edl", Android),
    descriptor!(IosTrust, "ios_trust", "Trust This Computer", "trigger_ios_trust_computer", "ios/trigger-trust-computer", Ios),
    descriptor!(IosPairing, "ios_pairing", "Device Pairing", "trigger_ios_pairing", "ios/trigger-pairing", Ios),
    descriptor!(IosBackup, "ios_backup", "Backup Encryption", "trigger_ios_backup_encryption", "ios/trigger-backup-encryption", Ios),
    descriptor!(IosDfu, "ios_dfu", "DFU/Recovery Mode", "trigger_dfu_recovery_mode", "ios/trigger-dfu", Ios),
    descriptor!(IosAppInstall, "ios_app_install", "App Installation Trust", "trigger_ios_app_install_auth", "ios/trigger-app-install", Ios),
    descriptor!(IosDeveloper, "ios_developer", "Developer Trust", "trigger_ios_developer_trust", "ios/trigger-developer-trust", Ios),
    descriptor!(FastbootUnlock, "fastboot_unlock", "Verify Bootloader Unlock", "verify_fastboot_unlock", "fastboot/verify-unlock", Fastboot),
    descriptor!(FastbootOemUnlock, "fastboot_oem_unlock", "OEM Unlock (DESTRUCTIVE)", "trigger_fastboot_oem_unlock", "fastboot/trigger-oem-unlock", Fastboot),
    descriptor!(SamsungDownload, "samsung_download", "Download Mode Detection", "trigger_samsung_download_mode", "samsung/trigger-download-mode", Samsung),
    descriptor!(QualcommEdl, "qualcomm_edl", "EDL Mode Verification", "verify_qualcomm_edl", "qualcomm/verify-edl", Qualcomm),
    descriptor!(MediatekFlash, "mediatek_flash", "SP Flash Tool Verification", "verify_mediatek_flash", "mediatek/verify-flash", Mediatek),
];

impl TriggerId {
    pub fn descriptor(&self) -> &'static TriggerDescriptor {
        &DESCRIPTORS[*self as usize]
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().id
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Operation name, also the audit `action`
    pub fn method(&self) -> &'static str {
        self.descriptor().method
    }

    pub fn route(&self) -> &'static str {
        self.descriptor().route
    }

    pub fn platform(&self) -> Platform {
        self.descriptor().platform
    }

    /// Authorization category reported in results
    pub fn authorization_type(&self) -> AuthorizationType {
        match self {
            TriggerId::AdbUsbDebugging => AuthorizationType::AdbUsbDebugging,
            TriggerId::FileTransfer => AuthorizationType::FileTransferPermission,
            TriggerId::BackupAuth => AuthorizationType::BackupAuthorization,
            TriggerId::ScreenCapture => AuthorizationType::ScreenCapturePermission,
            TriggerId::InstallAuth => AuthorizationType::AdbInstallPermission,
            TriggerId::WifiAdb => AuthorizationType::WifiAdbDebugging,
            TriggerId::DeveloperOptions => AuthorizationType::DeveloperOptionsCheck,
            TriggerId::UsbDebuggingStatus => AuthorizationType::UsbDebuggingStatus,
            TriggerId::RebootRecovery => AuthorizationType::RebootRecovery,
            TriggerId::RebootBootloader => AuthorizationType::RebootBootloader,
            TriggerId::RebootEdl => AuthorizationType::RebootEdl,
            TriggerId::IosTrust => AuthorizationType::IosTrustComputer,
            TriggerId::IosPairing => AuthorizationType::IosPairing,
            TriggerId::IosBackup => AuthorizationType::IosBackupEncryption,
            TriggerId::IosDfu => AuthorizationType::DfuRecoveryMode,
            TriggerId::IosAppInstall => AuthorizationType::IosAppInstallTrust,
            TriggerId::IosDeveloper => AuthorizationType::IosDeveloperTrust,
            TriggerId::FastbootUnlock => AuthorizationType::FastbootUnlockVerification,
            TriggerId::FastbootOemUnlock => AuthorizationType::FastbootOemUnlock,
            TriggerId::SamsungDownload => AuthorizationType::SamsungDownloadMode,
            TriggerId::QualcommEdl => AuthorizationType::QualcommEdlMode,
            TriggerId::MediatekFlash => AuthorizationType::MediatekSpFlash,
        }
    }

    pub fn identifier_kind(&self) -> IdentifierKind {
        match self.platform() {
            Platform::Ios => IdentifierKind::Udid,
            _ => IdentifierKind::Serial,
        }
    }

    /// Look up a trigger by its HTTP route (`adb/reboot-edl`)
    pub fn from_route(route: &str) -> Option<TriggerId> {
        DESCRIPTORS.iter().find(|d| d.route == route).map(|d| d.trigger)
    }

    /// Every trigger in catalog order
    pub fn all() -> impl Iterator<Item = TriggerId> {
        DESCRIPTORS.iter().map(|d| d.trigger)
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TriggerId {
    type Err = TriggerError;

    /// Accepts the catalog id or the operation name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DESCRIPTORS
            .iter()
            .find(|d| d.id == s || d.method == s)
            .map(|d| d.trigger)
            .ok_or_else(|| TriggerError::UnknownTrigger(s.to_string()))
    }
}

/// Public catalog entry `{id, name, method}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub method: &'static str,
}

impl From<&TriggerDescriptor> for CatalogEntry {
    fn from(d: &TriggerDescriptor) -> Self {
        Self {
            id: d.id,
            name: d.name,
            method: d.method,
        }
    }
}

/// Entries for every platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformCatalog {
    pub android: Vec<CatalogEntry>,
    pub ios: Vec<CatalogEntry>,
    pub fastboot: Vec<CatalogEntry>,
    pub samsung: Vec<CatalogEntry>,
    pub qualcomm: Vec<CatalogEntry>,
    pub mediatek: Vec<CatalogEntry>,
}

/// Response of `get_all_available_triggers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TriggerListing {
    All {
        success: bool,
        triggers: PlatformCatalog,
        #[serde(rename = "totalCount")]
        total_count: usize,
    },
    Platform {
        success: bool,
        triggers: Vec<CatalogEntry>,
        platform: String,
    },
}

impl TriggerListing {
    /// Number of listed entries
    pub fn len(&self) -> usize {
        match self {
            TriggerListing::All { total_count, .. } => *total_count,
            TriggerListing::Platform { triggers, .. } => triggers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entries(platform: Platform) -> Vec<CatalogEntry> {
    platform.triggers().map(CatalogEntry::from).collect()
}

/// List the catalog
///
/// `"all"` lists every platform with a total count; a known platform lists
/// its triggers; anything else yields an empty list (not an error).
pub fn get_all_available_triggers(platform: &str) -> TriggerListing {
    if platform == "all" {
        return TriggerListing::All {
            success: true,
            triggers: PlatformCatalog {
                android: entries(Platform::Android),
                ios: entries(Platform::Ios),
                fastboot: entries(Platform::Fastboot),
                samsung: entries(Platform::Samsung),
                qualcomm: entries(Platform::Qualcomm),
                mediatek: entries(Platform::Mediatek),
            },
            total_count: DESCRIPTORS.len(),
        };
    }

    let triggers = platform
        .parse::<Platform>()
        .map(entries)
        .unwrap_or_default();

    TriggerListing::Platform {
        success: true,
        triggers,
        platform: platform.to_string(),
    }
}
