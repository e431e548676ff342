//! Authorization Audit Trail
//!
//! Every trigger call produces exactly one audit entry: a JSON line
//! appended to `authorization-triggers-<YYYY-MM-DD>.log` (UTC date) and
//! mirrored to `tracing` under the `authorization_trigger` target.
//! Entries are append-only; there is no rotation or retention.

use crate::triggers::{IdentifierKind, TriggerResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::io::Write;
use tracing::info;

/// Default audit directory, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = ".pandora_private/logs";

/// A single audit line
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 UTC timestamp with millisecond precision
    pub timestamp: String,

    /// Operation name (`trigger_adb_usb_debugging`, ...)
    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub udid: Option<String>,

    #[serde(flatten)]
    pub result: TriggerResult,

    #[serde(skip)]
    recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry stamped with the current time
    pub fn new(
        action: impl Into<String>,
        kind: IdentifierKind,
        device_id: impl Into<String>,
        result: TriggerResult,
    ) -> Self {
        Self::at(Utc::now(), action, kind, device_id, result)
    }

    /// Build an entry with an explicit time
    pub fn at(
        recorded_at: DateTime<Utc>,
        action: impl Into<String>,
        kind: IdentifierKind,
        device_id: impl Into<String>,
        result: TriggerResult,
    ) -> Self {
        let device_id = device_id.into();
        let (serial, udid) = match kind {
            IdentifierKind::Serial => (Some(device_id), None),
            IdentifierKind::Udid => (None, Some(device_id)),
        };
        Self {
            timestamp: recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            action: action.into(),
            serial,
            udid,
            result,
            recorded_at,
        }
    }

    /// UTC calendar day the entry belongs to
    pub fn date(&self) -> NaiveDate {
        self.recorded_at.date_naive()
    }

    /// Serialize as one JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, AuditError> {
        serde_json::to_string(self).map_err(AuditError::Serialize)
    }
}

/// Errors from writing the audit trail
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Failed to write audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize audit entry: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Name of the log file for a UTC day
pub fn log_file_name(date: NaiveDate) -> String {
    format!("authorization-triggers-{}.log", date.format("%Y-%m-%d"))
}

/// Per-day JSON-lines audit files in one directory
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    log_dir: PathBuf,
}

impl Default for FileAuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR)
    }
}

impl FileAuditLog {
    /// Create a log writing into `log_dir` (created on first write)
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the file for a UTC day
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(log_file_name(date))
    }

    /// Read every entry of a day back as JSON values
    ///
    /// A missing file means no entries.
    pub async fn read_day(&self, date: NaiveDate) -> Result<Vec<serde_json::Value>, AuditError> {
        let path = self.file_for(date);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AuditError::Io { path, source }),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::Serialize))
            .collect()
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = entry.to_json_line()?;
        info!(target: "authorization_trigger", "{}", line);

        let log_dir = self.log_dir.clone();
        let path = self.file_for(entry.date());
        let mut buf = line.into_bytes();
        buf.push(b'\n');

        tokio::task::spawn_blocking(move || append_line(&log_dir, &path, &buf))
            .await
            .map_err(|e| AuditError::Io {
                path: self.log_dir.clone(),
                source: std::io::Error::other(e),
            })?
    }
}

/// Append one line with a single write on an `O_APPEND` handle
///
/// Returns once the bytes are handed to the OS, so write errors surface
/// here and concurrent appends never interleave.
fn append_line(log_dir: &Path, path: &Path, buf: &[u8]) -> Result<(), AuditError> {
    std::fs::create_dir_all(log_dir).map_err(|source| AuditError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let io_err = |source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(buf).map_err(io_err)?;
    file.flush().map_err(io_err)
}

/// In-memory audit sink
///
/// Keeps entries for inspection; used by embedders that do not want files
/// and by tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Entries for one action
    pub fn by_action(&self, action: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::AuthorizationType;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_result() -> TriggerResult {
        TriggerResult::new(
            AuthorizationType::RebootRecovery,
            true,
            "Device rebooting to recovery mode",
        )
        .triggered(true)
        .with_warning("Device will display recovery menu")
    }

    #[test]
    fn test_entry_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 58).unwrap();
        let entry = AuditEntry::at(
            at,
            "reboot_to_recovery",
            IdentifierKind::Serial,
            "R58M123",
            sample_result(),
        );

        let json: serde_json::Value = serde_json::from_str(&entry.to_json_line().unwrap()).unwrap();
        assert_eq!(json["timestamp"], json!("2024-03-09T23:59:58.000Z"));
        assert_eq!(json["action"], json!("reboot_to_recovery"));
        assert_eq!(json["serial"], json!("R58M123"));
        assert!(json.get("udid").is_none());
        assert_eq!(json["authorizationType"], json!("reboot_recovery"));
        assert_eq!(json["warning"], json!("Device will display recovery menu"));
    }

    #[test]
    fn test_udid_entry() {
        let entry = AuditEntry::new(
            "trigger_ios_pairing",
            IdentifierKind::Udid,
            "00008030-001A",
            sample_result(),
        );
        let json: serde_json::Value = serde_json::from_str(&entry.to_json_line().unwrap()).unwrap();
        assert_eq!(json["udid"], json!("00008030-001A"));
        assert!(json.get("serial").is_none());
    }

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(log_file_name(date), "authorization-triggers-2024-01-05.log");
    }

    #[tokio::test]
    async fn test_file_log_appends_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path().join("nested").join("logs"));
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        for action in ["reboot_to_recovery", "reboot_to_edl"] {
            let entry = AuditEntry::at(at, action, IdentifierKind::Serial, "ABC", sample_result());
            log.record(&entry).await.unwrap();
        }

        let date = at.date_naive();
        let raw = std::fs::read_to_string(log.file_for(date)).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));

        let entries = log.read_day(date).await.unwrap();
        assert_eq!(entries[0]["action"], json!("reboot_to_recovery"));
        assert_eq!(entries[1]["action"], json!("reboot_to_edl"));
    }

    #[tokio::test]
    async fn test_entries_split_by_utc_day() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path());
        let before = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 1).unwrap();

        for at in [before, after] {
            let entry = AuditEntry::at(at, "x", IdentifierKind::Serial, "ABC", sample_result());
            log.record(&entry).await.unwrap();
        }

        assert_eq!(log.read_day(before.date_naive()).await.unwrap().len(), 1);
        assert_eq!(log.read_day(after.date_naive()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_day_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(log.read_day(date).await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_dir_reports_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let log = FileAuditLog::new(blocker.join("logs"));

        let entry = AuditEntry::new("x", IdentifierKind::Serial, "ABC", sample_result());
        let err = log.record(&entry).await.unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_line_is_on_disk_when_record_returns() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let path = log.file_for(at.date_naive());

        for i in 0..200 {
            let serial = format!("DEV{}", i);
            let entry = AuditEntry::at(at, "reboot_to_edl", IdentifierKind::Serial, &serial, sample_result());
            log.record(&entry).await.unwrap();

            let raw = std::fs::read_to_string(&path).unwrap();
            assert_eq!(raw.lines().count(), i + 1);
            let last: serde_json::Value = serde_json::from_str(raw.lines().last().unwrap()).unwrap();
            assert_eq!(last["serial"], json!(serial));
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_full_device_reports_error() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(dir.path());
        let entry = AuditEntry::new("x", IdentifierKind::Serial, "ABC", sample_result());
        std::os::unix::fs::symlink("/dev/full", log.file_for(entry.date())).unwrap();

        let err = log.record(&entry).await.unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[tokio::test]
    async fn test_memory_log() {
        let log = MemoryAuditLog::new();
        assert!(log.is_empty());

        for action in ["a", "b", "a"] {
            let entry = AuditEntry::new(action, IdentifierKind::Serial, "ABC", sample_result());
            log.record(&entry).await.unwrap();
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.by_action("a").len(), 2);
    }
}
