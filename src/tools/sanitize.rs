//! Input Sanitization
//!
//! Device identifiers are interpolated into shell strings, so they are
//! reduced to a fixed safe alphabet first. This is the only injection
//! defense for probe commands.

use crate::error::TriggerError;
use serde::{Serialize, Serializer};
use std::fmt;

/// Characters allowed to survive sanitization besides ASCII alphanumerics
const SAFE_PUNCTUATION: [char; 4] = ['_', '-', ':', '.'];

/// Check whether a single character is in the safe alphabet
fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SAFE_PUNCTUATION.contains(&c)
}

/// Strip an identifier down to `[A-Za-z0-9_\-:.]`
///
/// Order of the surviving characters is preserved. No length bound is
/// applied.
///
/// # Errors
///
/// Returns `TriggerError::InvalidInput` if the input is empty.
///
/// # Example
///
/// ```
/// use workshop_triggers::tools::sanitize_input;
///
/// let clean = sanitize_input("emulator-5554; rm -rf /").unwrap();
/// assert_eq!(clean, "emulator-5554rm-rf");
/// ```
pub fn sanitize_input(input: &str) -> Result<String, TriggerError> {
    if input.is_empty() {
        return Err(TriggerError::InvalidInput);
    }
    Ok(input.chars().filter(|&c| is_safe_char(c)).collect())
}

/// Wrap a value in double quotes for shell interpolation
///
/// Used for resolved tool paths and temp file paths, which may contain
/// spaces. Works for both `cmd.exe` and POSIX shells for these values.
pub fn quote_for_shell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// A sanitized device identifier (ADB serial or iOS UDID)
///
/// Construction always goes through the sanitizer, so any `DeviceId` is
/// safe to place in a shell string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Sanitize a raw identifier
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidInput` if the input is empty or nothing
    /// remains after sanitization.
    pub fn parse(raw: &str) -> Result<Self, TriggerError> {
        let sanitized = sanitize_input(raw)?;
        if sanitized.is_empty() {
            return Err(TriggerError::InvalidInput);
        }
        Ok(Self(sanitized))
    }

    /// The sanitized identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
