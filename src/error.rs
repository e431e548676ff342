//! Error types for the trigger executor
//!
//! Only malformed input is raised as an error. Missing tools and failed
//! commands are reported inside `TriggerResult` instead.

/// Errors raised before any command is run
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Device identifier was empty or contained no safe characters
    #[error("Invalid input")]
    InvalidInput,

    /// No trigger registered under this id
    #[error("Unknown trigger '{0}'")]
    UnknownTrigger(String),

    /// Platform name is not one of the catalog platforms
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),
}
