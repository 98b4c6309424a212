//! Settings loading errors.

use thiserror::Error;

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors from loading or parsing the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file.
    #[error("failed to read settings file {path}: {reason}")]
    Read {
        /// Settings file path.
        path: String,
        /// Error description.
        reason: String,
    },

    /// Settings file was not valid JSON.
    #[error("failed to parse settings JSON: {reason}")]
    Parse {
        /// Error description.
        reason: String,
    },
}
