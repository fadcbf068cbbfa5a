//! Error types for vimnav.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vimnav operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing keys, injecting pointer events or
/// loading configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// The navigator is already running.
    #[error("navigator is already running")]
    AlreadyRunning,

    /// The navigator is not running.
    #[error("navigator is not running")]
    NotRunning,

    /// The process lacks the OS permission needed to tap or inject input.
    ///
    /// Recoverable by user action outside the process (granting
    /// accessibility access, joining the `input` group, ...).
    #[error("input capability denied: {0}")]
    CapabilityDenied(String),

    /// The global key listener could not be established.
    #[error("failed to subscribe to key events: {0}")]
    SubscribeFailed(String),

    /// A single synthetic event could not be delivered.
    #[error("failed to inject event: {0}")]
    InjectFailed(String),

    /// The configuration is malformed or contains conflicting bindings.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Platform-specific error.
    #[error("platform error: {0}")]
    Platform(String),

    /// Thread-related error.
    #[error("thread error: {0}")]
    ThreadError(String),

    /// The requested feature is not supported on this platform.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Whether this error is a permission problem the user can fix.
    pub fn is_capability(&self) -> bool {
        matches!(self, Error::CapabilityDenied(_))
    }
}
