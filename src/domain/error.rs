//! Domain-level error types for zebra-usb.
//!
//! Recoverable "not found" conditions are modelled as `Option` at the call
//! site; this enum covers what callers cannot paper over.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum ZebraError {
    /// A required printer, binding or identifier could not be located.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// More than one candidate where exactly one is required.
    #[error("Found {count} Zebra printers where exactly one was expected")]
    Ambiguous { count: usize },

    /// The printer has no `/dev/usb/lpX` node on this host.
    #[error("Printer {serial} does not enumerate under the USB line-printer directory")]
    NotEnumerated { serial: String },

    /// An external command could not be spawned or driven.
    #[error("Command `{command}` failed: {message}")]
    Command {
        command: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// An external command did not finish in time.
    #[error("Command `{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// Command output matched but a required field was missing.
    #[error("Unexpected command output: {message}")]
    Internal { message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Stored binding value is not `serial[-VID-PID]`.
    #[error("Invalid printer binding: {value:?}")]
    InvalidBinding { value: String },

    /// Binding store failure.
    #[error("Binding store error at {path}: {message}")]
    Store {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl ZebraError {
    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an internal-consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a command error wrapping the spawn/IO failure.
    pub fn command(command: impl Into<String>, err: std::io::Error) -> Self {
        Self::Command {
            command: command.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a store error from a rusqlite error.
    pub fn database(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        Self::Store {
            path: path.into(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `ZebraError`.
pub type Result<T> = std::result::Result<T, ZebraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ZebraError::Ambiguous { count: 3 };
        assert_eq!(
            err.to_string(),
            "Found 3 Zebra printers where exactly one was expected"
        );

        let err = ZebraError::NotEnumerated {
            serial: "ABC123".into(),
        };
        assert!(err.to_string().contains("ABC123"));
    }
}
