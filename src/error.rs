//! Custom error types for the device link.
//!
//! This module defines `LinkError`, the single error type returned by the
//! communication core. Using `thiserror`, it separates failures that mean the
//! link itself is unusable from configuration and file problems.
//!
//! ## Error Hierarchy
//!
//! - **`ConnectionFailure`**: the port could not be opened or prepared (busy,
//!   missing, permission denied, invalid baud rate). Returned from `connect`;
//!   the controller is left cleanly closed.
//! - **`NotConnected`**: a read or write was requested while no connection is
//!   open. Nothing touches the wire.
//! - **`TransientIo`**: a read or write failed on a previously open link (for
//!   example, a cable was pulled). The controller has already released the
//!   handle when this is returned.
//! - **`Config`** / **`Configuration`**: figment extraction errors and
//!   semantic validation errors respectively.
//! - **`Logging`**: the tracing subscriber could not be installed.
//! - **`Io`**: file I/O outside the serial link (credential store, config).
//!
//! Malformed telemetry is never an error; see [`crate::telemetry`].

use thiserror::Error;

/// Convenience alias for results using the link error type.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Errors produced by the device link and its configuration layer.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The port could not be opened or prepared.
    #[error("Failed to connect to {port}: {reason}")]
    ConnectionFailure {
        /// Port that was being opened.
        port: String,
        /// Cause reported by the OS or the link.
        reason: String,
    },

    /// No connection is open.
    #[error("Serial port not connected")]
    NotConnected,

    /// A read or write failed on an open link; the handle was released.
    #[error("Serial I/O error on {port} while {operation}: {source}")]
    TransientIo {
        /// Port the fault happened on.
        port: String,
        /// `"reading"` or `"writing"`.
        operation: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Figment could not extract the configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging initialization error: {0}")]
    Logging(String),

    /// File I/O outside the serial link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Builds a `ConnectionFailure` from any displayable cause.
    pub fn connection_failure(port: &str, reason: impl std::fmt::Display) -> Self {
        LinkError::ConnectionFailure {
            port: port.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true when the error means the connection is gone and the
    /// caller must `connect` again before further reads or writes.
    pub fn is_link_lost(&self) -> bool {
        matches!(
            self,
            LinkError::TransientIo { .. } | LinkError::NotConnected
        )
    }
}

impl From<figment::Error> for LinkError {
    fn from(value: figment::Error) -> Self {
        LinkError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn connection_failure_message_names_port() {
        let err = LinkError::connection_failure("/dev/ttyACM0", "Permission denied");
        assert_eq!(
            err.to_string(),
            "Failed to connect to /dev/ttyACM0: Permission denied"
        );
        assert!(!err.is_link_lost());
    }

    #[test]
    fn transient_io_counts_as_link_lost() {
        let err = LinkError::TransientIo {
            port: "COM3".into(),
            operation: "reading",
            source: io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"),
        };
        assert!(err.is_link_lost());
        assert!(err.to_string().contains("COM3"));
        assert!(err.to_string().contains("device unplugged"));
    }

    #[test]
    fn io_error_converts() {
        let err: LinkError = io::Error::from(io::ErrorKind::NotFound).into();
        match err {
            LinkError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
