//! Error types for OpenWire operations.

use std::io;
use thiserror::Error;

/// The main error type for OpenWire operations.
#[derive(Debug, Error)]
pub enum OpenWireError {
    /// Connection-related errors (network failures, disconnections).
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol-related errors (malformed frames, unknown type ids,
    /// presence-stream desync). Fatal to the transport that produced them.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Marshalling/unmarshalling errors for command bodies.
    #[error("marshal error: {0}")]
    Marshal(String),

    /// A blocking wait (request/response, reconnect) expired.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// Configuration errors (invalid URIs, unknown options, unresolved
    /// environment variables).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error reported by the broker in response to a specific request.
    #[error("broker error: {exception_class}: {message}")]
    Broker {
        /// The remote exception class name.
        exception_class: String,
        /// The remote exception message.
        message: String,
    },

    /// Reconnection was abandoned; the failover transport is dead.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl OpenWireError {
    /// Returns `true` for errors that kill the current physical transport
    /// but are recoverable by reconnecting (possibly to another broker).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OpenWireError::Connection(_) | OpenWireError::Protocol(_) | OpenWireError::Io(_)
        )
    }
}

/// A specialized `Result` type for OpenWire operations.
pub type Result<T> = std::result::Result<T, OpenWireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = OpenWireError::Connection("failed to connect to broker".to_string());
        assert_eq!(
            err.to_string(),
            "connection error: failed to connect to broker"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = OpenWireError::Protocol("unknown data type: 99".to_string());
        assert_eq!(err.to_string(), "protocol error: unknown data type: 99");
    }

    #[test]
    fn test_broker_error_display() {
        let err = OpenWireError::Broker {
            exception_class: "javax.jms.JMSSecurityException".to_string(),
            message: "not authorized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "broker error: javax.jms.JMSSecurityException: not authorized"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: OpenWireError = io_err.into();
        assert!(matches!(err, OpenWireError::Io(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(OpenWireError::Connection("x".into()).is_recoverable());
        assert!(OpenWireError::Protocol("x".into()).is_recoverable());
        assert!(!OpenWireError::Timeout("x".into()).is_recoverable());
        assert!(!OpenWireError::Configuration("x".into()).is_recoverable());
        assert!(!OpenWireError::ConnectionFailed("x".into()).is_recoverable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpenWireError>();
    }
}
