//! Transport stack: point-to-point TCP and the failover composite.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openwire_core::{Command, OpenWireError, Result};

mod failover;
mod tcp;

pub use failover::{FailoverStatus, FailoverTransport};
pub use tcp::TcpTransport;

/// Receives asynchronous traffic and lifecycle signals from a transport.
///
/// Implemented by the layer above the transport stack; dispatched commands
/// (message deliveries, broker control commands) arrive on the transport's
/// read task, so implementations must not block.
pub trait TransportListener: Send + Sync {
    /// Called for every inbound command that is not a correlated response.
    fn on_command(&self, command: Command);

    /// Called exactly once when the transport fails irrecoverably.
    fn on_exception(&self, error: OpenWireError);

    /// Called when the failover layer loses its underlying connection.
    fn transport_interrupted(&self) {}

    /// Called when the failover layer has restored a connection and
    /// finished replaying recovery state.
    fn transport_resumed(&self) {}
}

/// Reliable ordered delivery of commands to one logical peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts I/O tasks and performs the wire format handshake.
    async fn start(&self) -> Result<()>;

    /// Stops the transport, interrupting all blocked callers.
    async fn stop(&self) -> Result<()>;

    /// Permanently closes the transport. Equivalent to [`Transport::stop`].
    async fn close(&self) -> Result<()> {
        self.stop().await
    }

    /// Sends a command without waiting for any reply.
    async fn oneway(&self, command: Command) -> Result<()>;

    /// Sends a command tagged with a fresh command id and blocks until the
    /// correlated response arrives or the timeout elapses.
    async fn request(&self, command: Command, timeout: Duration) -> Result<Command>;

    /// Registers the listener for dispatches and failures. Must be called
    /// before [`Transport::start`].
    fn set_listener(&self, listener: Arc<dyn TransportListener>);

    /// Returns `true` while the transport can carry traffic.
    fn is_connected(&self) -> bool;

    /// Returns the remote endpoint, if currently connected.
    fn remote_address(&self) -> Option<String>;
}

/// Connection lifecycle notifications, mostly for diagnostics and tests.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A broker connection is established and negotiated.
    Connected {
        /// The broker endpoint.
        uri: String,
    },
    /// The active broker connection was lost.
    Disconnected {
        /// The broker endpoint.
        uri: String,
        /// The error that caused the disconnect, if any.
        error: Option<String>,
    },
    /// A reconnect attempt is about to dial.
    ReconnectAttempt {
        /// The broker endpoint being tried.
        uri: String,
        /// 1-based attempt counter within the current outage.
        attempt: u32,
    },
    /// Reconnection was abandoned permanently.
    ReconnectFailed {
        /// Why reconnection stopped.
        error: String,
    },
}
