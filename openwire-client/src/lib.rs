//! Failover-capable OpenWire transport for ActiveMQ-compatible brokers.
//!
//! This crate is the transport layer over [`openwire_core`]: a TCP transport
//! with a dedicated read task and correlated request/response, and a
//! [`FailoverTransport`] that hides broker failures behind a stable
//! interface: reconnecting through a URI pool with exponential backoff,
//! replaying cached connection/session/producer/consumer state to the new
//! broker, and holding application sends in FIFO order across the outage.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use openwire_client::{FailoverTransport, Transport};
//! use openwire_core::command::{Command, ConnectionId, ConnectionInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = FailoverTransport::from_uri(
//!         "failover:(tcp://broker-a:61616,tcp://broker-b:61616)?randomize=false",
//!     )?;
//!     transport.start().await?;
//!     transport.await_connected(Duration::from_secs(10)).await?;
//!
//!     let info = ConnectionInfo::new(ConnectionId::new("client-1"));
//!     let response = transport
//!         .request(Command::ConnectionInfo(info), Duration::from_secs(5))
//!         .await?;
//!     println!("broker answered: {}", response.name());
//!
//!     transport.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod state;
pub mod transport;
pub mod uri_pool;

pub use config::{BrokerUri, FailoverConfig, FailoverConfigBuilder};
pub use state::{ConnectionStateTracker, RecoveryPlan};
pub use transport::{
    ConnectionEvent, FailoverStatus, FailoverTransport, TcpTransport, Transport,
    TransportListener,
};
pub use uri_pool::UriPool;
