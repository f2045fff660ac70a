//! Point-to-point transport over one TCP connection.
//!
//! One dedicated read task per transport decodes frames and routes them:
//! correlated responses wake the requester blocked in [`TcpTransport::request`],
//! everything else goes to the registered listener. Writers share a single
//! lock, so same-connection commands always leave in submission order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

use openwire_core::command::info::KeepAliveInfo;
use openwire_core::{
    Command, OpenWireCodec, OpenWireError, OpenWireFormat, Result, WireFormatOptions,
};

use super::{Transport, TransportListener};

/// Handshake/liveness state of one TCP link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkStatus {
    /// Wire format infos are being exchanged; application sends wait.
    Negotiating,
    /// Negotiation complete; traffic flows.
    Ready,
    /// Dead after an I/O or protocol failure.
    Failed,
    /// Explicitly stopped.
    Closed,
}

type PendingMap = StdMutex<HashMap<i32, oneshot::Sender<Result<Command>>>>;

struct TcpCore {
    remote: String,
    codec: OpenWireCodec,
    writer: Mutex<Option<OwnedWriteHalf>>,
    pending: Arc<PendingMap>,
    listener: StdMutex<Option<Arc<dyn TransportListener>>>,
    command_ids: AtomicI32,
    status_tx: watch::Sender<LinkStatus>,
    last_write: StdMutex<Instant>,
    failed: AtomicBool,
    closing: AtomicBool,
}

impl TcpCore {
    async fn send_command(&self, command: &Command) -> Result<()> {
        let mut buf = BytesMut::new();
        self.codec.with_format(|format| format.marshal(command, &mut buf))?;

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| {
            OpenWireError::Connection(format!("transport to {} is closed", self.remote))
        })?;
        if let Err(e) = stream.write_all(&buf).await {
            drop(writer);
            let message = format!("failed to write to {}: {}", self.remote, e);
            self.fail(OpenWireError::Connection(message.clone()));
            return Err(OpenWireError::Connection(message));
        }
        *self.last_write.lock().expect("clock lock poisoned") = Instant::now();
        Ok(())
    }

    /// Routes one inbound command. Errors returned here are protocol
    /// violations and kill the transport.
    fn process_incoming(self: &Arc<Self>, command: Command) -> Result<()> {
        let ready = *self.status_tx.borrow() == LinkStatus::Ready;

        if !ready {
            return match command {
                Command::WireFormatInfo(info) => {
                    self.codec.with_format(|format| format.renegotiate(&info))?;
                    let _ = self.status_tx.send_replace(LinkStatus::Ready);
                    Ok(())
                }
                other => Err(OpenWireError::Protocol(format!(
                    "received {} before wire format negotiation completed",
                    other.name()
                ))),
            };
        }

        if let Some(correlation_id) = command.correlation_id() {
            let waiter = self
                .pending
                .lock()
                .expect("pending lock poisoned")
                .remove(&correlation_id);
            match waiter {
                Some(tx) => {
                    let result = match command {
                        Command::ExceptionResponse(response) => {
                            let error = response.exception.unwrap_or_default();
                            Err(OpenWireError::Broker {
                                exception_class: error.exception_class,
                                message: error.message,
                            })
                        }
                        other => Ok(other),
                    };
                    let _ = tx.send(result);
                }
                None => {
                    // Late response after its requester timed out; it must
                    // not match anything else.
                    tracing::debug!(correlation_id, "response with no waiter, dropping");
                }
            }
            return Ok(());
        }

        match command {
            Command::KeepAliveInfo(_) => {
                tracing::trace!(remote = %self.remote, "keepalive received");
            }
            Command::WireFormatInfo(info) => {
                // Mid-stream renegotiation requested by the peer.
                self.codec.with_format(|format| format.renegotiate(&info))?;
            }
            other => {
                let listener = self
                    .listener
                    .lock()
                    .expect("listener lock poisoned")
                    .clone();
                match listener {
                    Some(listener) => listener.on_command(other),
                    None => tracing::warn!(
                        remote = %self.remote,
                        command = other.name(),
                        "inbound command dropped: no listener registered"
                    ),
                }
            }
        }
        Ok(())
    }

    /// Marks the transport dead, failing all waiters and notifying the
    /// listener exactly once. Explicit stops skip the listener.
    fn fail(&self, error: OpenWireError) {
        if self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        if *self.status_tx.borrow() != LinkStatus::Closed {
            let _ = self.status_tx.send_replace(LinkStatus::Failed);
        }

        let waiters: Vec<oneshot::Sender<Result<Command>>> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.drain().map(|(_, tx)| tx).collect()
        };
        for tx in waiters {
            let _ = tx.send(Err(OpenWireError::Connection(format!(
                "transport to {} failed: {}",
                self.remote, error
            ))));
        }

        if self.closing.load(Ordering::Acquire) {
            return;
        }
        tracing::warn!(remote = %self.remote, error = %error, "transport failed");
        let listener = self
            .listener
            .lock()
            .expect("listener lock poisoned")
            .clone();
        if let Some(listener) = listener {
            listener.on_exception(error);
        }
    }
}

async fn read_loop(core: Arc<TcpCore>, mut framed: FramedRead<OwnedReadHalf, OpenWireCodec>) {
    loop {
        match framed.next().await {
            Some(Ok(command)) => {
                tracing::trace!(remote = %core.remote, command = command.name(), "received");
                if let Err(e) = core.process_incoming(command) {
                    core.fail(e);
                    break;
                }
            }
            Some(Err(e)) => {
                core.fail(e);
                break;
            }
            None => {
                core.fail(OpenWireError::Connection(format!(
                    "connection to {} closed by peer",
                    core.remote
                )));
                break;
            }
        }
    }
}

/// A response being awaited; dropping it abandons the wait.
pub(crate) struct PendingResponse {
    id: i32,
    rx: oneshot::Receiver<Result<Command>>,
    pending: Arc<PendingMap>,
}

impl PendingResponse {
    /// Blocks until the correlated response arrives or `timeout` elapses.
    ///
    /// A timeout removes the waiter so a late response cannot match a
    /// different request later.
    pub(crate) async fn wait(self, timeout: Duration) -> Result<Command> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OpenWireError::Connection(
                "transport closed while awaiting response".to_string(),
            )),
            Err(_) => {
                self.pending
                    .lock()
                    .expect("pending lock poisoned")
                    .remove(&self.id);
                Err(OpenWireError::Timeout(format!(
                    "no response for command {} within {:?}",
                    self.id, timeout
                )))
            }
        }
    }
}

/// Transport over a single TCP connection.
pub struct TcpTransport {
    core: Arc<TcpCore>,
    read_half: StdMutex<Option<OwnedReadHalf>>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    keepalive_task: StdMutex<Option<JoinHandle<()>>>,
    negotiate_timeout: Duration,
}

impl TcpTransport {
    /// Dials the broker and prepares (but does not start) the transport.
    pub async fn connect(
        remote: &str,
        wire_format: WireFormatOptions,
        connect_timeout: Duration,
        negotiate_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(remote))
            .await
            .map_err(|_| {
                OpenWireError::Timeout(format!(
                    "connection to {} timed out after {:?}",
                    remote, connect_timeout
                ))
            })?
            .map_err(|e| {
                OpenWireError::Connection(format!("failed to connect to {}: {}", remote, e))
            })?;

        stream.set_nodelay(true).map_err(|e| {
            OpenWireError::Connection(format!("failed to set TCP_NODELAY: {}", e))
        })?;
        tracing::debug!(remote, "established connection");

        let (read_half, write_half) = stream.into_split();
        let (status_tx, _) = watch::channel(LinkStatus::Negotiating);

        let core = Arc::new(TcpCore {
            remote: remote.to_string(),
            codec: OpenWireCodec::new(OpenWireFormat::new(wire_format)),
            writer: Mutex::new(Some(write_half)),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            listener: StdMutex::new(None),
            command_ids: AtomicI32::new(0),
            status_tx,
            last_write: StdMutex::new(Instant::now()),
            failed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        });

        Ok(Self {
            core,
            read_half: StdMutex::new(Some(read_half)),
            reader_task: StdMutex::new(None),
            keepalive_task: StdMutex::new(None),
            negotiate_timeout,
        })
    }

    fn next_command_id(&self) -> i32 {
        self.core.command_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Waits until negotiation completes, bounded by the handshake timeout.
    async fn ensure_ready(&self) -> Result<()> {
        let mut status_rx = self.core.status_tx.subscribe();
        loop {
            match *status_rx.borrow() {
                LinkStatus::Ready => return Ok(()),
                LinkStatus::Failed => {
                    return Err(OpenWireError::Connection(format!(
                        "transport to {} has failed",
                        self.core.remote
                    )))
                }
                LinkStatus::Closed => {
                    return Err(OpenWireError::Connection(format!(
                        "transport to {} is closed",
                        self.core.remote
                    )))
                }
                LinkStatus::Negotiating => {}
            }
            tokio::time::timeout(self.negotiate_timeout, status_rx.changed())
                .await
                .map_err(|_| {
                    OpenWireError::Timeout(format!(
                        "wire format negotiation with {} timed out after {:?}",
                        self.core.remote, self.negotiate_timeout
                    ))
                })?
                .map_err(|_| {
                    OpenWireError::Connection("transport dropped during negotiation".to_string())
                })?;
        }
    }

    /// Registers a response waiter and sends the command.
    ///
    /// Split from [`Transport::request`] so the failover layer can issue the
    /// send in FIFO order while awaiting the response elsewhere.
    pub(crate) async fn send_request(&self, mut command: Command) -> Result<PendingResponse> {
        self.ensure_ready().await?;
        let id = self.next_command_id();
        command.set_command_id(id);
        command.set_response_required(true);

        let (tx, rx) = oneshot::channel();
        self.core
            .pending
            .lock()
            .expect("pending lock poisoned")
            .insert(id, tx);

        if let Err(e) = self.core.send_command(&command).await {
            self.core
                .pending
                .lock()
                .expect("pending lock poisoned")
                .remove(&id);
            return Err(e);
        }

        Ok(PendingResponse {
            id,
            rx,
            pending: Arc::clone(&self.core.pending),
        })
    }

    fn spawn_keepalive(&self) {
        let interval_ms = self.core.codec.with_format(|f| f.max_inactivity_duration());
        if interval_ms <= 0 {
            return;
        }
        let period = Duration::from_millis((interval_ms as u64 / 2).max(1));
        let core = Arc::clone(&self.core);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if core.failed.load(Ordering::Acquire) {
                    break;
                }
                let idle = core
                    .last_write
                    .lock()
                    .expect("clock lock poisoned")
                    .elapsed();
                if idle < period {
                    continue;
                }
                let keepalive = Command::KeepAliveInfo(KeepAliveInfo::default());
                if core.send_command(&keepalive).await.is_err() {
                    break;
                }
                tracing::trace!(remote = %core.remote, "keepalive sent");
            }
        });
        *self
            .keepalive_task
            .lock()
            .expect("keepalive lock poisoned") = Some(handle);
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn start(&self) -> Result<()> {
        let read_half = self
            .read_half
            .lock()
            .expect("read half lock poisoned")
            .take()
            .ok_or_else(|| {
                OpenWireError::Connection("transport already started".to_string())
            })?;

        let framed = FramedRead::new(read_half, self.core.codec.clone());
        let handle = tokio::spawn(read_loop(Arc::clone(&self.core), framed));
        *self.reader_task.lock().expect("reader lock poisoned") = Some(handle);

        // Open the handshake: our preferred options go out first, the read
        // task applies the peer's answer.
        let info = self.core.codec.with_format(|f| f.preferred_info());
        self.core
            .send_command(&Command::WireFormatInfo(info))
            .await?;
        self.ensure_ready().await?;

        self.spawn_keepalive();
        tracing::info!(
            remote = %self.core.remote,
            version = self.core.codec.with_format(|f| f.version()),
            "transport ready"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.core.closing.store(true, Ordering::Release);
        let _ = self.core.status_tx.send_replace(LinkStatus::Closed);

        if let Some(handle) = self.reader_task.lock().expect("reader lock poisoned").take() {
            handle.abort();
        }
        if let Some(handle) = self
            .keepalive_task
            .lock()
            .expect("keepalive lock poisoned")
            .take()
        {
            handle.abort();
        }

        // Dropping the write half closes the socket.
        self.core.writer.lock().await.take();
        self.core.fail(OpenWireError::Connection(
            "transport stopped".to_string(),
        ));
        tracing::debug!(remote = %self.core.remote, "transport stopped");
        Ok(())
    }

    async fn oneway(&self, mut command: Command) -> Result<()> {
        self.ensure_ready().await?;
        if command.command_id() == 0 {
            command.set_command_id(self.next_command_id());
        }
        self.core.send_command(&command).await
    }

    async fn request(&self, command: Command, timeout: Duration) -> Result<Command> {
        let pending = self.send_request(command).await?;
        pending.wait(timeout).await
    }

    fn set_listener(&self, listener: Arc<dyn TransportListener>) {
        *self.core.listener.lock().expect("listener lock poisoned") = Some(listener);
    }

    fn is_connected(&self) -> bool {
        *self.core.status_tx.borrow() == LinkStatus::Ready
    }

    fn remote_address(&self) -> Option<String> {
        if self.is_connected() {
            Some(self.core.remote.clone())
        } else {
            None
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote", &self.core.remote)
            .field("status", &*self.core.status_tx.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_transitions_are_distinct() {
        assert_ne!(LinkStatus::Negotiating, LinkStatus::Ready);
        assert_ne!(LinkStatus::Ready, LinkStatus::Failed);
        assert_ne!(LinkStatus::Failed, LinkStatus::Closed);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 on localhost is essentially never listening.
        let result = TcpTransport::connect(
            "127.0.0.1:1",
            WireFormatOptions::default(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_timeout_to_blackhole() {
        // RFC 5737 TEST-NET-1 address; packets go nowhere.
        let result = TcpTransport::connect(
            "192.0.2.1:61616",
            WireFormatOptions::default(),
            Duration::from_millis(100),
            Duration::from_secs(1),
        )
        .await;
        match result {
            Err(OpenWireError::Timeout(_)) | Err(OpenWireError::Connection(_)) => {}
            other => panic!("expected timeout or connection error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_negotiation_timeout_against_silent_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept but never speak.
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let transport = TcpTransport::connect(
            &addr.to_string(),
            WireFormatOptions::default(),
            Duration::from_secs(2),
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        let err = transport.start().await.unwrap_err();
        assert!(matches!(err, OpenWireError::Timeout(_)));
    }
}
