//! In-process mock broker speaking real OpenWire frames.
//!
//! Accepts connections, performs the wire format handshake with the crate's
//! own `OpenWireFormat`, records every application command per connection,
//! and acknowledges `response_required` commands. Connections can be killed
//! and accepting paused to simulate a broker crash and restart.

// Each integration test binary compiles its own copy; not every test uses
// every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use openwire_core::command::response::{BrokerError, ExceptionResponse, IntegerResponse, Response};
use openwire_core::{Command, OpenWireFormat, WireFormatOptions};

/// Tuning knobs for a [`MockBroker`].
#[derive(Debug, Clone)]
pub struct MockBrokerOptions {
    /// Wire format options the broker advertises.
    pub wire_format: WireFormatOptions,
    /// Acknowledge `response_required` commands.
    pub respond: bool,
    /// Answer messages with an `IntegerResponse` whose result is the number
    /// at the end of the text body ("msg-7" → 7), instead of a plain
    /// `Response`. Lets tests check that callers get their own answer.
    pub echo_message_index: bool,
    /// Reject messages with an `ExceptionResponse` instead of acknowledging.
    pub fail_messages: bool,
}

impl Default for MockBrokerOptions {
    fn default() -> Self {
        Self {
            wire_format: WireFormatOptions::default(),
            respond: true,
            echo_message_index: false,
            fail_messages: false,
        }
    }
}

struct BrokerState {
    options: MockBrokerOptions,
    received: Mutex<Vec<(usize, Command)>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<Command>>>,
    connection_tasks: Mutex<Vec<JoinHandle<()>>>,
    connections: AtomicUsize,
    serving: AtomicBool,
}

/// A broker double bound to an ephemeral local port.
pub struct MockBroker {
    addr: std::net::SocketAddr,
    state: Arc<BrokerState>,
    accept_task: JoinHandle<()>,
}

impl MockBroker {
    /// Starts a broker with default options.
    pub async fn start() -> Self {
        Self::start_with(MockBrokerOptions::default()).await
    }

    /// Starts a broker with the given options.
    pub async fn start_with(options: MockBrokerOptions) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(BrokerState {
            options,
            received: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
            connection_tasks: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            serving: AtomicBool::new(true),
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                if !accept_state.serving.load(Ordering::Acquire) {
                    // Paused broker: refuse by closing immediately.
                    drop(socket);
                    continue;
                }
                let conn_id = accept_state.connections.fetch_add(1, Ordering::AcqRel) + 1;
                let conn_state = Arc::clone(&accept_state);
                let handle = tokio::spawn(async move {
                    let _ = serve_connection(socket, conn_id, conn_state).await;
                });
                accept_state
                    .connection_tasks
                    .lock()
                    .unwrap()
                    .push(handle);
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    /// Returns the broker's `tcp://` URI.
    pub fn uri(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    /// Returns the broker's `host:port` authority.
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Number of connections accepted and served so far.
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::Acquire)
    }

    /// Snapshot of received application commands as (connection, command).
    pub fn received(&self) -> Vec<(usize, Command)> {
        self.state.received.lock().unwrap().clone()
    }

    /// Commands received on a specific connection.
    pub fn received_on(&self, conn_id: usize) -> Vec<Command> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == conn_id)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    /// Sends a command to every live connection.
    pub fn broadcast(&self, command: Command) {
        let senders = self.state.senders.lock().unwrap();
        for tx in senders.iter() {
            let _ = tx.send(command.clone());
        }
    }

    /// Drops every live connection, simulating a broker crash.
    pub fn kill_connections(&self) {
        let mut tasks = self.state.connection_tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
        self.state.senders.lock().unwrap().clear();
    }

    /// Stops serving new connections (they are refused immediately).
    pub fn pause(&self) {
        self.state.serving.store(false, Ordering::Release);
    }

    /// Resumes serving new connections.
    pub fn resume(&self) {
        self.state.serving.store(true, Ordering::Release);
    }

    /// Waits until at least `count` application commands have arrived.
    pub async fn wait_for_commands(&self, count: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.state.received.lock().unwrap().len() >= count {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                let got = self.state.received.lock().unwrap().len();
                panic!("expected {} commands within {:?}, got {}", count, timeout, got);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Waits until at least `count` connections have been served.
    pub async fn wait_for_connections(&self, count: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.connection_count() < count {
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "expected {} connections within {:?}, got {}",
                    count,
                    timeout,
                    self.connection_count()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.kill_connections();
    }
}

async fn write_command(
    format: &OpenWireFormat,
    writer: &mut OwnedWriteHalf,
    command: &Command,
) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    format
        .marshal(command, &mut buf)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    writer.write_all(&buf).await
}

fn response_for(options: &MockBrokerOptions, command: &Command) -> Command {
    if options.fail_messages && matches!(command, Command::Message(_)) {
        return Command::ExceptionResponse(ExceptionResponse {
            command_id: 0,
            response_required: false,
            correlation_id: command.command_id(),
            exception: Some(BrokerError::new(
                "javax.jms.JMSSecurityException",
                "not authorized to send",
            )),
        });
    }
    if options.echo_message_index {
        if let Command::Message(msg) = command {
            let index = msg
                .body_text()
                .and_then(|text| text.rsplit('-').next())
                .and_then(|tail| tail.parse::<i32>().ok())
                .unwrap_or(-1);
            return Command::IntegerResponse(IntegerResponse {
                command_id: 0,
                response_required: false,
                correlation_id: command.command_id(),
                result: index,
            });
        }
    }
    Command::Response(Response::for_request(command.command_id()))
}

async fn serve_connection(
    stream: TcpStream,
    conn_id: usize,
    state: Arc<BrokerState>,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut format = OpenWireFormat::new(state.options.wire_format.clone());
    let mut buf = BytesMut::with_capacity(8192);
    let mut negotiated = false;

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    state.senders.lock().unwrap().push(tx);

    // The broker opens the handshake from its side, like the real one.
    let info = Command::WireFormatInfo(format.preferred_info());
    write_command(&format, &mut writer, &info).await?;

    loop {
        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                loop {
                    let decoded = format
                        .unmarshal(&mut buf)
                        .map_err(|e| std::io::Error::other(e.to_string()))?;
                    let Some(command) = decoded else { break };
                    match command {
                        Command::WireFormatInfo(peer) if !negotiated => {
                            format
                                .renegotiate(&peer)
                                .map_err(|e| std::io::Error::other(e.to_string()))?;
                            negotiated = true;
                        }
                        Command::KeepAliveInfo(_) => {}
                        command => {
                            state.received.lock().unwrap().push((conn_id, command.clone()));
                            if command.response_required() && state.options.respond {
                                let response = response_for(&state.options, &command);
                                write_command(&format, &mut writer, &response).await?;
                            }
                        }
                    }
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(command) => write_command(&format, &mut writer, &command).await?,
                    None => break,
                }
            }
        }
    }
    Ok(())
}
