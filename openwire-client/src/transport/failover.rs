//! Composite transport that survives broker failures.
//!
//! Presents the plain [`Transport`] interface while swapping the underlying
//! TCP transport whenever it fails. Application sends made during an outage
//! queue FIFO and block (bounded by the configured timeout) instead of
//! failing; once a new connection is negotiated the cached connection state
//! is replayed first, then the queue drains in arrival order, and only then
//! does the transport report connected again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;

use openwire_core::command::info::TransactionOp;
use openwire_core::{Command, OpenWireError, Result};

use super::{ConnectionEvent, Transport, TransportListener};
use crate::config::{BrokerUri, FailoverConfig};
use crate::state::ConnectionStateTracker;
use crate::transport::TcpTransport;
use crate::uri_pool::UriPool;

/// Relative spread applied to each backoff step so a fleet of clients does
/// not reconnect in lockstep.
const RECONNECT_JITTER: f64 = 0.1;

/// Externally visible state of the failover transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStatus {
    /// No connection and no attempt in progress yet.
    Disconnected,
    /// The reconnect task is cycling through the URI pool.
    Connecting,
    /// An underlying transport is connected and replay has finished.
    Connected,
    /// Reconnection was abandoned; the transport is dead.
    Failed,
    /// Explicitly closed.
    Closed,
}

enum QueuedSend {
    Oneway {
        command: Command,
        done: oneshot::Sender<Result<()>>,
    },
    Request {
        command: Command,
        timeout: Duration,
        reply: oneshot::Sender<Result<Command>>,
    },
}

struct FailoverShared {
    config: FailoverConfig,
    pool: StdMutex<UriPool>,
    tracker: StdMutex<ConnectionStateTracker>,
    active: StdMutex<Option<Arc<TcpTransport>>>,
    connected_uri: StdMutex<Option<BrokerUri>>,
    backups: StdMutex<Vec<(BrokerUri, Arc<TcpTransport>)>>,
    queue: StdMutex<VecDeque<QueuedSend>>,
    status_tx: watch::Sender<FailoverStatus>,
    listener: StdMutex<Option<Arc<dyn TransportListener>>>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    reconnect: Notify,
    closer_tx: mpsc::UnboundedSender<Arc<TcpTransport>>,
    first_connection: AtomicBool,
    closed: AtomicBool,
}

impl FailoverShared {
    fn status(&self) -> FailoverStatus {
        *self.status_tx.borrow()
    }

    fn current_active(&self) -> Option<Arc<TcpTransport>> {
        self.active.lock().expect("active lock poisoned").clone()
    }

    fn app_listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().expect("listener lock poisoned").clone()
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn track(&self, command: &Command) {
        self.tracker
            .lock()
            .expect("tracker lock poisoned")
            .track(command);
    }

    /// Reacts to the loss of the active transport: park it for asynchronous
    /// closing, return its URI to the pool, and wake the reconnect task.
    ///
    /// `failed` must be the transport that errored; a stale or backup
    /// transport failing must not tear down a healthy active connection.
    fn handle_transport_failure(&self, failed: &Arc<TcpTransport>, error: &OpenWireError) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let old = {
            let mut active = self.active.lock().expect("active lock poisoned");
            match active.as_ref() {
                Some(current) if Arc::ptr_eq(current, failed) => active.take(),
                _ => None,
            }
        };
        let Some(old) = old else {
            // Not the active transport (already replaced, or a backup).
            return;
        };
        let _ = self.closer_tx.send(old);

        let uri = self
            .connected_uri
            .lock()
            .expect("uri lock poisoned")
            .take();
        if let Some(uri) = uri {
            tracing::warn!(uri = %uri, error = %error, "broker connection lost, failing over");
            self.emit(ConnectionEvent::Disconnected {
                uri: uri.to_string(),
                error: Some(error.to_string()),
            });
            self.pool.lock().expect("pool lock poisoned").release(uri);
        }

        let _ = self.status_tx.send_replace(FailoverStatus::Connecting);
        if let Some(listener) = self.app_listener() {
            listener.transport_interrupted();
        }
        self.reconnect.notify_one();
    }

    /// Fails every queued send; used on terminal failure and on close.
    fn fail_queue(&self, make_error: impl Fn() -> OpenWireError) {
        let drained: Vec<QueuedSend> = {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue.drain(..).collect()
        };
        for item in drained {
            match item {
                QueuedSend::Oneway { done, .. } => {
                    let _ = done.send(Err(make_error()));
                }
                QueuedSend::Request { reply, .. } => {
                    let _ = reply.send(Err(make_error()));
                }
            }
        }
    }
}

/// Listener installed on each underlying TCP transport; routes dispatches up
/// to the application and converts transport death into a reconnect.
struct ActiveTransportListener {
    shared: Weak<FailoverShared>,
    transport: Weak<TcpTransport>,
}

impl ActiveTransportListener {
    fn is_active(&self, shared: &FailoverShared, me: &Arc<TcpTransport>) -> bool {
        shared
            .active
            .lock()
            .expect("active lock poisoned")
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, me))
    }
}

impl TransportListener for ActiveTransportListener {
    fn on_command(&self, command: Command) {
        let (Some(shared), Some(me)) = (self.shared.upgrade(), self.transport.upgrade()) else {
            return;
        };
        // Stale or backup transports may still receive late traffic; only
        // the active connection feeds the application.
        if !self.is_active(&shared, &me) {
            return;
        }
        if let Some(listener) = shared.app_listener() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: OpenWireError) {
        let (Some(shared), Some(me)) = (self.shared.upgrade(), self.transport.upgrade()) else {
            return;
        };
        shared.handle_transport_failure(&me, &error);
    }
}

/// Failover transport over a pool of broker URIs.
pub struct FailoverTransport {
    shared: Arc<FailoverShared>,
    closer_rx: StdMutex<Option<mpsc::UnboundedReceiver<Arc<TcpTransport>>>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl FailoverTransport {
    /// Creates a failover transport; no connection is attempted until
    /// [`Transport::start`].
    pub fn new(config: FailoverConfig) -> Self {
        let pool = UriPool::new(config.uris().to_vec(), config.randomize());
        let tracker =
            ConnectionStateTracker::new(config.track_messages(), config.max_cache_size());
        let (status_tx, _) = watch::channel(FailoverStatus::Disconnected);
        let (events_tx, _) = broadcast::channel(64);
        let (closer_tx, closer_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(FailoverShared {
                config,
                pool: StdMutex::new(pool),
                tracker: StdMutex::new(tracker),
                active: StdMutex::new(None),
                connected_uri: StdMutex::new(None),
                backups: StdMutex::new(Vec::new()),
                queue: StdMutex::new(VecDeque::new()),
                status_tx,
                listener: StdMutex::new(None),
                events_tx,
                reconnect: Notify::new(),
                closer_tx,
                first_connection: AtomicBool::new(true),
                closed: AtomicBool::new(false),
            }),
            closer_rx: StdMutex::new(Some(closer_rx)),
            tasks: StdMutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Parses a `failover:` (or plain `tcp://`) URI into a transport.
    pub fn from_uri(uri: &str) -> Result<Self> {
        Ok(Self::new(FailoverConfig::from_uri(uri)?))
    }

    /// Returns the current failover status.
    pub fn status(&self) -> FailoverStatus {
        self.shared.status()
    }

    /// Subscribes to connection lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Waits until the transport reports connected, failed, or closed.
    pub async fn await_connected(&self, timeout: Duration) -> Result<()> {
        let mut status_rx = self.shared.status_tx.subscribe();
        let deadline = Instant::now() + timeout;
        loop {
            match *status_rx.borrow() {
                FailoverStatus::Connected => return Ok(()),
                FailoverStatus::Failed => {
                    return Err(OpenWireError::ConnectionFailed(
                        "broker pool exhausted".to_string(),
                    ))
                }
                FailoverStatus::Closed => {
                    return Err(OpenWireError::Connection(
                        "failover transport is closed".to_string(),
                    ))
                }
                FailoverStatus::Disconnected | FailoverStatus::Connecting => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(OpenWireError::Timeout(format!(
                    "not connected within {:?}",
                    timeout
                )));
            }
            tokio::time::timeout(remaining, status_rx.changed())
                .await
                .map_err(|_| {
                    OpenWireError::Timeout(format!("not connected within {:?}", timeout))
                })?
                .map_err(|_| {
                    OpenWireError::Connection("failover transport dropped".to_string())
                })?;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(OpenWireError::Connection(
                "failover transport is closed".to_string(),
            ));
        }
        if self.shared.status() == FailoverStatus::Failed {
            return Err(OpenWireError::ConnectionFailed(
                "reconnection abandoned, broker pool exhausted".to_string(),
            ));
        }
        Ok(())
    }

    /// Refuses to queue behind a transport that will never reconnect.
    fn check_not_terminal(&self) -> Result<()> {
        match self.shared.status() {
            FailoverStatus::Failed => Err(OpenWireError::ConnectionFailed(
                "reconnection abandoned, broker pool exhausted".to_string(),
            )),
            FailoverStatus::Closed => Err(OpenWireError::Connection(
                "failover transport is closed".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Routes a oneway: direct when connected, queued while disconnected.
    fn route_oneway(&self, command: Command) -> Result<RoutedOneway> {
        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
        if self.shared.status() == FailoverStatus::Connected {
            if let Some(active) = self.shared.current_active() {
                return Ok(RoutedOneway::Direct(active));
            }
        }
        self.check_not_terminal()?;
        if queue.len() >= self.shared.config.max_async_send_backlog() {
            return Err(OpenWireError::Connection(format!(
                "send backlog exceeded ({} commands queued while disconnected)",
                queue.len()
            )));
        }
        let (done, rx) = oneshot::channel();
        queue.push_back(QueuedSend::Oneway { command, done });
        Ok(RoutedOneway::Queued(rx))
    }

    fn route_request(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<RoutedRequest> {
        let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
        if self.shared.status() == FailoverStatus::Connected {
            if let Some(active) = self.shared.current_active() {
                return Ok(RoutedRequest::Direct(active));
            }
        }
        self.check_not_terminal()?;
        if queue.len() >= self.shared.config.max_async_send_backlog() {
            return Err(OpenWireError::Connection(format!(
                "send backlog exceeded ({} commands queued while disconnected)",
                queue.len()
            )));
        }
        let (reply, rx) = oneshot::channel();
        queue.push_back(QueuedSend::Request {
            command,
            timeout,
            reply,
        });
        Ok(RoutedRequest::Queued(rx))
    }

    async fn wait_queued<T>(
        &self,
        rx: oneshot::Receiver<Result<T>>,
        bound: Option<Duration>,
    ) -> Result<T> {
        let outcome = match bound {
            Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                OpenWireError::Timeout(format!(
                    "send still queued after {:?} without a connection",
                    limit
                ))
            })?,
            None => rx.await,
        };
        outcome.map_err(|_| {
            OpenWireError::Connection("failover transport closed while send was queued".to_string())
        })?
    }

    /// Prunes transaction state once its commit or rollback is acknowledged.
    fn settle_transaction(&self, command: &Command) {
        if let Command::TransactionInfo(info) = command {
            let settled = matches!(
                info.op,
                TransactionOp::CommitOnePhase
                    | TransactionOp::CommitTwoPhase
                    | TransactionOp::Rollback
            );
            if settled {
                if let Some(txid) = &info.transaction_id {
                    self.shared
                        .tracker
                        .lock()
                        .expect("tracker lock poisoned")
                        .complete_transaction(txid);
                }
            }
        }
    }
}

enum RoutedOneway {
    Direct(Arc<TcpTransport>),
    Queued(oneshot::Receiver<Result<()>>),
}

enum RoutedRequest {
    Direct(Arc<TcpTransport>),
    Queued(oneshot::Receiver<Result<Command>>),
}

#[async_trait]
impl Transport for FailoverTransport {
    async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut closer_rx = self
            .closer_rx
            .lock()
            .expect("closer lock poisoned")
            .take()
            .expect("closer receiver consumed");
        // Discarded transports are torn down here, off the reconnect path,
        // so a slow socket close never delays recovery.
        let closer = tokio::spawn(async move {
            while let Some(transport) = closer_rx.recv().await {
                let _ = transport.stop().await;
            }
        });

        let reconnector = tokio::spawn(reconnect_loop(Arc::clone(&self.shared)));
        self.tasks
            .lock()
            .expect("tasks lock poisoned")
            .extend([closer, reconnector]);

        let _ = self.shared.status_tx.send_replace(FailoverStatus::Connecting);
        self.shared.reconnect.notify_one();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = self.shared.status_tx.send_replace(FailoverStatus::Closed);
        self.shared.reconnect.notify_one();
        self.shared.fail_queue(|| {
            OpenWireError::Connection("failover transport closed".to_string())
        });

        let active = self.shared.active.lock().expect("active lock poisoned").take();
        if let Some(active) = active {
            let _ = active.stop().await;
        }
        let backups: Vec<(BrokerUri, Arc<TcpTransport>)> = {
            let mut backups = self.shared.backups.lock().expect("backups lock poisoned");
            backups.drain(..).collect()
        };
        for (_, backup) in backups {
            let _ = backup.stop().await;
        }

        for task in self.tasks.lock().expect("tasks lock poisoned").drain(..) {
            task.abort();
        }
        tracing::info!("failover transport closed");
        Ok(())
    }

    async fn oneway(&self, command: Command) -> Result<()> {
        loop {
            self.ensure_open()?;
            match self.route_oneway(command.clone())? {
                RoutedOneway::Direct(active) => match active.oneway(command.clone()).await {
                    Ok(()) => {
                        self.shared.track(&command);
                        return Ok(());
                    }
                    Err(e) if e.is_recoverable() => {
                        self.shared.handle_transport_failure(&active, &e);
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                RoutedOneway::Queued(rx) => {
                    return self.wait_queued(rx, self.shared.config.timeout()).await;
                }
            }
        }
    }

    async fn request(&self, command: Command, timeout: Duration) -> Result<Command> {
        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_open()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(OpenWireError::Timeout(format!(
                    "request not completed within {:?}",
                    timeout
                )));
            }

            match self.route_request(command.clone(), remaining)? {
                RoutedRequest::Direct(active) => {
                    match active.send_request(command.clone()).await {
                        Ok(pending) => {
                            self.shared.track(&command);
                            match pending.wait(remaining).await {
                                Ok(response) => {
                                    self.settle_transaction(&command);
                                    return Ok(response);
                                }
                                // A silent broker is the caller's problem; a
                                // dead transport is ours, so retry.
                                Err(OpenWireError::Timeout(msg)) => {
                                    return Err(OpenWireError::Timeout(msg))
                                }
                                Err(e) if e.is_recoverable() => continue,
                                Err(e) => return Err(e),
                            }
                        }
                        Err(e) if e.is_recoverable() => {
                            self.shared.handle_transport_failure(&active, &e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                RoutedRequest::Queued(rx) => match self.wait_queued(rx, Some(remaining)).await {
                    Ok(response) => {
                        self.settle_transaction(&command);
                        return Ok(response);
                    }
                    Err(e) if e.is_recoverable() => continue,
                    Err(e) => return Err(e),
                },
            }
        }
    }

    fn set_listener(&self, listener: Arc<dyn TransportListener>) {
        *self.shared.listener.lock().expect("listener lock poisoned") = Some(listener);
    }

    fn is_connected(&self) -> bool {
        self.shared.status() == FailoverStatus::Connected
    }

    fn remote_address(&self) -> Option<String> {
        self.shared
            .connected_uri
            .lock()
            .expect("uri lock poisoned")
            .as_ref()
            .map(|uri| uri.to_string())
    }
}

impl std::fmt::Debug for FailoverTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverTransport")
            .field("status", &self.status())
            .field("uris", &self.shared.config.uris().len())
            .finish()
    }
}

/// Grows the backoff delay, bounded by the configured ceiling, with a small
/// random spread.
fn next_reconnect_delay(current: Duration, config: &FailoverConfig) -> Duration {
    if !config.use_exponential_backoff() {
        return current;
    }
    let base = current.as_secs_f64() * config.backoff_multiplier();
    let jitter = 1.0 + rand::thread_rng().gen_range(-RECONNECT_JITTER..=RECONNECT_JITTER);
    Duration::from_secs_f64(base * jitter).min(config.max_reconnect_delay())
}

async fn connect_one(shared: &Arc<FailoverShared>, uri: &BrokerUri) -> Result<Arc<TcpTransport>> {
    let transport = TcpTransport::connect(
        &uri.authority(),
        uri.wire_format().clone(),
        shared.config.connect_timeout(),
        shared.config.negotiate_timeout(),
    )
    .await?;
    let transport = Arc::new(transport);
    transport.set_listener(Arc::new(ActiveTransportListener {
        shared: Arc::downgrade(shared),
        transport: Arc::downgrade(&transport),
    }));
    transport.start().await?;
    Ok(transport)
}

/// Takes the first still-healthy warm backup, discarding dead ones.
fn take_backup(shared: &FailoverShared) -> Option<(BrokerUri, Arc<TcpTransport>)> {
    let mut backups = shared.backups.lock().expect("backups lock poisoned");
    while let Some((uri, transport)) = backups.pop() {
        if transport.is_connected() {
            return Some((uri, transport));
        }
        let _ = shared.closer_tx.send(transport);
        shared.pool.lock().expect("pool lock poisoned").release(uri);
    }
    None
}

/// Pre-establishes warm backups to other pool members while connected.
async fn fill_backups(shared: Arc<FailoverShared>) {
    if !shared.config.backup() {
        return;
    }
    loop {
        if shared.closed.load(Ordering::Acquire)
            || shared.status() != FailoverStatus::Connected
        {
            return;
        }
        {
            let backups = shared.backups.lock().expect("backups lock poisoned");
            if backups.len() >= shared.config.backup_pool_size() {
                return;
            }
        }
        let uri = shared.pool.lock().expect("pool lock poisoned").acquire();
        let Some(uri) = uri else {
            return;
        };
        match connect_one(&shared, &uri).await {
            Ok(transport) => {
                tracing::debug!(uri = %uri, "backup connection established");
                shared
                    .backups
                    .lock()
                    .expect("backups lock poisoned")
                    .push((uri, transport));
            }
            Err(e) => {
                tracing::debug!(uri = %uri, error = %e, "backup connection failed");
                shared.pool.lock().expect("pool lock poisoned").release(uri);
                return;
            }
        }
    }
}

/// Replays recovery state, then drains the queued sends in arrival order,
/// and only then flips the transport to connected.
async fn adopt(
    shared: &Arc<FailoverShared>,
    uri: BrokerUri,
    transport: Arc<TcpTransport>,
) -> Result<()> {
    // Becomes the active transport before replay so that dispatches the
    // broker sends in response to replayed consumers reach the application;
    // application sends still wait on the connected flag.
    *shared.active.lock().expect("active lock poisoned") = Some(Arc::clone(&transport));
    *shared.connected_uri.lock().expect("uri lock poisoned") = Some(uri.clone());

    let plan = shared
        .tracker
        .lock()
        .expect("tracker lock poisoned")
        .recovery_plan();

    let replayed = plan.commands.len();
    for command in plan.commands {
        transport.oneway(command).await?;
    }
    if replayed > 0 {
        tracing::info!(uri = %uri, commands = replayed, "replayed recovery state");
    }
    for response in plan.in_doubt {
        if let Some(listener) = shared.app_listener() {
            listener.on_command(Command::ExceptionResponse(response));
        }
    }

    // Drain queued sends; the connected flag flips under the queue lock so
    // nothing can slip in between the final pop and the flip.
    loop {
        let item = {
            let mut queue = shared.queue.lock().expect("queue lock poisoned");
            match queue.pop_front() {
                Some(item) => item,
                None => {
                    let _ = shared.status_tx.send_replace(FailoverStatus::Connected);
                    break;
                }
            }
        };
        match item {
            QueuedSend::Oneway { command, done } => {
                let result = transport.oneway(command.clone()).await;
                if result.is_ok() {
                    shared.track(&command);
                }
                let failed = result.is_err();
                let _ = done.send(result);
                if failed {
                    return Err(OpenWireError::Connection(
                        "transport failed while draining queued sends".to_string(),
                    ));
                }
            }
            QueuedSend::Request {
                command,
                timeout,
                reply,
            } => match transport.send_request(command.clone()).await {
                Ok(pending) => {
                    shared.track(&command);
                    tokio::spawn(async move {
                        let _ = reply.send(pending.wait(timeout).await);
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                    return Err(OpenWireError::Connection(
                        "transport failed while draining queued sends".to_string(),
                    ));
                }
            },
        }
    }

    shared.emit(ConnectionEvent::Connected {
        uri: uri.to_string(),
    });
    if let Some(listener) = shared.app_listener() {
        listener.transport_resumed();
    }
    tracing::info!(uri = %uri, "failover transport connected");

    tokio::spawn(fill_backups(Arc::clone(shared)));
    Ok(())
}

/// One full reconnect cycle: try backups and pool URIs with backoff until a
/// connection is adopted or the attempt budget is spent.
async fn establish(shared: &Arc<FailoverShared>) -> Result<()> {
    let config = &shared.config;
    let max_attempts = if shared.first_connection.load(Ordering::Acquire)
        && config.startup_max_reconnect_attempts() > 0
    {
        config.startup_max_reconnect_attempts()
    } else {
        config.max_reconnect_attempts()
    };

    let mut attempt: u32 = 0;
    let mut delay = config.initial_reconnect_delay();

    loop {
        if shared.closed.load(Ordering::Acquire) {
            return Err(OpenWireError::Connection(
                "failover transport is closed".to_string(),
            ));
        }

        if let Some((uri, backup)) = take_backup(shared) {
            tracing::info!(uri = %uri, "promoting warm backup connection");
            match adopt(shared, uri.clone(), backup).await {
                Ok(()) => {
                    shared.first_connection.store(false, Ordering::Release);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "backup promotion failed");
                    shared.pool.lock().expect("pool lock poisoned").release(uri);
                }
            }
        }

        let uri = shared.pool.lock().expect("pool lock poisoned").acquire();
        if let Some(uri) = uri {
            attempt += 1;
            shared.emit(ConnectionEvent::ReconnectAttempt {
                uri: uri.to_string(),
                attempt,
            });
            tracing::debug!(uri = %uri, attempt, "attempting broker connection");

            match connect_one(shared, &uri).await {
                Ok(transport) => match adopt(shared, uri.clone(), transport).await {
                    Ok(()) => {
                        shared.first_connection.store(false, Ordering::Release);
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(uri = %uri, error = %e, "connection adopted then failed");
                        shared.pool.lock().expect("pool lock poisoned").release(uri);
                    }
                },
                Err(e) => {
                    tracing::warn!(uri = %uri, attempt, error = %e, "connection attempt failed");
                    shared.pool.lock().expect("pool lock poisoned").release(uri);
                }
            }
        }

        if max_attempts > 0 && attempt >= max_attempts {
            return Err(OpenWireError::ConnectionFailed(format!(
                "failed to connect to any broker after {} attempts",
                attempt
            )));
        }

        tokio::time::sleep(delay).await;
        delay = next_reconnect_delay(delay, config);
    }
}

async fn reconnect_loop(shared: Arc<FailoverShared>) {
    loop {
        shared.reconnect.notified().await;
        if shared.closed.load(Ordering::Acquire) {
            return;
        }
        if shared.status() == FailoverStatus::Connected {
            continue;
        }
        let _ = shared.status_tx.send_replace(FailoverStatus::Connecting);

        match establish(&shared).await {
            Ok(()) => {}
            Err(OpenWireError::ConnectionFailed(reason)) => {
                tracing::error!(error = %reason, "reconnection abandoned");
                let _ = shared.status_tx.send_replace(FailoverStatus::Failed);
                shared.emit(ConnectionEvent::ReconnectFailed {
                    error: reason.clone(),
                });
                shared.fail_queue(|| OpenWireError::ConnectionFailed(reason.clone()));
                if let Some(listener) = shared.app_listener() {
                    listener.on_exception(OpenWireError::ConnectionFailed(reason.clone()));
                }
                return;
            }
            Err(_) => {
                // Closed while connecting.
                return;
            }
        }
    }
}
