//! Client-side record of broker-visible state, replayed after failover.
//!
//! The tracker watches commands as they are delivered and maintains the
//! ConnectionState → SessionState → {producers, consumers, transactions}
//! tree. After a reconnect the whole tree is re-issued to the new broker,
//! parents strictly before children and in original creation order, so that
//! broker-side object creation never references a missing parent.

use std::collections::VecDeque;

use openwire_core::command::ids::{DataStructure, LocalTransactionId, SessionId};
use openwire_core::command::info::{ConnectionInfo, ConsumerInfo, ProducerInfo, SessionInfo, TransactionOp};
use openwire_core::command::message::Message;
use openwire_core::command::response::{BrokerError, ExceptionResponse};
use openwire_core::Command;

/// Everything cached for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    info: ConnectionInfo,
    sessions: Vec<SessionState>,
    transactions: Vec<TransactionState>,
}

impl ConnectionState {
    fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            sessions: Vec::new(),
            transactions: Vec::new(),
        }
    }

    /// Returns the cached sessions in creation order.
    pub fn sessions(&self) -> &[SessionState] {
        &self.sessions
    }

    fn session_mut(&mut self, id: &SessionId) -> Option<&mut SessionState> {
        self.sessions.iter_mut().find(|s| &s.info.session_id == id)
    }

    fn transaction_mut(&mut self, id: &LocalTransactionId) -> Option<&mut TransactionState> {
        self.transactions.iter_mut().find(|t| &t.id == id)
    }
}

/// Everything cached for one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    info: SessionInfo,
    producers: Vec<ProducerInfo>,
    consumers: Vec<ConsumerInfo>,
}

impl SessionState {
    fn new(info: SessionInfo) -> Self {
        Self {
            info,
            producers: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Returns the cached producers in creation order.
    pub fn producers(&self) -> &[ProducerInfo] {
        &self.producers
    }

    /// Returns the cached consumers in creation order.
    pub fn consumers(&self) -> &[ConsumerInfo] {
        &self.consumers
    }
}

/// An open transaction and the commands that form it.
#[derive(Debug, Clone)]
struct TransactionState {
    id: LocalTransactionId,
    commands: Vec<Command>,
}

/// The ordered command sequence that reconstructs broker state, plus
/// synthesized failures for transactions whose outcome is unknowable.
#[derive(Debug)]
pub struct RecoveryPlan {
    /// Commands to replay, in order, before any queued application command.
    pub commands: Vec<Command>,
    /// Responses to deliver locally for commits in doubt: the commit may or
    /// may not have reached the old broker, so the only safe report is a
    /// forced rollback.
    pub in_doubt: Vec<ExceptionResponse>,
}

/// Watches outgoing commands and records what a new broker must be told.
#[derive(Debug)]
pub struct ConnectionStateTracker {
    connections: Vec<ConnectionState>,
    track_messages: bool,
    max_cache_size: usize,
    message_cache: VecDeque<Message>,
    cache_bytes: usize,
}

impl ConnectionStateTracker {
    /// Creates a tracker.
    ///
    /// With `track_messages` set, non-transacted messages are cached for
    /// replay, bounded by `max_cache_size` bytes (oldest evicted first).
    pub fn new(track_messages: bool, max_cache_size: usize) -> Self {
        Self {
            connections: Vec::new(),
            track_messages,
            max_cache_size,
            message_cache: VecDeque::new(),
            cache_bytes: 0,
        }
    }

    /// Returns the tracked connections in creation order.
    pub fn connections(&self) -> &[ConnectionState] {
        &self.connections
    }

    /// Records a successfully delivered command.
    pub fn track(&mut self, command: &Command) {
        match command {
            Command::ConnectionInfo(info) => {
                let exists = self
                    .connections
                    .iter()
                    .any(|c| c.info.connection_id == info.connection_id);
                if !exists {
                    self.connections.push(ConnectionState::new(info.clone()));
                }
            }
            Command::SessionInfo(info) => {
                let connection_id = &info.session_id.connection_id;
                if let Some(conn) = self
                    .connections
                    .iter_mut()
                    .find(|c| &c.info.connection_id.value == connection_id)
                {
                    if conn.session_mut(&info.session_id).is_none() {
                        conn.sessions.push(SessionState::new(info.clone()));
                    }
                }
            }
            Command::ProducerInfo(info) => {
                let session_id = info.producer_id.parent();
                if let Some(session) = self.session_state_mut(&session_id) {
                    if !session
                        .producers
                        .iter()
                        .any(|p| p.producer_id == info.producer_id)
                    {
                        session.producers.push(info.clone());
                    }
                }
            }
            Command::ConsumerInfo(info) => {
                let session_id = info.consumer_id.parent();
                if let Some(session) = self.session_state_mut(&session_id) {
                    if !session
                        .consumers
                        .iter()
                        .any(|c| c.consumer_id == info.consumer_id)
                    {
                        session.consumers.push(info.clone());
                    }
                }
            }
            Command::TransactionInfo(info) => {
                if let Some(txid) = &info.transaction_id {
                    let txid = txid.clone();
                    if let Some(conn) = self
                        .connections
                        .iter_mut()
                        .find(|c| c.info.connection_id == info.connection_id)
                    {
                        match info.op {
                            TransactionOp::Begin => {
                                if conn.transaction_mut(&txid).is_none() {
                                    conn.transactions.push(TransactionState {
                                        id: txid,
                                        commands: vec![command.clone()],
                                    });
                                }
                            }
                            _ => {
                                if let Some(tx) = conn.transaction_mut(&txid) {
                                    tx.commands.push(command.clone());
                                }
                            }
                        }
                    }
                }
            }
            Command::Message(msg) => {
                if let Some(txid) = &msg.transaction_id {
                    if let Some(tx) = self.transaction_state_mut(txid) {
                        tx.commands.push(command.clone());
                    }
                } else if self.track_messages {
                    self.cache_message(msg);
                }
            }
            Command::MessageAck(ack) => {
                if let Some(txid) = &ack.transaction_id {
                    if let Some(tx) = self.transaction_state_mut(txid) {
                        tx.commands.push(command.clone());
                    }
                }
            }
            Command::RemoveInfo(info) => self.remove(&info.object_id),
            Command::ShutdownInfo(_) => self.clear(),
            _ => {}
        }
    }

    fn session_state_mut(&mut self, id: &SessionId) -> Option<&mut SessionState> {
        self.connections
            .iter_mut()
            .find(|c| c.info.connection_id.value == id.connection_id)
            .and_then(|c| c.session_mut(id))
    }

    fn transaction_state_mut(&mut self, id: &LocalTransactionId) -> Option<&mut TransactionState> {
        self.connections
            .iter_mut()
            .find(|c| c.info.connection_id == id.connection_id)
            .and_then(|c| c.transaction_mut(id))
    }

    fn cache_message(&mut self, msg: &Message) {
        self.cache_bytes += msg.cached_size();
        self.message_cache.push_back(msg.clone());
        while self.cache_bytes > self.max_cache_size {
            match self.message_cache.pop_front() {
                Some(evicted) => {
                    self.cache_bytes -= evicted.cached_size();
                    tracing::debug!(
                        cached = self.message_cache.len(),
                        "replay cache full, evicted oldest message"
                    );
                }
                None => {
                    self.cache_bytes = 0;
                    break;
                }
            }
        }
    }

    fn remove(&mut self, object_id: &DataStructure) {
        match object_id {
            DataStructure::ConnectionId(id) => {
                self.connections.retain(|c| &c.info.connection_id != id);
            }
            DataStructure::SessionId(id) => {
                for conn in &mut self.connections {
                    conn.sessions.retain(|s| &s.info.session_id != id);
                }
            }
            DataStructure::ProducerId(id) => {
                if let Some(session) = self.session_state_mut(&id.parent()) {
                    session.producers.retain(|p| &p.producer_id != id);
                }
            }
            DataStructure::ConsumerId(id) => {
                if let Some(session) = self.session_state_mut(&id.parent()) {
                    session.consumers.retain(|c| &c.consumer_id != id);
                }
            }
            _ => {}
        }
    }

    /// Drops a transaction whose commit or rollback was acknowledged by the
    /// broker; it no longer needs replaying.
    pub fn complete_transaction(&mut self, id: &LocalTransactionId) {
        for conn in &mut self.connections {
            conn.transactions.retain(|t| &t.id != id);
        }
    }

    /// Builds the replay sequence for a fresh broker connection.
    ///
    /// Order: each ConnectionInfo (flagged as a failover reconnect), then per
    /// session its SessionInfo, producers, consumers; then open transaction
    /// command logs; then cached messages. Transactions whose last command
    /// was a one-phase commit are dropped and reported in-doubt instead of
    /// replayed.
    pub fn recovery_plan(&mut self) -> RecoveryPlan {
        let mut commands = Vec::new();
        let mut in_doubt = Vec::new();

        for conn in &mut self.connections {
            let mut info = conn.info.clone();
            info.failover_reconnect = true;
            commands.push(Command::ConnectionInfo(info));

            for session in &conn.sessions {
                commands.push(Command::SessionInfo(session.info.clone()));
                for producer in &session.producers {
                    commands.push(Command::ProducerInfo(producer.clone()));
                }
                for consumer in &session.consumers {
                    commands.push(Command::ConsumerInfo(consumer.clone()));
                }
            }

            conn.transactions.retain(|tx| {
                let commit_in_doubt = matches!(
                    tx.commands.last(),
                    Some(Command::TransactionInfo(info))
                        if info.op == TransactionOp::CommitOnePhase
                );
                if commit_in_doubt {
                    let commit = tx.commands.last().expect("non-empty transaction log");
                    in_doubt.push(ExceptionResponse {
                        command_id: 0,
                        response_required: false,
                        correlation_id: commit.command_id(),
                        exception: Some(BrokerError::new(
                            "TransactionRolledBackException",
                            format!(
                                "transaction {} completion in doubt due to failover, forcing rollback",
                                tx.id.value
                            ),
                        )),
                    });
                    false
                } else {
                    commands.extend(tx.commands.iter().cloned());
                    true
                }
            });
        }

        commands.extend(self.message_cache.iter().cloned().map(Command::Message));

        // Replayed commands carry ids from the dead connection. Nothing may
        // wait on them, and the broker must not answer them: a stale
        // correlation id could collide with a fresh request on the new
        // connection.
        for command in &mut commands {
            command.set_response_required(false);
        }

        RecoveryPlan { commands, in_doubt }
    }

    /// Forgets everything, e.g. on explicit shutdown.
    pub fn clear(&mut self) {
        self.connections.clear();
        self.message_cache.clear();
        self.cache_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openwire_core::command::ids::{
        ConnectionId, ConsumerId, Destination, ProducerId,
    };
    use openwire_core::command::info::TransactionInfo;

    fn conn_info(name: &str) -> ConnectionInfo {
        ConnectionInfo::new(ConnectionId::new(name))
    }

    fn tracker_with_topology() -> (ConnectionStateTracker, SessionId) {
        let mut tracker = ConnectionStateTracker::new(true, 1024 * 1024);
        let conn = ConnectionId::new("c1");
        let session = SessionId::new(&conn, 1);

        tracker.track(&Command::ConnectionInfo(conn_info("c1")));
        tracker.track(&Command::SessionInfo(SessionInfo::new(session.clone())));
        tracker.track(&Command::ProducerInfo(ProducerInfo::new(
            ProducerId::new(&session, 1),
            Some(Destination::Queue("q".into())),
        )));
        tracker.track(&Command::ProducerInfo(ProducerInfo::new(
            ProducerId::new(&session, 2),
            Some(Destination::Queue("q".into())),
        )));
        tracker.track(&Command::ConsumerInfo(ConsumerInfo::new(
            ConsumerId::new(&session, 3),
            Some(Destination::Queue("q".into())),
        )));
        (tracker, session)
    }

    #[test]
    fn test_recovery_plan_order() {
        let (mut tracker, _) = tracker_with_topology();
        let plan = tracker.recovery_plan();

        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "ConnectionInfo",
                "SessionInfo",
                "ProducerInfo",
                "ProducerInfo",
                "ConsumerInfo"
            ]
        );

        match &plan.commands[0] {
            Command::ConnectionInfo(info) => assert!(info.failover_reconnect),
            other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn test_producer_order_preserved() {
        let (mut tracker, _) = tracker_with_topology();
        let plan = tracker.recovery_plan();
        let producer_values: Vec<i64> = plan
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::ProducerInfo(p) => Some(p.producer_id.value),
                _ => None,
            })
            .collect();
        assert_eq!(producer_values, [1, 2]);
    }

    #[test]
    fn test_remove_prunes_exactly_one_node() {
        let (mut tracker, session) = tracker_with_topology();
        tracker.track(&Command::RemoveInfo(openwire_core::command::info::RemoveInfo::new(
            DataStructure::ProducerId(ProducerId::new(&session, 1)),
        )));

        let plan = tracker.recovery_plan();
        let producer_values: Vec<i64> = plan
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::ProducerInfo(p) => Some(p.producer_id.value),
                _ => None,
            })
            .collect();
        assert_eq!(producer_values, [2]);
        // Consumer untouched.
        assert!(plan.commands.iter().any(|c| matches!(c, Command::ConsumerInfo(_))));
    }

    #[test]
    fn test_remove_session_prunes_children() {
        let (mut tracker, session) = tracker_with_topology();
        tracker.track(&Command::RemoveInfo(openwire_core::command::info::RemoveInfo::new(
            DataStructure::SessionId(session),
        )));
        let plan = tracker.recovery_plan();
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["ConnectionInfo"]);
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let (mut tracker, _) = tracker_with_topology();
        tracker.track(&Command::ShutdownInfo(Default::default()));
        let plan = tracker.recovery_plan();
        assert!(plan.commands.is_empty());
    }

    #[test]
    fn test_duplicate_tracking_is_idempotent() {
        let (mut tracker, session) = tracker_with_topology();
        tracker.track(&Command::SessionInfo(SessionInfo::new(session)));
        let plan = tracker.recovery_plan();
        let session_count = plan
            .commands
            .iter()
            .filter(|c| matches!(c, Command::SessionInfo(_)))
            .count();
        assert_eq!(session_count, 1);
    }

    #[test]
    fn test_message_cache_replayed_after_topology() {
        let (mut tracker, _) = tracker_with_topology();
        let msg = Message::text(Destination::Queue("q".into()), "m1");
        tracker.track(&Command::Message(msg));

        let plan = tracker.recovery_plan();
        assert!(matches!(plan.commands.last(), Some(Command::Message(_))));
    }

    #[test]
    fn test_message_cache_eviction() {
        let mut tracker = ConnectionStateTracker::new(true, 300);
        for i in 0..10 {
            let msg = Message::bytes(Destination::Queue("q".into()), vec![0u8; 50]);
            let _ = i;
            tracker.track(&Command::Message(msg));
        }
        let plan = tracker.recovery_plan();
        let cached = plan
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Message(_)))
            .count();
        // 50-byte bodies cost ~114 bytes each against a 300-byte budget.
        assert!(cached < 10);
        assert!(cached >= 1);
    }

    #[test]
    fn test_messages_not_tracked_when_disabled() {
        let mut tracker = ConnectionStateTracker::new(false, 1024);
        tracker.track(&Command::Message(Message::text(
            Destination::Queue("q".into()),
            "m",
        )));
        assert!(tracker.recovery_plan().commands.is_empty());
    }

    #[test]
    fn test_open_transaction_replayed() {
        let (mut tracker, _session) = tracker_with_topology();
        let conn = ConnectionId::new("c1");
        let txid = LocalTransactionId {
            value: 7,
            connection_id: conn.clone(),
        };

        tracker.track(&Command::TransactionInfo(TransactionInfo {
            command_id: 20,
            response_required: true,
            connection_id: conn.clone(),
            transaction_id: Some(txid.clone()),
            op: TransactionOp::Begin,
        }));
        let mut msg = Message::text(Destination::Queue("q".into()), "tx message");
        msg.transaction_id = Some(txid.clone());
        tracker.track(&Command::Message(msg));

        let plan = tracker.recovery_plan();
        assert!(plan.in_doubt.is_empty());
        let names: Vec<&str> = plan.commands.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"TransactionInfo"));
        // The transacted message replays with the transaction, not the cache.
        let tx_pos = names.iter().position(|n| *n == "TransactionInfo").unwrap();
        let msg_pos = names.iter().position(|n| *n == "Message").unwrap();
        assert!(msg_pos > tx_pos);
    }

    #[test]
    fn test_commit_in_doubt_not_replayed() {
        let mut tracker = ConnectionStateTracker::new(true, 1024);
        let conn = ConnectionId::new("c1");
        tracker.track(&Command::ConnectionInfo(conn_info("c1")));
        let txid = LocalTransactionId {
            value: 9,
            connection_id: conn.clone(),
        };

        tracker.track(&Command::TransactionInfo(TransactionInfo {
            command_id: 30,
            response_required: true,
            connection_id: conn.clone(),
            transaction_id: Some(txid.clone()),
            op: TransactionOp::Begin,
        }));
        tracker.track(&Command::TransactionInfo(TransactionInfo {
            command_id: 31,
            response_required: true,
            connection_id: conn,
            transaction_id: Some(txid),
            op: TransactionOp::CommitOnePhase,
        }));

        let plan = tracker.recovery_plan();
        assert_eq!(plan.in_doubt.len(), 1);
        assert_eq!(plan.in_doubt[0].correlation_id, 31);
        assert!(
            !plan
                .commands
                .iter()
                .any(|c| matches!(c, Command::TransactionInfo(_))),
            "in-doubt transaction must not be replayed"
        );

        // Dropped for good: a second plan reports nothing.
        let plan = tracker.recovery_plan();
        assert!(plan.in_doubt.is_empty());
    }

    #[test]
    fn test_complete_transaction_prunes_state() {
        let mut tracker = ConnectionStateTracker::new(true, 1024);
        let conn = ConnectionId::new("c1");
        tracker.track(&Command::ConnectionInfo(conn_info("c1")));
        let txid = LocalTransactionId {
            value: 5,
            connection_id: conn.clone(),
        };
        tracker.track(&Command::TransactionInfo(TransactionInfo {
            command_id: 1,
            response_required: true,
            connection_id: conn,
            transaction_id: Some(txid.clone()),
            op: TransactionOp::Begin,
        }));

        tracker.complete_transaction(&txid);
        let plan = tracker.recovery_plan();
        assert!(!plan.commands.iter().any(|c| matches!(c, Command::TransactionInfo(_))));
    }
}
