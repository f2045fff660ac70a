//! Integration tests for the failover transport against mock brokers.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockBroker, MockBrokerOptions};
use openwire_client::{
    BrokerUri, FailoverConfigBuilder, FailoverStatus, FailoverTransport, Transport,
    TransportListener,
};
use openwire_core::command::{
    Command, ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, Destination, Message,
    ProducerId, ProducerInfo, SessionId, SessionInfo,
};
use openwire_core::OpenWireError;

struct QuietListener {
    exceptions: Mutex<Vec<String>>,
    interruptions: Mutex<u32>,
    resumptions: Mutex<u32>,
}

impl QuietListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            exceptions: Mutex::new(Vec::new()),
            interruptions: Mutex::new(0),
            resumptions: Mutex::new(0),
        })
    }
}

impl TransportListener for QuietListener {
    fn on_command(&self, _command: Command) {}

    fn on_exception(&self, error: OpenWireError) {
        self.exceptions.lock().unwrap().push(error.to_string());
    }

    fn transport_interrupted(&self) {
        *self.interruptions.lock().unwrap() += 1;
    }

    fn transport_resumed(&self) {
        *self.resumptions.lock().unwrap() += 1;
    }
}

fn failover_to(brokers: &[&MockBroker]) -> FailoverTransport {
    let mut builder = FailoverConfigBuilder::new()
        .randomize(false)
        .initial_reconnect_delay(Duration::from_millis(10))
        .max_reconnect_delay(Duration::from_millis(100))
        .connect_timeout(Duration::from_secs(2))
        .negotiate_timeout(Duration::from_secs(2));
    for broker in brokers {
        builder = builder.add_uri(BrokerUri::parse(&broker.uri()).unwrap());
    }
    FailoverTransport::new(builder.build().unwrap())
}

/// Announces a connection, one session, two producers, and a consumer.
async fn announce_topology(transport: &FailoverTransport) -> (ConnectionId, SessionId) {
    let conn = ConnectionId::new("client-1");
    let session = SessionId::new(&conn, 1);

    transport
        .request(
            Command::ConnectionInfo(ConnectionInfo::new(conn.clone())),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    transport
        .request(
            Command::SessionInfo(SessionInfo::new(session.clone())),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    for producer in 1..=2 {
        transport
            .request(
                Command::ProducerInfo(ProducerInfo::new(
                    ProducerId::new(&session, producer),
                    Some(Destination::Queue("orders".into())),
                )),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
    }
    transport
        .request(
            Command::ConsumerInfo(ConsumerInfo::new(
                ConsumerId::new(&session, 3),
                Some(Destination::Queue("orders".into())),
            )),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    (conn, session)
}

#[tokio::test]
async fn test_connects_and_reports_status() {
    let broker = MockBroker::start().await;
    let transport = failover_to(&[&broker]);

    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(transport.status(), FailoverStatus::Connected);
    assert_eq!(transport.remote_address(), Some(broker.uri()));

    transport.stop().await.unwrap();
    assert_eq!(transport.status(), FailoverStatus::Closed);
}

#[tokio::test]
async fn test_recovery_replays_topology_before_new_traffic() {
    let broker = MockBroker::start().await;
    let transport = Arc::new(failover_to(&[&broker]));
    let listener = QuietListener::new();
    transport.set_listener(listener.clone());

    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();
    announce_topology(&transport).await;
    broker.wait_for_commands(5, Duration::from_secs(5)).await;

    // Crash the broker and send a message mid-outage; it must queue.
    broker.pause();
    broker.kill_connections();

    let sender = Arc::clone(&transport);
    let queued_send = tokio::spawn(async move {
        sender
            .oneway(Command::Message(Message::text(
                Destination::Queue("orders".into()),
                "after outage",
            )))
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    broker.resume();

    queued_send.await.unwrap().unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();
    broker.wait_for_connections(2, Duration::from_secs(5)).await;

    // The second connection must see the exact replay order, then the
    // queued application message.
    let second = broker.connection_count();
    let replayed = broker.received_on(second);
    let names: Vec<&str> = replayed.iter().map(|c| c.name()).collect();
    assert_eq!(
        names,
        [
            "ConnectionInfo",
            "SessionInfo",
            "ProducerInfo",
            "ProducerInfo",
            "ConsumerInfo",
            "Message"
        ],
        "replay order mismatch: {:?}",
        names
    );

    match &replayed[0] {
        Command::ConnectionInfo(info) => assert!(info.failover_reconnect),
        other => panic!("unexpected command {}", other.name()),
    }
    let producer_values: Vec<i64> = replayed
        .iter()
        .filter_map(|c| match c {
            Command::ProducerInfo(p) => Some(p.producer_id.value),
            _ => None,
        })
        .collect();
    assert_eq!(producer_values, [1, 2], "producers must replay in creation order");

    assert!(*listener.interruptions.lock().unwrap() >= 1);
    assert!(*listener.resumptions.lock().unwrap() >= 1);
    // Outage was survived; nothing surfaced to the exception listener.
    assert!(listener.exceptions.lock().unwrap().is_empty());

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_fifo_across_reconnect() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        echo_message_index: true,
        ..Default::default()
    })
    .await;
    let transport = Arc::new(failover_to(&[&broker]));
    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();

    broker.pause();
    broker.kill_connections();
    // Let the transport notice the outage so requests queue.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while transport.status() == FailoverStatus::Connected {
        assert!(tokio::time::Instant::now() < deadline, "outage never noticed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut handles = Vec::new();
    for i in 0..5 {
        let transport = Arc::clone(&transport);
        handles.push(tokio::spawn(async move {
            let message = Message::text(Destination::Queue("q".into()), format!("msg-{}", i));
            transport
                .request(Command::Message(message), Duration::from_secs(10))
                .await
        }));
        // Fix arrival order: each request is queued before the next starts.
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    broker.resume();

    for (i, handle) in handles.into_iter().enumerate() {
        let response = handle.await.unwrap().unwrap();
        match response {
            Command::IntegerResponse(r) => {
                assert_eq!(r.result, i as i32, "caller {} got someone else's answer", i)
            }
            other => panic!("unexpected response {}", other.name()),
        }
    }

    // FIFO on the wire: the reconnected broker sees the messages in the
    // order the callers originally submitted them.
    let second = broker.connection_count();
    let bodies: Vec<String> = broker
        .received_on(second)
        .iter()
        .filter_map(|c| match c {
            Command::Message(m) => m.body_text().map(str::to_string),
            _ => None,
        })
        .collect();
    assert_eq!(bodies, ["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_failover_to_second_broker() {
    let primary = MockBroker::start().await;
    let secondary = MockBroker::start().await;
    let transport = failover_to(&[&primary, &secondary]);

    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(transport.remote_address(), Some(primary.uri()));

    primary.pause();
    primary.kill_connections();

    // A send during the outage rides over to the second broker.
    transport
        .oneway(Command::Message(Message::text(
            Destination::Queue("q".into()),
            "rerouted",
        )))
        .await
        .unwrap();

    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(transport.remote_address(), Some(secondary.uri()));
    secondary.wait_for_commands(1, Duration::from_secs(5)).await;

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_backup_promotion_skips_dialing() {
    let primary = MockBroker::start().await;
    let secondary = MockBroker::start().await;

    let config = FailoverConfigBuilder::new()
        .randomize(false)
        .add_uri(BrokerUri::parse(&primary.uri()).unwrap())
        .add_uri(BrokerUri::parse(&secondary.uri()).unwrap())
        .initial_reconnect_delay(Duration::from_millis(10))
        .backup(true)
        .build()
        .unwrap();
    let transport = FailoverTransport::new(config);

    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();

    // The warm backup shows up as one served connection on the secondary.
    secondary.wait_for_connections(1, Duration::from_secs(5)).await;
    assert_eq!(secondary.connection_count(), 1);

    primary.pause();
    primary.kill_connections();

    transport
        .oneway(Command::Message(Message::text(
            Destination::Queue("q".into()),
            "via backup",
        )))
        .await
        .unwrap();
    secondary.wait_for_commands(1, Duration::from_secs(5)).await;

    // Promotion reused the pre-established connection; no second dial.
    assert_eq!(secondary.connection_count(), 1);
    assert_eq!(transport.remote_address(), Some(secondary.uri()));

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_latency_not_failure_during_brief_outage() {
    let broker = MockBroker::start().await;
    let transport = Arc::new(failover_to(&[&broker]));
    transport.start().await.unwrap();
    transport
        .await_connected(Duration::from_secs(5))
        .await
        .unwrap();

    broker.pause();
    broker.kill_connections();

    let requester = Arc::clone(&transport);
    let pending = tokio::spawn(async move {
        requester
            .request(
                Command::ConnectionInfo(ConnectionInfo::new(ConnectionId::new("c"))),
                Duration::from_secs(10),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished(), "request must block through the outage");

    broker.resume();
    let response = pending.await.unwrap().unwrap();
    assert!(matches!(response, Command::Response(_)));

    transport.stop().await.unwrap();
}
