//! Integration tests for the point-to-point transport against a mock broker.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockBroker, MockBrokerOptions};
use openwire_client::{TcpTransport, Transport, TransportListener};
use openwire_core::command::{
    Command, ConnectionId, ConnectionInfo, ConsumerId, Destination, Message, MessageDispatch,
    SessionId,
};
use openwire_core::{OpenWireError, WireFormatOptions};

struct CollectingListener {
    commands: Mutex<Vec<Command>>,
    exceptions: Mutex<Vec<String>>,
}

impl CollectingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            exceptions: Mutex::new(Vec::new()),
        })
    }

    fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().unwrap().clone()
    }
}

impl TransportListener for CollectingListener {
    fn on_command(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }

    fn on_exception(&self, error: OpenWireError) {
        self.exceptions.lock().unwrap().push(error.to_string());
    }
}

async fn connect(broker: &MockBroker) -> TcpTransport {
    let transport = TcpTransport::connect(
        &broker.authority(),
        WireFormatOptions::default(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    transport.start().await.unwrap();
    transport
}

#[tokio::test]
async fn test_handshake_and_request_response() {
    let broker = MockBroker::start().await;
    let transport = connect(&broker).await;
    assert!(transport.is_connected());

    let info = ConnectionInfo::new(ConnectionId::new("client-1"));
    let response = transport
        .request(Command::ConnectionInfo(info), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matches!(response, Command::Response(_)));

    let received = broker.received();
    assert_eq!(received.len(), 1);
    assert!(matches!(received[0].1, Command::ConnectionInfo(_)));

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_handshake_with_older_loose_broker() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        wire_format: WireFormatOptions {
            version: 5,
            tight_encoding_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    })
    .await;

    let transport = connect(&broker).await;
    // Negotiation lands on v5/loose; traffic must still flow both ways.
    let info = ConnectionInfo::new(ConnectionId::new("client-loose"));
    let response = transport
        .request(Command::ConnectionInfo(info), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matches!(response, Command::Response(_)));

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_oneway_does_not_wait() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        respond: false,
        ..Default::default()
    })
    .await;
    let transport = connect(&broker).await;

    let message = Message::text(Destination::Queue("q".into()), "fire and forget");
    transport
        .oneway(Command::Message(message))
        .await
        .unwrap();

    broker.wait_for_commands(1, Duration::from_secs(5)).await;
    let received = broker.received();
    match &received[0].1 {
        Command::Message(msg) => assert_eq!(msg.body_text(), Some("fire and forget")),
        other => panic!("unexpected command {}", other.name()),
    }

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_timeout_against_silent_broker() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        respond: false,
        ..Default::default()
    })
    .await;
    let transport = connect(&broker).await;

    let started = tokio::time::Instant::now();
    let err = transport
        .request(
            Command::ConnectionInfo(ConnectionInfo::new(ConnectionId::new("c"))),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, OpenWireError::Timeout(_)), "got {:?}", err);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);

    // The dangling waiter is gone: a second request gets its own response
    // once the broker starts answering again.
    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_broker_error_propagates_to_requester() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        fail_messages: true,
        ..Default::default()
    })
    .await;
    let transport = connect(&broker).await;

    let message = Message::text(Destination::Queue("denied".into()), "payload");
    let err = transport
        .request(Command::Message(message), Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        OpenWireError::Broker {
            exception_class,
            message,
        } => {
            assert_eq!(exception_class, "javax.jms.JMSSecurityException");
            assert!(message.contains("not authorized"));
        }
        other => panic!("expected broker error, got {:?}", other),
    }

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_routed_to_listener() {
    let broker = MockBroker::start().await;
    let transport = TcpTransport::connect(
        &broker.authority(),
        WireFormatOptions::default(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let listener = CollectingListener::new();
    transport.set_listener(listener.clone());
    transport.start().await.unwrap();

    let session = SessionId::new(&ConnectionId::new("c"), 1);
    let dispatch = MessageDispatch {
        command_id: 0,
        response_required: false,
        consumer_id: ConsumerId::new(&session, 1),
        destination: Some(Destination::Queue("q".into())),
        message: Some(Box::new(Message::text(
            Destination::Queue("q".into()),
            "delivered",
        ))),
        redelivery_counter: 0,
    };
    broker.broadcast(Command::MessageDispatch(dispatch));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !listener.commands().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "dispatch never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    match &listener.commands()[0] {
        Command::MessageDispatch(d) => {
            assert_eq!(
                d.message.as_ref().unwrap().body_text(),
                Some("delivered")
            );
        }
        other => panic!("unexpected command {}", other.name()),
    }

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_peer_close_fires_exception_listener_once() {
    let broker = MockBroker::start().await;
    let transport = TcpTransport::connect(
        &broker.authority(),
        WireFormatOptions::default(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let listener = CollectingListener::new();
    transport.set_listener(listener.clone());
    transport.start().await.unwrap();

    broker.kill_connections();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !listener.exceptions().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "exception never fired");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Give any duplicate a chance to show up, then check exactly-once.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(listener.exceptions().len(), 1);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_concurrent_requests_each_get_their_answer() {
    let broker = MockBroker::start_with(MockBrokerOptions {
        echo_message_index: true,
        ..Default::default()
    })
    .await;
    let transport = Arc::new(connect(&broker).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let transport = Arc::clone(&transport);
        handles.push(tokio::spawn(async move {
            let message = Message::text(Destination::Queue("q".into()), format!("msg-{}", i));
            let response = transport
                .request(Command::Message(message), Duration::from_secs(5))
                .await
                .unwrap();
            match response {
                Command::IntegerResponse(r) => assert_eq!(r.result, i),
                other => panic!("unexpected response {}", other.name()),
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    transport.stop().await.unwrap();
}
