//! Factory dispatch, deduplication and shutdown tests against a scripted establisher.

mod common;

use common::{connected, socket_pair, HandshakeStep, MockEstablisher, SocketStep};
use transportnet::base::kind::TransportKind;
use transportnet::base::loadstate::SlotState;
use transportnet::base::neterror::{SocketErrorCode, TransportError};
use transportnet::channel::Channel;
use transportnet::factory::config::DEFAULT_SHUTDOWN_REASON;
use transportnet::factory::{Factory, TransportRequest};
use transportnet::socket::registry::Registry;
use transportnet::socket::slot::{Slot, SlotContext, SlotTarget};

fn factory_with(mock: &std::sync::Arc<MockEstablisher>) -> Factory {
    Factory::builder().establisher(mock.clone()).build()
}

#[tokio::test]
async fn test_concurrent_requests_share_one_attempt() {
    let (mock, mut log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    let release = mock.hold_socket();

    let first = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    let second = factory.request_tagged("initiatingsocket", &["db.local", "5432"]);
    assert!(first.same_result(&second));
    assert_eq!(log.next().await, "db.local:5432");

    let registry = factory.registry(TransportKind::InitiatingSocket).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(!first.is_settled());

    release.send(connected()).unwrap();
    let a = first.await.unwrap();
    let b = second.await.unwrap();
    assert!(Channel::ptr_eq(&a, &b));
    assert_eq!(a.peer(), "db.local:5432");

    assert!(registry.is_empty());
    assert_eq!(mock.socket_calls(), 1);
    assert!(log.try_next().is_none());
}

#[tokio::test]
async fn test_key_reused_after_success() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    mock.push_socket(SocketStep::Connect);
    mock.push_socket(SocketStep::Connect);

    let first = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    let first_channel = first.clone().await.unwrap();

    let second = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    assert!(!first.same_result(&second));
    let second_channel = second.await.unwrap();

    assert!(!Channel::ptr_eq(&first_channel, &second_channel));
    assert_eq!(mock.socket_calls(), 2);
}

#[tokio::test]
async fn test_distinct_keys_do_not_share() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);

    let a = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    let b = factory.request(TransportRequest::initiating_socket("db.local", 5433));
    let c = factory.request(TransportRequest::ipc("/run/db.sock"));
    assert!(!a.same_result(&b));
    assert!(!a.same_result(&c));
    assert_eq!(factory.pending_count(), 3);
}

#[tokio::test]
async fn test_no_server_rejects_without_retry() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    mock.push_socket(SocketStep::Fail(SocketErrorCode::ConnectionRefused));

    let result = factory.request(TransportRequest::initiating_socket("10.0.0.1", 9999));
    let err = result.clone().await.unwrap_err();
    assert!(matches!(err, TransportError::NoServerListening { .. }));
    assert_eq!(err.code(), "NO_SERVER");
    assert_eq!(err.to_string(), "No server at socket://10.0.0.1:9999");
    assert_eq!(err.destination(), Some(("10.0.0.1", Some(9999))));

    // Late observers get the same rejection.
    let again = result.await.unwrap_err();
    assert_eq!(again.code(), "NO_SERVER");

    assert!(factory.registry(TransportKind::InitiatingSocket).unwrap().is_empty());
    assert_eq!(mock.socket_calls(), 1);

    // The next request starts over.
    mock.push_socket(SocketStep::Connect);
    let fresh = factory.request(TransportRequest::initiating_socket("10.0.0.1", 9999));
    assert!(fresh.await.is_ok());
    assert_eq!(mock.socket_calls(), 2);
}

#[tokio::test]
async fn test_missing_destination_rejects() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    mock.push_socket(SocketStep::Fail(SocketErrorCode::NoEntry));
    mock.push_socket(SocketStep::Fail(SocketErrorCode::NotFound));

    let ipc = factory.request(TransportRequest::ipc("/run/missing.sock")).await.unwrap_err();
    assert_eq!(ipc.code(), "ADDRESS_NOT_FOUND");
    assert_eq!(ipc.to_string(), "Could not connect to socket:///run/missing.sock");

    let tcp = factory
        .request(TransportRequest::initiating_socket("nowhere.invalid", 80))
        .await
        .unwrap_err();
    assert!(matches!(tcp, TransportError::DestinationNotFound { port: Some(80), .. }));
}

#[tokio::test]
async fn test_http_and_ws_dedup_by_connection_string() {
    let (mock, mut log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    let (tx, rx) = tokio::sync::oneshot::channel();
    mock.push_handshake(HandshakeStep::Wait(rx));

    let url = "http://api.local:8080/v1";
    let first = factory.request(TransportRequest::http(url));
    let second = factory.request_tagged("http", &[url]);
    assert!(first.same_result(&second));
    assert_eq!(log.next().await, url);

    let ws = factory.request(TransportRequest::websocket("ws://api.local:8080/v1"));
    assert!(!ws.same_result(&first));
    assert_eq!(factory.registry(TransportKind::Http).unwrap().len(), 1);
    assert_eq!(factory.registry(TransportKind::WebSocket).unwrap().len(), 1);

    tx.send(Ok(common::stream_channel(TransportKind::Http, url))).unwrap();
    let a = first.await.unwrap();
    let b = second.await.unwrap();
    assert!(Channel::ptr_eq(&a, &b));
    assert_eq!(mock.handshake_calls(), 2);
}

#[tokio::test]
async fn test_handshake_failure_rejects_and_unregisters() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    mock.push_handshake(HandshakeStep::Fail(TransportError::HandshakeFailed {
        protocol: "ws",
        connection_string: "ws://feed.local/".into(),
        reason: "bad upgrade".into(),
    }));

    let err = factory.request(TransportRequest::websocket("ws://feed.local/")).await.unwrap_err();
    assert_eq!(err.code(), "HANDSHAKE_FAILED");
    assert!(factory.registry(TransportKind::WebSocket).unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_rejects_every_registry() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);

    let socket = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    let http = factory.request(TransportRequest::http("http://api.local/"));
    let ws = factory.request(TransportRequest::websocket("ws://feed.local/"));
    assert_eq!(factory.pending_count(), 3);

    assert!(factory.shutdown("maintenance"));
    assert!(factory.is_closed());
    assert_eq!(factory.pending_count(), 0);

    for result in [socket, http, ws] {
        let err = result.await.unwrap_err();
        assert!(err.is_shutdown());
        assert_eq!(err.to_string(), "maintenance");
    }

    // Repeated shutdown is a no-op.
    assert!(!factory.shutdown("again"));
}

#[tokio::test]
async fn test_closed_factory_rejects_without_establishing() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    factory.shutdown("closed for the day");

    let requests = [
        factory.request(TransportRequest::initiating_socket("db.local", 5432)),
        factory.request(TransportRequest::inproc("bus")),
        factory.request(TransportRequest::process("worker", ["--once"])),
        factory.request_tagged("http", &["http://api.local/"]),
        factory.request_tagged("no-such-kind", &[]),
    ];
    for result in requests {
        assert!(result.is_settled());
        let err = result.await.unwrap_err();
        assert_eq!(err.code(), "SHUTDOWN");
        assert_eq!(err.to_string(), "closed for the day");
    }
    assert_eq!(mock.socket_calls(), 0);
    assert_eq!(mock.handshake_calls(), 0);
    assert_eq!(mock.immediate_calls(), 0);
}

#[tokio::test]
async fn test_slot_closed_before_connect_never_establishes() {
    let (mock, _log) = MockEstablisher::new();
    let registry = std::sync::Arc::new(Registry::new(TransportKind::InitiatingSocket));
    let ctx = SlotContext::new(mock.clone());
    let target = SlotTarget::Socket { address: "db.local".into(), port: Some(5432) };

    let (slot, created) =
        Slot::open(&registry, target, &ctx, || Some(TransportError::shutdown("closing")));
    assert!(created);
    assert_eq!(slot.state(), SlotState::Rejected);
    assert!(!slot.has_attempt());
    assert!(registry.is_empty());

    let err = slot.result().await.unwrap_err();
    assert!(err.is_shutdown());
    assert_eq!(err.to_string(), "closing");
    assert_eq!(mock.socket_calls(), 0);
}

#[tokio::test]
async fn test_slot_gate_runs_only_for_new_slots() {
    let (mock, mut log) = MockEstablisher::new();
    let registry = std::sync::Arc::new(Registry::new(TransportKind::InitiatingSocket));
    let ctx = SlotContext::new(mock.clone());
    let target = SlotTarget::Socket { address: "db.local".into(), port: Some(5432) };

    let (first, created) = Slot::open(&registry, target.clone(), &ctx, || None);
    assert!(created);
    assert_eq!(log.next().await, "db.local:5432");

    // A joiner never consults the gate, so it cannot reject a live attempt.
    let (second, created) = Slot::open(&registry, target, &ctx, || {
        Some(TransportError::shutdown("closing"))
    });
    assert!(!created);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(!first.is_settled());
    assert_eq!(mock.socket_calls(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_delivered_channels_when_enabled() {
    let (mock, _log) = MockEstablisher::new();
    let factory =
        Factory::builder().establisher(mock.clone()).close_channels_on_shutdown(true).build();
    mock.push_socket(SocketStep::Connect);

    let channel =
        factory.request(TransportRequest::initiating_socket("db.local", 5432)).await.unwrap();
    assert_eq!(factory.live_channel_count(), 1);

    factory.shutdown("bye");
    assert!(channel.is_closed());
    assert!(!channel.is_usable());
    assert_eq!(factory.live_channel_count(), 0);
}

#[tokio::test]
async fn test_shutdown_leaves_channels_open_by_default() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    mock.push_socket(SocketStep::Connect);

    let channel =
        factory.request(TransportRequest::initiating_socket("db.local", 5432)).await.unwrap();
    assert_eq!(factory.live_channel_count(), 0);
    factory.shutdown("bye");
    assert!(!channel.is_closed());
    assert!(channel.has_transport());
}

/// Connect through a factory that is gone by the time the channel is returned.
async fn connect_once(close_channels_on_shutdown: bool) -> Channel {
    let (mock, _log) = MockEstablisher::new();
    let factory = Factory::builder()
        .establisher(mock.clone())
        .close_channels_on_shutdown(close_channels_on_shutdown)
        .build();
    mock.push_socket(SocketStep::Connect);
    factory.request(TransportRequest::initiating_socket("db.local", 5432)).await.unwrap()
}

#[tokio::test]
async fn test_channel_outlives_dropped_factory() {
    for close_channels_on_shutdown in [false, true] {
        let channel = connect_once(close_channels_on_shutdown).await;
        assert!(!channel.is_closed());
        assert!(channel.is_usable());
        assert!(channel.has_transport());
    }
}

#[tokio::test]
async fn test_dropping_factory_shuts_down() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);
    let clone = factory.clone();

    let pending = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    drop(factory);
    assert!(!pending.is_settled());

    drop(clone);
    let err = pending.await.unwrap_err();
    assert_eq!(err.to_string(), DEFAULT_SHUTDOWN_REASON);
}

#[tokio::test]
async fn test_unsupported_and_unconnectable_requests() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);

    let err = factory.request_tagged("carrier-pigeon", &["coop"]).await.unwrap_err();
    assert_eq!(err.to_string(), "Protocol carrier-pigeon is not supported");

    let err = factory.request_tagged("initiatingsocket", &["", "80"]).await.unwrap_err();
    assert_eq!(err.code(), "BAD_ADDRESS");

    let err = factory.request_tagged("initiatingsocket", &["db.local", "port"]).await.unwrap_err();
    assert_eq!(err.to_string(), "Connection string db.local:port is not connectable");

    let err = factory.request(TransportRequest::http("")).await.unwrap_err();
    assert_eq!(err.code(), "BAD_ADDRESS");

    let err = factory.request(TransportRequest::websocket("http://api.local/")).await.unwrap_err();
    assert_eq!(err.code(), "BAD_ADDRESS");

    let err = factory.request_tagged("socket", &[]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");

    assert_eq!(factory.pending_count(), 0);
    assert_eq!(mock.socket_calls() + mock.handshake_calls(), 0);
}

#[tokio::test]
async fn test_connect_on_busy_slot_is_already_connected() {
    let (mock, mut log) = MockEstablisher::new();
    let factory = factory_with(&mock);

    let pending = factory.request(TransportRequest::initiating_socket("db.local", 5432));
    log.next().await;

    let registry = factory.registry(TransportKind::InitiatingSocket).unwrap();
    let slot = registry.lookup("db.local:5432").unwrap();
    assert!(slot.has_attempt());
    assert_eq!(slot.state(), SlotState::Connecting);

    slot.connect();
    assert_eq!(slot.state(), SlotState::Rejected);
    assert!(!slot.has_attempt());

    let err = pending.await.unwrap_err();
    assert!(matches!(err, TransportError::AlreadyConnected { port: Some(5432), .. }));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_immediate_kinds_bypass_registries() {
    let (mock, _log) = MockEstablisher::new();
    let factory = factory_with(&mock);

    let inproc = factory.request(TransportRequest::inproc("bus"));
    let again = factory.request(TransportRequest::inproc("bus"));
    assert!(inproc.is_settled());
    assert!(!inproc.same_result(&again));

    let process = factory.request_tagged("proc", &["worker", "--once"]).await.unwrap();
    assert_eq!(process.kind(), TransportKind::Process);
    let external = factory.request_tagged("externalproc", &["daemon"]).await.unwrap();
    assert_eq!(external.kind(), TransportKind::ExternalProcess);

    let (socket, _peer) = socket_pair();
    let wrapped = factory
        .request(TransportRequest::Socket {
            socket,
            address: Some("peer.local".into()),
            port: Some(7),
        })
        .await
        .unwrap();
    assert_eq!(wrapped.kind(), TransportKind::Socket);
    assert_eq!(wrapped.peer(), "peer.local:7");

    assert_eq!(inproc.await.unwrap().kind(), TransportKind::InProc);
    assert_eq!(mock.immediate_calls(), 4);
    assert_eq!(factory.pending_count(), 0);
}
