//! Integration tests for the reconnect controller
//!
//! Most tests run on paused time against the scripted connector, so backoff
//! delays elapse instantly and deterministically.

mod common;

use common::*;
use netconf_session::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc::UnboundedReceiver;

/// Answer every connection with a server hello and keep it open
fn serve_hellos(mut peers: UnboundedReceiver<MockPeer<DuplexStream>>) {
    tokio::spawn(async move {
        let mut open = Vec::new();
        let mut session_id = 1;
        while let Some(mut peer) = peers.recv().await {
            peer.read_hello().await;
            peer.send_hello(&server_hello(base_1_1(), session_id)).await;
            session_id += 1;
            open.push(peer);
        }
    });
}

fn reconnect_config(between_attempts: Duration, sleep_factor: f64) -> ReconnectConfig {
    ReconnectConfig {
        between_attempts_timeout: between_attempts,
        sleep_factor,
        ..ReconnectConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_session_after_failed_attempts() {
    let (listener, mut events) = RecordingListener::new();
    let (connector, peers) = ScriptedConnector::new([
        ConnectOutcome::Refuse,
        ConnectOutcome::Refuse,
        ConnectOutcome::Accept,
    ]);
    serve_hellos(peers);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(reconnect_config(Duration::from_millis(100), 2.0))
        .start()
        .unwrap();

    let session = controller.first_session().await.unwrap();
    verbose_println!("Established {} after {} connects", session, connector.connects());

    assert_eq!(session.session_id(), 1);
    assert_eq!(connector.connects(), 3);
    // A successful session resets the backoff
    assert_eq!(controller.attempts(), 0);
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(1));
    assert!(!controller.reconnect_future().is_done());

    controller.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let (listener, _events) = RecordingListener::new();
    let (connector, _peers) = ScriptedConnector::new([]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(ReconnectConfig {
            max_connection_attempts: Some(3),
            ..reconnect_config(Duration::from_millis(100), 1.5)
        })
        .start()
        .unwrap();

    let cause = controller.reconnect_future().await.unwrap_err();
    assert_eq!(cause, NetconfError::ConnectionAttemptsExhausted { attempts: 3 });
    assert!(cause.is_give_up());

    // The first-session handle fails with the same cause
    assert_eq!(controller.first_session().await.unwrap_err(), cause);
    // The initial connect plus three retries
    assert_eq!(connector.connects(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_before_crossing_deadline() {
    let (listener, _events) = RecordingListener::new();
    let (connector, _peers) = ScriptedConnector::new([]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(ReconnectConfig {
            deadline: Some(Duration::from_millis(350)),
            ..reconnect_config(Duration::from_millis(100), 1.0)
        })
        .start()
        .unwrap();

    let cause = controller.first_session().await.unwrap_err();
    verbose_println!("Gave up with {}", cause);
    assert!(matches!(cause, NetconfError::DeadlineWouldBeCrossed { .. }));
    // Attempts at roughly 0, 100, 200 and 300ms
    assert_eq!(connector.connects(), 4);
    assert_eq!(controller.reconnect_future().await.unwrap_err(), cause);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_when_session_goes_down() {
    let (listener, mut events) = RecordingListener::new();
    let (connector, mut peers) =
        ScriptedConnector::new([ConnectOutcome::Accept, ConnectOutcome::Accept]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(reconnect_config(Duration::from_millis(100), 2.0))
        .start()
        .unwrap();

    // First connection: establish, then hang up
    let mut first = peers.recv().await.unwrap();
    first.read_hello().await;
    first.send_hello(&server_hello(base_1_1(), 1)).await;
    let session = controller.first_session().await.unwrap();
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(1));
    drop(first);

    match next_event(&mut events).await {
        ListenerEvent::Down(1, NetconfError::ChannelClosed(_)) => {}
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!session.is_up());

    // Second connection after the minimum delay
    let mut second = peers.recv().await.unwrap();
    second.read_hello().await;
    second.send_hello(&server_hello(base_1_1(), 2)).await;
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(2));

    // The first-session handle keeps its original value
    assert_eq!(controller.first_session().await.unwrap().session_id(), 1);
    assert_eq!(connector.connects(), 2);
    assert_eq!(
        controller.current_session().map(|s| s.session_id()),
        Some(2)
    );

    // Cancelling closes the live session
    controller.cancel();
    assert_eq!(
        next_event(&mut events).await,
        ListenerEvent::Terminated(2, "Session closed".to_string())
    );
    assert!(second.closed_by_remote().await);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_counts_from_session_loss() {
    let (listener, mut events) = RecordingListener::new();
    let (connector, mut peers) =
        ScriptedConnector::new([ConnectOutcome::Accept, ConnectOutcome::Accept]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(ReconnectConfig {
            deadline: Some(Duration::from_secs(10)),
            ..reconnect_config(Duration::from_millis(100), 2.0)
        })
        .start()
        .unwrap();

    let mut first = peers.recv().await.unwrap();
    first.read_hello().await;
    first.send_hello(&server_hello(base_1_1(), 1)).await;
    controller.first_session().await.unwrap();
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(1));

    // Stay up far beyond the deadline, then lose the peer
    tokio::time::sleep(Duration::from_secs(3600)).await;
    drop(first);
    match next_event(&mut events).await {
        ListenerEvent::Down(1, NetconfError::ChannelClosed(_)) => {}
        other => panic!("unexpected event {:?}", other),
    }

    let mut second = peers.recv().await.unwrap();
    second.read_hello().await;
    second.send_hello(&server_hello(base_1_1(), 2)).await;
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(2));
    assert_eq!(connector.connects(), 2);
    assert!(!controller.reconnect_future().is_done());

    // A fresh cycle still honours the deadline
    drop(second);
    match next_event(&mut events).await {
        ListenerEvent::Down(2, NetconfError::ChannelClosed(_)) => {}
        other => panic!("unexpected event {:?}", other),
    }
    let cause = controller.reconnect_future().await.unwrap_err();
    verbose_println!("Gave up with {} after {} connects", cause, connector.connects());
    assert!(matches!(cause, NetconfError::DeadlineWouldBeCrossed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_reconnecting() {
    let (listener, _events) = RecordingListener::new();
    let (connector, _peers) = ScriptedConnector::new([]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .reconnect_config(reconnect_config(Duration::from_secs(1), 2.0))
        .start()
        .unwrap();

    // First attempt fails, the controller is now sleeping
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(connector.connects(), 1);
    assert_eq!(controller.attempts(), 1);

    controller.cancel();
    controller.cancel();
    assert!(controller.is_cancelled());
    assert_eq!(
        controller.first_session().await.unwrap_err(),
        NetconfError::Cancelled
    );
    assert_eq!(
        controller.reconnect_future().await.unwrap_err(),
        NetconfError::Cancelled
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_attempt_in_flight() {
    let (listener, _events) = RecordingListener::new();
    let (connector, mut peers) = ScriptedConnector::new([ConnectOutcome::Accept]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .start()
        .unwrap();

    // The peer reads our hello but never answers
    let mut peer = peers.recv().await.unwrap();
    peer.read_hello().await;

    controller.cancel();
    assert_eq!(
        controller.first_session().await.unwrap_err(),
        NetconfError::Cancelled
    );
    assert!(peer.closed_by_remote().await);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_negotiation_timeout_counts_as_failed_attempt() {
    let (listener, _events) = RecordingListener::new();
    let (connector, mut peers) =
        ScriptedConnector::new([ConnectOutcome::Accept, ConnectOutcome::Accept]);

    let controller = netconf_session::builder()
        .shared_connector(connector.clone())
        .shared_listener(listener)
        .negotiation_timeout(Duration::from_secs(1))
        .reconnect_config(reconnect_config(Duration::from_millis(100), 2.0))
        .start()
        .unwrap();

    // The first peer stays silent until negotiation times out
    let mut silent = peers.recv().await.unwrap();
    silent.read_hello().await;
    assert!(silent.closed_by_remote().await);

    let mut second = peers.recv().await.unwrap();
    second.read_hello().await;
    second.send_hello(&server_hello(base_1_1(), 8)).await;

    let session = controller.first_session().await.unwrap();
    assert_eq!(session.session_id(), 8);
    controller.cancel();
}

#[tokio::test]
async fn test_tcp_session_against_mock_server() {
    let server = MockNetconfServer::start(base_1_1()).await;
    let (listener, mut events) = RecordingListener::new();

    let controller = netconf_session::builder()
        .address(server.address())
        .shared_listener(listener)
        .start()
        .unwrap();

    let session = tokio::time::timeout(TEST_TIMEOUT, controller.first_session().future())
        .await
        .unwrap()
        .unwrap();
    verbose_println!("Connected to {} as {}", server.address(), session);

    assert_eq!(session.session_id(), 1);
    assert_eq!(session.framing(), FramingMechanism::Chunked);
    assert_eq!(next_event(&mut events).await, ListenerEvent::Up(1));

    session.send(NetconfMessage::new(RPC_GET)).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ListenerEvent::Message(1, RPC_REPLY_OK.to_string())
    );

    controller.cancel();
    assert_eq!(
        next_event(&mut events).await,
        ListenerEvent::Terminated(1, "Session closed".to_string())
    );
}

#[tokio::test]
async fn test_invalid_reconnect_config_is_rejected() {
    let (listener, _events) = RecordingListener::new();
    let (connector, _peers) = ScriptedConnector::new([]);

    let result = netconf_session::builder()
        .shared_connector(connector)
        .shared_listener(Arc::clone(&listener) as Arc<dyn SessionListener>)
        .reconnect_config(reconnect_config(Duration::from_millis(100), 0.5))
        .start();

    assert!(matches!(result, Err(NetconfError::Configuration(_))));
}
