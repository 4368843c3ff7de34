//! Push channel lifecycle and fan-out tests.

mod common;

use std::time::Duration;

use shelf_core::{AuthToken, ClientMessage, PushEvent, ServerUrl};
use shelf_sync::{CloseReason, ConnectionState, PushChannel};

use common::{FakeConnector, book, eventually, wait_until};

fn channel(connector: &FakeConnector) -> PushChannel<FakeConnector> {
    PushChannel::new(connector.clone(), ServerUrl::default(), 16)
}

#[tokio::test]
async fn test_opens_only_when_online_and_authenticated() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let token = AuthToken::new("tok");

    channel.update(false, Some(&token)).await;
    assert_eq!(
        channel.state(),
        ConnectionState::Closed(CloseReason::Offline)
    );

    channel.update(true, None).await;
    assert_eq!(
        channel.state(),
        ConnectionState::Closed(CloseReason::Unauthenticated)
    );
    assert_eq!(connector.connects(), 0);

    channel.update(true, Some(&token)).await;
    let mut state = channel.watch_state();
    wait_until(&mut state, |s| s.is_open()).await;

    assert_eq!(connector.connects(), 1);
    assert_eq!(
        connector.handshakes(),
        [ClientMessage::Authenticate {
            token: "tok".to_string()
        }]
    );
}

#[tokio::test]
async fn test_repeated_open_is_noop() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let token = AuthToken::new("tok");

    channel.update(true, Some(&token)).await;
    channel.update(true, Some(&token)).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;
    channel.update(true, Some(&token)).await;

    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_going_offline_closes_immediately() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let token = AuthToken::new("tok");

    channel.update(true, Some(&token)).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;
    assert_eq!(connector.live(), 1);

    channel.update(false, Some(&token)).await;

    // `update` waits for the transport to be dropped
    assert_eq!(connector.live(), 0);
    assert_eq!(
        channel.state(),
        ConnectionState::Closed(CloseReason::Offline)
    );

    channel.update(true, None).await;
    assert_eq!(
        channel.state(),
        ConnectionState::Closed(CloseReason::Unauthenticated)
    );
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_rapid_toggling_never_has_two_transports() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let token = AuthToken::new("tok");

    for _ in 0..20 {
        channel.update(true, Some(&token)).await;
        channel.update(false, Some(&token)).await;
    }
    channel.update(true, Some(&token)).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;

    assert_eq!(connector.max_live(), 1);
    assert_eq!(connector.live(), 1);
}

#[tokio::test]
async fn test_events_fan_out_to_every_subscriber() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);

    let mut list_screen = channel.subscribe();
    let mut detail_screen = channel.subscribe();
    assert_eq!(channel.subscriber_count(), 2);

    channel.update(true, Some(&AuthToken::new("tok"))).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;

    connector.push(PushEvent::Updated(book(1, "B")));

    let timeout = Duration::from_secs(1);
    let a = tokio::time::timeout(timeout, list_screen.recv()).await.unwrap();
    let b = tokio::time::timeout(timeout, detail_screen.recv()).await.unwrap();
    assert_eq!(a, Some(PushEvent::Updated(book(1, "B"))));
    assert_eq!(b, a);

    drop(detail_screen);
    assert_eq!(channel.subscriber_count(), 1);

    connector.push(PushEvent::Created(book(2, "C")));
    let c = tokio::time::timeout(timeout, list_screen.recv()).await.unwrap();
    assert_eq!(c, Some(PushEvent::Created(book(2, "C"))));
}

#[tokio::test]
async fn test_unknown_events_are_not_delivered() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let mut sub = channel.subscribe();

    channel.update(true, Some(&AuthToken::new("tok"))).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;

    connector.push(PushEvent::Unknown {
        kind: "deleted".to_string(),
    });
    connector.push(PushEvent::Created(book(3, "D")));

    let next = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .unwrap();
    assert_eq!(next, Some(PushEvent::Created(book(3, "D"))));
}

#[tokio::test]
async fn test_transport_error_closes_without_reconnect() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);
    let token = AuthToken::new("tok");

    channel.update(true, Some(&token)).await;
    let mut state = channel.watch_state();
    wait_until(&mut state, |s| s.is_open()).await;

    connector.break_transports();
    wait_until(&mut state, |s| {
        *s == ConnectionState::Closed(CloseReason::TransportFailed)
    })
    .await;
    eventually(|| connector.live() == 0).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.connects(), 1);

    // The next gating transition reopens
    channel.update(false, Some(&token)).await;
    channel.update(true, Some(&token)).await;
    wait_until(&mut state, |s| s.is_open()).await;
    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let connector = FakeConnector::new();
    connector.fail_connect(true);
    let channel = channel(&connector);

    channel.update(true, Some(&AuthToken::new("tok"))).await;
    wait_until(&mut channel.watch_state(), |s| {
        *s == ConnectionState::Closed(CloseReason::TransportFailed)
    })
    .await;
}

#[tokio::test]
async fn test_shutdown_closes_transport() {
    let connector = FakeConnector::new();
    let channel = channel(&connector);

    channel.update(true, Some(&AuthToken::new("tok"))).await;
    wait_until(&mut channel.watch_state(), |s| s.is_open()).await;

    channel.shutdown().await;
    assert_eq!(connector.live(), 0);
    assert_eq!(
        channel.state(),
        ConnectionState::Closed(CloseReason::Shutdown)
    );
}
