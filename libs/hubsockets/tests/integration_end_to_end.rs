//! End-to-end test: real connector against mock HTTP and WebSocket hosts
//!
//! negotiate and start go to wiremock, the transport upgrade goes to the mock
//! hub server. A server-side close must lead to a fresh attempt.

mod common;

use common::{recv_within, MockWsServer, ServerScript};
use hubsockets::{
    ChannelDispatcher, EndpointDescriptor, FeedSupervisor, StateSnapshot, SupervisorPhase,
};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

async fn wait_for_phase(
    rx: &mut tokio::sync::watch::Receiver<StateSnapshot>,
    pred: impl Fn(&StateSnapshot) -> bool,
) -> StateSnapshot {
    tokio::time::timeout(WAIT, async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("supervisor never reached the expected state")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_feed_survives_server_close() {
    verbose_println!("Testing full connect, deliver, reconnect cycle...");

    let http = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .and(query_param("ftoken", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"cb({"ConnectionToken":"tok-1","ConnectionId":"c1"})"#),
        )
        .mount(&http)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalr/start"))
        .and(query_param("connectionToken", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Response":"started"}"#))
        .mount(&http)
        .await;

    let ws = MockWsServer::start(ServerScript {
        frames: vec![r#"{"C":"d-1","M":[{"H":"NewsHub","M":"sendUpdates","A":["[]"]}]}"#.to_string()],
        silent: false,
    })
    .await;

    let endpoint = EndpointDescriptor::builder(http.uri())
        .ws_base(ws.ws_url())
        .callback("cb")
        .origin("https://www.example.com")
        .auth_token(Some("secret".to_string()))
        .build()
        .unwrap();

    let (dispatcher, messages) = ChannelDispatcher::new();
    let supervisor = FeedSupervisor::builder()
        .endpoint(endpoint)
        .dispatcher(dispatcher)
        .backoff(Duration::from_millis(50), Duration::from_millis(200))
        .max_retries(3)
        .build()
        .unwrap();

    let mut states = supervisor.subscribe();
    assert!(supervisor.start());

    let live = wait_for_phase(&mut states, |s| s.phase == SupervisorPhase::Live).await;
    assert_eq!(live.attempts, 1);

    let first = recv_within(&messages, WAIT).await.expect("update from first session");
    assert!(first.invocations[0].is_hub("newshub"));

    let uri = &ws.uris()[0];
    assert!(uri.contains("connectionToken=tok-1"));
    assert!(uri.contains("ftoken=secret"));

    // Let the server park in its read loop before closing
    tokio::time::sleep(Duration::from_millis(100)).await;
    ws.close_sessions();

    let relive = wait_for_phase(&mut states, |s| {
        s.phase == SupervisorPhase::Live && s.attempts == 2
    })
    .await;
    verbose_println!("  Reconnected: {:?}", relive);
    assert_eq!(relive.episodes, 1);
    assert_eq!(relive.retry_count, 0);
    assert_eq!(ws.connections(), 2);

    // Second session delivers its own copy of the frame
    assert!(recv_within(&messages, WAIT).await.is_some());

    supervisor.shutdown().await;
    assert_eq!(supervisor.phase(), SupervisorPhase::Stopped);
}
