//! Integration tests for the negotiate and start calls
//!
//! An HTTP mock stands in for the feed host.

mod common;

use hubsockets::core::endpoint::{ConnectionToken, EndpointDescriptor};
use hubsockets::core::handshake::{HandshakeClient, HttpRetryPolicy};
use hubsockets::HandshakeError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(server: &MockServer, auth: Option<&str>) -> Arc<EndpointDescriptor> {
    Arc::new(
        EndpointDescriptor::builder(server.uri())
            .callback("cb_42")
            .origin("https://www.example.com")
            .user_agent("hubsockets-test")
            .cookies([
                ("session".to_string(), "s1".to_string()),
                ("region".to_string(), "eu".to_string()),
            ])
            .auth_token(auth.map(str::to_string))
            .build()
            .unwrap(),
    )
}

fn client(server: &MockServer, auth: Option<&str>) -> HandshakeClient {
    HandshakeClient::new(
        endpoint(server, auth),
        HttpRetryPolicy {
            max_retries: 2,
            backoff_factor: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
        },
    )
}

#[tokio::test]
async fn test_negotiate_reads_token_from_jsonp_body() {
    verbose_println!("Testing negotiate with a JSONP body...");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .and(query_param("clientProtocol", "2.1"))
        .and(query_param("connectionData", r#"[{"name":"newshub"}]"#))
        .and(query_param("callback", "cb_42"))
        .and(query_param("ftoken", "secret token"))
        .and(header("Origin", "https://www.example.com"))
        .and(header("User-Agent", "hubsockets-test"))
        .and(header("Cookie", "region=eu; session=s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"cb_42({"Url":"/signalr","ConnectionToken":"tok+/=","ConnectionId":"id-1","ProtocolVersion":"1.5"});"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Trailing `;` defeats the callback shape; the balanced scan still finds the record
    let token = client(&server, Some("secret token")).negotiate().await.unwrap();
    assert_eq!(token.as_str(), "tok+/=");
}

#[tokio::test]
async fn test_negotiate_falls_back_to_connection_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .and(query_param_is_missing("ftoken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"ConnectionId":"only-id"}"#),
        )
        .mount(&server)
        .await;

    let token = client(&server, None).negotiate().await.unwrap();
    assert_eq!(token.as_str(), "only-id");
}

#[tokio::test]
async fn test_negotiate_rejects_non_success_status() {
    let server = MockServer::start().await;
    let body = "x".repeat(1000);
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(403).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    match client(&server, None).negotiate().await {
        Err(HandshakeError::Status { status, body_prefix }) => {
            assert_eq!(status, 403);
            assert_eq!(body_prefix.len(), 300);
        }
        other => panic!("expected status error, got {:?}", other.map(|t| t.as_str().to_string())),
    }
}

#[tokio::test]
async fn test_negotiate_without_payload_or_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("maintenance window"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Url":"/signalr"}"#))
        .mount(&server)
        .await;

    let client = client(&server, None);
    assert!(matches!(client.negotiate().await, Err(HandshakeError::NoPayload)));
    assert!(matches!(client.negotiate().await, Err(HandshakeError::MissingToken)));
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"ConnectionToken":"after-retry"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server, None).negotiate().await.unwrap();
    assert_eq!(token.as_str(), "after-retry");
}

#[tokio::test]
async fn test_retries_run_out_on_persistent_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(502))
        // first try plus two retries
        .expect(3)
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server, None).negotiate().await,
        Err(HandshakeError::Status { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_start_sends_token_and_optional_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/start"))
        .and(query_param("transport", "webSockets"))
        .and(query_param("connectionToken", "tok+/="))
        .and(query_param("ftoken", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Response":"started"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signalr/start"))
        .and(query_param_is_missing("ftoken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client(&server, Some("secret"));
    let token = ConnectionToken::new("tok+/=");

    let ack = client.confirm_start(&token, true).await.unwrap();
    assert!(ack.is_success());
    assert!(ack.body.contains("started"));

    // A 5xx start answer is reported, not turned into an error
    let ack = client.confirm_start(&token, false).await.unwrap();
    assert_eq!(ack.status, 500);
    assert!(!ack.is_success());
}

#[tokio::test]
async fn test_release_rebuilds_client_lazily() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signalr/negotiate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ConnectionToken":"t"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, None);
    client.negotiate().await.unwrap();
    client.release();
    client.release();
    client.negotiate().await.unwrap();
}
