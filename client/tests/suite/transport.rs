//! Transport-level behavior against a live mock server: error taxonomy,
//! message extraction, timeouts.

use std::time::Duration;

use autoqa_client::{Transport, TransportError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> Transport {
    Transport::new(&server.uri(), Duration::from_secs(2)).expect("build transport")
}

#[tokio::test]
async fn get_decodes_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let body = transport_for(&server)
        .get("/api/health")
        .await
        .expect("health");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn post_sends_json_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/approve"))
        .and(body_json(json!({"scenario": {"title": "T1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport_for(&server)
        .post("/api/approve", &json!({"scenario": {"title": "T1"}}))
        .await
        .expect("approve");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn malformed_200_body_is_a_decode_error_with_raw_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = transport_for(&server)
        .get("/api/runs")
        .await
        .expect_err("must fail to decode");
    assert_eq!(
        err,
        TransportError::Decode {
            raw: "not json".to_string()
        }
    );
}

#[tokio::test]
async fn http_error_extracts_detail_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis/latest"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "No analysis yet"})),
        )
        .mount(&server)
        .await;

    let err = transport_for(&server)
        .get("/api/analysis/latest")
        .await
        .expect_err("must be http error");
    match err {
        TransportError::Http {
            status, message, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No analysis yet");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_falls_back_to_message_field_then_generic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/with-message"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain-text"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);

    let err = transport.get("/with-message").await.expect_err("http 500");
    match err {
        TransportError::Http { message, .. } => assert_eq!(message, "boom"),
        other => panic!("expected Http error, got {other:?}"),
    }

    let err = transport.get("/plain-text").await.expect_err("http 503");
    match err {
        TransportError::Http {
            status,
            message,
            raw,
        } => {
            assert_eq!(status, 503);
            assert_eq!(message, "request failed with status 503");
            assert_eq!(raw, "Service Unavailable");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    // Port 1 on loopback refuses connections immediately.
    let transport =
        Transport::new("http://127.0.0.1:1", Duration::from_secs(2)).expect("build transport");
    let err = transport.get("/api/health").await.expect_err("unreachable");
    assert!(matches!(err, TransportError::Network { .. }));
}

#[tokio::test]
async fn slow_response_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let transport =
        Transport::new(&server.uri(), Duration::from_millis(100)).expect("build transport");
    let err = transport.get("/api/runs").await.expect_err("timeout");
    assert!(matches!(err, TransportError::Network { .. }));
}
