//! HttpTransport against a mock webhook endpoint.

use chatbridge_core::{Author, ChannelId, ChatMessage, MessageId, CHANNEL_MODEL};
use chatbridge_webhook::{
    HttpTransport, OutboundPayload, OutboundRequest, WebhookError, WebhookTransport,
};
use chrono::Utc;
use secrecy::Secret;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> OutboundPayload {
    let message = ChatMessage {
        id: MessageId::new(7),
        model: Some(CHANNEL_MODEL.to_string()),
        res_id: Some(42),
        author: Author::guest(5, "Alice"),
        body: "hi".to_string(),
        created_at: Utc::now(),
    };
    OutboundPayload::new(&message, ChannelId::new(42), None)
}

fn request(server: &MockServer, token: Option<&str>) -> OutboundRequest {
    OutboundRequest {
        url: format!("{}/webhook/chat", server.uri()),
        token: token.map(|t| Secret::new(t.to_string())),
        payload: payload(),
    }
}

#[tokio::test]
async fn test_posts_json_with_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/chat"))
        .and(header("X-N8N-Token", "out-secret"))
        .and(body_partial_json(json!({
            "body": "hi",
            "author_id": "guest_5",
            "res_id": 42,
            "active_specialist": false
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let receipt = transport
        .deliver(request(&server, Some("out-secret")))
        .await
        .unwrap();

    assert_eq!(receipt.status_code, 200);
}

#[tokio::test]
async fn test_token_header_omitted_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/chat"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    transport.deliver(request(&server, None)).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("x-n8n-token").is_none());
    let agent = received[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(agent.starts_with("chatbridge/"));
}

#[tokio::test]
async fn test_custom_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Bridge-Secret", "s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5))
        .unwrap()
        .with_token_header("X-Bridge-Secret");
    assert!(transport.deliver(request(&server, Some("s3cret"))).await.is_ok());
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let err = transport.deliver(request(&server, None)).await.unwrap_err();

    assert!(matches!(err, WebhookError::DeliveryFailed(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_millis(100)).unwrap();
    let err = transport.deliver(request(&server, None)).await.unwrap_err();

    assert!(matches!(err, WebhookError::Timeout));
}
