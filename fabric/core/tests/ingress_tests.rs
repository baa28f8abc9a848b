// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::body::Body;
use axum::http::{Request, StatusCode};
use canis_fabric_core::domain::envelope::{
    DIDCOMM_ENVELOPE_CONTENT_TYPE, DIDCOMM_QUEUE, ORIGINAL_CONTENT_TYPE_HEADER, TRANSPORT_HEADER,
};
use canis_fabric_core::domain::queue::{Delivery, Listener, Publisher};
use canis_fabric_core::infrastructure::queue::{InMemoryBroker, MemoryPublisher};
use canis_fabric_core::presentation::ingress::IngressGateway;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn gateway(broker: &InMemoryBroker) -> (IngressGateway, Arc<MemoryPublisher>) {
    let publisher = Arc::new(broker.publisher(DIDCOMM_QUEUE));
    let gateway = IngressGateway::new(publisher.clone(), "127.0.0.1:0", "127.0.0.1:0");
    (gateway, publisher)
}

/// Close the queue and collect everything that was published on it.
async fn drain(broker: &InMemoryBroker, publisher: &MemoryPublisher) -> Vec<Delivery> {
    let listener = broker.listener(DIDCOMM_QUEUE);
    let stream = listener.listen().await.unwrap();
    publisher.close().await.unwrap();
    stream.collect().await
}

#[tokio::test]
async fn test_http_happy_path_publishes_body_verbatim() {
    let broker = InMemoryBroker::default();
    let (gateway, publisher) = gateway(&broker);

    let response = gateway
        .http_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", DIDCOMM_ENVELOPE_CONTENT_TYPE)
                .body(Body::from(r#"{"x":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());

    let deliveries = drain(&broker, &publisher).await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].body.as_ref(), br#"{"x":1}"#);
    assert_eq!(deliveries[0].content_type, "application/json");
    assert_eq!(
        deliveries[0].header(ORIGINAL_CONTENT_TYPE_HEADER),
        Some(DIDCOMM_ENVELOPE_CONTENT_TYPE)
    );
}

#[tokio::test]
async fn test_http_wrong_method_publishes_nothing() {
    let broker = InMemoryBroker::default();
    let (gateway, publisher) = gateway(&broker);

    let response = gateway
        .http_router()
        .oneshot(Request::builder().method("GET").uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(drain(&broker, &publisher).await.is_empty());
}

#[tokio::test]
async fn test_http_empty_post_is_bad_request() {
    let broker = InMemoryBroker::default();
    let (gateway, publisher) = gateway(&broker);

    let response = gateway
        .http_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", DIDCOMM_ENVELOPE_CONTENT_TYPE)
                .header("content-length", "0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(drain(&broker, &publisher).await.is_empty());
}

#[tokio::test]
async fn test_http_wrong_content_type_publishes_nothing() {
    let broker = InMemoryBroker::default();
    let (gateway, publisher) = gateway(&broker);

    for content_type in ["application/json", "text/plain", ""] {
        let response = gateway
            .http_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/inbox")
                    .header("content-type", content_type)
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    assert!(drain(&broker, &publisher).await.is_empty());
}

#[tokio::test]
async fn test_websocket_frames_are_published_in_order() {
    let broker = InMemoryBroker::default();
    let (gateway, _publisher) = gateway(&broker);
    let listener = broker.listener(DIDCOMM_QUEUE);
    let mut deliveries = listener.listen().await.unwrap();

    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(gateway.serve_on(http, ws, shutdown.clone()));

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{ws_addr}/any"))
        .await
        .unwrap();
    client.send(Message::Binary(b"frame-1".to_vec())).await.unwrap();
    client.send(Message::Text("frame-2".to_string())).await.unwrap();
    client.send(Message::Binary(Vec::new())).await.unwrap();
    client.send(Message::Ping(b"hi".to_vec())).await.unwrap();
    client.send(Message::Binary(b"frame-3".to_vec())).await.unwrap();

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.content_type, "application/json");
        assert_eq!(delivery.header(TRANSPORT_HEADER), Some("ws"));
        bodies.push(delivery.body);
    }
    assert_eq!(bodies, vec!["frame-1", "frame-2", "", "frame-3"]);

    client.close(None).await.unwrap();
    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_outbound_session_publishes_peer_frames() {
    let broker = InMemoryBroker::default();
    let (gateway, _publisher) = gateway(&broker);
    let listener = broker.listener(DIDCOMM_QUEUE);
    let mut deliveries = listener.listen().await.unwrap();

    let peer = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();
    let peer_task = tokio::spawn(async move {
        let (stream, _) = peer.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        socket.send(Message::Binary(b"from-peer".to_vec())).await.unwrap();
        // Wait for the gateway to close the session
        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let shutdown = CancellationToken::new();
    let session = gateway
        .connect_outbound(&format!("ws://{peer_addr}/"), shutdown.clone())
        .await
        .unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.body.as_ref(), b"from-peer");

    shutdown.cancel();
    session.await.unwrap();
    peer_task.await.unwrap();
}
