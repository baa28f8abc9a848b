// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use canis_fabric_core::application::notifier::{Notifier, NotifierError};
use canis_fabric_core::domain::notification::{Notification, Webhook, NOTIFICATION_QUEUE};
use canis_fabric_core::domain::queue::Publisher;
use canis_fabric_core::infrastructure::queue::InMemoryBroker;
use canis_fabric_core::infrastructure::repositories::InMemoryWebhookRepository;
use canis_fabric_core::infrastructure::webhook_client::WebhookClient;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn notifier(broker: &InMemoryBroker, hooks: Vec<Webhook>) -> Notifier {
    Notifier::new(
        Arc::new(broker.listener(NOTIFICATION_QUEUE)),
        Arc::new(InMemoryWebhookRepository::with_webhooks(hooks)),
        WebhookClient::new(Duration::from_secs(5)).unwrap(),
        16,
    )
}

/// Publish `notes`, close the queue and run the notifier until it drains.
async fn run_to_close(broker: &InMemoryBroker, notifier: &Notifier, notes: &[Notification]) {
    let publisher = broker.publisher(NOTIFICATION_QUEUE);
    for note in notes {
        Notifier::publish_notification(&publisher, note).await.unwrap();
    }
    publisher.close().await.unwrap();

    let result = notifier.start(CancellationToken::new()).await;
    assert!(matches!(result, Err(NotifierError::MessagesClosed)));
}

#[tokio::test]
async fn test_fan_out_failing_hook_does_not_affect_others() {
    let mut server = mockito::Server::new_async().await;
    let expected = Matcher::PartialJson(json!({"event": "e", "message": {"k": 42}}));
    let hook_a = server
        .mock("POST", "/a")
        .match_header("content-type", "application/json")
        .match_body(expected.clone())
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let hook_b = server
        .mock("POST", "/b")
        .match_header("content-type", "application/json")
        .match_body(expected)
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    let url_a = format!("{}/a", server.url());
    let url_b = format!("{}/b", server.url());
    let broker = InMemoryBroker::default();
    let notifier = notifier(
        &broker,
        vec![Webhook::new("t", url_a), Webhook::new("t", url_b.clone())],
    );
    let mut errors = notifier.errors().unwrap();

    run_to_close(&broker, &notifier, &[Notification::new("t", "e", json!({"k": 42}))]).await;

    hook_a.assert_async().await;
    hook_b.assert_async().await;

    match errors.try_recv() {
        Ok(NotifierError::Delivery { url, status, body }) => {
            assert_eq!(url, url_b);
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_topic_without_hooks_reports_error_and_posts_nothing() {
    let mut server = mockito::Server::new_async().await;
    let unused = server.mock("POST", Matcher::Any).expect(0).create_async().await;

    let broker = InMemoryBroker::default();
    let notifier = notifier(
        &broker,
        vec![Webhook::new("other", format!("{}/x", server.url()))],
    );
    let mut errors = notifier.errors().unwrap();

    run_to_close(&broker, &notifier, &[Notification::new("t", "e", json!({"k": 42}))]).await;

    unused.assert_async().await;
    let err = errors.try_recv().unwrap();
    assert_eq!(err.to_string(), "no webhooks for topic t");
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_every_notification_reaches_the_hook() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({"event": "first"})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({"event": "second"})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let broker = InMemoryBroker::default();
    let notifier = notifier(
        &broker,
        vec![Webhook::new("t", format!("{}/hook", server.url()))],
    );
    let mut errors = notifier.errors().unwrap();

    run_to_close(
        &broker,
        &notifier,
        &[
            Notification::new("t", "first", json!(1)),
            Notification::new("t", "second", json!(2)),
        ],
    )
    .await;

    first.assert_async().await;
    second.assert_async().await;
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_unreachable_hook_is_a_transport_error() {
    let broker = InMemoryBroker::default();
    let notifier = notifier(&broker, vec![Webhook::new("t", "http://127.0.0.1:1/hook")]);
    let mut errors = notifier.errors().unwrap();

    run_to_close(&broker, &notifier, &[Notification::new("t", "e", json!({}))]).await;

    assert!(matches!(
        errors.try_recv(),
        Ok(NotifierError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_errors_without_consumer_go_to_log() {
    let broker = InMemoryBroker::default();
    let notifier = notifier(&broker, Vec::new());

    // Nothing has taken the channel; dispatch must not block on it.
    let notes: Vec<Notification> = (0..32)
        .map(|i| Notification::new("t", format!("e{i}"), json!({})))
        .collect();
    run_to_close(&broker, &notifier, &notes).await;

    // The channel stays available and empty.
    let mut errors = notifier.errors().unwrap();
    assert!(errors.try_recv().is_err());
    assert!(matches!(
        notifier.errors(),
        Err(NotifierError::ErrorsAlreadyTaken)
    ));
}

#[tokio::test]
async fn test_closed_sentinel_message() {
    assert_eq!(
        NotifierError::MessagesClosed.to_string(),
        "notification messages closed"
    );
}
