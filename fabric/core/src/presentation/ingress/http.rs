// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP listener for DIDComm envelopes. Every path is served by one fallback
// handler; routing is not distinguished.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::domain::envelope::{Envelope, Transport, DIDCOMM_ENVELOPE_CONTENT_TYPE};
use crate::domain::queue::Publisher;
use crate::infrastructure::metrics;

/// Upper bound on a buffered envelope.
pub const MAX_ENVELOPE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone)]
struct HttpState {
    publisher: Arc<dyn Publisher>,
}

pub fn router(publisher: Arc<dyn Publisher>) -> Router {
    Router::new()
        .fallback(handle_envelope)
        .with_state(HttpState { publisher })
        .layer(TraceLayer::new_for_http())
}

fn reject(status: StatusCode, message: String) -> Response {
    metrics::record_ingress_rejected(status.as_u16());
    debug!(status = status.as_u16(), %message, "Rejected inbound envelope");
    (status, message).into_response()
}

async fn handle_envelope(
    State(state): State<HttpState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        return reject(
            StatusCode::METHOD_NOT_ALLOWED,
            "HTTP Method not allowed".to_string(),
        );
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();
    if content_type != DIDCOMM_ENVELOPE_CONTENT_TYPE {
        return reject(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Unsupported Content-type \"{}\"", content_type),
        );
    }

    let declared_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    if declared_length == Some(0) {
        return reject(StatusCode::BAD_REQUEST, "Empty payload".to_string());
    }

    let body = match to_bytes(body, MAX_ENVELOPE_SIZE).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to read inbound envelope");
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read payload".to_string(),
            );
        }
    };

    let envelope = match Envelope::new(Some(content_type), body, Transport::Http) {
        Ok(envelope) => envelope,
        Err(e) => return reject(StatusCode::BAD_REQUEST, e.to_string()),
    };

    // Publish failures are not surfaced to the peer
    match state.publisher.publish_message(envelope.into_delivery()).await {
        Ok(()) => metrics::record_ingress_message(Transport::Http),
        Err(e) => error!(error = %e, "Failed to publish inbound envelope"),
    }

    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::DIDCOMM_QUEUE;
    use crate::infrastructure::queue::InMemoryBroker;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_wrong_content_type_is_415() {
        let broker = InMemoryBroker::default();
        let app = router(Arc::new(broker.publisher(DIDCOMM_QUEUE)));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"x":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_method_checked_before_content_type() {
        let broker = InMemoryBroker::default();
        let app = router(Arc::new(broker.publisher(DIDCOMM_QUEUE)));

        let response = app
            .oneshot(Request::builder().method("PUT").uri("/any/path").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
