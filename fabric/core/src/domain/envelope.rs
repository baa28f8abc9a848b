// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DIDComm Envelope
//!
//! The ingress gateway treats DIDComm traffic as an opaque byte sequence. An
//! [`Envelope`] is created per inbound request (or WebSocket frame), handed
//! to the queue, and never mutated afterwards.
//!
//! The queue always carries `application/json`; the inbound content type is
//! preserved as the [`ORIGINAL_CONTENT_TYPE_HEADER`] delivery attribute so
//! downstream consumers keep the metadata without the body being touched.

use bytes::Bytes;
use thiserror::Error;

use crate::domain::queue::Delivery;

/// The only content type accepted on the HTTP ingress.
pub const DIDCOMM_ENVELOPE_CONTENT_TYPE: &str = "application/didcomm-envelope-enc";

/// Content type stamped on every ingress queue message.
pub const QUEUE_CONTENT_TYPE: &str = "application/json";

/// Delivery header carrying the content type the peer actually sent.
pub const ORIGINAL_CONTENT_TYPE_HEADER: &str = "x-original-content-type";

/// Delivery header naming the transport the envelope arrived on.
pub const TRANSPORT_HEADER: &str = "x-ingress-transport";

/// Well-known queue for inbound DIDComm messages.
pub const DIDCOMM_QUEUE: &str = "didcomm-msgs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    WebSocket,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::WebSocket => "ws",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Empty payload")]
    EmptyBody,
}

/// Opaque DIDComm message as received at the edge.
#[derive(Debug, Clone)]
pub struct Envelope {
    content_type: Option<String>,
    body: Bytes,
    transport: Transport,
}

impl Envelope {
    /// Build an envelope, rejecting empty bodies.
    pub fn new(
        content_type: Option<String>,
        body: Bytes,
        transport: Transport,
    ) -> Result<Self, EnvelopeError> {
        if body.is_empty() {
            return Err(EnvelopeError::EmptyBody);
        }
        Ok(Self {
            content_type,
            body,
            transport,
        })
    }

    /// Envelope for a WebSocket frame. Every frame is forwarded, empty
    /// ones included.
    pub fn frame(body: Bytes) -> Self {
        Self {
            content_type: None,
            body,
            transport: Transport::WebSocket,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Convert into the message published on the ingress queue.
    ///
    /// The body is forwarded verbatim.
    pub fn into_delivery(self) -> Delivery {
        let mut delivery = Delivery::new(self.body, QUEUE_CONTENT_TYPE)
            .with_header(TRANSPORT_HEADER, self.transport.as_str());
        if let Some(content_type) = self.content_type {
            delivery = delivery.with_header(ORIGINAL_CONTENT_TYPE_HEADER, content_type);
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_rejected() {
        let result = Envelope::new(
            Some(DIDCOMM_ENVELOPE_CONTENT_TYPE.to_string()),
            Bytes::new(),
            Transport::Http,
        );
        assert_eq!(result.unwrap_err(), EnvelopeError::EmptyBody);
    }

    #[test]
    fn test_delivery_keeps_body_and_records_original_type() {
        let envelope = Envelope::new(
            Some(DIDCOMM_ENVELOPE_CONTENT_TYPE.to_string()),
            Bytes::from_static(br#"{"x":1}"#),
            Transport::Http,
        )
        .unwrap();

        let delivery = envelope.into_delivery();
        assert_eq!(delivery.body.as_ref(), br#"{"x":1}"#);
        assert_eq!(delivery.content_type, QUEUE_CONTENT_TYPE);
        assert_eq!(
            delivery.header(ORIGINAL_CONTENT_TYPE_HEADER),
            Some(DIDCOMM_ENVELOPE_CONTENT_TYPE)
        );
        assert_eq!(delivery.header(TRANSPORT_HEADER), Some("http"));
    }

    #[test]
    fn test_ws_frame_without_content_type() {
        let delivery = Envelope::frame(Bytes::from_static(b"frame")).into_delivery();
        assert_eq!(delivery.header(ORIGINAL_CONTENT_TYPE_HEADER), None);
        assert_eq!(delivery.header(TRANSPORT_HEADER), Some("ws"));
    }

    #[test]
    fn test_empty_ws_frame_is_kept() {
        let delivery = Envelope::frame(Bytes::new()).into_delivery();
        assert!(delivery.body.is_empty());
        assert_eq!(delivery.content_type, QUEUE_CONTENT_TYPE);
    }
}
