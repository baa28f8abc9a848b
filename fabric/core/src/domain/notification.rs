// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Notification and webhook types shared by producers and the notifier.
//!
//! On the wire both [`Notification`] and [`EventMessage`] carry their opaque
//! payload under the `message` key.

use serde::{Deserialize, Serialize};

/// Well-known queue the notifier consumes.
pub const NOTIFICATION_QUEUE: &str = "notification";

/// A domain event addressed to every webhook registered for `topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub event: String,
    #[serde(rename = "message", default)]
    pub event_data: serde_json::Value,
}

impl Notification {
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        event_data: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            event_data,
        }
    }
}

/// Body POSTed to a webhook. `timestamp` is set by the notifier at dispatch
/// time, in Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    pub timestamp: i64,
    #[serde(rename = "message")]
    pub event_data: serde_json::Value,
}

impl EventMessage {
    pub fn from_notification(notification: &Notification, timestamp: i64) -> Self {
        Self {
            event: notification.event.clone(),
            timestamp,
            event_data: notification.event_data.clone(),
        }
    }
}

/// An external endpoint subscribed to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Webhook {
    pub topic: String,
    pub url: String,
}

impl Webhook {
    pub fn new(topic: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            url: url.into(),
        }
    }
}
