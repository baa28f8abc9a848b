// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::domain::notification::EventMessage;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("unable to post event to hook {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("error response from hook {url}. code: ({status}): {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// HTTP client that POSTs [`EventMessage`]s to subscriber URLs.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `event` as JSON. Only 200 and 204 count as delivered.
    pub async fn deliver(&self, url: &str, event: &EventMessage) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| WebhookError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.map_err(|e| WebhookError::Transport {
            url: url.to_string(),
            reason: format!("failed reading response body: {}", e),
        })?;
        Err(WebhookError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}
