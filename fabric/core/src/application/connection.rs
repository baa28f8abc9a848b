// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! EstablishConnection helper.
//!
//! Accepts a DID-exchange invitation through a [`ConnectionClient`] and waits
//! for the resulting connection to complete. The protocol itself is the
//! client's business; this module only watches state transitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const STATE_COMPLETED: &str = "completed";
pub const STATE_ABANDONED: &str = "abandoned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub service_endpoint: String,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub state: String,
    #[serde(default)]
    pub their_label: Option<String>,
}

impl Connection {
    pub fn is_completed(&self) -> bool {
        self.state == STATE_COMPLETED
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateEvent {
    pub connection_id: String,
    pub state: String,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection client error: {0}")]
    Client(String),

    #[error("connection {0} was abandoned")]
    Abandoned(String),

    #[error("connection timed out in bad state: {state}")]
    Timeout { connection_id: String, state: String },

    #[error("connection state events closed while waiting for {0}")]
    EventsClosed(String),
}

/// DID-exchange client used by [`establish_connection`].
#[async_trait]
pub trait ConnectionClient: Send + Sync {
    /// Accept `invitation` and return the id of the new connection.
    async fn handle_invitation(&self, invitation: &Invitation) -> Result<String, ConnectionError>;

    async fn get_connection(&self, connection_id: &str) -> Result<Connection, ConnectionError>;

    /// State transitions for every connection the client manages.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionStateEvent>;
}

/// Accept `invitation` and wait up to `timeout` for the connection to reach
/// `completed`.
///
/// On expiry the connection is read once more; a connection that completed
/// without the event being seen is returned, anything else is a
/// [`ConnectionError::Timeout`] carrying the state it was left in.
pub async fn establish_connection(
    client: &dyn ConnectionClient,
    invitation: &Invitation,
    timeout: Duration,
) -> Result<Connection, ConnectionError> {
    let mut events = client.subscribe();
    let connection_id = client.handle_invitation(invitation).await?;
    debug!(invitation_id = %invitation.id, connection_id = %connection_id, "Invitation accepted");

    match tokio::time::timeout(timeout, wait_for_completion(client, &mut events, &connection_id)).await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(connection_id = %connection_id, ?timeout, "Timed out waiting for connection");
            let connection = client.get_connection(&connection_id).await?;
            if connection.is_completed() {
                return Ok(connection);
            }
            Err(ConnectionError::Timeout {
                connection_id,
                state: connection.state,
            })
        }
    }
}

async fn wait_for_completion(
    client: &dyn ConnectionClient,
    events: &mut broadcast::Receiver<ConnectionStateEvent>,
    connection_id: &str,
) -> Result<Connection, ConnectionError> {
    loop {
        let state = match events.recv().await {
            Ok(event) if event.connection_id == connection_id => event.state,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Missed transitions; fall back to the stored state.
                debug!(connection_id, skipped, "Connection events lagged");
                client.get_connection(connection_id).await?.state
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ConnectionError::EventsClosed(connection_id.to_string()))
            }
        };

        match state.as_str() {
            STATE_COMPLETED => return client.get_connection(connection_id).await,
            STATE_ABANDONED => return Err(ConnectionError::Abandoned(connection_id.to_string())),
            _ => {}
        }
    }
}
