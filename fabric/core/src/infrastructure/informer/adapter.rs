// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Stream Adapter
//!
//! Turns the control plane's `WatchAgents` server stream into an ordered
//! channel of [`ResourceEvent<Agent>`].
//!
//! Every (re)connect starts with a snapshot: one `ADD` per agent the server
//! knows, then a `SYNCED` marker, then live events. The adapter keeps the
//! last state it saw for each id and uses it to reconcile the snapshot:
//!
//! | Snapshot entry | Cached? | Emitted |
//! |----------------|---------|---------|
//! | `ADD` | no | `Added(new)` |
//! | `ADD` | yes | `Updated { old: cached, new }` (may be `old == new`) |
//! | absent at `SYNCED` | yes | `Deleted(Unknown { key, last_known })` |
//!
//! A stream error or a clean stream end is followed by a reconnect after an
//! exponential backoff delay. Only [`close`](AgentStreamAdapter::close)
//! ends the loop.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffConfig, BackoffState};
use super::{InformerError, StreamAdapter, EVENT_BUFFER};
use crate::domain::agent::Agent;
use crate::domain::resource::{DeletedFinalStateUnknown, DeletedObject, ResourceEvent};
use crate::infrastructure::control_plane_proto::canis::admin::v1 as pb;
use pb::admin_client::AdminClient;

enum WatchEnd {
    /// The server closed the stream.
    StreamEnded,
    /// Nobody is reading the event channel any more.
    ConsumerGone,
}

pub struct AgentStreamAdapter {
    cancel: CancellationToken,
    events: Mutex<Option<mpsc::Receiver<ResourceEvent<Agent>>>>,
}

impl AgentStreamAdapter {
    /// Start watching through an existing client.
    pub fn new(client: AdminClient<Channel>, backoff: BackoffConfig) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let watcher = Watcher {
            client,
            tx,
            cache: HashMap::new(),
            backoff: BackoffState::new(backoff),
        };
        tokio::spawn(watcher.run(cancel.clone()));

        Self {
            cancel,
            events: Mutex::new(Some(rx)),
        }
    }

    /// Watch the control plane at `endpoint`. The connection is made lazily,
    /// so an unreachable server is retried rather than reported here.
    pub fn connect(endpoint: &str, backoff: BackoffConfig) -> Result<Self, InformerError> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| InformerError::Endpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .connect_lazy();
        Ok(Self::new(AdminClient::new(channel), backoff))
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl StreamAdapter<Agent> for AgentStreamAdapter {
    fn take_events(&self) -> Option<mpsc::Receiver<ResourceEvent<Agent>>> {
        self.events.lock().take()
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AgentStreamAdapter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Watcher {
    client: AdminClient<Channel>,
    tx: mpsc::Sender<ResourceEvent<Agent>>,
    cache: HashMap<String, Agent>,
    backoff: BackoffState,
}

impl Watcher {
    async fn run(mut self, cancel: CancellationToken) {
        info!("Watching agent events");
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.watch_once() => result,
            };

            match result {
                Ok(WatchEnd::ConsumerGone) => {
                    debug!("Agent event consumer dropped; stopping watch");
                    break;
                }
                Ok(WatchEnd::StreamEnded) => info!("Agent watch stream ended; reconnecting"),
                Err(status) => warn!(code = ?status.code(), message = status.message(), "Agent watch stream failed"),
            }

            let Some(delay) = self.backoff.record_failure() else {
                error!(
                    failures = self.backoff.consecutive_failures(),
                    "Giving up on agent watch stream"
                );
                break;
            };
            debug!(?delay, "Reconnecting agent watch after backoff");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("Agent watch loop exited");
    }

    async fn watch_once(&mut self) -> Result<WatchEnd, tonic::Status> {
        let mut stream = self
            .client
            .watch_agents(pb::WatchRequest {})
            .await?
            .into_inner();
        debug!("Agent watch stream created");

        // Ids replayed since this connection opened; None once SYNCED arrives
        let mut snapshot: Option<HashSet<String>> = Some(HashSet::new());

        while let Some(message) = stream.message().await? {
            let events = self.reconcile(message, &mut snapshot);
            for event in events {
                if self.tx.send(event).await.is_err() {
                    return Ok(WatchEnd::ConsumerGone);
                }
            }
        }

        Ok(WatchEnd::StreamEnded)
    }

    fn reconcile(
        &mut self,
        message: pb::AgentEvent,
        snapshot: &mut Option<HashSet<String>>,
    ) -> Vec<ResourceEvent<Agent>> {
        let kind = match pb::agent_event::Type::try_from(message.r#type) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(value = message.r#type, "Ignoring agent event of unknown type");
                return Vec::new();
            }
        };

        match kind {
            pb::agent_event::Type::Add => {
                let Some(new) = message.new.map(Agent::from) else {
                    warn!("ADD event without an agent payload");
                    return Vec::new();
                };
                if let Some(seen) = snapshot.as_mut() {
                    seen.insert(new.id.clone());
                }
                match self.cache.insert(new.id.clone(), new.clone()) {
                    Some(old) => vec![ResourceEvent::Updated { old, new }],
                    None => vec![ResourceEvent::Added(new)],
                }
            }
            pb::agent_event::Type::Update => {
                let Some(new) = message.new.map(Agent::from) else {
                    warn!("UPDATE event without a new agent payload");
                    return Vec::new();
                };
                let wire_old = message.old.map(Agent::from);
                let cached = self.cache.insert(new.id.clone(), new.clone());
                let old = wire_old.or(cached).unwrap_or_else(|| new.clone());
                vec![ResourceEvent::Updated { old, new }]
            }
            pb::agent_event::Type::Delete => {
                let Some(old) = message.old.map(Agent::from) else {
                    warn!("DELETE event without an agent payload");
                    return Vec::new();
                };
                self.cache.remove(&old.id);
                vec![ResourceEvent::Deleted(DeletedObject::Known(old))]
            }
            pb::agent_event::Type::Synced => {
                self.backoff.record_success();
                let Some(seen) = snapshot.take() else {
                    return Vec::new();
                };
                let mut missing: Vec<String> = self
                    .cache
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                missing.sort();
                missing
                    .into_iter()
                    .filter_map(|key| {
                        let last_known = self.cache.remove(&key)?;
                        debug!(agent_id = %key, "Agent missing from relist; emitting tombstone");
                        Some(ResourceEvent::Deleted(DeletedObject::Unknown(
                            DeletedFinalStateUnknown { key, last_known },
                        )))
                    })
                    .collect()
            }
        }
    }
}
