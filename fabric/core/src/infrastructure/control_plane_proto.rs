// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Generated protobuf code for the control-plane Admin service, plus
// conversions between the wire messages and domain types.

pub mod canis {
    pub mod admin {
        pub mod v1 {
            tonic::include_proto!("canis.admin.v1");
        }
    }
}

use chrono::{DateTime, Utc};

use crate::domain::agent::{Agent, AgentEvent, AgentEventKind, AgentStatus};
use canis::admin::v1 as pb;

impl From<&Agent> for pb::Agent {
    fn from(agent: &Agent) -> Self {
        pb::Agent {
            id: agent.id.clone(),
            name: agent.name.clone(),
            pid: agent.pid.clone(),
            status: agent.status.as_str().to_string(),
            public_did: agent.public_did,
            updated_at_ms: agent.updated_at.timestamp_millis(),
        }
    }
}

impl From<pb::Agent> for Agent {
    fn from(agent: pb::Agent) -> Self {
        let status = agent.status.parse::<AgentStatus>().unwrap_or_else(|e| {
            tracing::warn!(agent_id = %agent.id, "{}", e);
            AgentStatus::NotStarted
        });
        Agent {
            id: agent.id,
            name: agent.name,
            pid: agent.pid,
            status,
            public_did: agent.public_did,
            updated_at: DateTime::<Utc>::from_timestamp_millis(agent.updated_at_ms).unwrap_or_default(),
        }
    }
}

impl From<&AgentEvent> for pb::AgentEvent {
    fn from(event: &AgentEvent) -> Self {
        let kind = match event.kind {
            AgentEventKind::Add => pb::agent_event::Type::Add,
            AgentEventKind::Update => pb::agent_event::Type::Update,
            AgentEventKind::Delete => pb::agent_event::Type::Delete,
        };
        pb::AgentEvent {
            r#type: kind as i32,
            old: event.old.as_ref().map(pb::Agent::from),
            new: event.new.as_ref().map(pb::Agent::from),
        }
    }
}

/// The marker sent once the snapshot replay of `WatchAgents` is complete.
pub fn synced_marker() -> pb::AgentEvent {
    pb::AgentEvent {
        r#type: pb::agent_event::Type::Synced as i32,
        old: None,
        new: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_roundtrip_keeps_equality() {
        let mut agent = Agent::new("a1", "issuer");
        agent.mark_launched("abc");
        // Wire precision is milliseconds
        agent.updated_at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();

        let back = Agent::from(pb::Agent::from(&agent));
        assert_eq!(back, agent);
    }

    #[test]
    fn test_event_mapping() {
        let event = AgentEvent::deleted(Agent::new("a1", "issuer"));
        let wire = pb::AgentEvent::from(&event);
        assert_eq!(wire.r#type(), pb::agent_event::Type::Delete);
        assert!(wire.new.is_none());
        assert_eq!(wire.old.unwrap().id, "a1");
        assert_eq!(synced_marker().r#type(), pb::agent_event::Type::Synced);
    }
}
