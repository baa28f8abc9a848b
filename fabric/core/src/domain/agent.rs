// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared agent resource. The canonical copy lives in the control-plane
/// store; `pid` is empty iff no runtime instance is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub public_did: bool,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pid: String::new(),
            status: AgentStatus::NotStarted,
            public_did: false,
            updated_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.pid.is_empty()
    }

    /// Record a successful launch.
    pub fn mark_launched(&mut self, pid: impl Into<String>) {
        self.pid = pid.into();
        self.status = AgentStatus::Starting;
        self.updated_at = Utc::now();
    }

    /// Record a successful shutdown.
    pub fn mark_stopped(&mut self) {
        self.pid.clear();
        self.status = AgentStatus::Terminated;
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    NotStarted,
    Starting,
    Running,
    Error,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::NotStarted => "NOT_STARTED",
            AgentStatus::Starting => "STARTING",
            AgentStatus::Running => "RUNNING",
            AgentStatus::Error => "ERROR",
            AgentStatus::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "NOT_STARTED" => Ok(AgentStatus::NotStarted),
            "STARTING" => Ok(AgentStatus::Starting),
            "RUNNING" => Ok(AgentStatus::Running),
            "ERROR" => Ok(AgentStatus::Error),
            "TERMINATED" => Ok(AgentStatus::Terminated),
            other => Err(format!("unknown agent status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEventKind {
    Add,
    Update,
    Delete,
}

/// Change record emitted by the control plane. `Add` has only `new`,
/// `Delete` has only `old`, `Update` carries both.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    pub old: Option<Agent>,
    pub new: Option<Agent>,
}

impl AgentEvent {
    pub fn added(agent: Agent) -> Self {
        Self {
            kind: AgentEventKind::Add,
            old: None,
            new: Some(agent),
        }
    }

    pub fn updated(old: Agent, new: Agent) -> Self {
        Self {
            kind: AgentEventKind::Update,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(agent: Agent) -> Self {
        Self {
            kind: AgentEventKind::Delete,
            old: Some(agent),
            new: None,
        }
    }

    /// Id of the agent the event refers to.
    pub fn agent_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|agent| agent.id.as_str())
    }
}
