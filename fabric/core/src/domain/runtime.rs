// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Executor Contract
//!
//! The lower layer that can launch, watch and terminate agent processes by
//! id. The scheduler is the only caller; deduplication of launches is its job,
//! not the executor's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Observed state of a runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuntimeStatus {
    #[default]
    Pending,
    Starting,
    Running,
    Error,
    Completed,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeStatus::Pending => "pending",
            RuntimeStatus::Starting => "starting",
            RuntimeStatus::Running => "running",
            RuntimeStatus::Error => "error",
            RuntimeStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    pub pid: String,
    pub status: RuntimeStatus,
}

impl RuntimeContext {
    pub fn new(pid: impl Into<String>, status: RuntimeStatus) -> Self {
        Self {
            pid: pid.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub runtime_context: RuntimeContext,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to spawn instance: {0}")]
    SpawnFailed(String),
    #[error("Failed to terminate instance: {0}")]
    TerminationFailed(String),
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),
    #[error("Failed to watch instance: {0}")]
    WatchFailed(String),
    #[error("Instance already running: {0}")]
    AlreadyRunning(String),
}

/// Stream of runtime events for one pid.
///
/// Dropping the watcher stops the producing task.
#[derive(Debug)]
pub struct Watcher {
    rx: mpsc::Receiver<RuntimeEvent>,
    cancel: CancellationToken,
}

impl Watcher {
    /// Build a watcher from the receiving half of an event channel. The
    /// producer should exit once `cancel` fires.
    pub fn new(rx: mpsc::Receiver<RuntimeEvent>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    pub fn result_channel(&mut self) -> &mut mpsc::Receiver<RuntimeEvent> {
        &mut self.rx
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Start a runtime instance for `agent_id` and return its pid. Repeated
    /// calls may return distinct pids.
    async fn launch_agent(&self, agent_id: &str) -> Result<String, RuntimeError>;

    /// Stop the instance. Succeeds when it is already gone.
    async fn shutdown_agent(&self, pid: &str) -> Result<(), RuntimeError>;

    async fn status(&self, pid: &str) -> Result<RuntimeContext, RuntimeError>;

    async fn watch(&self, pid: &str) -> Result<Watcher, RuntimeError>;
}
