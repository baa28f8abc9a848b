// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scheduler
//!
//! Reconciles declared [`Agent`] resources with the runtime population behind
//! an [`Executor`].
//!
//! ## Launch
//!
//! ```text
//! launch_agent(id) ──▶ executor.launch_agent ──▶ store: pid + STARTING
//!        │
//! await_launch(id, pid) ──▶ executor.watch(pid)
//!        │                      │
//!        ├── Running    ──▶ RUNNING
//!        ├── Error      ──▶ ERROR   (SchedulerError::AgentFailed)
//!        ├── Completed  ──▶ TERMINATED
//!        └── window expires ──▶ watcher stopped, last observed status
//! ```
//!
//! The window is enforced by a deadline owned here. It is set before the
//! executor is called and also bounds acquiring the watch, so a launch
//! returns within it no matter how the executor behaves.
//!
//! ## Invariants
//!
//! - `pid` goes from empty to non-empty only through [`Scheduler::launch_agent`],
//!   which refuses agents that already have one. Launches of one id are
//!   serialized from the load to the save; a concurrent caller gets
//!   [`SchedulerError::LaunchInProgress`].
//! - `pid` goes back to empty only after the executor confirmed the shutdown.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::repository::{AgentRepository, RepositoryError};
use crate::domain::resource::{DeletedObject, ResourceEventHandler};
use crate::domain::runtime::{Executor, RuntimeError, RuntimeStatus, Watcher};
use crate::infrastructure::metrics;

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("agent {id} is already running with pid {pid}")]
    AlreadyRunning { id: String, pid: String },

    #[error("launch of agent {0} already in progress")]
    LaunchInProgress(String),

    #[error("launch of agent {0} timed out")]
    LaunchTimeout(String),

    #[error("agent with ID {0} is not currently running")]
    NotRunning(String),

    #[error("agent {id} failed to start (pid {pid})")]
    AgentFailed { id: String, pid: String },

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("store error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    pub pid: String,
}

/// Result of waiting on a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub status: AgentStatus,
    /// The window expired before the executor reported a decisive state.
    pub timed_out: bool,
}

fn agent_status(status: RuntimeStatus) -> AgentStatus {
    match status {
        RuntimeStatus::Pending | RuntimeStatus::Starting => AgentStatus::Starting,
        RuntimeStatus::Running => AgentStatus::Running,
        RuntimeStatus::Error => AgentStatus::Error,
        RuntimeStatus::Completed => AgentStatus::Terminated,
    }
}

/// Marks an id as launching until dropped.
struct LaunchGuard<'a> {
    launching: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for LaunchGuard<'_> {
    fn drop(&mut self) {
        self.launching.lock().remove(&self.id);
    }
}

pub struct Scheduler {
    store: Arc<dyn AgentRepository>,
    executor: Arc<dyn Executor>,
    launch_timeout: Duration,
    launching: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn AgentRepository>, executor: Arc<dyn Executor>) -> Self {
        Self {
            store,
            executor,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            launching: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    pub fn launch_timeout(&self) -> Duration {
        self.launch_timeout
    }

    async fn load(&self, id: &str) -> Result<Agent, SchedulerError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SchedulerError::AgentNotFound(id.to_string()))
    }

    /// Store `agent` as received from the control plane unless the store
    /// already knows it. Returns whether it was added.
    pub async fn register(&self, agent: &Agent) -> Result<bool, SchedulerError> {
        if self.store.find_by_id(&agent.id).await?.is_some() {
            return Ok(false);
        }
        self.store.save(agent).await?;
        debug!(agent_id = %agent.id, "Agent registered from control plane");
        Ok(true)
    }

    /// Start a runtime instance for agent `id` and record its pid.
    ///
    /// The executor call is bounded by the launch window.
    pub async fn launch_agent(&self, id: &str) -> Result<Launched, SchedulerError> {
        self.launch_agent_by(id, self.launch_deadline()).await
    }

    /// End of a launch window opened now.
    pub fn launch_deadline(&self) -> Instant {
        Instant::now() + self.launch_timeout
    }

    /// [`Scheduler::launch_agent`] bounded by an explicit deadline, so that
    /// one window can cover the launch and the wait that follows.
    pub async fn launch_agent_by(
        &self,
        id: &str,
        deadline: Instant,
    ) -> Result<Launched, SchedulerError> {
        let _guard = self.begin_launch(id)?;

        let mut agent = self.load(id).await?;
        if agent.is_running() {
            return Err(SchedulerError::AlreadyRunning {
                id: agent.id,
                pid: agent.pid,
            });
        }

        let launch = self.executor.launch_agent(id);
        let pid = match tokio::time::timeout_at(deadline, launch).await {
            Ok(pid) => pid?,
            Err(_) => {
                warn!(agent_id = %id, "Executor did not launch the agent within the launch window");
                return Err(SchedulerError::LaunchTimeout(id.to_string()));
            }
        };
        agent.mark_launched(pid.clone());
        self.store.save(&agent).await?;

        info!(agent_id = %id, pid = %pid, "Agent launched");
        Ok(Launched { pid })
    }

    fn begin_launch(&self, id: &str) -> Result<LaunchGuard<'_>, SchedulerError> {
        if !self.launching.lock().insert(id.to_string()) {
            return Err(SchedulerError::LaunchInProgress(id.to_string()));
        }
        Ok(LaunchGuard {
            launching: &self.launching,
            id: id.to_string(),
        })
    }

    /// Watch `pid` until it reaches a decisive state or the launch window
    /// expires, then persist the outcome.
    pub async fn await_launch(&self, id: &str, pid: &str) -> Result<LaunchOutcome, SchedulerError> {
        self.await_launch_by(id, pid, self.launch_deadline()).await
    }

    pub async fn await_launch_by(
        &self,
        id: &str,
        pid: &str,
        deadline: Instant,
    ) -> Result<LaunchOutcome, SchedulerError> {
        let watch = self.executor.watch(pid);
        let (last, timed_out) = match tokio::time::timeout_at(deadline, watch).await {
            Ok(watcher) => self.observe(id, pid, watcher?, deadline).await,
            Err(_) => {
                warn!(agent_id = %id, pid = %pid, "Runtime watch not established within the launch window");
                (RuntimeStatus::Starting, true)
            }
        };
        self.settle(id, pid, last, timed_out).await
    }

    /// Read runtime events until a decisive state, the end of the stream or
    /// `deadline`. Returns the last status and whether the deadline hit.
    async fn observe(
        &self,
        id: &str,
        pid: &str,
        mut watcher: Watcher,
        deadline: Instant,
    ) -> (RuntimeStatus, bool) {
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        let mut last = RuntimeStatus::Starting;
        let mut timed_out = false;

        loop {
            tokio::select! {
                _ = &mut expiry => {
                    timed_out = true;
                    break;
                }
                event = watcher.result_channel().recv() => match event {
                    Some(event) => {
                        last = event.runtime_context.status;
                        debug!(agent_id = %id, pid = %pid, status = %last, "Runtime status observed");
                        if matches!(
                            last,
                            RuntimeStatus::Running | RuntimeStatus::Error | RuntimeStatus::Completed
                        ) {
                            break;
                        }
                    }
                    None => {
                        warn!(agent_id = %id, pid = %pid, "Runtime watch ended before the agent settled");
                        break;
                    }
                },
            }
        }
        watcher.stop();
        (last, timed_out)
    }

    async fn settle(
        &self,
        id: &str,
        pid: &str,
        last: RuntimeStatus,
        timed_out: bool,
    ) -> Result<LaunchOutcome, SchedulerError> {
        let status = agent_status(last);
        if timed_out {
            warn!(
                agent_id = %id,
                pid = %pid,
                timeout = ?self.launch_timeout,
                status = %status,
                "Timed out waiting for agent to start"
            );
            metrics::record_scheduler_launch("timeout");
        } else {
            metrics::record_scheduler_launch(status.as_str());
        }

        match self.store.find_by_id(id).await? {
            Some(mut agent) if agent.pid == pid => {
                agent.set_status(status);
                self.store.save(&agent).await?;
            }
            Some(_) => debug!(agent_id = %id, pid = %pid, "Agent pid changed during launch; status not recorded"),
            None => debug!(agent_id = %id, "Agent removed during launch"),
        }

        if status == AgentStatus::Error {
            return Err(SchedulerError::AgentFailed {
                id: id.to_string(),
                pid: pid.to_string(),
            });
        }
        Ok(LaunchOutcome { status, timed_out })
    }

    /// Launch and wait, with one launch window covering both steps.
    pub async fn launch_and_wait(&self, id: &str) -> Result<LaunchOutcome, SchedulerError> {
        let deadline = self.launch_deadline();
        let pid = match self.launch_agent_by(id, deadline).await {
            Ok(Launched { pid }) => pid,
            Err(SchedulerError::LaunchTimeout(_)) => {
                metrics::record_scheduler_launch("timeout");
                return Ok(LaunchOutcome {
                    status: AgentStatus::Starting,
                    timed_out: true,
                });
            }
            Err(e) => return Err(e),
        };
        self.await_launch_by(id, &pid, deadline).await
    }

    /// Stop the runtime instance of agent `id` and clear its pid.
    ///
    /// `final_state` is the last known copy of the agent, used when the store
    /// no longer holds it (the delete already happened upstream).
    pub async fn shutdown_agent(
        &self,
        id: &str,
        final_state: Option<&Agent>,
    ) -> Result<(), SchedulerError> {
        let (mut agent, stored) = match self.store.find_by_id(id).await? {
            Some(agent) => (agent, true),
            None => match final_state {
                Some(agent) => (agent.clone(), false),
                None => return Err(SchedulerError::AgentNotFound(id.to_string())),
            },
        };

        if !agent.is_running() {
            return Err(SchedulerError::NotRunning(id.to_string()));
        }

        let pid = agent.pid.clone();
        if let Err(e) = self.executor.shutdown_agent(&pid).await {
            error!(agent_id = %id, pid = %pid, error = %e, "Shutdown failed; runtime instance may be orphaned");
            return Err(e.into());
        }

        agent.mark_stopped();
        if stored {
            self.store.save(&agent).await?;
        }
        info!(agent_id = %id, pid = %pid, "Agent shut down");
        Ok(())
    }

    /// Clear the pid of every stored agent whose runtime instance is gone.
    /// Returns the number of agents corrected.
    pub async fn reconcile(&self) -> Result<usize, SchedulerError> {
        let mut corrected = 0;
        for mut agent in self.store.list_all().await? {
            if !agent.is_running() {
                continue;
            }

            let observed = match self.executor.status(&agent.pid).await {
                Ok(context) => context.status,
                Err(RuntimeError::InstanceNotFound(_)) => RuntimeStatus::Completed,
                Err(e) => {
                    warn!(agent_id = %agent.id, pid = %agent.pid, error = %e, "Unable to query runtime status");
                    continue;
                }
            };

            match observed {
                RuntimeStatus::Completed | RuntimeStatus::Error => {
                    info!(agent_id = %agent.id, pid = %agent.pid, status = %observed, "Clearing pid of stopped agent");
                    agent.mark_stopped();
                    if observed == RuntimeStatus::Error {
                        agent.set_status(AgentStatus::Error);
                    }
                    self.store.save(&agent).await?;
                    corrected += 1;
                }
                other => {
                    let status = agent_status(other);
                    if agent.status != status {
                        agent.set_status(status);
                        self.store.save(&agent).await?;
                    }
                }
            }
        }
        Ok(corrected)
    }
}

/// Informer handler that drives the [`Scheduler`] from agent events.
///
/// `on_add` launches on the dispatcher task and waits for the outcome on a
/// separate task, so a slow start does not hold up other handlers.
pub struct SchedulerHandler {
    scheduler: Arc<Scheduler>,
    launching: Arc<Mutex<HashSet<String>>>,
}

impl SchedulerHandler {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            scheduler,
            launching: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_launching(&self, id: &str) -> bool {
        self.launching.lock().contains(id)
    }
}

#[async_trait]
impl ResourceEventHandler<Agent> for SchedulerHandler {
    async fn on_add(&self, agent: &Agent) -> anyhow::Result<()> {
        let id = agent.id.clone();
        if !self.launching.lock().insert(id.clone()) {
            debug!(agent_id = %id, "Launch already in progress");
            return Ok(());
        }

        // The scheduler may keep its own store; the event carries the agent
        if let Err(e) = self.scheduler.register(agent).await {
            self.launching.lock().remove(&id);
            return Err(e.into());
        }

        let deadline = self.scheduler.launch_deadline();
        let Launched { pid } = match self.scheduler.launch_agent_by(&id, deadline).await {
            Ok(launched) => launched,
            Err(SchedulerError::AlreadyRunning { pid, .. }) => {
                self.launching.lock().remove(&id);
                debug!(agent_id = %id, pid = %pid, "Agent already running");
                return Ok(());
            }
            Err(SchedulerError::LaunchInProgress(_)) => {
                self.launching.lock().remove(&id);
                debug!(agent_id = %id, "Launch already in progress");
                return Ok(());
            }
            Err(e) => {
                self.launching.lock().remove(&id);
                return Err(e.into());
            }
        };

        let scheduler = self.scheduler.clone();
        let launching = self.launching.clone();
        tokio::spawn(async move {
            match scheduler.await_launch_by(&id, &pid, deadline).await {
                Ok(outcome) => info!(
                    agent_id = %id,
                    status = %outcome.status,
                    timed_out = outcome.timed_out,
                    "Agent launch settled"
                ),
                Err(e) => error!(agent_id = %id, error = %e, "Agent launch failed"),
            }
            launching.lock().remove(&id);
        });
        Ok(())
    }

    async fn on_update(&self, _old: &Agent, new: &Agent) -> anyhow::Result<()> {
        debug!(agent_id = %new.id, "Agent update ignored by scheduler");
        Ok(())
    }

    async fn on_delete(&self, obj: &DeletedObject<Agent>) -> anyhow::Result<()> {
        if obj.is_tombstone() {
            debug!(agent_id = %obj.key(), "Agent deletion inferred on relist");
        }
        self.scheduler
            .shutdown_agent(obj.key(), Some(obj.last_state()))
            .await?;
        Ok(())
    }
}
