// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig, Mount, MountTypeEnum};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, InspectContainerOptions, RemoveContainerOptionsBuilder,
    StartContainerOptions,
};
use bollard::Docker;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::runtime::{
    Executor, RuntimeContext, RuntimeError, RuntimeEvent, RuntimeStatus, Watcher,
};

const AGENT_CONFIG_DIR: &str = "/etc/canis";
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Consecutive inspect failures a watch tolerates before reporting Error.
const MAX_INSPECT_FAILURES: u32 = 3;

/// Container name for an agent id.
pub fn agent_container_name(agent_id: &str) -> String {
    format!("canis_agent_{}", agent_id)
}

/// Map Docker's container state onto the executor's status model.
pub fn runtime_status(state: Option<ContainerStateStatusEnum>, exit_code: Option<i64>) -> RuntimeStatus {
    match state {
        Some(ContainerStateStatusEnum::CREATED) | Some(ContainerStateStatusEnum::RESTARTING) => {
            RuntimeStatus::Starting
        }
        Some(ContainerStateStatusEnum::RUNNING) | Some(ContainerStateStatusEnum::PAUSED) => {
            RuntimeStatus::Running
        }
        Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::REMOVING) => {
            match exit_code {
                Some(0) | None => RuntimeStatus::Completed,
                Some(_) => RuntimeStatus::Error,
            }
        }
        Some(ContainerStateStatusEnum::DEAD) => RuntimeStatus::Error,
        _ => RuntimeStatus::Pending,
    }
}

/// Run of failed `inspect_container` calls during a watch.
#[derive(Debug, Default)]
struct InspectFailures {
    consecutive: u32,
}

impl InspectFailures {
    /// Status to report for a failed inspect, or `None` to skip the tick.
    /// A missing container is decisive; other failures only once they repeat.
    fn record(&mut self, not_found: bool) -> Option<RuntimeStatus> {
        self.consecutive += 1;
        if not_found || self.consecutive >= MAX_INSPECT_FAILURES {
            Some(RuntimeStatus::Error)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[derive(Clone)]
pub struct DockerExecutor {
    docker: Docker,
    image: String,
    home: String,
}

impl DockerExecutor {
    pub fn new(image: String, home: String, socket_path: Option<String>) -> Result<Self, RuntimeError> {
        let docker = match socket_path {
            Some(path) => Docker::connect_with_unix(&path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    RuntimeError::SpawnFailed(format!(
                        "Failed to connect to Docker at {}: {}\n\n\
                         Ensure Docker is running and the socket path is correct.",
                        path, e
                    ))
                })?,
            None => Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::SpawnFailed(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Check that the daemon is running (docker ps) and that the\n\
                     current user can access /var/run/docker.sock.",
                    e
                ))
            })?,
        };

        Ok(Self { docker, image, home })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(|e| {
            RuntimeError::SpawnFailed(format!(
                "Cannot connect to Docker daemon: {}\n\nVerify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<RuntimeContext, DockerError> {
        let inspect = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await?;
        let pid = inspect
            .id
            .as_deref()
            .map(|id| id.chars().take(12).collect())
            .unwrap_or_else(|| name.to_string());
        let (state, exit_code) = inspect
            .state
            .map(|s| (s.status, s.exit_code))
            .unwrap_or((None, None));
        Ok(RuntimeContext::new(pid, runtime_status(state, exit_code)))
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        self.docker.remove_container(name, Some(options)).await
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    async fn launch_agent(&self, agent_id: &str) -> Result<String, RuntimeError> {
        let name = agent_container_name(agent_id);

        // A leftover container with the same name blocks creation
        match self.inspect(&name).await {
            Ok(ctx) if ctx.status == RuntimeStatus::Running => {
                return Err(RuntimeError::AlreadyRunning(name));
            }
            Ok(_) => {
                if let Err(e) = self.remove(&name).await {
                    debug!(container = %name, error = %e, "Stale agent container not removed");
                }
            }
            Err(_) => {}
        }

        let host_config = HostConfig {
            mounts: Some(vec![Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(self.home.clone()),
                target: Some(AGENT_CONFIG_DIR.to_string()),
                ..Default::default()
            }]),
            auto_remove: Some(false),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(self.image.clone()),
            cmd: Some(vec![
                "agent".to_string(),
                "start".to_string(),
                "--id".to_string(),
                agent_id.to_string(),
            ]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default().name(&name).build();
        let res = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| RuntimeError::SpawnFailed(format!("unable to create container for agent: {}", e)))?;

        self.docker
            .start_container(&res.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| RuntimeError::SpawnFailed(format!("unable to start agent: {}", e)))?;

        let pid: String = res.id.chars().take(12).collect();
        info!(agent_id, pid = %pid, "Launched agent container");
        Ok(pid)
    }

    async fn shutdown_agent(&self, pid: &str) -> Result<(), RuntimeError> {
        match self.remove(pid).await {
            Ok(()) => {
                info!(pid, "Removed agent container");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(pid, "Agent container already gone");
                Ok(())
            }
            Err(e) => Err(RuntimeError::TerminationFailed(e.to_string())),
        }
    }

    async fn status(&self, pid: &str) -> Result<RuntimeContext, RuntimeError> {
        self.inspect(pid).await.map_err(|e| {
            if is_not_found(&e) {
                RuntimeError::InstanceNotFound(pid.to_string())
            } else {
                RuntimeError::WatchFailed(e.to_string())
            }
        })
    }

    async fn watch(&self, pid: &str) -> Result<Watcher, RuntimeError> {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let executor = self.clone();
        let pid = pid.to_string();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut last: Option<RuntimeStatus> = None;
            let mut failures = InspectFailures::default();
            let mut ticker = tokio::time::interval(WATCH_POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let ctx = match executor.inspect(&pid).await {
                    Ok(ctx) => {
                        failures.reset();
                        ctx
                    }
                    Err(e) => {
                        warn!(pid = %pid, error = %e, failures = failures.consecutive + 1, "Unable to inspect agent container");
                        match failures.record(is_not_found(&e)) {
                            Some(status) => RuntimeContext::new(pid.clone(), status),
                            None => continue,
                        }
                    }
                };

                if last == Some(ctx.status) {
                    continue;
                }
                last = Some(ctx.status);
                let terminal = matches!(ctx.status, RuntimeStatus::Error | RuntimeStatus::Completed);
                if tx.send(RuntimeEvent { runtime_context: ctx }).await.is_err() || terminal {
                    break;
                }
            }
            debug!(pid = %pid, "Container watch ended");
        });

        Ok(Watcher::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name() {
        assert_eq!(agent_container_name("a1"), "canis_agent_a1");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            runtime_status(Some(ContainerStateStatusEnum::CREATED), None),
            RuntimeStatus::Starting
        );
        assert_eq!(
            runtime_status(Some(ContainerStateStatusEnum::RUNNING), None),
            RuntimeStatus::Running
        );
        assert_eq!(
            runtime_status(Some(ContainerStateStatusEnum::EXITED), Some(0)),
            RuntimeStatus::Completed
        );
        assert_eq!(
            runtime_status(Some(ContainerStateStatusEnum::EXITED), Some(137)),
            RuntimeStatus::Error
        );
        assert_eq!(
            runtime_status(Some(ContainerStateStatusEnum::DEAD), None),
            RuntimeStatus::Error
        );
        assert_eq!(runtime_status(None, None), RuntimeStatus::Pending);
    }

    #[test]
    fn test_transient_inspect_failures_are_skipped() {
        let mut failures = InspectFailures::default();
        assert_eq!(failures.record(false), None);
        assert_eq!(failures.record(false), None);
        failures.reset();
        assert_eq!(failures.record(false), None);
        assert_eq!(failures.record(false), None);
        assert_eq!(failures.record(false), Some(RuntimeStatus::Error));
    }

    #[test]
    fn test_missing_container_is_an_error_at_once() {
        let mut failures = InspectFailures::default();
        assert_eq!(failures.record(true), Some(RuntimeStatus::Error));
    }
}
