// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent scheduler
//!
//! Watches the control plane and launches or stops one container per agent.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use canis_fabric_core::application::repository_factory::Stores;
use canis_fabric_core::application::scheduler::{Scheduler, SchedulerHandler};
use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::domain::repository::StorageBackend;
use canis_fabric_core::infrastructure::DockerExecutor;
use canis_fabric_sdk::CanisClient;

#[derive(Subcommand)]
pub enum SchedulerCommand {
    /// Start scheduling agents
    Start {
        /// Clear stale pids before watching
        #[arg(long)]
        reconcile: bool,

        /// Docker socket path (default: local defaults)
        #[arg(long, env = "CANIS_DOCKER_SOCKET", value_name = "PATH")]
        docker_socket: Option<String>,
    },
}

pub async fn handle_command(
    command: SchedulerCommand,
    config: &FabricConfigManifest,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        SchedulerCommand::Start {
            reconcile,
            docker_socket,
        } => start(config, reconcile, docker_socket, shutdown).await,
    }
}

async fn start(
    config: &FabricConfigManifest,
    reconcile: bool,
    docker_socket: Option<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    let settings = &config.spec.scheduler;
    let executor = DockerExecutor::new(settings.image.clone(), settings.home.clone(), docker_socket)?;
    executor.healthcheck().await?;

    let backend = config.storage_backend();
    if matches!(backend, StorageBackend::InMemory) {
        warn!("Scheduler is using an in-memory agent store; agents are tracked from control-plane events and pids are lost on restart");
    }
    let stores = Stores::open(&backend)
        .await
        .context("Failed to open agent store")?;

    let scheduler = Arc::new(
        Scheduler::new(stores.agents, Arc::new(executor)).with_launch_timeout(settings.launch_timeout()),
    );

    if reconcile || settings.reconcile_on_start {
        let cleared = scheduler.reconcile().await.context("Reconcile failed")?;
        info!(cleared, "Reconciled agent pids");
    }

    let client = CanisClient::from_config(config)?;
    let informer = client.agent_informer().await?;
    informer
        .add_event_handler(Arc::new(SchedulerHandler::new(scheduler)))
        .await;

    info!(endpoint = client.endpoint(), "Scheduler watching agents");
    informer.run(shutdown).await;
    informer.close();
    Ok(())
}
