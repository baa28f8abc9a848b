// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Control-plane gRPC server

use anyhow::{Context, Result};
use clap::Subcommand;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use canis_fabric_core::application::control_plane::ControlPlane;
use canis_fabric_core::application::repository_factory::Stores;
use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::infrastructure::event_bus::AgentEventBus;
use canis_fabric_core::presentation::grpc::start_grpc_server;

#[derive(Subcommand)]
pub enum ControlPlaneCommand {
    /// Serve the Admin service
    Start,
}

pub async fn handle_command(
    command: ControlPlaneCommand,
    config: &FabricConfigManifest,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        ControlPlaneCommand::Start => start(config, shutdown).await,
    }
}

async fn start(config: &FabricConfigManifest, shutdown: CancellationToken) -> Result<()> {
    let listen = &config.spec.controlplane.listen;
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid control-plane listen address: {}", listen))?;

    let stores = Stores::open(&config.storage_backend())
        .await
        .context("Failed to open agent store")?;
    let control_plane = ControlPlane::new(stores.agents, AgentEventBus::with_default_capacity());

    start_grpc_server(addr, control_plane, shutdown.cancelled_owned()).await
}
