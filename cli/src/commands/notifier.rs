// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Webhook notifier
//!
//! Consumes notifications and POSTs them to every webhook registered for
//! their topic.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use canis_fabric_core::application::notifier::Notifier;
use canis_fabric_core::application::repository_factory::Stores;
use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::infrastructure::queue::RabbitListener;

#[derive(Subcommand)]
pub enum NotifierCommand {
    /// Start consuming the notification queue
    Start,
}

pub async fn handle_command(
    command: NotifierCommand,
    config: &FabricConfigManifest,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        NotifierCommand::Start => start(config, shutdown).await,
    }
}

async fn start(config: &FabricConfigManifest, shutdown: CancellationToken) -> Result<()> {
    let queue = &config.spec.notifier.queue;
    let listener = RabbitListener::connect(&config.amqp_address(), queue)
        .await
        .with_context(|| format!("Failed to connect to notification queue {}", queue))?;

    let stores = Stores::open(&config.storage_backend())
        .await
        .context("Failed to open webhook store")?;

    // Nobody consumes `errors()` here, so soft errors go to the log.
    let notifier = Notifier::from_config(Arc::new(listener), stores.webhooks, &config.spec.notifier)?;
    notifier.start(shutdown).await.context("Notifier stopped")?;
    Ok(())
}
