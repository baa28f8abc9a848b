// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! DIDComm ingress gateway
//!
//! Accepts envelopes over HTTP and WebSocket and spools them onto the
//! `didcomm-msgs` queue.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::domain::envelope::DIDCOMM_QUEUE;
use canis_fabric_core::infrastructure::queue::RabbitPublisher;
use canis_fabric_core::presentation::ingress::{IngressGateway, KeepalivePolicy};

#[derive(Subcommand)]
pub enum IngressCommand {
    /// Start the HTTP and WebSocket listeners
    Start {
        /// Also ping inbound WebSocket peers
        #[arg(long)]
        symmetric_keepalive: bool,

        /// Peer WebSocket URL to dial out to (repeatable)
        #[arg(long = "outbound", value_name = "URL")]
        outbound: Vec<String>,
    },
}

pub async fn handle_command(
    command: IngressCommand,
    config: &FabricConfigManifest,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        IngressCommand::Start {
            symmetric_keepalive,
            outbound,
        } => start(config, symmetric_keepalive, outbound, shutdown).await,
    }
}

async fn start(
    config: &FabricConfigManifest,
    symmetric_keepalive: bool,
    outbound: Vec<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    let publisher = RabbitPublisher::connect(&config.amqp_address(), DIDCOMM_QUEUE)
        .await
        .context("Failed to connect ingress publisher")?;

    let keepalive = if symmetric_keepalive {
        KeepalivePolicy::Symmetric
    } else {
        KeepalivePolicy::OutboundOnly
    };
    let gateway = IngressGateway::from_config(Arc::new(publisher), config).with_keepalive(keepalive);

    let mut sessions = Vec::with_capacity(outbound.len());
    for url in &outbound {
        let session = gateway
            .connect_outbound(url, shutdown.clone())
            .await
            .with_context(|| format!("Failed to open outbound session to {}", url))?;
        sessions.push(session);
    }

    gateway.serve(shutdown).await.context("Ingress gateway failed")?;

    let failed_sessions = join_sessions(sessions).await;
    info!(failed_sessions, "Ingress stopped");
    Ok(())
}

/// Wait for every outbound session. Returns how many ended abnormally.
async fn join_sessions(sessions: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for session in sessions {
        if let Err(e) = session.await {
            warn!(error = %e, "Outbound session task failed");
            failed += 1;
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicked_session_is_counted() {
        let sessions = vec![
            tokio::spawn(async {}),
            tokio::spawn(async { panic!("session blew up") }),
        ];
        assert_eq!(join_sessions(sessions).await, 1);
    }
}
