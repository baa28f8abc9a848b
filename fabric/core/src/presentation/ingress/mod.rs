// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ingress Gateway
//!
//! Terminates DIDComm traffic at the edge and spools it onto the ingress
//! queue. Two listeners share one [`Publisher`]:
//!
//! | Listener | Accepts | Queue message |
//! |----------|---------|---------------|
//! | HTTP | `POST` with `Content-Type: application/didcomm-envelope-enc` | body verbatim |
//! | WebSocket | any upgrade, binary or text frames | frame verbatim |
//!
//! HTTP checks run in a fixed order: method (405), content type (415),
//! declared length (400), body read (500). Queue messages are labelled
//! `application/json`; the inbound content type travels as the
//! `x-original-content-type` header.
//!
//! Publishing is fire-and-forget from the peer's point of view.

pub mod http;
pub mod ws;

use axum::Router;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::config::FabricConfigManifest;
use crate::domain::queue::Publisher;

/// Interval between keepalive pings on sessions that ping.
pub const PING_FREQUENCY: Duration = Duration::from_secs(30);

/// Which WebSocket sessions send keepalive pings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeepalivePolicy {
    /// Only sessions we open ping; accepted sessions rely on the peer.
    #[default]
    OutboundOnly,
    /// Accepted sessions ping as well.
    Symmetric,
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("ingress listener failed: {0}")]
    Serve(#[source] io::Error),

    #[error("unable to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
}

pub struct IngressGateway {
    publisher: Arc<dyn Publisher>,
    http_addr: String,
    ws_addr: String,
    keepalive: KeepalivePolicy,
}

impl IngressGateway {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        http_addr: impl Into<String>,
        ws_addr: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            http_addr: http_addr.into(),
            ws_addr: ws_addr.into(),
            keepalive: KeepalivePolicy::default(),
        }
    }

    pub fn from_config(publisher: Arc<dyn Publisher>, config: &FabricConfigManifest) -> Self {
        Self::new(publisher, config.http_address(), config.ws_address())
    }

    pub fn with_keepalive(mut self, keepalive: KeepalivePolicy) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn http_router(&self) -> Router {
        http::router(self.publisher.clone())
    }

    pub fn ws_router(&self, shutdown: CancellationToken) -> Router {
        ws::router(
            self.publisher.clone(),
            self.keepalive == KeepalivePolicy::Symmetric,
            shutdown,
        )
    }

    /// Bind both listeners and serve until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), IngressError> {
        let http = bind(&self.http_addr).await?;
        let ws = bind(&self.ws_addr).await?;
        self.serve_on(http, ws, shutdown).await
    }

    /// Serve on already bound listeners until `shutdown` is cancelled.
    pub async fn serve_on(
        self,
        http: TcpListener,
        ws: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), IngressError> {
        if let Ok(addr) = http.local_addr() {
            info!(%addr, "Listening for HTTP DIDComm messages");
        }
        if let Ok(addr) = ws.local_addr() {
            info!(%addr, keepalive = ?self.keepalive, "Listening for WS DIDComm messages");
        }

        let http_server = axum::serve(http, self.http_router())
            .with_graceful_shutdown(shutdown.clone().cancelled_owned());
        let ws_server = axum::serve(ws, self.ws_router(shutdown.clone()))
            .with_graceful_shutdown(shutdown.clone().cancelled_owned());

        tokio::try_join!(
            async { http_server.await.map_err(IngressError::Serve) },
            async { ws_server.await.map_err(IngressError::Serve) },
        )?;

        info!("Ingress gateway stopped");
        Ok(())
    }

    /// Open an outbound session to a peer; its frames land on the same queue.
    pub async fn connect_outbound(
        &self,
        url: &str,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, IngressError> {
        ws::connect_outbound(url, self.publisher.clone(), PING_FREQUENCY, shutdown).await
    }
}

async fn bind(addr: &str) -> Result<TcpListener, IngressError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| IngressError::Bind {
            addr: addr.to_string(),
            source,
        })
}
