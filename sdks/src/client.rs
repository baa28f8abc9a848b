// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use canis_fabric_core::domain::agent::Agent;
use canis_fabric_core::domain::config::FabricConfigManifest;
use canis_fabric_core::infrastructure::control_plane_proto::canis::admin::v1 as pb;
use canis_fabric_core::infrastructure::informer::{
    AgentStreamAdapter, BackoffConfig, InformerError, SharedResourceInformer,
};
use pb::admin_client::AdminClient;
use thiserror::Error;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid control-plane endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("control-plane call failed: {0}")]
    Call(#[from] tonic::Status),

    #[error(transparent)]
    Informer(#[from] InformerError),
}

/// Client for the Canis fabric control plane.
///
/// The connection is lazy: construction never touches the network, and
/// an unreachable server surfaces on the first call (or, for the informer,
/// as reconnect attempts).
pub struct CanisClient {
    endpoint: String,
    admin: AdminClient<Channel>,
    backoff: BackoffConfig,
    agent_informer: OnceCell<Arc<SharedResourceInformer<Agent>>>,
}

impl CanisClient {
    /// Create a client for the control plane at `endpoint`
    /// (e.g. `http://127.0.0.1:7778`).
    pub fn connect(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let endpoint = endpoint.into();
        let channel = Endpoint::from_shared(endpoint.clone())
            .map_err(|e| ClientError::Endpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?
            .connect_lazy();

        Ok(Self {
            endpoint,
            admin: AdminClient::new(channel),
            backoff: BackoffConfig::default(),
            agent_informer: OnceCell::new(),
        })
    }

    pub fn from_config(config: &FabricConfigManifest) -> Result<Self, ClientError> {
        Self::connect(config.spec.controlplane.endpoint.clone())
    }

    /// Reconnect policy for informers created by this client.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The agent informer shared by every caller of this client.
    ///
    /// Created on first use; the watch stream starts immediately but events
    /// queue until someone calls [`SharedResourceInformer::run`].
    pub async fn agent_informer(
        &self,
    ) -> Result<Arc<SharedResourceInformer<Agent>>, ClientError> {
        let informer = self
            .agent_informer
            .get_or_try_init(|| async {
                debug!(endpoint = %self.endpoint, "Creating shared agent informer");
                let adapter = AgentStreamAdapter::new(self.admin.clone(), self.backoff.clone());
                SharedResourceInformer::new(adapter).map(Arc::new)
            })
            .await?;
        Ok(informer.clone())
    }

    pub async fn create_agent(
        &self,
        id: &str,
        name: &str,
        public_did: bool,
    ) -> Result<Agent, ClientError> {
        let response = self
            .admin
            .clone()
            .create_agent(pb::CreateAgentRequest {
                id: id.to_string(),
                name: name.to_string(),
                public_did,
            })
            .await?;
        Ok(response.into_inner().into())
    }

    pub async fn delete_agent(&self, id: &str) -> Result<(), ClientError> {
        self.admin
            .clone()
            .delete_agent(pb::DeleteAgentRequest { id: id.to_string() })
            .await?;
        Ok(())
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        let response = self.admin.clone().list_agents(pb::ListAgentsRequest {}).await?;
        Ok(response
            .into_inner()
            .agents
            .into_iter()
            .map(Agent::from)
            .collect())
    }
}
