// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC Server Implementation for the control-plane Admin service
//! Exposes WatchAgents, CreateAgent, DeleteAgent, ListAgents

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::application::control_plane::{ControlPlane, ControlPlaneError};
use crate::infrastructure::control_plane_proto::canis::admin::v1 as pb;
use crate::infrastructure::control_plane_proto::synced_marker;
use crate::infrastructure::event_bus::EventBusError;

use pb::admin_server::{Admin, AdminServer};

/// Per-watcher buffer between the bus subscription and the gRPC stream.
const WATCH_BUFFER: usize = 128;

fn to_status(err: ControlPlaneError) -> Status {
    match err {
        ControlPlaneError::AgentExists(_) => Status::already_exists(err.to_string()),
        ControlPlaneError::AgentNotFound(_) => Status::not_found(err.to_string()),
        ControlPlaneError::EmptyId => Status::invalid_argument(err.to_string()),
        ControlPlaneError::Repository(_) => Status::internal(err.to_string()),
    }
}

/// Implementation of the Admin gRPC service
#[derive(Clone)]
pub struct AdminService {
    control_plane: ControlPlane,
}

impl AdminService {
    pub fn new(control_plane: ControlPlane) -> Self {
        Self { control_plane }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> AdminServer<Self> {
        AdminServer::new(self)
    }
}

#[tonic::async_trait]
impl Admin for AdminService {
    type WatchAgentsStream = ReceiverStream<Result<pb::AgentEvent, Status>>;

    /// Snapshot, SYNCED, then live events. A watcher that falls behind the
    /// bus is disconnected; its relist on reconnect restores consistency.
    async fn watch_agents(
        &self,
        _request: Request<pb::WatchRequest>,
    ) -> Result<Response<Self::WatchAgentsStream>, Status> {
        let (snapshot, mut events) = self.control_plane.watch().await.map_err(to_status)?;
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        debug!(agents = snapshot.len(), "Agent watcher connected");

        tokio::spawn(async move {
            for agent in &snapshot {
                let add = pb::AgentEvent {
                    r#type: pb::agent_event::Type::Add as i32,
                    old: None,
                    new: Some(agent.into()),
                };
                if tx.send(Ok(add)).await.is_err() {
                    return;
                }
            }
            if tx.send(Ok(synced_marker())).await.is_err() {
                return;
            }

            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => {
                        if tx.send(Ok((&event).into())).await.is_err() {
                            break;
                        }
                    }
                    Err(EventBusError::Lagged(skipped)) => {
                        warn!(skipped, "Agent watcher lagged; disconnecting");
                        let _ = tx
                            .send(Err(Status::data_loss(format!(
                                "watcher lagged by {skipped} events"
                            ))))
                            .await;
                        break;
                    }
                    Err(_) => break,
                }
            }
            debug!("Agent watcher disconnected");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn create_agent(
        &self,
        request: Request<pb::CreateAgentRequest>,
    ) -> Result<Response<pb::Agent>, Status> {
        let req = request.into_inner();
        let agent = self
            .control_plane
            .create_agent(&req.id, &req.name, req.public_did)
            .await
            .map_err(to_status)?;
        Ok(Response::new((&agent).into()))
    }

    async fn delete_agent(
        &self,
        request: Request<pb::DeleteAgentRequest>,
    ) -> Result<Response<pb::DeleteAgentResponse>, Status> {
        let req = request.into_inner();
        self.control_plane
            .delete_agent(&req.id)
            .await
            .map_err(to_status)?;
        Ok(Response::new(pb::DeleteAgentResponse {}))
    }

    async fn list_agents(
        &self,
        _request: Request<pb::ListAgentsRequest>,
    ) -> Result<Response<pb::ListAgentsResponse>, Status> {
        let agents = self.control_plane.list_agents().await.map_err(to_status)?;
        Ok(Response::new(pb::ListAgentsResponse {
            agents: agents.iter().map(pb::Agent::from).collect(),
        }))
    }
}

/// Start the gRPC server on `addr` until `shutdown` resolves.
pub async fn start_grpc_server(
    addr: SocketAddr,
    control_plane: ControlPlane,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_grpc(listener, control_plane, shutdown).await
}

/// Serve the Admin service on an already bound listener.
pub async fn serve_grpc(
    listener: TcpListener,
    control_plane: ControlPlane,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    info!("Starting control-plane gRPC server on {}", listener.local_addr()?);

    tonic::transport::Server::builder()
        .add_service(AdminService::new(control_plane).into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    Ok(())
}
