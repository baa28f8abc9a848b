// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Canis Fabric Core
//!
//! The control-plane event fabric: DIDComm ingress, webhook notifier, agent
//! informer and scheduler.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, infrastructure adapters
//!   and network surfaces, layered `domain` → `application` →
//!   `infrastructure` / `presentation`

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::agent::{Agent, AgentEvent, AgentStatus};
pub use domain::config::FabricConfigManifest;
pub use domain::notification::{EventMessage, Notification, Webhook};
pub use domain::queue::{Delivery, Listener, Publisher, QueueError};
pub use domain::resource::{DeletedObject, ResourceEvent, ResourceEventHandler};
