// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Canis Fabric Rust SDK
//!
//! Talk to the control plane and watch its agents.

pub mod client;

pub use canis_fabric_core::domain::agent::{Agent, AgentStatus};
pub use canis_fabric_core::domain::resource::{
    DeletedObject, ResourceEventHandler, ResourceEventHandlerFuncs,
};
pub use canis_fabric_core::infrastructure::informer::{BackoffConfig, SharedResourceInformer};
pub use client::{CanisClient, ClientError};
