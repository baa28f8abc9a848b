// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Canis fabric CLI

pub mod agent;
pub mod config;
pub mod control_plane;
pub mod db;
pub mod ingress;
pub mod notifier;
pub mod scheduler;

pub use self::agent::AgentCommand;
pub use self::config::ConfigCommand;
pub use self::control_plane::ControlPlaneCommand;
pub use self::db::DbCommand;
pub use self::ingress::IngressCommand;
pub use self::notifier::NotifierCommand;
pub use self::scheduler::SchedulerCommand;
