// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod control_plane_proto;
pub mod db;
pub mod event_bus;
pub mod informer;
pub mod metrics;
pub mod queue;
pub mod repositories;
pub mod runtime;
pub mod webhook_client;

pub use event_bus::AgentEventBus;
pub use runtime::DockerExecutor;
