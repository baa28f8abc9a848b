// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Queue broker adapters.
//!
//! - [`rabbitmq`]: AMQP 0-9-1 via `lapin`, used by every deployed process
//! - [`memory`]: bounded in-process channels for tests and single-binary runs

pub mod memory;
pub mod rabbitmq;

pub use memory::{InMemoryBroker, MemoryListener, MemoryPublisher};
pub use rabbitmq::{RabbitListener, RabbitPublisher};
