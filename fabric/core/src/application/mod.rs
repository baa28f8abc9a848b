// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod connection;
pub mod control_plane;
pub mod notifier;
pub mod repository_factory;
pub mod scheduler;

// Re-export services for convenience
pub use connection::{establish_connection, ConnectionClient, ConnectionError};
pub use control_plane::{ControlPlane, ControlPlaneError};
pub use notifier::{Notifier, NotifierError};
pub use repository_factory::Stores;
pub use scheduler::{LaunchOutcome, Launched, Scheduler, SchedulerError, SchedulerHandler};
