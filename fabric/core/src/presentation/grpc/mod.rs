// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Control-plane gRPC surface.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Serves the `canis.admin.v1.Admin` service the agent informer watches

pub mod server;

pub use server::{serve_grpc, start_grpc_server, AdminService};
