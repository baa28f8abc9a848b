// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for canis-fabric-core
//!
//! Compiles the control-plane Protocol Buffer definitions used by the agent
//! informer (client side) and the admin service (server side).
//!
//! # Compilation Targets
//!
//! - `../../proto/canis_admin.proto` - `Admin` service with the `WatchAgents`
//!   server stream and the agent CRUD calls
//!
//! Generated code is placed in `OUT_DIR` and included via `tonic::include_proto!`
//! in `src/infrastructure/control_plane_proto.rs`.
//!
//! # Dependencies
//!
//! - **protoc**: Protocol buffer compiler (vendored via `protoc-bin-vendored`)
//! - **tonic-prost-build**: Code generator for Rust gRPC stubs

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point prost at the vendored protoc binary so builds do not depend on a system install
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["../../proto/canis_admin.proto"], &["../../proto"])?;

    println!("cargo:rerun-if-changed=../../proto/canis_admin.proto");

    Ok(())
}
