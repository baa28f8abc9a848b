// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`canis-fabric-core`)
//!
//! Network surfaces that translate external traffic into application calls.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`ingress`] | HTTP + WebSocket (Axum) | DIDComm edge; spools envelopes onto the ingress queue |
//! | [`grpc`] | gRPC (Tonic) | Control-plane `Admin` service streamed by agent informers |

pub mod grpc;
pub mod ingress;
