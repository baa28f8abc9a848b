// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for the event fabric.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Records, capability traits and error types shared by every
//!   fabric component. Nothing here performs I/O.

pub mod agent;
pub mod config;
pub mod envelope;
pub mod notification;
pub mod queue;
pub mod repository;
pub mod resource;
pub mod runtime;
