// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types and pure domain services of the engine: operations, layer
//! descriptors, the failure taxonomy, mapping tables, the validation scope
//! engine, the topology registry and the ports to external collaborators.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Owns every invariant the engine enforces

pub mod operation;
pub mod layer;
pub mod failure;
pub mod mapping;
pub mod validation;
pub mod topology;
pub mod policy;
pub mod provider;
pub mod events;
pub mod engine_config;
