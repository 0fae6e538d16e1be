// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strata Core
//!
//! Layer-composition and failure-taxonomy translation engine.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Certify layer topologies, scope validation per call-site and
//!   translate failures exactly once per layer boundary

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
