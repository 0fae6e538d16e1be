// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capability Provider
//!
//! Domain port for the opaque operation sources (brokers, data stores) that
//! foundation layers sit on. The engine never inspects provider internals:
//! it hands over an operation name and a payload and receives either a
//! result or a [`Failure`] raised with [`crate::domain::failure::FailureOrigin::Provider`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary to external capability providers

use crate::domain::failure::Failure;
use async_trait::async_trait;
use serde_json::Value;

/// Opaque capability source invoked by the bottom-most layer.
///
/// Implementations signal "nothing found" for lookups by returning
/// `Value::Null`, and raise a [`Failure`] for everything that went wrong.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn invoke(&self, operation_name: &str, payload: Value) -> Result<Value, Failure>;
}
