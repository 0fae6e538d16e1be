// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Logical Operations
//!
//! A [`LogicalOperation`] names *what* a caller asks a layer to do: the entity
//! it concerns, the verb, and the operation shape. Operations are immutable
//! once built and live only for the duration of one call.
//!
//! | Shape | Meaning |
//! |-------|---------|
//! | `PassThrough` | forwards one call with no logic beyond validation/translation |
//! | `Combination` | two or more primitive calls producing one outcome |
//! | `Shifter` | turns one primitive result into a different primitive result |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verbs issued by the layer services against their dependencies.
pub mod verbs {
    pub const ENSURE_EXISTS: &str = "ensure-exists";
    pub const UPSERT: &str = "upsert";
    pub const VERIFY_EXISTS: &str = "verify-exists";
    pub const REMOVE: &str = "remove";
    pub const RETRIEVE_BY_ID: &str = "retrieve-by-id";
    pub const RETRIEVE_ALL: &str = "retrieve-all";
    pub const ADD: &str = "add";
    pub const MODIFY: &str = "modify";
    pub const REMOVE_BY_ID: &str = "remove-by-id";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("Entity name cannot be empty")]
    EmptyEntityName,

    #[error("Operation verb cannot be empty")]
    EmptyVerb,
}

/// Name of a business entity (e.g. `Student`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName(String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> Result<Self, OperationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(OperationError::EmptyEntityName);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityName {
    type Error = OperationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityName> for String {
    fn from(value: EntityName) -> Self {
        value.0
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationShape {
    Shifter,
    Combination,
    PassThrough,
}

impl std::fmt::Display for OperationShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationShape::Shifter => "shifter",
            OperationShape::Combination => "combination",
            OperationShape::PassThrough => "pass_through",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOperation {
    entity: EntityName,
    verb: String,
    shape: OperationShape,
}

impl LogicalOperation {
    pub fn new(
        entity: EntityName,
        verb: impl Into<String>,
        shape: OperationShape,
    ) -> Result<Self, OperationError> {
        let verb = verb.into();
        if verb.trim().is_empty() {
            return Err(OperationError::EmptyVerb);
        }
        Ok(Self {
            entity,
            verb: verb.trim().to_string(),
            shape,
        })
    }

    /// Shorthand for a single forwarded primitive call.
    pub fn pass_through(entity: EntityName, verb: &str) -> Self {
        Self {
            entity,
            verb: verb.to_string(),
            shape: OperationShape::PassThrough,
        }
    }

    pub fn with_shape(mut self, shape: OperationShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn shape(&self) -> OperationShape {
        self.shape
    }
}

impl std::fmt::Display for LogicalOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{} ({})", self.entity, self.verb, self.shape)
    }
}
