// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Layer Descriptors
//!
//! A [`LayerDescriptor`] declares one logical service: its layer kind, the
//! entity it serves and the ordered list of layers it depends on. Descriptors
//! are values; the composition rules they must satisfy live in
//! [`crate::domain::topology`].

use crate::domain::operation::EntityName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Foundation,
    Processing,
    Orchestration,
    Coordination,
    Aggregation,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Foundation,
        LayerKind::Processing,
        LayerKind::Orchestration,
        LayerKind::Coordination,
        LayerKind::Aggregation,
    ];

    /// Infix used when naming failures local to this layer.
    ///
    /// Foundation failures carry no infix (`StudentValidationFailure`), every
    /// other layer inserts its own name (`StudentProcessingValidationFailure`).
    pub fn failure_infix(&self) -> &'static str {
        match self {
            LayerKind::Foundation => "",
            LayerKind::Processing => "Processing",
            LayerKind::Orchestration => "Orchestration",
            LayerKind::Coordination => "Coordination",
            LayerKind::Aggregation => "Aggregation",
        }
    }

    /// Distance from the capability provider. Higher is further out.
    pub fn depth(&self) -> u8 {
        match self {
            LayerKind::Foundation => 0,
            LayerKind::Processing => 1,
            LayerKind::Orchestration => 2,
            LayerKind::Coordination => 3,
            LayerKind::Aggregation => 4,
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LayerKind::Foundation => "foundation",
            LayerKind::Processing => "processing",
            LayerKind::Orchestration => "orchestration",
            LayerKind::Coordination => "coordination",
            LayerKind::Aggregation => "aggregation",
        };
        f.write_str(label)
    }
}

/// Reference to another registered descriptor, keyed by `(kind, entity)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerRef {
    pub kind: LayerKind,
    pub entity: EntityName,
}

impl LayerRef {
    pub fn new(kind: LayerKind, entity: EntityName) -> Self {
        Self { kind, entity }
    }
}

impl std::fmt::Display for LayerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.entity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub kind: LayerKind,
    pub entity: EntityName,
    #[serde(default)]
    pub dependencies: Vec<LayerRef>,
}

impl LayerDescriptor {
    pub fn foundation(entity: EntityName) -> Self {
        Self {
            kind: LayerKind::Foundation,
            entity,
            dependencies: vec![],
        }
    }

    /// Processing descriptor bound to the foundation of the same entity.
    pub fn processing(entity: EntityName) -> Self {
        Self {
            kind: LayerKind::Processing,
            dependencies: vec![LayerRef::new(LayerKind::Foundation, entity.clone())],
            entity,
        }
    }

    pub fn new(kind: LayerKind, entity: EntityName, dependencies: Vec<LayerRef>) -> Self {
        Self {
            kind,
            entity,
            dependencies,
        }
    }

    pub fn key(&self) -> LayerRef {
        LayerRef::new(self.kind, self.entity.clone())
    }
}
