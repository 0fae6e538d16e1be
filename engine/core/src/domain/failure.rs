// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Failure Taxonomy
//!
//! Every per-call failure observed by a caller is a [`Failure`]: a concrete
//! kind name (e.g. `StudentProcessingDependencyValidationFailure`) classified
//! into one of the taxonomy classes below, scoped to an entity and to the
//! layer (or provider) that raised it.
//!
//! | Class | Raised by | Translation |
//! |-------|-----------|-------------|
//! | `Validation` | the layer itself, for malformed input | never wrapped |
//! | `DependencyValidation` | a dependency rejected its input | wrapped, inner kept |
//! | `Dependency` | a dependency faulted opaquely | wrapped, inner usually discarded |
//! | `Service` | this layer faulted unexpectedly | catch-all |
//! | `Cancellation` | the caller cancelled | passed through untouched |
//!
//! Registration-time topology violations are not failures; they are
//! reported as [`crate::domain::topology::TopologyError`] before any traffic.
//!
//! A translated failure exclusively owns its inner chain, so the complete
//! causal history can be walked with [`Failure::chain`] or through
//! [`std::error::Error::source`].

use crate::domain::layer::LayerKind;
use crate::domain::operation::EntityName;
use crate::domain::validation::Violation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Validation,
    DependencyValidation,
    Dependency,
    Service,
    Cancellation,
}

impl FailureClass {
    /// Kind name used when a provider raises a failure of this class
    /// without naming it more precisely.
    pub fn generic_kind(&self) -> &'static str {
        match self {
            FailureClass::Validation => "ValidationFailure",
            FailureClass::DependencyValidation => "DependencyValidationFailure",
            FailureClass::Dependency => "DependencyFailure",
            FailureClass::Service => "ServiceFailure",
            FailureClass::Cancellation => "CancellationFailure",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureClass::Validation => "validation",
            FailureClass::DependencyValidation => "dependency_validation",
            FailureClass::Dependency => "dependency",
            FailureClass::Service => "service",
            FailureClass::Cancellation => "cancellation",
        };
        f.write_str(label)
    }
}

/// Where a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "layer", rename_all = "snake_case")]
pub enum FailureOrigin {
    Provider,
    Layer(LayerKind),
}

impl std::fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureOrigin::Provider => f.write_str("provider"),
            FailureOrigin::Layer(kind) => write!(f, "{}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub class: FailureClass,
    pub kind: String,
    pub entity: EntityName,
    pub origin: FailureOrigin,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<Failure>>,
}

impl Failure {
    pub fn new(
        class: FailureClass,
        kind: impl Into<String>,
        entity: EntityName,
        origin: FailureOrigin,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class,
            kind: kind.into(),
            entity,
            origin,
            message: message.into(),
            violations: vec![],
            inner: None,
        }
    }

    /// Failure raised by a capability provider, named after its class.
    pub fn provider(class: FailureClass, entity: EntityName, message: impl Into<String>) -> Self {
        Self::new(
            class,
            class.generic_kind(),
            entity,
            FailureOrigin::Provider,
            message,
        )
    }

    /// Cancellation surfaced through `next`. Never translated.
    pub fn cancelled(entity: EntityName, origin: FailureOrigin) -> Self {
        Self::new(
            FailureClass::Cancellation,
            FailureClass::Cancellation.generic_kind(),
            entity,
            origin,
            "operation was cancelled",
        )
    }

    /// Local failure named after the entity and layer, e.g.
    /// `StudentProcessingValidationFailure`.
    pub fn local(
        class: FailureClass,
        entity: EntityName,
        layer: LayerKind,
        message: impl Into<String>,
    ) -> Self {
        let kind = format!(
            "{}{}{}",
            entity,
            layer.failure_infix(),
            class.generic_kind()
        );
        Self::new(class, kind, entity, FailureOrigin::Layer(layer), message)
    }

    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }

    pub fn with_inner(mut self, inner: Failure) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub fn inner(&self) -> Option<&Failure> {
        self.inner.as_deref()
    }

    pub fn is_cancellation(&self) -> bool {
        self.class == FailureClass::Cancellation
    }

    /// Iterate from this failure down to the root cause.
    pub fn chain(&self) -> impl Iterator<Item = &Failure> {
        std::iter::successors(Some(self), |failure| failure.inner())
    }

    /// Number of wrappers above the root cause.
    pub fn wrapper_depth(&self) -> usize {
        self.chain().count() - 1
    }

    pub fn root_cause(&self) -> &Failure {
        self.chain().last().unwrap_or(self)
    }
}
