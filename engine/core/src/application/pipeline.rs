// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Layer Invocation Pipeline
//!
//! Wraps every call into a layer with validation on the way in and failure
//! translation on the way out.
//!
//! ```text
//! Pending → Validating ─┬─ ValidationFailed ──────────────┐
//!                       ├─ Validated → Invoking ─┬─ Succeeded ─┤→ Terminal
//!                       │                        └─ Faulted ───┤
//!                       └─ Faulted (rule set fault) ───────────┘
//! ```
//!
//! Invalid input produces a failure local to the layer and `next` never runs.
//! Failures returned by `next` are translated exactly once with the layer's
//! mapping table. The only suspension point is the await on `next`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `ValidationEngine`, `TaxonomyMapper`, `LayerPolicy`

use crate::application::taxonomy_mapper::TaxonomyMapper;
use crate::domain::failure::{Failure, FailureClass};
use crate::domain::layer::LayerRef;
use crate::domain::operation::LogicalOperation;
use crate::domain::policy::LayerPolicy;
use crate::domain::validation::{ValidationEngine, ValidationOutcome, ValidationScope};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, trace, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Pending,
    Validating,
    ValidationFailed,
    Validated,
    Invoking,
    Succeeded,
    Faulted,
    Terminal,
}

impl InvocationState {
    pub fn can_transition_to(&self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, ValidationFailed)
                | (Validating, Validated)
                | (Validating, Faulted)
                | (Validated, Invoking)
                | (Invoking, Succeeded)
                | (Invoking, Faulted)
                | (ValidationFailed, Terminal)
                | (Succeeded, Terminal)
                | (Faulted, Terminal)
        )
    }
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InvocationState::Pending => "pending",
            InvocationState::Validating => "validating",
            InvocationState::ValidationFailed => "validation_failed",
            InvocationState::Validated => "validated",
            InvocationState::Invoking => "invoking",
            InvocationState::Succeeded => "succeeded",
            InvocationState::Faulted => "faulted",
            InvocationState::Terminal => "terminal",
        };
        f.write_str(label)
    }
}

/// States visited by one invocation, in order.
#[derive(Debug)]
struct StateTrail {
    visited: Vec<InvocationState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            visited: vec![InvocationState::Pending],
        }
    }

    fn current(&self) -> InvocationState {
        self.visited
            .last()
            .copied()
            .unwrap_or(InvocationState::Pending)
    }

    fn advance(&mut self, next: InvocationState) {
        let from = self.current();
        debug_assert!(
            from.can_transition_to(next),
            "illegal invocation transition {} -> {}",
            from,
            next
        );
        trace!(from = %from, to = %next, "Invocation state transition");
        self.visited.push(next);
    }

    fn finish(mut self) -> Vec<InvocationState> {
        self.advance(InvocationState::Terminal);
        self.visited
    }
}

/// Validation and translation guard for one registered layer.
#[derive(Clone, Debug)]
pub struct LayerPipeline {
    layer: LayerRef,
    policy: Arc<LayerPolicy>,
    validator: Arc<ValidationEngine>,
    mapper: TaxonomyMapper,
}

impl LayerPipeline {
    pub fn new(
        layer: LayerRef,
        policy: Arc<LayerPolicy>,
        validator: Arc<ValidationEngine>,
        mapper: TaxonomyMapper,
    ) -> Self {
        Self {
            layer,
            policy,
            validator,
            mapper,
        }
    }

    pub fn layer(&self) -> &LayerRef {
        &self.layer
    }

    pub fn policy(&self) -> &LayerPolicy {
        &self.policy
    }

    pub async fn invoke<F, Fut>(
        &self,
        operation: &LogicalOperation,
        scope: &ValidationScope,
        input: Value,
        next: F,
    ) -> Result<Value, Failure>
    where
        F: FnOnce(Value) -> Fut + Send,
        Fut: Future<Output = Result<Value, Failure>> + Send,
    {
        self.invoke_traced(operation, scope, input, next).await.0
    }

    /// Same as [`invoke`](Self::invoke), also returning the visited states.
    pub async fn invoke_traced<F, Fut>(
        &self,
        operation: &LogicalOperation,
        scope: &ValidationScope,
        input: Value,
        next: F,
    ) -> (Result<Value, Failure>, Vec<InvocationState>)
    where
        F: FnOnce(Value) -> Fut + Send,
        Fut: Future<Output = Result<Value, Failure>> + Send,
    {
        let span = tracing::debug_span!(
            "layer_invoke",
            layer = %self.layer,
            operation = %operation,
            invocation_id = %Uuid::new_v4(),
        );
        self.run(operation, scope, input, next).instrument(span).await
    }

    async fn run<F, Fut>(
        &self,
        operation: &LogicalOperation,
        scope: &ValidationScope,
        input: Value,
        next: F,
    ) -> (Result<Value, Failure>, Vec<InvocationState>)
    where
        F: FnOnce(Value) -> Fut + Send,
        Fut: Future<Output = Result<Value, Failure>> + Send,
    {
        let mut trail = StateTrail::new();
        let entity = &self.layer.entity;
        let kind = self.layer.kind;

        trail.advance(InvocationState::Validating);
        let outcome = match self.validator.validate(&input, scope, &self.policy.rules) {
            Ok(outcome) => outcome,
            Err(fault) => {
                error!(error = %fault, "Validation rule set is faulty");
                trail.advance(InvocationState::Faulted);
                let failure =
                    Failure::local(FailureClass::Service, entity.clone(), kind, fault.to_string());
                return (Err(failure), trail.finish());
            }
        };

        let input = match outcome {
            ValidationOutcome::Invalid(violations) => {
                warn!(
                    violations = violations.len(),
                    "Rejected invalid input for {}", operation
                );
                trail.advance(InvocationState::ValidationFailed);
                let failure = Failure::local(
                    FailureClass::Validation,
                    entity.clone(),
                    kind,
                    format!("invalid input for {}", operation),
                )
                .with_violations(violations);
                return (Err(failure), trail.finish());
            }
            coerced @ ValidationOutcome::Coerced(_) => {
                debug!("Coerced absent fields for {}", operation);
                coerced.apply(input)
            }
            ValidationOutcome::Valid => input,
        };
        trail.advance(InvocationState::Validated);

        trail.advance(InvocationState::Invoking);
        match next(input).await {
            Ok(value) => {
                trail.advance(InvocationState::Succeeded);
                (Ok(value), trail.finish())
            }
            Err(failure) => {
                trail.advance(InvocationState::Faulted);
                let translated = self
                    .mapper
                    .translate(failure, &self.policy.table, entity, kind);
                (Err(translated), trail.finish())
            }
        }
    }
}
