// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Failure Mapping Tables
//!
//! A [`MappingTable`] is the declarative, per-layer description of how a
//! failure raised below the layer is re-classified as it crosses the layer
//! boundary. Rules are evaluated first-match; the table must end with exactly
//! one catch-all rule so every failure resolves to some outer kind.
//!
//! ```yaml
//! - source: { class: dependency_validation }
//!   wrap_inner: true
//!   outer: { kind: StudentProcessingDependencyValidationFailure, class: dependency_validation }
//!   severity: error
//! - source: any_unclassified
//!   wrap_inner: true
//!   outer: { kind: StudentProcessingServiceFailure, class: service }
//!   severity: error
//! ```
//!
//! Lookup prefers a rule naming the exact failure kind, then a rule matching
//! the failure class, then the catch-all. Since tables are immutable once
//! built, the resolved rule is a pure function of `(failure kind, table)`.

use crate::domain::failure::{Failure, FailureClass};
use crate::domain::layer::LayerKind;
use crate::domain::operation::EntityName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSelector {
    /// Matches one concrete failure kind by name.
    Named(String),
    /// Matches every failure of a taxonomy class.
    Class(FailureClass),
    /// Catch-all; must be the last rule of a table.
    AnyUnclassified,
}

impl FailureSelector {
    pub fn is_catch_all(&self) -> bool {
        matches!(self, FailureSelector::AnyUnclassified)
    }
}

impl std::fmt::Display for FailureSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureSelector::Named(kind) => write!(f, "kind={}", kind),
            FailureSelector::Class(class) => write!(f, "class={}", class),
            FailureSelector::AnyUnclassified => f.write_str("any_unclassified"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Outer failure produced when a rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterFailure {
    pub kind: String,
    pub class: FailureClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Written as `any_unclassified`, `{ class: ... }` or `{ named: ... }`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: FailureSelector,
    #[serde(default)]
    pub wrap_inner: bool,
    pub outer: OuterFailure,
    pub severity: LogSeverity,
}

impl MappingRule {
    pub fn new(
        source: FailureSelector,
        wrap_inner: bool,
        outer_kind: impl Into<String>,
        outer_class: FailureClass,
        severity: LogSeverity,
    ) -> Self {
        Self {
            source,
            wrap_inner,
            outer: OuterFailure {
                kind: outer_kind.into(),
                class: outer_class,
            },
            severity,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingTableError {
    #[error("Mapping table must contain at least one rule")]
    Empty,

    #[error("Mapping table has no catch-all rule (source: any_unclassified)")]
    MissingCatchAll,

    #[error("Mapping table has {0} catch-all rules; exactly one is allowed")]
    DuplicateCatchAll(usize),

    #[error("Catch-all rule must be last (found at position {position} of {len})")]
    CatchAllNotLast { position: usize, len: usize },

    #[error("Rule {position} maps to class '{class}', which cannot be an outer failure")]
    InvalidOuterClass { position: usize, class: FailureClass },

    #[error("Rule {0} selects cancellation failures, which are passed through untranslated")]
    CancellationSelected(usize),

    #[error("Rule {0} has an empty outer kind")]
    EmptyOuterKind(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MappingRule>", into = "Vec<MappingRule>")]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    pub fn new(rules: Vec<MappingRule>) -> Result<Self, MappingTableError> {
        if rules.is_empty() {
            return Err(MappingTableError::Empty);
        }

        let catch_all_positions: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.source.is_catch_all())
            .map(|(position, _)| position)
            .collect();

        match catch_all_positions.as_slice() {
            [] => return Err(MappingTableError::MissingCatchAll),
            [position] if *position != rules.len() - 1 => {
                return Err(MappingTableError::CatchAllNotLast {
                    position: *position,
                    len: rules.len(),
                });
            }
            [_] => {}
            many => return Err(MappingTableError::DuplicateCatchAll(many.len())),
        }

        for (position, rule) in rules.iter().enumerate() {
            if rule.outer.kind.trim().is_empty() {
                return Err(MappingTableError::EmptyOuterKind(position));
            }
            if matches!(
                rule.outer.class,
                FailureClass::Validation | FailureClass::Cancellation
            ) {
                return Err(MappingTableError::InvalidOuterClass {
                    position,
                    class: rule.outer.class,
                });
            }
            if rule.source == FailureSelector::Class(FailureClass::Cancellation) {
                return Err(MappingTableError::CancellationSelected(position));
            }
        }

        Ok(Self { rules })
    }

    /// The conventional table for an entity at a given layer.
    ///
    /// Validation-type failures from below become dependency-validation
    /// failures here with the cause kept; opaque dependency faults are
    /// reported critically without nesting; a dependency's own service
    /// fault becomes a dependency failure; anything else is this layer's
    /// service failure.
    pub fn standard(entity: &EntityName, layer: LayerKind) -> Self {
        let name = |class: FailureClass| {
            format!("{}{}{}", entity, layer.failure_infix(), class.generic_kind())
        };
        let rules = vec![
            MappingRule::new(
                FailureSelector::Class(FailureClass::Validation),
                true,
                name(FailureClass::DependencyValidation),
                FailureClass::DependencyValidation,
                LogSeverity::Error,
            ),
            MappingRule::new(
                FailureSelector::Class(FailureClass::DependencyValidation),
                true,
                name(FailureClass::DependencyValidation),
                FailureClass::DependencyValidation,
                LogSeverity::Error,
            ),
            MappingRule::new(
                FailureSelector::Class(FailureClass::Dependency),
                false,
                name(FailureClass::Dependency),
                FailureClass::Dependency,
                LogSeverity::Critical,
            ),
            MappingRule::new(
                FailureSelector::Class(FailureClass::Service),
                true,
                name(FailureClass::Dependency),
                FailureClass::Dependency,
                LogSeverity::Error,
            ),
            MappingRule::new(
                FailureSelector::AnyUnclassified,
                true,
                name(FailureClass::Service),
                FailureClass::Service,
                LogSeverity::Error,
            ),
        ];
        Self { rules }
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Resolve the rule governing `failure`.
    pub fn resolve(&self, failure: &Failure) -> &MappingRule {
        let named = self
            .rules
            .iter()
            .find(|rule| matches!(&rule.source, FailureSelector::Named(kind) if *kind == failure.kind));
        let by_class = || {
            self.rules
                .iter()
                .find(|rule| rule.source == FailureSelector::Class(failure.class))
        };

        named
            .or_else(by_class)
            .unwrap_or_else(|| self.catch_all())
    }

    fn catch_all(&self) -> &MappingRule {
        // Construction guarantees the last rule is the catch-all.
        &self.rules[self.rules.len() - 1]
    }
}

impl TryFrom<Vec<MappingRule>> for MappingTable {
    type Error = MappingTableError;

    fn try_from(rules: Vec<MappingRule>) -> Result<Self, Self::Error> {
        Self::new(rules)
    }
}

impl From<MappingTable> for Vec<MappingRule> {
    fn from(table: MappingTable) -> Self {
        table.rules
    }
}
