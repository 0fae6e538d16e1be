// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Validation Scope Engine
//!
//! Evaluates an entity's declared [`ValidationRuleSet`] against a payload under
//! a call-site [`ValidationScope`]:
//!
//! | Scope | Rules evaluated |
//! |-------|-----------------|
//! | `Full` | every rule, in declaration order |
//! | `UsedFieldsOnly` | only rules on fields the call actually consumes |
//!
//! Both scopes first check that the value itself exists. Invalid input is a
//! legitimate [`ValidationOutcome::Invalid`], never an error; the only
//! [`ValidationFault`]s are programming errors in the rule set itself.
//!
//! `UsedFieldsOnly` carries an explicit [`AbsentFieldPolicy`]: with `Coerce`,
//! a null or missing used field whose rule declares a `default` is replaced
//! by that default (e.g. a null collection becomes `[]`) rather than
//! rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentFieldPolicy {
    #[default]
    Fail,
    Coerce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationScope {
    Full,
    UsedFieldsOnly {
        fields: BTreeSet<String>,
        #[serde(default)]
        absent: AbsentFieldPolicy,
    },
}

impl ValidationScope {
    pub fn used_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValidationScope::UsedFieldsOnly {
            fields: fields.into_iter().map(Into::into).collect(),
            absent: AbsentFieldPolicy::Fail,
        }
    }

    /// Switch a used-fields scope to coercing absent fields. No-op for `Full`.
    pub fn coercing(self) -> Self {
        match self {
            ValidationScope::UsedFieldsOnly { fields, .. } => ValidationScope::UsedFieldsOnly {
                fields,
                absent: AbsentFieldPolicy::Coerce,
            },
            full => full,
        }
    }

    fn applies_to(&self, field: &str) -> bool {
        match self {
            ValidationScope::Full => true,
            ValidationScope::UsedFieldsOnly { fields, .. } => fields.contains(field),
        }
    }

    fn coerces(&self) -> bool {
        matches!(
            self,
            ValidationScope::UsedFieldsOnly {
                absent: AbsentFieldPolicy::Coerce,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    NotNull,
    NotEmpty,
    NotWhitespace,
    Custom(String),
}

impl PredicateKind {
    fn reason(&self) -> String {
        match self {
            PredicateKind::NotNull => "is required".to_string(),
            PredicateKind::NotEmpty => "must not be empty".to_string(),
            PredicateKind::NotWhitespace => "must not be blank".to_string(),
            PredicateKind::Custom(name) => format!("failed check '{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub predicate: PredicateKind,
    /// Replacement used when an absent field is coerced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, predicate: PredicateKind) -> Self {
        Self {
            field: field.into(),
            predicate,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Rules for one entity, together with the entity's declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRuleSet {
    pub entity: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
}

impl ValidationRuleSet {
    pub fn new(entity: impl Into<String>, fields: Vec<String>, rules: Vec<FieldRule>) -> Self {
        Self {
            entity: entity.into(),
            fields,
            rules,
        }
    }

    /// A rule set with a declared shape and no rules; only existence is checked.
    pub fn existence_only(entity: impl Into<String>) -> Self {
        Self::new(entity, vec![], vec![])
    }

    /// Check the rule set against its own declared shape.
    pub fn check_shape(&self) -> Result<(), ValidationFault> {
        for rule in &self.rules {
            if !self.fields.iter().any(|field| *field == rule.field) {
                return Err(ValidationFault::UndeclaredField {
                    entity: self.entity.clone(),
                    field: rule.field.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coercion {
    pub field: String,
    pub replacement: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Coerced(Vec<Coercion>),
    Invalid(Vec<Violation>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid(_))
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationOutcome::Invalid(violations) => violations,
            _ => &[],
        }
    }

    /// Write any coercions into `value`.
    pub fn apply(&self, mut value: Value) -> Value {
        if let (ValidationOutcome::Coerced(coercions), Value::Object(map)) =
            (self, &mut value)
        {
            for coercion in coercions {
                map.insert(coercion.field.clone(), coercion.replacement.clone());
            }
        }
        value
    }
}

/// Programming errors in a rule set. Never raised for bad input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFault {
    #[error("Rule for '{entity}' references undeclared field '{field}'")]
    UndeclaredField { entity: String, field: String },

    #[error("Custom predicate '{0}' is not registered")]
    UnknownPredicate(String),
}

pub type CustomPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Named structural predicates available to `Custom` rules.
#[derive(Clone, Default)]
pub struct PredicateCatalog {
    predicates: HashMap<String, CustomPredicate>,
}

impl PredicateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.register(name, predicate);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&CustomPredicate> {
        self.predicates.get(name)
    }
}

impl std::fmt::Debug for PredicateCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("PredicateCatalog")
            .field("predicates", &names)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    catalog: PredicateCatalog,
}

impl ValidationEngine {
    pub fn new(catalog: PredicateCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PredicateCatalog {
        &self.catalog
    }

    pub fn validate(
        &self,
        value: &Value,
        scope: &ValidationScope,
        rule_set: &ValidationRuleSet,
    ) -> Result<ValidationOutcome, ValidationFault> {
        rule_set.check_shape()?;
        for rule in &rule_set.rules {
            if let PredicateKind::Custom(name) = &rule.predicate {
                if !self.catalog.contains(name) {
                    return Err(ValidationFault::UnknownPredicate(name.clone()));
                }
            }
        }

        if value.is_null() {
            return Ok(ValidationOutcome::Invalid(vec![Violation {
                field: rule_set.entity.clone(),
                reason: PredicateKind::NotNull.reason(),
            }]));
        }

        let mut violations = Vec::new();
        let mut coercions: Vec<Coercion> = Vec::new();

        for rule in rule_set.rules.iter().filter(|rule| scope.applies_to(&rule.field)) {
            let coerced = coercions
                .iter()
                .find(|coercion| coercion.field == rule.field)
                .map(|coercion| &coercion.replacement);
            let field_value = coerced.or_else(|| value.get(&rule.field));

            if self.holds(&rule.predicate, field_value)? {
                continue;
            }

            // Coercions are written into fields, so only objects can take them.
            let absent = field_value.map_or(true, Value::is_null);
            match (&rule.default, absent && scope.coerces() && value.is_object()) {
                (Some(default), true) => {
                    let replacement = default.clone();
                    if self.holds(&rule.predicate, Some(&replacement))? {
                        coercions.push(Coercion {
                            field: rule.field.clone(),
                            replacement,
                        });
                        continue;
                    }
                    violations.push(Violation {
                        field: rule.field.clone(),
                        reason: rule.predicate.reason(),
                    });
                }
                _ => violations.push(Violation {
                    field: rule.field.clone(),
                    reason: rule.predicate.reason(),
                }),
            }
        }

        Ok(if !violations.is_empty() {
            ValidationOutcome::Invalid(violations)
        } else if !coercions.is_empty() {
            ValidationOutcome::Coerced(coercions)
        } else {
            ValidationOutcome::Valid
        })
    }

    fn holds(&self, predicate: &PredicateKind, value: Option<&Value>) -> Result<bool, ValidationFault> {
        let present = value.filter(|value| !value.is_null());
        let result = match predicate {
            PredicateKind::NotNull => present.is_some(),
            PredicateKind::NotEmpty => present.is_some_and(|value| match value {
                Value::String(text) => !text.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(map) => !map.is_empty(),
                _ => true,
            }),
            PredicateKind::NotWhitespace => present.is_some_and(|value| match value {
                Value::String(text) => !text.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(map) => !map.is_empty(),
                _ => true,
            }),
            PredicateKind::Custom(name) => {
                let predicate = self
                    .catalog
                    .get(name)
                    .ok_or_else(|| ValidationFault::UnknownPredicate(name.clone()))?;
                predicate(value.unwrap_or(&Value::Null))
            }
        };
        Ok(result)
    }
}
