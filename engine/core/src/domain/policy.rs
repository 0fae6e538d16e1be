// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::layer::{LayerKind, LayerRef};
use crate::domain::mapping::MappingTable;
use crate::domain::operation::EntityName;
use crate::domain::validation::ValidationRuleSet;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a pipeline needs to guard one layer: how to validate its input
/// and how to translate failures from below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPolicy {
    pub table: MappingTable,
    pub rules: ValidationRuleSet,
}

/// Policies for a whole topology, keyed by layer (tables) and entity (rules).
///
/// Layers without a configured table get [`MappingTable::standard`]; entities
/// without a rule set, and every composite layer, are only checked for
/// existence.
#[derive(Debug, Clone, Default)]
pub struct PolicyBook {
    tables: HashMap<LayerRef, MappingTable>,
    rule_sets: HashMap<EntityName, ValidationRuleSet>,
}

impl PolicyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, layer: LayerRef, table: MappingTable) -> Self {
        self.tables.insert(layer, table);
        self
    }

    pub fn with_rule_set(mut self, entity: EntityName, rules: ValidationRuleSet) -> Self {
        self.rule_sets.insert(entity, rules);
        self
    }

    pub fn policy_for(&self, layer: &LayerRef) -> Arc<LayerPolicy> {
        let table = self
            .tables
            .get(layer)
            .cloned()
            .unwrap_or_else(|| MappingTable::standard(&layer.entity, layer.kind));
        // Composite layers forward other entities' payloads; they only check existence.
        let rules = match layer.kind {
            LayerKind::Foundation | LayerKind::Processing => self.rule_sets.get(&layer.entity).cloned(),
            LayerKind::Orchestration | LayerKind::Coordination | LayerKind::Aggregation => None,
        }
        .unwrap_or_else(|| ValidationRuleSet::existence_only(layer.entity.as_str()));
        Arc::new(LayerPolicy { table, rules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::{FailureSelector, LogSeverity, MappingRule};
    use crate::domain::failure::FailureClass;
    use crate::domain::validation::{FieldRule, PredicateKind};

    #[test]
    fn test_defaults_when_unconfigured() {
        let layer = LayerRef::new(LayerKind::Processing, EntityName::new("Student").unwrap());
        let policy = PolicyBook::new().policy_for(&layer);
        assert_eq!(
            policy.table,
            MappingTable::standard(&layer.entity, LayerKind::Processing)
        );
        assert!(policy.rules.rules.is_empty());
        assert_eq!(policy.rules.entity, "Student");
    }

    #[test]
    fn test_configured_table_wins() {
        let layer = LayerRef::new(LayerKind::Foundation, EntityName::new("Student").unwrap());
        let table = MappingTable::new(vec![MappingRule::new(
            FailureSelector::AnyUnclassified,
            false,
            "StudentServiceFailure",
            FailureClass::Service,
            LogSeverity::Critical,
        )])
        .unwrap();
        let book = PolicyBook::new().with_table(layer.clone(), table.clone());
        assert_eq!(book.policy_for(&layer).table, table);
    }

    #[test]
    fn test_composite_layers_ignore_entity_rule_set() {
        let school = EntityName::new("School").unwrap();
        let rules = ValidationRuleSet::new(
            "School",
            vec!["name".to_string()],
            vec![FieldRule::new("name", PredicateKind::NotWhitespace)],
        );
        let book = PolicyBook::new().with_rule_set(school.clone(), rules.clone());

        let aggregation = book.policy_for(&LayerRef::new(LayerKind::Aggregation, school.clone()));
        assert!(aggregation.rules.rules.is_empty());

        let processing = book.policy_for(&LayerRef::new(LayerKind::Processing, school));
        assert_eq!(processing.rules, rules);
    }
}
