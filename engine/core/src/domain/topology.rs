// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Topology Registry & Composition Validator
//!
//! The registry is the only process-wide state of the engine. It is
//! append-only: descriptors are registered once, never mutated or removed.
//!
//! ## Composition rules
//!
//! | Kind | Dependencies |
//! |------|--------------|
//! | Foundation | none (talks to the capability provider) |
//! | Processing | exactly one Foundation of the same entity |
//! | Orchestration | two or three, all Processing or all Foundation |
//! | Coordination | two or three, all Orchestration |
//! | Aggregation | one or more, all of one kind, any cardinality |
//!
//! Additionally no descriptor may transitively depend on itself.
//!
//! ## Lifecycle
//!
//! 1. `register` each descriptor (serialized behind the writer lock). Forward
//!    references to descriptors registered later are allowed.
//! 2. `certify` once all descriptors are in: every reference must resolve.
//!    The returned [`CertifiedTopology`] is an immutable snapshot that can be
//!    read from any number of tasks without locking.

use crate::domain::layer::{LayerDescriptor, LayerKind, LayerRef};
use crate::domain::operation::EntityName;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Topology violation for {layer}: {reason}")]
    TopologyViolation { layer: LayerRef, reason: String },

    #[error("Layer {0} is already registered")]
    DuplicateRegistration(LayerRef),

    #[error("No layer registered for '{0}'")]
    NotFound(String),
}

impl TopologyError {
    fn violation(layer: &LayerDescriptor, reason: impl Into<String>) -> Self {
        TopologyError::TopologyViolation {
            layer: layer.key(),
            reason: reason.into(),
        }
    }
}

/// Stateless structural checks on a single descriptor.
pub struct CompositionValidator;

impl CompositionValidator {
    pub fn check(descriptor: &LayerDescriptor) -> Result<(), TopologyError> {
        let deps = &descriptor.dependencies;

        let mut seen = HashSet::new();
        if let Some(dup) = deps.iter().find(|dep| !seen.insert(*dep)) {
            return Err(TopologyError::violation(
                descriptor,
                format!("dependency {} is listed more than once", dup),
            ));
        }

        match descriptor.kind {
            LayerKind::Foundation => {
                if !deps.is_empty() {
                    return Err(TopologyError::violation(
                        descriptor,
                        "a foundation layer cannot depend on other layers",
                    ));
                }
            }
            LayerKind::Processing => {
                let [dependency] = deps.as_slice() else {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!(
                            "a processing layer needs exactly one foundation dependency, found {}",
                            deps.len()
                        ),
                    ));
                };
                if dependency.kind != LayerKind::Foundation {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!(
                            "a processing layer must depend on a foundation layer, not {}",
                            dependency.kind
                        ),
                    ));
                }
                if dependency.entity != descriptor.entity {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!(
                            "a processing layer must depend on the foundation of its own entity, not '{}'",
                            dependency.entity
                        ),
                    ));
                }
            }
            LayerKind::Orchestration => {
                Self::check_cardinality(descriptor, 2, 3)?;
                let kind = Self::check_homogeneous(descriptor)?;
                if !matches!(kind, LayerKind::Processing | LayerKind::Foundation) {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!("an orchestration layer cannot depend on {} layers", kind),
                    ));
                }
            }
            LayerKind::Coordination => {
                Self::check_cardinality(descriptor, 2, 3)?;
                let kind = Self::check_homogeneous(descriptor)?;
                if kind != LayerKind::Orchestration {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!("a coordination layer cannot depend on {} layers", kind),
                    ));
                }
            }
            LayerKind::Aggregation => {
                if deps.is_empty() {
                    return Err(TopologyError::violation(
                        descriptor,
                        "an aggregation layer needs at least one dependency",
                    ));
                }
                Self::check_homogeneous(descriptor)?;
            }
        }

        Ok(())
    }

    fn check_cardinality(
        descriptor: &LayerDescriptor,
        min: usize,
        max: usize,
    ) -> Result<(), TopologyError> {
        let count = descriptor.dependencies.len();
        if count < min || count > max {
            return Err(TopologyError::violation(
                descriptor,
                format!(
                    "a {} layer needs {} to {} dependencies, found {}",
                    descriptor.kind, min, max, count
                ),
            ));
        }
        Ok(())
    }

    fn check_homogeneous(descriptor: &LayerDescriptor) -> Result<LayerKind, TopologyError> {
        let mut kinds = descriptor.dependencies.iter().map(|dep| dep.kind);
        let first = kinds.next().ok_or_else(|| {
            TopologyError::violation(descriptor, "no dependencies declared")
        })?;
        if let Some(other) = kinds.find(|kind| *kind != first) {
            return Err(TopologyError::violation(
                descriptor,
                format!(
                    "dependencies must all be of one kind, found both {} and {}",
                    first, other
                ),
            ));
        }
        Ok(first)
    }
}

type DescriptorMap = BTreeMap<LayerRef, Arc<LayerDescriptor>>;

#[derive(Debug, Default)]
pub struct TopologyRegistry {
    descriptors: RwLock<DescriptorMap>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: LayerDescriptor) -> Result<Arc<LayerDescriptor>, TopologyError> {
        CompositionValidator::check(&descriptor)?;

        let key = descriptor.key();
        let mut descriptors = self.descriptors.write();

        if descriptors.contains_key(&key) {
            return Err(TopologyError::DuplicateRegistration(key));
        }
        if let Some(path) = find_cycle(&descriptors, &descriptor) {
            let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
            return Err(TopologyError::violation(
                &descriptor,
                format!("dependency cycle {}", rendered.join(" -> ")),
            ));
        }

        let descriptor = Arc::new(descriptor);
        descriptors.insert(key.clone(), descriptor.clone());
        info!(
            layer = %key,
            dependencies = descriptor.dependencies.len(),
            "Registered layer"
        );
        Ok(descriptor)
    }

    /// Outermost registered layer for `entity`.
    pub fn resolve(&self, entity: &EntityName) -> Result<Arc<LayerDescriptor>, TopologyError> {
        outermost(&self.descriptors.read(), entity)
    }

    pub fn resolve_layer(&self, layer: &LayerRef) -> Result<Arc<LayerDescriptor>, TopologyError> {
        self.descriptors
            .read()
            .get(layer)
            .cloned()
            .ok_or_else(|| TopologyError::NotFound(layer.to_string()))
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }

    /// Verify every reference resolves and freeze the current contents.
    pub fn certify(&self) -> Result<CertifiedTopology, TopologyError> {
        let descriptors = self.descriptors.read();
        for descriptor in descriptors.values() {
            for dependency in &descriptor.dependencies {
                if !descriptors.contains_key(dependency) {
                    return Err(TopologyError::violation(
                        descriptor,
                        format!("dependency {} is not registered", dependency),
                    ));
                }
            }
        }
        debug!(layers = descriptors.len(), "Topology certified");
        Ok(CertifiedTopology {
            descriptors: Arc::new(descriptors.clone()),
        })
    }
}

/// Immutable, fully resolved topology snapshot.
#[derive(Debug, Clone)]
pub struct CertifiedTopology {
    descriptors: Arc<DescriptorMap>,
}

impl CertifiedTopology {
    pub fn resolve(&self, entity: &EntityName) -> Result<Arc<LayerDescriptor>, TopologyError> {
        outermost(&self.descriptors, entity)
    }

    pub fn resolve_layer(&self, layer: &LayerRef) -> Result<Arc<LayerDescriptor>, TopologyError> {
        self.descriptors
            .get(layer)
            .cloned()
            .ok_or_else(|| TopologyError::NotFound(layer.to_string()))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<LayerDescriptor>> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn outermost(
    descriptors: &DescriptorMap,
    entity: &EntityName,
) -> Result<Arc<LayerDescriptor>, TopologyError> {
    LayerKind::ALL
        .iter()
        .rev()
        .find_map(|kind| descriptors.get(&LayerRef::new(*kind, entity.clone())))
        .cloned()
        .ok_or_else(|| TopologyError::NotFound(entity.to_string()))
}

/// Depth-first search from `candidate` through registered descriptors.
/// Returns the offending path when `candidate` reaches itself.
fn find_cycle(descriptors: &DescriptorMap, candidate: &LayerDescriptor) -> Option<Vec<LayerRef>> {
    fn visit(
        current: &LayerRef,
        target: &LayerRef,
        descriptors: &DescriptorMap,
        visited: &mut HashSet<LayerRef>,
        path: &mut Vec<LayerRef>,
    ) -> bool {
        path.push(current.clone());
        if current == target {
            return true;
        }
        if visited.insert(current.clone()) {
            if let Some(descriptor) = descriptors.get(current) {
                for dependency in &descriptor.dependencies {
                    if visit(dependency, target, descriptors, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    let target = candidate.key();
    let mut visited = HashSet::new();
    for dependency in &candidate.dependencies {
        let mut path = vec![target.clone()];
        if visit(dependency, &target, descriptors, &mut visited, &mut path) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str) -> EntityName {
        EntityName::new(name).unwrap()
    }

    fn layer(kind: LayerKind, name: &str) -> LayerRef {
        LayerRef::new(kind, entity(name))
    }

    // ── Composition rules ─────────────────────────────────────────────────────

    #[test]
    fn test_processing_with_two_dependencies_is_rejected() {
        let descriptor = LayerDescriptor::new(
            LayerKind::Processing,
            entity("Student"),
            vec![
                layer(LayerKind::Foundation, "Student"),
                layer(LayerKind::Foundation, "Guardian"),
            ],
        );
        assert!(matches!(
            CompositionValidator::check(&descriptor),
            Err(TopologyError::TopologyViolation { .. })
        ));
        assert!(CompositionValidator::check(&LayerDescriptor::processing(entity("Student"))).is_ok());
    }

    #[test]
    fn test_processing_dependency_must_match_entity_and_kind() {
        let other_entity = LayerDescriptor::new(
            LayerKind::Processing,
            entity("Student"),
            vec![layer(LayerKind::Foundation, "Guardian")],
        );
        assert!(CompositionValidator::check(&other_entity).is_err());

        let other_kind = LayerDescriptor::new(
            LayerKind::Processing,
            entity("Student"),
            vec![layer(LayerKind::Processing, "Student")],
        );
        assert!(CompositionValidator::check(&other_kind).is_err());

        let none = LayerDescriptor::new(LayerKind::Processing, entity("Student"), vec![]);
        assert!(CompositionValidator::check(&none).is_err());
    }

    #[test]
    fn test_foundation_cannot_have_dependencies() {
        let descriptor = LayerDescriptor::new(
            LayerKind::Foundation,
            entity("Student"),
            vec![layer(LayerKind::Foundation, "Guardian")],
        );
        assert!(CompositionValidator::check(&descriptor).is_err());
    }

    #[test]
    fn test_aggregation_requires_homogeneous_dependencies() {
        let mixed = LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("School"),
            vec![
                layer(LayerKind::Processing, "Student"),
                layer(LayerKind::Foundation, "Teacher"),
            ],
        );
        assert!(CompositionValidator::check(&mixed).is_err());

        let mixed_upper = LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("School"),
            vec![
                layer(LayerKind::Orchestration, "Enrollment"),
                layer(LayerKind::Coordination, "Admission"),
            ],
        );
        assert!(CompositionValidator::check(&mixed_upper).is_err());

        let many: Vec<LayerRef> = ["Student", "Teacher", "Guardian", "Course", "Room"]
            .iter()
            .map(|name| layer(LayerKind::Processing, name))
            .collect();
        let wide = LayerDescriptor::new(LayerKind::Aggregation, entity("School"), many);
        assert!(CompositionValidator::check(&wide).is_ok());
    }

    #[test]
    fn test_orchestration_and_coordination_cardinality() {
        let single = LayerDescriptor::new(
            LayerKind::Orchestration,
            entity("Enrollment"),
            vec![layer(LayerKind::Processing, "Student")],
        );
        assert!(CompositionValidator::check(&single).is_err());

        let pair = LayerDescriptor::new(
            LayerKind::Orchestration,
            entity("Enrollment"),
            vec![
                layer(LayerKind::Processing, "Student"),
                layer(LayerKind::Processing, "Course"),
            ],
        );
        assert!(CompositionValidator::check(&pair).is_ok());

        let wrong_kind = LayerDescriptor::new(
            LayerKind::Coordination,
            entity("Admission"),
            vec![
                layer(LayerKind::Processing, "Student"),
                layer(LayerKind::Processing, "Course"),
            ],
        );
        assert!(CompositionValidator::check(&wrong_kind).is_err());
    }

    #[test]
    fn test_duplicate_dependency_is_rejected() {
        let descriptor = LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("School"),
            vec![
                layer(LayerKind::Processing, "Student"),
                layer(LayerKind::Processing, "Student"),
            ],
        );
        assert!(CompositionValidator::check(&descriptor).is_err());
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    #[test]
    fn test_register_and_resolve_outermost() {
        let registry = TopologyRegistry::new();
        registry
            .register(LayerDescriptor::foundation(entity("Student")))
            .unwrap();
        assert_eq!(
            registry.resolve(&entity("Student")).unwrap().kind,
            LayerKind::Foundation
        );

        registry
            .register(LayerDescriptor::processing(entity("Student")))
            .unwrap();
        assert_eq!(
            registry.resolve(&entity("Student")).unwrap().kind,
            LayerKind::Processing
        );
        assert_eq!(
            registry
                .resolve_layer(&layer(LayerKind::Foundation, "Student"))
                .unwrap()
                .kind,
            LayerKind::Foundation
        );
        assert_eq!(
            registry.resolve(&entity("Teacher")),
            Err(TopologyError::NotFound("Teacher".to_string()))
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = TopologyRegistry::new();
        registry
            .register(LayerDescriptor::foundation(entity("Student")))
            .unwrap();
        let second = registry.register(LayerDescriptor::foundation(entity("Student")));
        assert_eq!(
            second,
            Err(TopologyError::DuplicateRegistration(layer(
                LayerKind::Foundation,
                "Student"
            )))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_aggregation_registration_order_is_irrelevant() {
        let names = ["Student", "Teacher", "Guardian"];
        let aggregation = LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("School"),
            names.iter().map(|n| layer(LayerKind::Processing, n)).collect(),
        );

        let registry = TopologyRegistry::new();
        registry.register(aggregation).unwrap();
        for name in names.iter().rev() {
            registry.register(LayerDescriptor::processing(entity(name))).unwrap();
            registry.register(LayerDescriptor::foundation(entity(name))).unwrap();
        }
        let certified = registry.certify().unwrap();
        assert_eq!(certified.len(), 7);
        assert_eq!(
            certified.resolve(&entity("School")).unwrap().dependencies.len(),
            3
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let registry = TopologyRegistry::new();
        registry
            .register(LayerDescriptor::new(
                LayerKind::Aggregation,
                entity("North"),
                vec![layer(LayerKind::Aggregation, "South")],
            ))
            .unwrap();
        let result = registry.register(LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("South"),
            vec![layer(LayerKind::Aggregation, "North")],
        ));
        match result {
            Err(TopologyError::TopologyViolation { reason, .. }) => {
                assert!(reason.contains("cycle"), "unexpected reason: {}", reason);
            }
            other => panic!("expected a cycle violation, got {:?}", other),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let registry = TopologyRegistry::new();
        let result = registry.register(LayerDescriptor::new(
            LayerKind::Aggregation,
            entity("Loop"),
            vec![layer(LayerKind::Aggregation, "Loop")],
        ));
        assert!(matches!(result, Err(TopologyError::TopologyViolation { .. })));
    }

    #[test]
    fn test_certify_requires_resolved_references() {
        let registry = TopologyRegistry::new();
        registry
            .register(LayerDescriptor::processing(entity("Student")))
            .unwrap();
        assert!(registry.certify().is_err());

        registry
            .register(LayerDescriptor::foundation(entity("Student")))
            .unwrap();
        assert!(registry.certify().is_ok());
    }

    #[test]
    fn test_concurrent_duplicate_registration() {
        let registry = Arc::new(TopologyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.register(LayerDescriptor::foundation(entity("Student")))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(TopologyError::DuplicateRegistration(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, 7);
    }
}
