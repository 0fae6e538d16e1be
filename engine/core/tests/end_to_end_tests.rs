// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end scenarios for the Student entity, from configuration manifest
//! through the assembled layer services down to a capability provider.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use strata_core::application::layer_service::{LayerEndpoint, LayerRequest};
use strata_core::application::pipeline::InvocationState;
use strata_core::application::{LayerFactory, LayerPipeline, TaxonomyMapper};
use strata_core::domain::engine_config::EngineConfigManifest;
use strata_core::domain::failure::{Failure, FailureClass, FailureOrigin};
use strata_core::domain::layer::{LayerKind, LayerRef};
use strata_core::domain::mapping::{FailureSelector, LogSeverity, MappingRule, MappingTable};
use strata_core::domain::operation::{verbs, EntityName, LogicalOperation, OperationShape};
use strata_core::domain::policy::LayerPolicy;
use strata_core::domain::provider::CapabilityProvider;
use strata_core::domain::validation::{ValidationEngine, ValidationRuleSet, ValidationScope};
use strata_core::infrastructure::log_sink::{InMemoryLogSink, TranslationBus};
use strata_core::infrastructure::providers::InMemoryCapabilityProvider;

const SCHOOL: &str = r#"
apiVersion: strata.dev/v1
kind: EngineConfig
metadata:
  name: school
spec:
  topology:
    - kind: aggregation
      entity: School
      dependencies:
        - { kind: processing, entity: Student }
        - { kind: processing, entity: Course }
    - kind: processing
      entity: Student
      dependencies: [{ kind: foundation, entity: Student }]
    - kind: processing
      entity: Course
      dependencies: [{ kind: foundation, entity: Course }]
    - { kind: foundation, entity: Student }
    - { kind: foundation, entity: Course }
  rule_sets:
    - entity: Student
      fields: [id, name, courses]
      rules:
        - { field: id, predicate: not_null }
        - { field: name, predicate: not_whitespace }
        - { field: courses, predicate: not_null, default: [] }
"#;

/// Reports "not found" for lookups and accepts any add, recording each call.
#[derive(Default)]
struct ScriptedProvider {
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedProvider {
    fn verbs(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(verb, _)| verb.clone()).collect()
    }
}

#[async_trait]
impl CapabilityProvider for ScriptedProvider {
    async fn invoke(&self, operation_name: &str, payload: Value) -> Result<Value, Failure> {
        self.calls
            .lock()
            .push((operation_name.to_string(), payload.clone()));
        match operation_name {
            verbs::RETRIEVE_BY_ID => Ok(Value::Null),
            verbs::ADD => Ok(payload),
            other => Err(Failure::provider(
                FailureClass::Service,
                EntityName::new("Student").unwrap(),
                format!("unexpected operation '{}'", other),
            )),
        }
    }
}

fn student() -> EntityName {
    EntityName::new("Student").unwrap()
}

fn manifest() -> EngineConfigManifest {
    let manifest = EngineConfigManifest::from_yaml_str(SCHOOL).unwrap();
    manifest.validate().unwrap();
    manifest
}

fn factory(sink: Arc<InMemoryLogSink>) -> LayerFactory {
    let manifest = manifest();
    let topology = manifest.build_registry().unwrap().certify().unwrap();
    LayerFactory::new(topology, manifest.policy_book().unwrap(), sink)
}

// ── Student ensure-exists ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_ensure_exists_looks_up_then_adds() {
    let provider = Arc::new(ScriptedProvider::default());
    let sink = Arc::new(InMemoryLogSink::new());
    let students = factory(sink.clone())
        .with_provider(student(), provider.clone())
        .build(&student())
        .unwrap();
    assert_eq!(students.layer(), &LayerRef::new(LayerKind::Processing, student()));

    let ada = json!({"id": "s-1", "name": "Ada", "courses": ["algebra"]});
    let added = students
        .call(LayerRequest::full(
            LogicalOperation::pass_through(student(), verbs::ENSURE_EXISTS),
            ada.clone(),
        ))
        .await
        .unwrap();

    assert_eq!(added, ada);
    assert_eq!(provider.verbs(), vec![verbs::RETRIEVE_BY_ID, verbs::ADD]);
    assert_eq!(provider.calls.lock()[0].1, json!({"id": "s-1"}));
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_rejected_id_surfaces_as_processing_failure() {
    let sink = Arc::new(InMemoryLogSink::new());
    let table = MappingTable::new(vec![
        MappingRule::new(
            FailureSelector::Named("DependencyValidationFailure".into()),
            true,
            "StudentProcessingDependencyValidationFailure",
            FailureClass::DependencyValidation,
            LogSeverity::Error,
        ),
        MappingRule::new(
            FailureSelector::AnyUnclassified,
            true,
            "StudentProcessingServiceFailure",
            FailureClass::Service,
            LogSeverity::Error,
        ),
    ])
    .unwrap();
    let pipeline = LayerPipeline::new(
        LayerRef::new(LayerKind::Processing, student()),
        Arc::new(LayerPolicy {
            table,
            rules: ValidationRuleSet::existence_only("Student"),
        }),
        Arc::new(ValidationEngine::default()),
        TaxonomyMapper::new(sink.clone()),
    );
    let rejected = Failure::provider(FailureClass::DependencyValidation, student(), "bad id");
    let operation = LogicalOperation::new(student(), verbs::ENSURE_EXISTS, OperationShape::Combination)
        .unwrap();

    let raised = &rejected;

    let (result, states) = pipeline
        .invoke_traced(&operation, &ValidationScope::Full, json!({"id": "??"}), move |_| async move {
            Err(raised.clone())
        })
        .await;

    let failure = result.unwrap_err();
    assert_eq!(failure.kind, "StudentProcessingDependencyValidationFailure");
    assert_eq!(failure.inner(), Some(&rejected));
    assert_eq!(failure.inner().map(|inner| inner.origin), Some(FailureOrigin::Provider));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].severity, LogSeverity::Error);
    assert_eq!(records[0].source_kind, "DependencyValidationFailure");
    assert_eq!(records[0].outer_kind, "StudentProcessingDependencyValidationFailure");
    assert_eq!(
        states,
        vec![
            InvocationState::Pending,
            InvocationState::Validating,
            InvocationState::Validated,
            InvocationState::Invoking,
            InvocationState::Faulted,
            InvocationState::Terminal,
        ]
    );
}

// ── Aggregation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_school_aggregation_routes_each_entity() {
    let students = Arc::new(InMemoryCapabilityProvider::new(student()));
    let courses = Arc::new(InMemoryCapabilityProvider::new(EntityName::new("Course").unwrap()));
    let school = factory(Arc::new(InMemoryLogSink::new()))
        .with_provider(student(), students.clone())
        .with_provider(EntityName::new("Course").unwrap(), courses.clone())
        .build(&EntityName::new("School").unwrap())
        .unwrap();

    school
        .call(LayerRequest::full(
            LogicalOperation::pass_through(student(), verbs::UPSERT),
            json!({"id": "s-1", "name": "Ada", "courses": []}),
        ))
        .await
        .unwrap();
    school
        .call(LayerRequest::full(
            LogicalOperation::pass_through(EntityName::new("Course").unwrap(), verbs::ENSURE_EXISTS),
            json!({"id": "c-1"}),
        ))
        .await
        .unwrap();

    assert_eq!(students.len(), 1);
    assert_eq!(courses.len(), 1);

    let exists = school
        .call(LayerRequest::full(
            LogicalOperation::pass_through(student(), verbs::VERIFY_EXISTS),
            json!({"id": "s-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(exists, Value::Bool(true));
}

#[tokio::test]
async fn test_aggregation_does_not_apply_its_own_rule_set() {
    let yaml = SCHOOL.replace(
        "  rule_sets:\n",
        "  rule_sets:\n    - entity: School\n      fields: [name]\n      rules:\n        - { field: name, predicate: not_whitespace }\n",
    );
    let manifest = EngineConfigManifest::from_yaml_str(&yaml).unwrap();
    manifest.validate().unwrap();
    assert_eq!(manifest.spec.rule_sets.len(), 2);

    let courses = Arc::new(InMemoryCapabilityProvider::new(EntityName::new("Course").unwrap()));
    let school = LayerFactory::new(
        manifest.build_registry().unwrap().certify().unwrap(),
        manifest.policy_book().unwrap(),
        Arc::new(InMemoryLogSink::new()),
    )
    .with_provider(EntityName::new("Course").unwrap(), courses.clone())
    .with_default_provider(Arc::new(InMemoryCapabilityProvider::new(student())))
    .build(&EntityName::new("School").unwrap())
    .unwrap();

    school
        .call(LayerRequest::full(
            LogicalOperation::pass_through(EntityName::new("Course").unwrap(), verbs::ENSURE_EXISTS),
            json!({"id": "c-1", "title": "Algebra"}),
        ))
        .await
        .unwrap();

    assert_eq!(courses.calls(), vec![verbs::RETRIEVE_BY_ID, verbs::ADD]);
}

#[tokio::test]
async fn test_coerced_collection_is_stored() {
    let students = Arc::new(InMemoryCapabilityProvider::new(student()));
    let stack = factory(Arc::new(InMemoryLogSink::new()))
        .with_default_provider(students.clone())
        .build(&student())
        .unwrap();

    let request = LayerRequest::new(
        LogicalOperation::pass_through(student(), verbs::ADD),
        ValidationScope::used_fields(["id", "courses"]).coercing(),
        json!({"id": "s-2", "courses": null}),
    );
    let stored = stack.call(request).await.unwrap();

    assert_eq!(stored["courses"], json!([]));
    assert_eq!(students.len(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_stack() {
    let students = Arc::new(InMemoryCapabilityProvider::new(student()));
    let bus = TranslationBus::new(64);
    let mut records = bus.subscribe();
    let manifest = manifest();
    let stack = LayerFactory::new(
        manifest.build_registry().unwrap().certify().unwrap(),
        manifest.policy_book().unwrap(),
        Arc::new(bus),
    )
    .with_default_provider(students.clone())
    .build(&student())
    .unwrap();

    let calls = (0..16).map(|i| {
        let stack = stack.clone();
        async move {
            stack
                .call(LayerRequest::full(
                    LogicalOperation::pass_through(student(), verbs::ENSURE_EXISTS),
                    json!({"id": format!("s-{}", i % 4), "name": "Ada", "courses": []}),
                ))
                .await
        }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(students.len(), 4);
    assert!(records.try_recv().is_err());
}
