// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Layer Services
//!
//! Concrete endpoints for each layer kind. Every endpoint owns a
//! [`LayerPipeline`] and expresses its operations as ordinary nested calls
//! against its dependencies; each nested call is validated and translated by
//! the dependency's own pipeline.
//!
//! | Service | Kinds | Behaviour |
//! |---------|-------|-----------|
//! | [`FoundationService`] | Foundation | forwards the verb to the capability provider |
//! | [`ProcessingService`] | Processing | combinations and shifters over one foundation |
//! | [`CompositeService`] | Orchestration, Coordination, Aggregation | routes by entity, no added logic |

use crate::application::pipeline::LayerPipeline;
use crate::domain::failure::{Failure, FailureClass};
use crate::domain::layer::LayerRef;
use crate::domain::operation::{verbs, EntityName, LogicalOperation, OperationShape};
use crate::domain::provider::CapabilityProvider;
use crate::domain::validation::ValidationScope;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One call into a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRequest {
    pub operation: LogicalOperation,
    pub scope: ValidationScope,
    pub payload: Value,
}

impl LayerRequest {
    pub fn new(operation: LogicalOperation, scope: ValidationScope, payload: Value) -> Self {
        Self {
            operation,
            scope,
            payload,
        }
    }

    pub fn full(operation: LogicalOperation, payload: Value) -> Self {
        Self::new(operation, ValidationScope::Full, payload)
    }
}

#[async_trait]
pub trait LayerEndpoint: Send + Sync {
    fn layer(&self) -> &LayerRef;

    async fn call(&self, request: LayerRequest) -> Result<Value, Failure>;
}

/// Adapts a [`CapabilityProvider`] to the operation vocabulary.
#[derive(Clone)]
pub struct ProviderEndpoint {
    provider: Arc<dyn CapabilityProvider>,
}

impl ProviderEndpoint {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self { provider }
    }

    pub async fn invoke(&self, operation: &LogicalOperation, payload: Value) -> Result<Value, Failure> {
        self.provider.invoke(operation.verb(), payload).await
    }
}

pub struct FoundationService {
    pipeline: LayerPipeline,
    provider: ProviderEndpoint,
}

impl FoundationService {
    pub fn new(pipeline: LayerPipeline, provider: ProviderEndpoint) -> Self {
        Self { pipeline, provider }
    }
}

#[async_trait]
impl LayerEndpoint for FoundationService {
    fn layer(&self) -> &LayerRef {
        self.pipeline.layer()
    }

    async fn call(&self, request: LayerRequest) -> Result<Value, Failure> {
        let LayerRequest {
            operation,
            scope,
            payload,
        } = request;
        let provider = &self.provider;
        let op = &operation;
        self.pipeline
            .invoke(op, &scope, payload, move |input| provider.invoke(op, input))
            .await
    }
}

/// Higher-order operations over exactly one foundation dependency.
///
/// Named verbs pick their own validation scope: lookups and removals only
/// consume the identifier, writes consume the whole record. Any other verb is
/// forwarded unchanged under the caller's scope.
pub struct ProcessingService {
    pipeline: LayerPipeline,
    foundation: Arc<dyn LayerEndpoint>,
    id_field: String,
}

impl ProcessingService {
    pub fn new(pipeline: LayerPipeline, foundation: Arc<dyn LayerEndpoint>) -> Self {
        Self {
            pipeline,
            foundation,
            id_field: "id".to_string(),
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    fn entity(&self) -> &EntityName {
        &self.pipeline.layer().entity
    }

    fn operation(&self, verb: &str, shape: OperationShape) -> LogicalOperation {
        LogicalOperation::pass_through(self.entity().clone(), verb).with_shape(shape)
    }

    fn id_scope(&self) -> ValidationScope {
        ValidationScope::used_fields([self.id_field.as_str()])
    }

    fn id_payload(&self, record: &Value) -> Value {
        let id = record.get(&self.id_field).cloned().unwrap_or(Value::Null);
        let mut payload = serde_json::Map::new();
        payload.insert(self.id_field.clone(), id);
        Value::Object(payload)
    }

    fn all_scope() -> ValidationScope {
        ValidationScope::used_fields(Vec::<String>::new())
    }

    async fn lookup(&self, record: &Value) -> Result<Value, Failure> {
        let request = LayerRequest::new(
            self.operation(verbs::RETRIEVE_BY_ID, OperationShape::PassThrough),
            self.id_scope(),
            self.id_payload(record),
        );
        self.foundation.call(request).await
    }

    async fn write(&self, verb: &str, record: Value) -> Result<Value, Failure> {
        let request = LayerRequest::full(self.operation(verb, OperationShape::PassThrough), record);
        self.foundation.call(request).await
    }

    async fn fetch_all(&self) -> Result<Value, Failure> {
        let request = LayerRequest::new(
            self.operation(verbs::RETRIEVE_ALL, OperationShape::PassThrough),
            Self::all_scope(),
            json!({}),
        );
        self.foundation.call(request).await
    }

    async fn add_if_absent(&self, record: Value) -> Result<Value, Failure> {
        let existing = self.lookup(&record).await?;
        if !existing.is_null() {
            debug!(entity = %self.entity(), "Record already present");
            return Ok(existing);
        }
        self.write(verbs::ADD, record).await
    }

    async fn add_or_modify(&self, record: Value) -> Result<Value, Failure> {
        let existing = self.lookup(&record).await?;
        let verb = if existing.is_null() {
            verbs::ADD
        } else {
            verbs::MODIFY
        };
        self.write(verb, record).await
    }

    async fn contains(&self, record: Value) -> Result<Value, Failure> {
        let all = self.fetch_all().await?;
        let id = record.get(&self.id_field);
        let found = all
            .as_array()
            .is_some_and(|records| records.iter().any(|r| r.get(&self.id_field) == id));
        Ok(Value::Bool(found))
    }

    async fn remove_by_id(&self, record: Value) -> Result<Value, Failure> {
        let request = LayerRequest::new(
            self.operation(verbs::REMOVE_BY_ID, OperationShape::PassThrough),
            self.id_scope(),
            self.id_payload(&record),
        );
        self.foundation.call(request).await
    }

    /// Look the record up and add it only when absent.
    pub async fn ensure_exists(&self, record: Value) -> Result<Value, Failure> {
        let operation = self.operation(verbs::ENSURE_EXISTS, OperationShape::Combination);
        self.pipeline
            .invoke(&operation, &ValidationScope::Full, record, |input| {
                self.add_if_absent(input)
            })
            .await
    }

    /// Modify the record when present, add it otherwise.
    pub async fn upsert(&self, record: Value) -> Result<Value, Failure> {
        let operation = self.operation(verbs::UPSERT, OperationShape::Combination);
        self.pipeline
            .invoke(&operation, &ValidationScope::Full, record, |input| {
                self.add_or_modify(input)
            })
            .await
    }

    /// Whether a record with the same identifier is among all stored records.
    pub async fn verify_exists(&self, record: Value) -> Result<bool, Failure> {
        let operation = self.operation(verbs::VERIFY_EXISTS, OperationShape::Shifter);
        let found = self
            .pipeline
            .invoke(&operation, &self.id_scope(), record, |input| self.contains(input))
            .await?;
        Ok(found.as_bool().unwrap_or(false))
    }

    pub async fn retrieve_all(&self) -> Result<Value, Failure> {
        let operation = self.operation(verbs::RETRIEVE_ALL, OperationShape::PassThrough);
        self.pipeline
            .invoke(&operation, &Self::all_scope(), json!({}), |_| self.fetch_all())
            .await
    }

    pub async fn remove(&self, record: Value) -> Result<Value, Failure> {
        let operation = self.operation(verbs::REMOVE, OperationShape::PassThrough);
        self.pipeline
            .invoke(&operation, &self.id_scope(), record, |input| {
                self.remove_by_id(input)
            })
            .await
    }
}

#[async_trait]
impl LayerEndpoint for ProcessingService {
    fn layer(&self) -> &LayerRef {
        self.pipeline.layer()
    }

    async fn call(&self, request: LayerRequest) -> Result<Value, Failure> {
        match request.operation.verb() {
            verbs::ENSURE_EXISTS => self.ensure_exists(request.payload).await,
            verbs::UPSERT => self.upsert(request.payload).await,
            verbs::VERIFY_EXISTS => self.verify_exists(request.payload).await.map(Value::Bool),
            verbs::RETRIEVE_ALL => self.retrieve_all().await,
            verbs::REMOVE => self.remove(request.payload).await,
            _ => {
                let LayerRequest {
                    operation,
                    scope,
                    payload,
                } = request;
                let foundation = &self.foundation;
                let forwarded = LayerRequest::new(operation.clone(), scope.clone(), Value::Null);
                self.pipeline
                    .invoke(&operation, &scope, payload, move |input| async move {
                        foundation
                            .call(LayerRequest {
                                payload: input,
                                ..forwarded
                            })
                            .await
                    })
                    .await
            }
        }
    }
}

/// Single contact point for several same-kind dependencies.
pub struct CompositeService {
    pipeline: LayerPipeline,
    routes: BTreeMap<EntityName, Arc<dyn LayerEndpoint>>,
}

impl CompositeService {
    pub fn new(pipeline: LayerPipeline, routes: BTreeMap<EntityName, Arc<dyn LayerEndpoint>>) -> Self {
        Self { pipeline, routes }
    }

    pub fn routes(&self) -> impl Iterator<Item = &EntityName> {
        self.routes.keys()
    }
}

#[async_trait]
impl LayerEndpoint for CompositeService {
    fn layer(&self) -> &LayerRef {
        self.pipeline.layer()
    }

    async fn call(&self, request: LayerRequest) -> Result<Value, Failure> {
        let layer = self.pipeline.layer();
        let Some(route) = self.routes.get(request.operation.entity()) else {
            return Err(Failure::local(
                FailureClass::Validation,
                layer.entity.clone(),
                layer.kind,
                format!(
                    "{} does not route entity '{}'",
                    layer,
                    request.operation.entity()
                ),
            ));
        };

        let LayerRequest {
            operation,
            scope,
            payload,
        } = request;
        let forwarded = LayerRequest::new(operation.clone(), scope.clone(), Value::Null);
        self.pipeline
            .invoke(&operation, &scope, payload, move |input| async move {
                route
                    .call(LayerRequest {
                        payload: input,
                        ..forwarded
                    })
                    .await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::taxonomy_mapper::TaxonomyMapper;
    use crate::domain::layer::LayerKind;
    use crate::domain::policy::PolicyBook;
    use crate::domain::validation::{FieldRule, PredicateKind, ValidationEngine, ValidationRuleSet};
    use crate::infrastructure::log_sink::InMemoryLogSink;
    use crate::infrastructure::providers::InMemoryCapabilityProvider;

    fn student() -> EntityName {
        EntityName::new("Student").unwrap()
    }

    fn policies() -> PolicyBook {
        PolicyBook::new().with_rule_set(
            student(),
            ValidationRuleSet::new(
                "Student",
                vec!["id".into(), "name".into()],
                vec![
                    FieldRule::new("id", PredicateKind::NotWhitespace),
                    FieldRule::new("name", PredicateKind::NotWhitespace),
                ],
            ),
        )
    }

    fn pipeline(kind: LayerKind, entity: EntityName, sink: &Arc<InMemoryLogSink>) -> LayerPipeline {
        let layer = LayerRef::new(kind, entity);
        LayerPipeline::new(
            layer.clone(),
            policies().policy_for(&layer),
            Arc::new(ValidationEngine::default()),
            TaxonomyMapper::new(sink.clone()),
        )
    }

    fn processing(
        provider: Arc<InMemoryCapabilityProvider>,
        sink: &Arc<InMemoryLogSink>,
    ) -> ProcessingService {
        let foundation = FoundationService::new(
            pipeline(LayerKind::Foundation, student(), sink),
            ProviderEndpoint::new(provider),
        );
        ProcessingService::new(
            pipeline(LayerKind::Processing, student(), sink),
            Arc::new(foundation),
        )
    }

    #[tokio::test]
    async fn test_ensure_exists_adds_missing_record() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let service = processing(provider.clone(), &sink);

        let ada = json!({"id": "s-1", "name": "Ada"});
        assert_eq!(service.ensure_exists(ada.clone()).await.unwrap(), ada);
        assert_eq!(provider.calls(), vec![verbs::RETRIEVE_BY_ID, verbs::ADD]);

        assert_eq!(service.ensure_exists(ada.clone()).await.unwrap(), ada);
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_modifies_existing_record() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let service = processing(provider.clone(), &sink);

        service.upsert(json!({"id": "s-1", "name": "Ada"})).await.unwrap();
        service.upsert(json!({"id": "s-1", "name": "Grace"})).await.unwrap();

        assert_eq!(
            provider.calls(),
            vec![
                verbs::RETRIEVE_BY_ID,
                verbs::ADD,
                verbs::RETRIEVE_BY_ID,
                verbs::MODIFY
            ]
        );
        assert_eq!(service.retrieve_all().await.unwrap(), json!([{"id": "s-1", "name": "Grace"}]));
    }

    #[tokio::test]
    async fn test_verify_exists_shifts_list_to_bool() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let service = processing(provider.clone(), &sink);

        assert!(!service.verify_exists(json!({"id": "s-1"})).await.unwrap());
        service.ensure_exists(json!({"id": "s-1", "name": "Ada"})).await.unwrap();
        assert!(service.verify_exists(json!({"id": "s-1"})).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_record_is_translated() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let service = processing(provider, &sink);

        let failure = service.remove(json!({"id": "s-404"})).await.unwrap_err();
        assert_eq!(failure.kind, "StudentProcessingDependencyValidationFailure");
        assert_eq!(failure.wrapper_depth(), 2);
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_record_never_reaches_provider() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let service = processing(provider.clone(), &sink);

        let failure = service
            .ensure_exists(json!({"id": "s-1", "name": ""}))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, "StudentProcessingValidationFailure");
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_composite_routes_by_entity() {
        let sink = Arc::new(InMemoryLogSink::new());
        let provider = Arc::new(InMemoryCapabilityProvider::new(student()));
        let enrollment = EntityName::new("Enrollment").unwrap();

        let mut routes: BTreeMap<EntityName, Arc<dyn LayerEndpoint>> = BTreeMap::new();
        routes.insert(student(), Arc::new(processing(provider.clone(), &sink)));
        let composite = CompositeService::new(
            pipeline(LayerKind::Aggregation, enrollment.clone(), &sink),
            routes,
        );

        let request = LayerRequest::full(
            LogicalOperation::pass_through(student(), verbs::ENSURE_EXISTS),
            json!({"id": "s-1", "name": "Ada"}),
        );
        composite.call(request).await.unwrap();
        assert_eq!(provider.calls().len(), 2);

        let unrouted = LayerRequest::full(
            LogicalOperation::pass_through(EntityName::new("Course").unwrap(), verbs::RETRIEVE_ALL),
            json!({}),
        );
        let failure = composite.call(unrouted).await.unwrap_err();
        assert_eq!(failure.kind, "EnrollmentAggregationValidationFailure");
    }
}
