// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory capability provider.
//!
//! Stores records of one entity keyed by their identifier field and answers
//! the primitive verbs (`retrieve-by-id`, `retrieve-all`, `add`, `modify`,
//! `remove-by-id`). Rejections of the caller's input (duplicate add, missing
//! record) are raised as dependency-validation failures. Every invocation is
//! recorded so callers can count provider round trips.

use crate::domain::failure::{Failure, FailureClass};
use crate::domain::operation::{verbs, EntityName};
use crate::domain::provider::CapabilityProvider;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub struct InMemoryCapabilityProvider {
    entity: EntityName,
    id_field: String,
    records: RwLock<BTreeMap<String, Value>>,
    injected: RwLock<HashMap<String, Failure>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryCapabilityProvider {
    pub fn new(entity: EntityName) -> Self {
        Self {
            entity,
            id_field: "id".to_string(),
            records: RwLock::new(BTreeMap::new()),
            injected: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Pre-load records. Records without an identifier are skipped.
    pub fn seed(&self, records: impl IntoIterator<Item = Value>) {
        let mut store = self.records.write();
        for record in records {
            if let Some(key) = self.key_of(&record) {
                store.insert(key, record);
            }
        }
    }

    /// Make every later call of `operation` fail with `failure`.
    pub fn inject_failure(&self, operation: impl Into<String>, failure: Failure) {
        self.injected.write().insert(operation.into(), failure);
    }

    /// Operation names received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn key_of(&self, record: &Value) -> Option<String> {
        match record.get(&self.id_field)? {
            Value::Null => None,
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    fn rejected(&self, message: impl Into<String>) -> Failure {
        Failure::provider(FailureClass::DependencyValidation, self.entity.clone(), message)
    }

    fn require_key(&self, payload: &Value) -> Result<String, Failure> {
        self.key_of(payload)
            .ok_or_else(|| self.rejected(format!("payload has no '{}'", self.id_field)))
    }

    fn dispatch(&self, operation_name: &str, payload: Value) -> Result<Value, Failure> {
        match operation_name {
            verbs::RETRIEVE_BY_ID => {
                let key = self.require_key(&payload)?;
                Ok(self.records.read().get(&key).cloned().unwrap_or(Value::Null))
            }
            verbs::RETRIEVE_ALL => Ok(Value::Array(self.records.read().values().cloned().collect())),
            verbs::ADD => {
                let key = self.require_key(&payload)?;
                let mut records = self.records.write();
                if records.contains_key(&key) {
                    return Err(self.rejected(format!("{} '{}' already exists", self.entity, key)));
                }
                records.insert(key, payload.clone());
                Ok(payload)
            }
            verbs::MODIFY => {
                let key = self.require_key(&payload)?;
                let mut records = self.records.write();
                match records.get_mut(&key) {
                    Some(existing) => {
                        *existing = payload.clone();
                        Ok(payload)
                    }
                    None => Err(self.rejected(format!("{} '{}' not found", self.entity, key))),
                }
            }
            verbs::REMOVE_BY_ID => {
                let key = self.require_key(&payload)?;
                self.records
                    .write()
                    .remove(&key)
                    .ok_or_else(|| self.rejected(format!("{} '{}' not found", self.entity, key)))
            }
            other => Err(Failure::provider(
                FailureClass::Service,
                self.entity.clone(),
                format!("unsupported operation '{}'", other),
            )),
        }
    }
}

#[async_trait]
impl CapabilityProvider for InMemoryCapabilityProvider {
    async fn invoke(&self, operation_name: &str, payload: Value) -> Result<Value, Failure> {
        self.calls.lock().push(operation_name.to_string());
        debug!(entity = %self.entity, operation = operation_name, "Provider invoked");

        if let Some(failure) = self.injected.read().get(operation_name) {
            return Err(failure.clone());
        }
        self.dispatch(operation_name, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> InMemoryCapabilityProvider {
        InMemoryCapabilityProvider::new(EntityName::new("Student").unwrap())
    }

    #[tokio::test]
    async fn test_add_then_retrieve() {
        let provider = provider();
        let ada = json!({"id": "s-1", "name": "Ada"});
        provider.invoke(verbs::ADD, ada.clone()).await.unwrap();

        let found = provider
            .invoke(verbs::RETRIEVE_BY_ID, json!({"id": "s-1"}))
            .await
            .unwrap();
        assert_eq!(found, ada);

        let missing = provider
            .invoke(verbs::RETRIEVE_BY_ID, json!({"id": "s-2"}))
            .await
            .unwrap();
        assert!(missing.is_null());
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let provider = provider();
        provider.seed([json!({"id": 7, "name": "Ada"})]);

        let failure = provider
            .invoke(verbs::ADD, json!({"id": 7, "name": "Grace"}))
            .await
            .unwrap_err();
        assert_eq!(failure.class, FailureClass::DependencyValidation);
        assert_eq!(failure.kind, "DependencyValidationFailure");
    }

    #[tokio::test]
    async fn test_modify_and_remove_require_existing_record() {
        let provider = provider();
        assert!(provider.invoke(verbs::MODIFY, json!({"id": "s-1"})).await.is_err());
        assert!(provider.invoke(verbs::REMOVE_BY_ID, json!({"id": "s-1"})).await.is_err());

        provider.seed([json!({"id": "s-1", "name": "Ada"})]);
        provider
            .invoke(verbs::MODIFY, json!({"id": "s-1", "name": "Grace"}))
            .await
            .unwrap();
        let removed = provider
            .invoke(verbs::REMOVE_BY_ID, json!({"id": "s-1"}))
            .await
            .unwrap();
        assert_eq!(removed["name"], "Grace");
        assert!(provider.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_and_unknown_operation() {
        let provider = provider();
        let injected = Failure::provider(
            FailureClass::Dependency,
            EntityName::new("Student").unwrap(),
            "store offline",
        );
        provider.inject_failure(verbs::RETRIEVE_ALL, injected.clone());

        assert_eq!(provider.invoke(verbs::RETRIEVE_ALL, json!({})).await.unwrap_err(), injected);

        let unknown = provider.invoke("archive", json!({})).await.unwrap_err();
        assert_eq!(unknown.class, FailureClass::Service);
    }
}
