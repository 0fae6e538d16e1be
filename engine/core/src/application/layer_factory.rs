// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Layer Factory - Application Layer
//!
//! Assembles the endpoint graph for a certified topology: one service per
//! descriptor, each wired to its dependencies' services, its own policy and a
//! shared mapper and validation engine. Foundations are bound to the
//! capability provider registered for their entity, or to the default
//! provider when none is.
//!
//! Shared dependencies are built once; an orchestration over two processing
//! layers and a coordination above it reuse the same processing endpoints.
//! Composite layers route every entity reachable below them to the first
//! dependency, in declaration order, that serves it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Composition root for layer services

use crate::application::layer_service::{
    CompositeService, FoundationService, LayerEndpoint, ProcessingService, ProviderEndpoint,
};
use crate::application::pipeline::LayerPipeline;
use crate::application::taxonomy_mapper::TaxonomyMapper;
use crate::domain::events::TranslationLogSink;
use crate::domain::layer::{LayerDescriptor, LayerKind, LayerRef};
use crate::domain::operation::EntityName;
use crate::domain::policy::PolicyBook;
use crate::domain::provider::CapabilityProvider;
use crate::domain::topology::{CertifiedTopology, TopologyError};
use crate::domain::validation::ValidationEngine;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("No capability provider registered for foundation of '{0}'")]
    MissingProvider(EntityName),
}

type Built = HashMap<LayerRef, Arc<dyn LayerEndpoint>>;

pub struct LayerFactory {
    topology: CertifiedTopology,
    policies: PolicyBook,
    providers: HashMap<EntityName, Arc<dyn CapabilityProvider>>,
    default_provider: Option<Arc<dyn CapabilityProvider>>,
    mapper: TaxonomyMapper,
    validator: Arc<ValidationEngine>,
}

impl LayerFactory {
    pub fn new(
        topology: CertifiedTopology,
        policies: PolicyBook,
        sink: Arc<dyn TranslationLogSink>,
    ) -> Self {
        Self {
            topology,
            policies,
            providers: HashMap::new(),
            default_provider: None,
            mapper: TaxonomyMapper::new(sink),
            validator: Arc::new(ValidationEngine::default()),
        }
    }

    pub fn with_validator(mut self, validator: ValidationEngine) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_provider(mut self, entity: EntityName, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.insert(entity, provider);
        self
    }

    /// Provider used by foundations whose entity has no dedicated provider.
    pub fn with_default_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Build the outermost layer registered for `entity`.
    pub fn build(&self, entity: &EntityName) -> Result<Arc<dyn LayerEndpoint>, FactoryError> {
        let descriptor = self.topology.resolve(entity)?;
        self.build_layer(&descriptor.key())
    }

    pub fn build_layer(&self, layer: &LayerRef) -> Result<Arc<dyn LayerEndpoint>, FactoryError> {
        let mut built = Built::new();
        let endpoint = self.assemble(layer, &mut built)?;
        info!(
            layer = %layer,
            services = built.len(),
            "Assembled layer services"
        );
        Ok(endpoint)
    }

    fn assemble(&self, layer: &LayerRef, built: &mut Built) -> Result<Arc<dyn LayerEndpoint>, FactoryError> {
        if let Some(endpoint) = built.get(layer) {
            return Ok(endpoint.clone());
        }

        let descriptor = self.topology.resolve_layer(layer)?;
        let pipeline = self.pipeline(&descriptor);
        let endpoint: Arc<dyn LayerEndpoint> = match descriptor.kind {
            LayerKind::Foundation => {
                let provider = self
                    .providers
                    .get(&descriptor.entity)
                    .or(self.default_provider.as_ref())
                    .cloned()
                    .ok_or_else(|| FactoryError::MissingProvider(descriptor.entity.clone()))?;
                Arc::new(FoundationService::new(pipeline, ProviderEndpoint::new(provider)))
            }
            LayerKind::Processing => {
                let foundation = match descriptor.dependencies.first() {
                    Some(dependency) => self.assemble(dependency, built)?,
                    None => {
                        return Err(TopologyError::TopologyViolation {
                            layer: descriptor.key(),
                            reason: "processing layer without a foundation".to_string(),
                        }
                        .into())
                    }
                };
                Arc::new(ProcessingService::new(pipeline, foundation))
            }
            LayerKind::Orchestration | LayerKind::Coordination | LayerKind::Aggregation => {
                let mut routes = BTreeMap::new();
                for dependency in &descriptor.dependencies {
                    let endpoint = self.assemble(dependency, built)?;
                    let mut served = Vec::new();
                    self.served_entities(dependency, &mut served)?;
                    for entity in served {
                        routes.entry(entity).or_insert_with(|| endpoint.clone());
                    }
                }
                Arc::new(CompositeService::new(pipeline, routes))
            }
        };

        debug!(layer = %layer, "Built layer service");
        built.insert(layer.clone(), endpoint.clone());
        Ok(endpoint)
    }

    /// Entities reachable through `layer`, the layer's own entity first.
    fn served_entities(&self, layer: &LayerRef, out: &mut Vec<EntityName>) -> Result<(), FactoryError> {
        if !out.contains(&layer.entity) {
            out.push(layer.entity.clone());
        }
        let descriptor = self.topology.resolve_layer(layer)?;
        for dependency in &descriptor.dependencies {
            self.served_entities(dependency, out)?;
        }
        Ok(())
    }

    fn pipeline(&self, descriptor: &LayerDescriptor) -> LayerPipeline {
        let layer = descriptor.key();
        let policy = self.policies.policy_for(&layer);
        LayerPipeline::new(layer, policy, self.validator.clone(), self.mapper.clone())
    }
}
