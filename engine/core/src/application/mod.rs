// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod taxonomy_mapper;
pub mod pipeline;
pub mod layer_service;
pub mod layer_factory;

// Re-export the entry points for convenience
pub use layer_factory::{FactoryError, LayerFactory};
pub use layer_service::{LayerEndpoint, LayerRequest, ProcessingService};
pub use pipeline::{InvocationState, LayerPipeline};
pub use taxonomy_mapper::TaxonomyMapper;
