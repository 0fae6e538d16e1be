// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Exception Taxonomy Mapper
//!
//! Re-classifies a failure raised below a layer into the failure kind that
//! layer exposes, according to the layer's [`MappingTable`].
//!
//! Resolution ([`TaxonomyMapper::map`]) is a pure function of the failure and
//! the table. [`TaxonomyMapper::translate`] adds exactly one
//! [`TranslationRecord`] per translation, sent to the injected sink on a
//! best-effort basis.
//!
//! Cancellation is not a taxonomy to translate: cancellation failures are
//! returned untouched and no record is written.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** Domain `MappingTable`, `TranslationLogSink` port

use crate::domain::events::{TranslationLogSink, TranslationRecord};
use crate::domain::failure::{Failure, FailureOrigin};
use crate::domain::layer::LayerKind;
use crate::domain::mapping::{LogSeverity, MappingTable};
use crate::domain::operation::EntityName;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of resolving a failure against a table, before any logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub failure: Failure,
    pub source_kind: String,
    pub severity: LogSeverity,
}

#[derive(Clone)]
pub struct TaxonomyMapper {
    sink: Arc<dyn TranslationLogSink>,
}

impl TaxonomyMapper {
    pub fn new(sink: Arc<dyn TranslationLogSink>) -> Self {
        Self { sink }
    }

    /// Pure resolution of the outer failure.
    pub fn map(
        failure: Failure,
        table: &MappingTable,
        entity: &EntityName,
        layer: LayerKind,
    ) -> Translation {
        let rule = table.resolve(&failure);
        let source_kind = failure.kind.clone();

        let mut outer = Failure::new(
            rule.outer.class,
            rule.outer.kind.clone(),
            entity.clone(),
            FailureOrigin::Layer(layer),
            failure.message.clone(),
        );
        if rule.wrap_inner {
            outer.violations = failure.violations.clone();
            outer.inner = Some(Box::new(failure));
        }

        Translation {
            failure: outer,
            source_kind,
            severity: rule.severity,
        }
    }

    /// Translate `failure` for the boundary of `layer` and log the translation.
    pub fn translate(
        &self,
        failure: Failure,
        table: &MappingTable,
        entity: &EntityName,
        layer: LayerKind,
    ) -> Failure {
        if failure.is_cancellation() {
            debug!(
                entity = %entity,
                layer = %layer,
                kind = %failure.kind,
                "Passing cancellation through untranslated"
            );
            return failure;
        }

        let translation = Self::map(failure, table, entity, layer);
        let record = TranslationRecord {
            timestamp: chrono::Utc::now(),
            severity: translation.severity,
            entity: entity.clone(),
            layer,
            source_kind: translation.source_kind,
            outer_kind: translation.failure.kind.clone(),
        };

        if let Err(e) = self.sink.emit(&record) {
            warn!(
                entity = %entity,
                layer = %layer,
                "Dropping translation record: {}",
                e
            );
        }

        translation.failure
    }
}

impl std::fmt::Debug for TaxonomyMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyMapper").finish_non_exhaustive()
    }
}
