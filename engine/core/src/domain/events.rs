// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Translation Records
//!
//! One [`TranslationRecord`] is emitted for every failure translated at a
//! layer boundary. Records go to an injected [`TranslationLogSink`];
//! implementations live in `crate::infrastructure::log_sink`.
//!
//! Sinks are best-effort: a sink error is reported back to the mapper, which
//! discards it. Delivery never influences the failure being raised.

use crate::domain::layer::LayerKind;
use crate::domain::mapping::LogSeverity;
use crate::domain::operation::EntityName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub entity: EntityName,
    pub layer: LayerKind,
    pub source_kind: String,
    pub outer_kind: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Log sink unavailable: {0}")]
    Unavailable(String),

    #[error("Log sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for translation records.
///
/// `emit` is synchronous so the pipeline gains no suspension point from
/// logging.
pub trait TranslationLogSink: Send + Sync {
    fn emit(&self, record: &TranslationRecord) -> Result<(), SinkError>;
}
