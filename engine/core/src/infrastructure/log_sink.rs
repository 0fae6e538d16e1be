// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Translation Log Sinks
//
// Implementations of the TranslationLogSink port:
// - TracingLogSink: writes each record as a tracing event at its severity
// - InMemoryLogSink: keeps records for inspection (tests, CLI demo)
// - TranslationBus: tokio broadcast fan-out to any number of subscribers
// - FanOutLogSink: forwards each record to several sinks
//
// The bus is in-memory only; records published with no subscriber are dropped.

use crate::domain::events::{SinkError, TranslationLogSink, TranslationRecord};
use crate::domain::mapping::LogSeverity;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Emits every record through `tracing`. Critical records are logged at
/// `error` level with `critical = true`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    pub fn new() -> Self {
        Self
    }
}

impl TranslationLogSink for TracingLogSink {
    fn emit(&self, record: &TranslationRecord) -> Result<(), SinkError> {
        match record.severity {
            LogSeverity::Info => info!(
                entity = %record.entity,
                layer = %record.layer,
                source_kind = %record.source_kind,
                outer_kind = %record.outer_kind,
                "Translated failure"
            ),
            LogSeverity::Warning => warn!(
                entity = %record.entity,
                layer = %record.layer,
                source_kind = %record.source_kind,
                outer_kind = %record.outer_kind,
                "Translated failure"
            ),
            LogSeverity::Error => error!(
                entity = %record.entity,
                layer = %record.layer,
                source_kind = %record.source_kind,
                outer_kind = %record.outer_kind,
                "Translated failure"
            ),
            LogSeverity::Critical => error!(
                critical = true,
                entity = %record.entity,
                layer = %record.layer,
                source_kind = %record.source_kind,
                outer_kind = %record.outer_kind,
                "Translated failure"
            ),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLogSink {
    records: Arc<Mutex<Vec<TranslationRecord>>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TranslationRecord> {
        self.records.lock().clone()
    }

    pub fn records_at(&self, severity: LogSeverity) -> Vec<TranslationRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.severity == severity)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl TranslationLogSink for InMemoryLogSink {
    fn emit(&self, record: &TranslationRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Broadcast channel for translation records.
#[derive(Clone)]
pub struct TranslationBus {
    sender: Arc<broadcast::Sender<TranslationRecord>>,
}

impl TranslationBus {
    /// Capacity is the number of records buffered before slow receivers lag.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn subscribe(&self) -> RecordReceiver {
        RecordReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TranslationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl TranslationLogSink for TranslationBus {
    fn emit(&self, record: &TranslationRecord) -> Result<(), SinkError> {
        // send() only fails when nobody is listening
        if self.sender.send(record.clone()).is_err() {
            debug!("No subscribers listening for translation records");
        }
        Ok(())
    }
}

pub struct RecordReceiver {
    receiver: broadcast::Receiver<TranslationRecord>,
}

impl RecordReceiver {
    pub async fn recv(&mut self) -> Result<TranslationRecord, BusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Record receiver lagged by {} records", n);
                BusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<TranslationRecord, BusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => BusError::Empty,
            broadcast::error::TryRecvError::Closed => BusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Record receiver lagged by {} records", n);
                BusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Translation bus is closed")]
    Closed,

    #[error("No records available")]
    Empty,

    #[error("Receiver lagged by {0} records (records were dropped)")]
    Lagged(u64),
}

/// Forwards every record to each inner sink. All sinks are tried; the first
/// error is reported.
#[derive(Clone, Default)]
pub struct FanOutLogSink {
    sinks: Vec<Arc<dyn TranslationLogSink>>,
}

impl FanOutLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TranslationLogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TranslationLogSink for FanOutLogSink {
    fn emit(&self, record: &TranslationRecord) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
