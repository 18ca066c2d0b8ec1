//! In-memory sink for inspecting delivered batches.

use super::{IngestionSink, SinkError};
use crate::core::{BatchEnvelope, EventRecord};
use std::sync::Mutex;

/// Keeps every accepted batch in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<BatchEnvelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received so far, in arrival order.
    pub fn batches(&self) -> Vec<BatchEnvelope> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// All received records, concatenated in arrival order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect()
    }

    /// Drain the received batches.
    pub fn take_batches(&self) -> Vec<BatchEnvelope> {
        std::mem::take(&mut *self.batches.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl IngestionSink for MemorySink {
    fn accept(&self, batch: BatchEnvelope) -> Result<(), SinkError> {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(batch);
        Ok(())
    }
}
