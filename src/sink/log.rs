//! Simulated ingestion: logs the request instead of sending it.

use super::{IngestionSink, SinkError};
use crate::core::BatchEnvelope;

/// Logs what an ingestion call would have sent.
#[derive(Debug, Clone)]
pub struct LogSink {
    endpoint: String,
}

impl LogSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IngestionSink for LogSink {
    fn accept(&self, batch: BatchEnvelope) -> Result<(), SinkError> {
        let payload_size = batch
            .estimated_size()
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        tracing::info!(
            endpoint = %self.endpoint,
            method = "POST",
            payload_size = format!("{payload_size} bytes"),
            event_count = batch.len(),
            batch_id = %batch.batch_id,
            "Simulated API call"
        );
        Ok(())
    }
}
