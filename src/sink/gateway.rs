//! HTTP ingestion sink.
//!
//! Batches are POSTed as JSON on a small background runtime. `accept` only
//! schedules the request; transport failures are logged by the request task and
//! never reach the pipeline.

use super::{IngestionSink, SinkError};
use crate::core::BatchEnvelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Ingest endpoint URL
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fire-and-forget HTTP sink.
pub struct GatewaySink {
    config: GatewayConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    in_flight: Arc<AtomicUsize>,
}

impl GatewaySink {
    /// Create a new gateway sink with its own background runtime.
    pub fn new(config: GatewayConfig) -> Result<Self, SinkError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vakaru-gateway")
            .enable_all()
            .build()
            .map_err(|e| SinkError::Unavailable(format!("Failed to create runtime: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            runtime,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Requests scheduled but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Give outstanding requests up to `timeout` to finish before the process exits.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        true
    }
}

impl IngestionSink for GatewaySink {
    fn accept(&self, batch: BatchEnvelope) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&batch).map_err(|e| SinkError::Serialization(e.to_string()))?;

        let request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .body(body);
        let in_flight = self.in_flight.clone();
        let batch_id = batch.batch_id;
        let event_count = batch.events.len();

        in_flight.fetch_add(1, Ordering::SeqCst);
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(%batch_id, event_count, "Batch delivered");
                }
                Ok(response) => {
                    tracing::warn!(%batch_id, status = response.status().as_u16(), "Gateway rejected batch");
                }
                Err(e) => {
                    tracing::warn!(%batch_id, error = %e, "Gateway request failed");
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchMetadata;
    use crate::identity::SessionContext;

    #[test]
    fn test_accept_returns_before_delivery() {
        // Nothing listens on this port; the request fails in the background.
        let sink = GatewaySink::new(GatewayConfig::new("http://127.0.0.1:9/ingest")).unwrap();
        let session = SessionContext {
            session_id: "sess".to_string(),
            user_id: "user".to_string(),
        };
        let batch = BatchEnvelope::new(
            &session,
            0,
            vec![],
            BatchMetadata {
                source: "test".to_string(),
                version: "1.0.0".to_string(),
                domain: String::new(),
            },
        );

        assert!(sink.accept(batch).is_ok());
        assert!(sink.wait_idle(Duration::from_secs(15)));
    }
}
