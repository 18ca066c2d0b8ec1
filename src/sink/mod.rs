//! Ingestion sinks.
//!
//! A sink receives one [`BatchEnvelope`] per flush. The pipeline's contract ends
//! at the handoff: it never retries, never inspects a response and never puts a
//! batch back into the buffer. Sinks are called from whichever thread triggered
//! the flush and must not block on the network.

mod export;
#[cfg(feature = "gateway")]
mod gateway;
mod log;
mod memory;

pub use export::ExportSink;
#[cfg(feature = "gateway")]
pub use gateway::{GatewayConfig, GatewaySink};
pub use log::LogSink;
pub use memory::MemorySink;

use crate::core::BatchEnvelope;

/// Receiver of finalized batches.
pub trait IngestionSink: Send + Sync {
    /// Take ownership of a batch.
    fn accept(&self, batch: BatchEnvelope) -> Result<(), SinkError>;
}

/// Sink errors.
#[derive(Debug)]
pub enum SinkError {
    IoError(String),
    Serialization(String),
    Network(String),
    Unavailable(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::IoError(e) => write!(f, "Sink IO error: {e}"),
            SinkError::Serialization(e) => write!(f, "Sink serialization error: {e}"),
            SinkError::Network(e) => write!(f, "Sink network error: {e}"),
            SinkError::Unavailable(e) => write!(f, "Sink unavailable: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}
