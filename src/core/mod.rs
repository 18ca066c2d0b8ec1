//! Core functionality for the Vakaru pixel.
//!
//! This module contains:
//! - Event records and the buffer that holds them until flush
//! - Session statistics
//! - Batch envelopes handed to the ingestion sink
//! - The recorder/flush pipeline and its periodic timer

pub mod batch;
pub mod buffer;
pub mod pipeline;
pub mod record;
pub mod stats;
pub mod timer;

// Re-export commonly used types
pub use batch::{BatchEnvelope, BatchMetadata};
pub use buffer::EventBuffer;
pub use pipeline::{EventPipeline, FlushOutcome, FlushTrigger, PipelineOptions, RecordError};
pub use record::{ClientContext, EventRecord, Payload, KEY_FIELDS};
pub use stats::{EventCount, EventStats, StatsSnapshot};
pub use timer::FlushTimer;
