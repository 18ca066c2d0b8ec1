//! Event recorder and flush controller.
//!
//! ```text
//! record() ──▶ [ EventBuffer ] ──(threshold | timer | teardown | manual)──▶ flush() ──▶ IngestionSink
//!                   │
//!                   ▼
//!              EventStats
//! ```
//!
//! The buffer and the statistics share one lock, so an append and its count
//! are observed together. Flushes take the buffer inside that lock and hand the
//! batch to the sink after releasing it; a second lock serializes handoffs so
//! batches reach the sink in the order they were cut. A sink that panics is
//! treated like one that returns an error.

use crate::config::Config;
use crate::core::batch::{BatchEnvelope, BatchMetadata};
use crate::core::buffer::EventBuffer;
use crate::core::record::{ClientContext, EventRecord, Payload};
use crate::core::stats::{EventCount, EventStats, StatsSnapshot};
use crate::diagnostics::SharedDeliveryLog;
use crate::environment::{Environment, EnvironmentError};
use crate::identity::SessionContext;
use crate::sink::{IngestionSink, SinkError};
use chrono::{TimeZone, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Buffer reached capacity
    Threshold,
    /// Periodic timer fired
    Timer,
    /// Session is ending
    Teardown,
    /// Operator request
    Manual,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Threshold => "threshold",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Teardown => "teardown",
            FlushTrigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one flush call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no batch was built
    Empty,
    /// The sink accepted the batch
    Delivered { batch_id: String, events: usize },
    /// The sink rejected the batch; it is gone
    Dropped { batch_id: String, events: usize },
}

impl FlushOutcome {
    /// Number of records that left the buffer.
    pub fn events(&self) -> usize {
        match self {
            FlushOutcome::Empty => 0,
            FlushOutcome::Delivered { events, .. } | FlushOutcome::Dropped { events, .. } => {
                *events
            }
        }
    }
}

/// Errors raised while building a record. Never returned from [`EventPipeline::record`].
#[derive(Debug)]
pub enum RecordError {
    EmptyEventType,
    Environment(EnvironmentError),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::EmptyEventType => write!(f, "Event type must not be empty"),
            RecordError::Environment(e) => write!(f, "Could not read page context: {e}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<EnvironmentError> for RecordError {
    fn from(e: EnvironmentError) -> Self {
        RecordError::Environment(e)
    }
}

/// Settings the pipeline reads from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub buffer_size: usize,
    pub top_events: usize,
    pub source: String,
    pub schema_version: String,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            buffer_size: config.buffer_size,
            top_events: config.top_events,
            source: config.source.clone(),
            schema_version: config.schema_version.clone(),
        }
    }
}

struct PipelineState {
    buffer: EventBuffer,
    stats: EventStats,
}

/// Records events, keeps statistics and flushes batches to a sink.
pub struct EventPipeline {
    session: SessionContext,
    options: PipelineOptions,
    environment: Arc<dyn Environment>,
    sink: Arc<dyn IngestionSink>,
    state: Mutex<PipelineState>,
    delivery: Mutex<()>,
    log: SharedDeliveryLog,
}

impl EventPipeline {
    pub fn new(
        session: SessionContext,
        options: PipelineOptions,
        environment: Arc<dyn Environment>,
        sink: Arc<dyn IngestionSink>,
        log: SharedDeliveryLog,
    ) -> Self {
        let state = PipelineState {
            buffer: EventBuffer::new(options.buffer_size),
            stats: EventStats::new(now_ms()),
        };
        Self {
            session,
            options,
            environment,
            sink,
            state: Mutex::new(state),
            delivery: Mutex::new(()),
            log,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn delivery_log(&self) -> &SharedDeliveryLog {
        &self.log
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one event. Failures are logged and counted, never returned.
    pub fn record(&self, event_type: &str, payload: Payload) {
        if let Err(e) = self.try_record(event_type, payload) {
            self.log.record_failed();
            tracing::error!(event_type, error = %e, "Failed to track event");
        }
    }

    /// Record one event, reporting build failures to the caller.
    ///
    /// The record is fully built before the buffer or the statistics are touched.
    /// When the append fills the buffer, the batch (including this record) is
    /// flushed before returning.
    pub fn try_record(&self, event_type: &str, payload: Payload) -> Result<(), RecordError> {
        if event_type.is_empty() {
            return Err(RecordError::EmptyEventType);
        }

        let record = EventRecord {
            session_id: self.session.session_id.clone(),
            user_id: self.session.user_id.clone(),
            timestamp_ms: now_ms(),
            event_type: event_type.to_string(),
            source_url: self.environment.page_url()?,
            client_context: ClientContext {
                user_agent: self.environment.user_agent()?,
            },
            payload,
        };
        let trace_payload = serde_json::Value::Object(record.payload.clone());

        let (event_count, full) = {
            let mut state = self.lock_state();
            let full = state.buffer.push(record);
            state.stats.record(event_type);
            (state.stats.total_events(), full)
        };
        self.log.record_accepted();

        tracing::debug!(
            event_type,
            session = %self.session.short_session_id(15),
            event_count,
            payload = %trace_payload,
            "[Vakaru] event"
        );

        if full {
            self.flush(FlushTrigger::Threshold);
        }
        Ok(())
    }

    /// Cut the buffer into a batch and hand it to the sink.
    pub fn flush(&self, trigger: FlushTrigger) -> FlushOutcome {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());

        let (events, stats) = {
            let mut state = self.lock_state();
            if state.buffer.is_empty() {
                return FlushOutcome::Empty;
            }
            let events = state.buffer.take();
            (events, state.stats.snapshot(now_ms()))
        };
        let count = events.len();

        self.trace_flush(trigger, &events, &stats);

        let batch = BatchEnvelope::new(&self.session, now_ms(), events, self.metadata());
        let batch_id = batch.batch_id.clone();
        match batch.estimated_size() {
            Ok(size) => tracing::debug!(%batch_id, payload_size = size, "Batch built"),
            Err(e) => tracing::debug!(%batch_id, error = %e, "Could not size batch"),
        }

        let handoff = panic::catch_unwind(AssertUnwindSafe(|| self.sink.accept(batch)))
            .unwrap_or_else(|payload| Err(SinkError::Unavailable(panic_message(&*payload))));

        match handoff {
            Ok(()) => {
                self.log.batch_flushed(count);
                FlushOutcome::Delivered {
                    batch_id,
                    events: count,
                }
            }
            Err(e) => {
                self.log.batch_dropped();
                tracing::error!(%batch_id, events = count, %trigger, error = %e, "Failed to flush event buffer");
                FlushOutcome::Dropped {
                    batch_id,
                    events: count,
                }
            }
        }
    }

    fn metadata(&self) -> BatchMetadata {
        BatchMetadata {
            source: self.options.source.clone(),
            version: self.options.schema_version.clone(),
            domain: self.environment.domain(),
        }
    }

    fn trace_flush(&self, trigger: FlushTrigger, events: &[EventRecord], stats: &StatsSnapshot) {
        let top: Vec<String> = stats
            .top_events(self.options.top_events)
            .iter()
            .map(|c| c.to_string())
            .collect();

        tracing::info!(
            %trigger,
            batch_size = events.len(),
            total_events = stats.total_events,
            session_duration = %stats.session_duration_label(),
            top_events = ?top,
            "[Vakaru] Flushing {} events",
            events.len()
        );

        for event in events {
            let time = Utc
                .timestamp_millis_opt(event.timestamp_ms)
                .single()
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            tracing::debug!(
                event_type = %event.event_type,
                %time,
                key_data = %event.key_data(),
                "[Vakaru] flushed event"
            );
        }
    }

    /// Current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.lock_state().stats.snapshot(now_ms())
    }

    /// The `n` most frequent event types.
    pub fn top_events(&self, n: usize) -> Vec<EventCount> {
        self.lock_state().stats.top_events(n)
    }

    /// Records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.lock_state().buffer.len()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("sink panicked: {reason}")
}
