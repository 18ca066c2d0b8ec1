//! Operator-facing handle onto a running pixel.

use crate::core::pipeline::now_ms;
use crate::core::{EventCount, EventPipeline, FlushOutcome, FlushTrigger, Payload, StatsSnapshot};
use crate::diagnostics::DeliveryStats;
use serde_json::{json, Value};
use std::sync::Arc;

/// Event type recorded by [`DiagnosticHandle::test`].
pub const MANUAL_TEST_EVENT: &str = "manual_test";

/// Cloneable debugging handle: statistics, manual flush and a synthetic event.
///
/// Not part of the data path; nothing here changes what gets recorded except
/// [`DiagnosticHandle::test`], which records one `manual_test` event.
#[derive(Clone)]
pub struct DiagnosticHandle {
    pipeline: Arc<EventPipeline>,
}

impl DiagnosticHandle {
    pub fn new(pipeline: Arc<EventPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn session_id(&self) -> &str {
        &self.pipeline.session().session_id
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    pub fn top_events(&self) -> Vec<EventCount> {
        self.pipeline
            .top_events(self.pipeline.options().top_events)
    }

    pub fn delivery(&self) -> DeliveryStats {
        self.pipeline.delivery_log().stats()
    }

    pub fn buffered(&self) -> usize {
        self.pipeline.buffered()
    }

    /// Flush whatever is buffered right now.
    pub fn flush(&self) -> FlushOutcome {
        self.pipeline.flush(FlushTrigger::Manual)
    }

    /// Record a synthetic event.
    pub fn test(&self) {
        let payload = match json!({ "triggered": "manually", "timestamp": now_ms() }) {
            Value::Object(map) => map,
            _ => Payload::new(),
        };
        self.pipeline.record(MANUAL_TEST_EVENT, payload);
    }
}
