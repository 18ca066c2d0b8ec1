//! Batch envelopes handed to the ingestion sink.

use crate::core::record::EventRecord;
use crate::identity::{random_token, SessionContext};
use serde::{Deserialize, Serialize};

/// Summary metadata attached to every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Source tag (e.g. `shopify_web_pixel`)
    pub source: String,
    /// Schema version
    pub version: String,
    /// Originating store domain
    pub domain: String,
}

/// A flushed snapshot of the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEnvelope {
    pub batch_id: String,
    pub session_id: String,
    pub user_id: String,
    /// Flush time in unix milliseconds
    pub timestamp: i64,
    pub events: Vec<EventRecord>,
    pub metadata: BatchMetadata,
}

impl BatchEnvelope {
    /// Wrap a buffer snapshot with a fresh batch id.
    pub fn new(
        session: &SessionContext,
        timestamp: i64,
        events: Vec<EventRecord>,
        metadata: BatchMetadata,
    ) -> Self {
        Self {
            batch_id: random_token(),
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            timestamp,
            events,
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialized size in bytes. Diagnostics only.
    pub fn estimated_size(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(self).map(|bytes| bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::ClientContext;

    fn session() -> SessionContext {
        SessionContext {
            session_id: "sess_1".to_string(),
            user_id: "user_1".to_string(),
        }
    }

    fn metadata() -> BatchMetadata {
        BatchMetadata {
            source: "shopify_web_pixel".to_string(),
            version: "1.0.0".to_string(),
            domain: "shop.example".to_string(),
        }
    }

    fn record() -> EventRecord {
        EventRecord {
            session_id: "sess_1".to_string(),
            user_id: "user_1".to_string(),
            timestamp_ms: 1,
            event_type: "page_viewed".to_string(),
            payload: Default::default(),
            source_url: "https://shop.example/".to_string(),
            client_context: ClientContext {
                user_agent: "agent".to_string(),
            },
        }
    }

    #[test]
    fn test_envelope_shape() {
        let batch = BatchEnvelope::new(&session(), 42, vec![record()], metadata());
        let value = serde_json::to_value(&batch).unwrap();

        assert_eq!(value["batchId"].as_str().unwrap().len(), 9);
        assert_eq!(value["sessionId"], "sess_1");
        assert_eq!(value["userId"], "user_1");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["events"].as_array().unwrap().len(), 1);
        assert_eq!(value["metadata"]["source"], "shopify_web_pixel");
        assert_eq!(value["metadata"]["domain"], "shop.example");
    }

    #[test]
    fn test_batch_ids_are_unique() {
        let a = BatchEnvelope::new(&session(), 0, vec![], metadata());
        let b = BatchEnvelope::new(&session(), 0, vec![], metadata());
        assert_ne!(a.batch_id, b.batch_id);
    }

    #[test]
    fn test_estimated_size_grows_with_events() {
        let small = BatchEnvelope::new(&session(), 0, vec![record()], metadata());
        let large = BatchEnvelope::new(&session(), 0, vec![record(), record()], metadata());
        assert!(large.estimated_size().unwrap() > small.estimated_size().unwrap());
    }
}
