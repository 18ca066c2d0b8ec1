//! The event record stored in the buffer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured event payload.
pub type Payload = Map<String, Value>;

/// Client-side context captured with each record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    pub user_agent: String,
}

/// One normalized, timestamped observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub session_id: String,
    pub user_id: String,
    pub timestamp_ms: i64,
    pub event_type: String,
    pub payload: Payload,
    pub source_url: String,
    pub client_context: ClientContext,
}

/// Fields surfaced in flush diagnostics when present.
pub const KEY_FIELDS: [&str; 6] = [
    "productTitle",
    "searchTerm",
    "totalPrice",
    "currency",
    "quantity",
    "orderId",
];

impl EventRecord {
    /// The diagnostic subset of the payload, or `"event_captured"` when none of the
    /// key fields are present.
    pub fn key_data(&self) -> Value {
        let extracted: Payload = KEY_FIELDS
            .iter()
            .filter_map(|field| {
                self.payload
                    .get(*field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect();

        if extracted.is_empty() {
            Value::String("event_captured".to_string())
        } else {
            Value::Object(extracted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(payload: Value) -> EventRecord {
        EventRecord {
            session_id: "sess".to_string(),
            user_id: "user".to_string(),
            timestamp_ms: 0,
            event_type: "product_viewed".to_string(),
            payload: payload.as_object().cloned().unwrap_or_default(),
            source_url: "https://shop.example/".to_string(),
            client_context: ClientContext {
                user_agent: "agent".to_string(),
            },
        }
    }

    #[test]
    fn test_key_data_extracts_known_fields() {
        let r = record(json!({"productTitle": "Hat", "price": 10, "currency": "EUR"}));
        assert_eq!(
            r.key_data(),
            json!({"productTitle": "Hat", "currency": "EUR"})
        );
    }

    #[test]
    fn test_key_data_fallback() {
        let r = record(json!({"path": "/"}));
        assert_eq!(r.key_data(), json!("event_captured"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(record(json!({}))).unwrap();
        assert!(value.get("sessionId").is_some());
        assert!(value.get("timestampMs").is_some());
        assert_eq!(value["clientContext"]["userAgent"], "agent");
    }
}
