//! Raw events as the host surfaces them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event from the host's analytics subscription.
///
/// `context` carries page metadata (`document.title`, `document.location`, ...)
/// and `data` the domain-specific block (product, cart line, checkout, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub timestamp: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<Value>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Look up a context field by JSON pointer (`/document/title`).
    pub fn context_field(&self, pointer: &str) -> Option<&Value> {
        self.context.pointer(pointer).filter(|v| !v.is_null())
    }

    /// Look up a data field by JSON pointer (`/checkout/token`).
    pub fn data_field(&self, pointer: &str) -> Option<&Value> {
        self.data.pointer(pointer).filter(|v| !v.is_null())
    }

    /// The page URL carried in the context block, if any.
    pub fn page_url(&self) -> Option<&str> {
        self.context_field("/document/location/href")
            .and_then(Value::as_str)
    }
}

/// Storefront events the pixel subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorefrontEvent {
    PageViewed,
    ProductViewed,
    ProductAddedToCart,
    ProductRemovedFromCart,
    SearchSubmitted,
    CheckoutStarted,
    PaymentInfoSubmitted,
    CheckoutCompleted,
}

impl StorefrontEvent {
    pub const ALL: [StorefrontEvent; 8] = [
        StorefrontEvent::PageViewed,
        StorefrontEvent::ProductViewed,
        StorefrontEvent::ProductAddedToCart,
        StorefrontEvent::ProductRemovedFromCart,
        StorefrontEvent::SearchSubmitted,
        StorefrontEvent::CheckoutStarted,
        StorefrontEvent::PaymentInfoSubmitted,
        StorefrontEvent::CheckoutCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorefrontEvent::PageViewed => "page_viewed",
            StorefrontEvent::ProductViewed => "product_viewed",
            StorefrontEvent::ProductAddedToCart => "product_added_to_cart",
            StorefrontEvent::ProductRemovedFromCart => "product_removed_from_cart",
            StorefrontEvent::SearchSubmitted => "search_submitted",
            StorefrontEvent::CheckoutStarted => "checkout_started",
            StorefrontEvent::PaymentInfoSubmitted => "payment_info_submitted",
            StorefrontEvent::CheckoutCompleted => "checkout_completed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl std::fmt::Display for StorefrontEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page lifecycle signals from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSignal {
    /// Page moved to the background
    Hidden,
    /// Page returned to the foreground
    Visible,
    /// Page/process about to terminate
    Unload,
}

impl PageSignal {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "page_hidden" => Some(PageSignal::Hidden),
            "page_visible" => Some(PageSignal::Visible),
            "page_unload" | "beforeunload" => Some(PageSignal::Unload),
            _ => None,
        }
    }
}

/// Anything the host can deliver to the pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Storefront(RawEvent),
    Signal(PageSignal),
}

impl From<RawEvent> for SourceEvent {
    fn from(raw: RawEvent) -> Self {
        match PageSignal::from_name(&raw.name) {
            Some(signal) => SourceEvent::Signal(signal),
            None => SourceEvent::Storefront(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names_round_trip() {
        for event in StorefrontEvent::ALL {
            assert_eq!(StorefrontEvent::from_name(event.as_str()), Some(event));
        }
        assert_eq!(StorefrontEvent::from_name("cart_viewed"), None);
    }

    #[test]
    fn test_raw_event_parses_with_missing_blocks() {
        let raw: RawEvent = serde_json::from_str(r#"{"name":"page_viewed"}"#).unwrap();
        assert_eq!(raw.name, "page_viewed");
        assert!(raw.context.is_null());
        assert_eq!(raw.page_url(), None);
    }

    #[test]
    fn test_signal_classification() {
        assert_eq!(
            SourceEvent::from(RawEvent::new("page_hidden")),
            SourceEvent::Signal(PageSignal::Hidden)
        );
        assert!(matches!(
            SourceEvent::from(RawEvent::new("product_viewed")),
            SourceEvent::Storefront(_)
        ));
    }

    #[test]
    fn test_null_fields_are_absent() {
        let raw = RawEvent::new("x").with_data(json!({"checkout": {"token": null}}));
        assert_eq!(raw.data_field("/checkout/token"), None);
    }
}
