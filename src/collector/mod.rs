//! Event source adapter for the Vakaru pixel.
//!
//! The host surfaces raw storefront events by name. This module provides the
//! subscription registry, the per-event normalization into flat payloads and a
//! channel-backed source that replays JSON-lines input.

pub mod channel;
pub mod normalize;
pub mod subscriptions;
pub mod types;

// Re-export commonly used types
pub use channel::{parse_line, ChannelSource};
pub use normalize::{normalize, normalize_raw};
pub use subscriptions::{subscribe_storefront, track_navigation, Subscriptions};
pub use types::{PageSignal, RawEvent, SourceEvent, StorefrontEvent};
