//! Diagnostics for the Vakaru pixel.
//!
//! Delivery counters that outlive a run, and a handle for inspecting and poking
//! a running pixel. Everything here reports through `tracing` or return values;
//! nothing surfaces to the code emitting events.

pub mod handle;
pub mod log;

// Re-export commonly used types
pub use handle::{DiagnosticHandle, MANUAL_TEST_EVENT};
pub use log::{DeliveryLog, DeliveryStats, SharedDeliveryLog};
