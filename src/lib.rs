//! Vakaru Pixel - storefront event telemetry collector.
//!
//! Observes storefront interaction events, stamps them with session context,
//! buffers them and hands batches to an ingestion sink.
//!
//! # Delivery Model
//!
//! - **Threshold flush**: the record that fills the buffer is flushed with it
//! - **Timer flush**: a periodic timer flushes whatever is buffered
//! - **Teardown flush**: the session-end signal records `page_exit` and flushes
//! - **Fire-and-forget**: a batch the sink rejects is dropped, never retried
//! - **Isolation**: tracking never fails the calling code; failures are logged
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Vakaru Pixel                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│  Recorder   │──▶│   Buffer    │──┐    │
//! │  │ (normalize) │   │  (stamp)    │   │ (10 events) │  │    │
//! │  └─────────────┘   └─────────────┘   └─────────────┘  │    │
//! │                          │          threshold/timer/  │    │
//! │                          ▼              teardown      ▼    │
//! │                   ┌─────────────┐            ┌──────────┐  │
//! │                   │ Statistics  │            │   Sink   │  │
//! │                   └─────────────┘            └──────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vakaru_pixel::{Config, LogSink, MemoryStore, PageEnvironment, Pixel};
//!
//! let config = Config::default();
//! let pixel = Pixel::start(
//!     &config,
//!     &MemoryStore::new(),
//!     Arc::new(PageEnvironment::new("https://shop.example/", "demo-agent")),
//!     Arc::new(LogSink::new(&config.endpoint)),
//! );
//!
//! pixel.record("page_viewed", Default::default());
//! pixel.shutdown();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod environment;
pub mod identity;
pub mod pixel;
pub mod sink;

// Re-export key types at crate root for convenience
pub use collector::{PageSignal, RawEvent, SourceEvent, StorefrontEvent, Subscriptions};
pub use config::{Config, ConfigError};
pub use crate::core::{
    BatchEnvelope, EventPipeline, EventRecord, FlushOutcome, FlushTrigger, Payload, StatsSnapshot,
};
pub use diagnostics::{DeliveryLog, DeliveryStats, DiagnosticHandle, SharedDeliveryLog};
pub use environment::{Environment, PageEnvironment};
pub use identity::{FileStore, IdentityStore, MemoryStore, SessionContext, UnavailableStore};
pub use pixel::Pixel;
pub use sink::{ExportSink, IngestionSink, LogSink, MemorySink, SinkError};

#[cfg(feature = "gateway")]
pub use sink::{GatewayConfig, GatewaySink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Collection declaration that can be displayed to merchants.
pub const COLLECTION_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              VAKARU PIXEL - COLLECTION DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This pixel records storefront interactions for analytics.       ║
║                                                                  ║
║  ✓ WHAT WE RECORD:                                               ║
║    • Page views, product views and searches                      ║
║    • Cart additions and removals                                 ║
║    • Checkout start, payment step and completion                 ║
║    • Page visibility changes and time on page                    ║
║                                                                  ║
║  ✓ WITH EACH EVENT:                                              ║
║    • A per-visit session id and a pseudonymous user id           ║
║    • The page URL and the browser's user agent                   ║
║                                                                  ║
║  ✗ WHAT WE NEVER RECORD:                                         ║
║    • Payment card details                                        ║
║    • Form contents or keystrokes                                 ║
║                                                                  ║
║  Events are batched in memory and sent every 10 events or        ║
║  every 5 seconds, whichever comes first.                         ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
