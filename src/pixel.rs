//! Session lifecycle around the event pipeline.
//!
//! `Pixel::start` runs the one-time setup (identity, periodic flush timer, the
//! `pixel_initialized` record). The host then feeds events and page signals, and
//! calls [`Pixel::shutdown`] (or delivers [`PageSignal::Unload`]) before exit.

use crate::collector::{subscribe_storefront, PageSignal, Subscriptions};
use crate::config::Config;
use crate::core::pipeline::now_ms;
use crate::core::{EventPipeline, FlushOutcome, FlushTimer, FlushTrigger, Payload, PipelineOptions, StatsSnapshot};
use crate::diagnostics::{DeliveryLog, DiagnosticHandle, SharedDeliveryLog};
use crate::environment::Environment;
use crate::identity::{IdentityStore, SessionContext};
use crate::sink::IngestionSink;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// A running pixel: one session, one buffer, one timer.
pub struct Pixel {
    pipeline: Arc<EventPipeline>,
    timer: Mutex<Option<FlushTimer>>,
    torn_down: AtomicBool,
}

impl Pixel {
    /// Start a pixel with fresh delivery counters.
    pub fn start(
        config: &Config,
        store: &dyn IdentityStore,
        environment: Arc<dyn Environment>,
        sink: Arc<dyn IngestionSink>,
    ) -> Self {
        Self::start_with_log(config, store, environment, sink, DeliveryLog::new().shared())
    }

    /// Start a pixel reporting into an existing delivery log.
    pub fn start_with_log(
        config: &Config,
        store: &dyn IdentityStore,
        environment: Arc<dyn Environment>,
        sink: Arc<dyn IngestionSink>,
        log: SharedDeliveryLog,
    ) -> Self {
        let session = SessionContext::initialize(store);

        tracing::info!(
            session_id = %session.short_session_id(20),
            user_id = %session.user_id,
            account_id = config.account_id.as_deref().unwrap_or("-"),
            timestamp = %Utc::now().to_rfc3339(),
            "Vakaru Pixel started"
        );

        let user_agent = environment.user_agent().unwrap_or_default();
        let pipeline = Arc::new(EventPipeline::new(
            session,
            PipelineOptions::from(config),
            environment,
            sink,
            log,
        ));

        let ticker = Arc::downgrade(&pipeline);
        let timer = match FlushTimer::start(config.flush_interval, move || {
            if let Some(pipeline) = ticker.upgrade() {
                pipeline.flush(FlushTrigger::Timer);
            }
        }) {
            Ok(timer) => Some(timer),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start flush timer; flushing on threshold and teardown only");
                None
            }
        };

        pipeline.record(
            "pixel_initialized",
            payload(json!({
                "accountId": config.account_id,
                "userAgent": user_agent,
                "timestamp": now_ms(),
            })),
        );

        Self {
            pipeline,
            timer: Mutex::new(timer),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &SessionContext {
        self.pipeline.session()
    }

    pub fn pipeline(&self) -> &Arc<EventPipeline> {
        &self.pipeline
    }

    /// Record one business event.
    pub fn record(&self, event_type: &str, payload: Payload) {
        self.pipeline.record(event_type, payload);
    }

    /// Subscribe this pixel to every storefront event.
    pub fn subscribe(&self, subscriptions: &mut Subscriptions) {
        subscribe_storefront(subscriptions, self.pipeline.clone());
    }

    /// React to a page lifecycle signal.
    pub fn handle_signal(&self, signal: PageSignal) {
        match signal {
            PageSignal::Hidden => {
                self.record("page_hidden", payload(json!({ "timestamp": now_ms() })))
            }
            PageSignal::Visible => {
                self.record("page_visible", payload(json!({ "timestamp": now_ms() })))
            }
            PageSignal::Unload => {
                self.teardown();
            }
        }
    }

    /// Flush everything buffered now.
    pub fn flush(&self) -> FlushOutcome {
        self.pipeline.flush(FlushTrigger::Manual)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    pub fn diagnostics(&self) -> DiagnosticHandle {
        DiagnosticHandle::new(self.pipeline.clone())
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Record `page_exit`, stop the timer and flush. Runs at most once.
    pub fn teardown(&self) -> FlushOutcome {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return FlushOutcome::Empty;
        }

        if let Some(mut timer) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            timer.cancel();
        }

        let time_on_page = self.pipeline.stats().session_duration_ms;
        self.record(
            "page_exit",
            payload(json!({ "timeOnPage": time_on_page, "timestamp": now_ms() })),
        );
        self.pipeline.flush(FlushTrigger::Teardown)
    }

    /// Tear down and release the pixel.
    pub fn shutdown(self) -> FlushOutcome {
        self.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::PageEnvironment;
    use crate::identity::MemoryStore;
    use crate::sink::MemorySink;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            flush_interval: Duration::from_secs(3600),
            account_id: Some("acct-1".to_string()),
            ..Config::default()
        }
    }

    fn start(sink: Arc<MemorySink>) -> Pixel {
        Pixel::start(
            &config(),
            &MemoryStore::new(),
            Arc::new(PageEnvironment::new("https://shop.example/", "agent/1.0")),
            sink,
        )
    }

    #[test]
    fn test_start_records_initialization() {
        let sink = Arc::new(MemorySink::new());
        let pixel = start(sink.clone());

        let stats = pixel.stats();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.count_of("pixel_initialized"), 1);

        pixel.flush();
        let event = &sink.events()[0];
        assert_eq!(event.event_type, "pixel_initialized");
        assert_eq!(event.payload["accountId"], "acct-1");
        assert_eq!(event.payload["userAgent"], "agent/1.0");
    }

    #[test]
    fn test_visibility_signals_record_events() {
        let sink = Arc::new(MemorySink::new());
        let pixel = start(sink);
        pixel.handle_signal(PageSignal::Hidden);
        pixel.handle_signal(PageSignal::Visible);

        let stats = pixel.stats();
        assert_eq!(stats.count_of("page_hidden"), 1);
        assert_eq!(stats.count_of("page_visible"), 1);
    }

    #[test]
    fn test_unload_records_exit_and_flushes_once() {
        let sink = Arc::new(MemorySink::new());
        let pixel = start(sink.clone());
        pixel.record("product_viewed", Payload::new());

        pixel.handle_signal(PageSignal::Unload);
        assert!(pixel.is_torn_down());
        assert_eq!(pixel.pipeline().buffered(), 0);

        let types: Vec<String> = sink.events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec!["pixel_initialized", "product_viewed", "page_exit"]);

        assert_eq!(pixel.shutdown(), FlushOutcome::Empty);
        assert_eq!(sink.batch_count(), 1);
    }

    #[test]
    fn test_diagnostic_test_event() {
        let sink = Arc::new(MemorySink::new());
        let pixel = start(sink.clone());
        let handle = pixel.diagnostics();

        handle.test();
        assert_eq!(handle.stats().count_of("manual_test"), 1);
        assert_eq!(handle.session_id(), pixel.session().session_id);

        let outcome = handle.flush();
        assert_eq!(outcome.events(), 2);
        let event = &sink.events()[1];
        assert_eq!(event.payload["triggered"], "manually");
    }
}
