//! Integration tests for the pixel delivery pipeline

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vakaru_pixel::{
    collector::track_navigation, BatchEnvelope, Config, IdentityStore, IngestionSink,
    MemorySink, MemoryStore, PageEnvironment, PageSignal, Pixel, RawEvent, SinkError,
    Subscriptions, UnavailableStore,
};

struct RejectingSink;

impl IngestionSink for RejectingSink {
    fn accept(&self, _batch: BatchEnvelope) -> Result<(), SinkError> {
        Err(SinkError::Network("connection refused".to_string()))
    }
}

fn config(interval: Duration) -> Config {
    Config {
        flush_interval: interval,
        account_id: Some("acct-test".to_string()),
        ..Config::default()
    }
}

fn environment() -> Arc<PageEnvironment> {
    Arc::new(PageEnvironment::new("https://shop.example/", "test-agent/1.0"))
}

#[test]
fn test_threshold_flush_includes_triggering_record() {
    let sink = Arc::new(MemorySink::new());
    let pixel = Pixel::start(&config(Duration::from_secs(3600)), &MemoryStore::new(), environment(), sink.clone());

    // pixel_initialized occupies the first slot
    for i in 0..8 {
        pixel.record("product_viewed", json!({ "i": i }).as_object().cloned().unwrap());
    }
    assert_eq!(sink.batch_count(), 0);
    assert_eq!(pixel.pipeline().buffered(), 9);

    pixel.record("product_viewed", Default::default());
    assert_eq!(sink.batch_count(), 1);
    assert_eq!(sink.batches()[0].len(), 10);
    assert_eq!(pixel.pipeline().buffered(), 0);
}

#[test]
fn test_timer_flushes_partial_buffer() {
    let sink = Arc::new(MemorySink::new());
    let pixel = Pixel::start(&config(Duration::from_millis(50)), &MemoryStore::new(), environment(), sink.clone());

    pixel.record("page_viewed", Default::default());
    pixel.record("search_submitted", Default::default());
    pixel.record("product_viewed", Default::default());

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(pixel.pipeline().buffered(), 0);
    assert_eq!(sink.events().len(), 4);

    // Idle ticks do not produce empty batches
    let batches = sink.batch_count();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(sink.batch_count(), batches);
    assert!(sink.batches().iter().all(|b| !b.is_empty()));

    pixel.shutdown();
}

#[test]
fn test_rejected_batches_are_dropped_and_counted() {
    let pixel = Pixel::start(
        &config(Duration::from_secs(3600)),
        &MemoryStore::new(),
        environment(),
        Arc::new(RejectingSink),
    );
    pixel.record("checkout_started", Default::default());

    let outcome = pixel.flush();
    assert_eq!(outcome.events(), 2);
    assert_eq!(pixel.pipeline().buffered(), 0);

    let delivery = pixel.diagnostics().delivery();
    assert_eq!(delivery.batches_dropped, 1);
    assert_eq!(delivery.batches_flushed, 0);

    // Statistics keep counting after a failed delivery
    pixel.record("checkout_completed", Default::default());
    assert_eq!(pixel.stats().total_events, 3);
}

#[test]
fn test_every_record_delivered_exactly_once() {
    let sink = Arc::new(MemorySink::new());
    let pixel = Pixel::start(&config(Duration::from_millis(5)), &MemoryStore::new(), environment(), sink.clone());

    for i in 0..57 {
        pixel.record("product_viewed", json!({ "seq": i }).as_object().cloned().unwrap());
    }
    pixel.shutdown();

    let seqs: Vec<i64> = sink
        .events()
        .iter()
        .filter(|e| e.event_type == "product_viewed")
        .filter_map(|e| e.payload.get("seq").and_then(|v| v.as_i64()))
        .collect();
    assert_eq!(seqs, (0..57).collect::<Vec<_>>());

    let types: Vec<String> = sink.events().into_iter().map(|e| e.event_type).collect();
    assert_eq!(types.first().map(String::as_str), Some("pixel_initialized"));
    assert_eq!(types.last().map(String::as_str), Some("page_exit"));
    assert!(sink.batches().iter().all(|b| b.len() <= 10 && !b.is_empty()));
}

#[test]
fn test_user_id_stable_across_sessions() {
    let store = MemoryStore::new();
    let first = Pixel::start(&config(Duration::from_secs(3600)), &store, environment(), Arc::new(MemorySink::new()));
    let second = Pixel::start(&config(Duration::from_secs(3600)), &store, environment(), Arc::new(MemorySink::new()));

    assert_eq!(first.session().user_id, second.session().user_id);
    assert_ne!(first.session().session_id, second.session().session_id);
    assert_eq!(
        store.get("vakaru_user_id").unwrap().as_deref(),
        Some(first.session().user_id.as_str())
    );
}

#[test]
fn test_unavailable_store_still_tracks() {
    let sink = Arc::new(MemorySink::new());
    let pixel = Pixel::start(&config(Duration::from_secs(3600)), &UnavailableStore, environment(), sink.clone());

    assert!(pixel.session().user_id.starts_with("user_"));
    pixel.record("page_viewed", Default::default());
    pixel.flush();
    assert!(sink
        .events()
        .iter()
        .all(|e| e.user_id == pixel.session().user_id));
}

#[test]
fn test_storefront_journey_end_to_end() {
    let sink = Arc::new(MemorySink::new());
    let env = environment();
    let pixel = Pixel::start(&config(Duration::from_secs(3600)), &MemoryStore::new(), env.clone(), sink.clone());

    let mut subscriptions = Subscriptions::new();
    track_navigation(&mut subscriptions, env);
    pixel.subscribe(&mut subscriptions);

    subscriptions.publish(&RawEvent::new("page_viewed").with_context(json!({
        "document": {
            "title": "Mug",
            "location": { "href": "https://shop.example/products/mug", "pathname": "/products/mug" }
        }
    })));
    subscriptions.publish(&RawEvent::new("product_added_to_cart").with_data(json!({
        "cartLine": {
            "quantity": 2,
            "merchandise": { "id": "v-1", "product": { "id": "p-1" } }
        }
    })));
    assert_eq!(subscriptions.publish(&RawEvent::new("collection_viewed")), 0);

    pixel.handle_signal(PageSignal::Unload);

    let events = sink.events();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["pixel_initialized", "page_viewed", "product_added_to_cart", "page_exit"]
    );

    let viewed = &events[1];
    assert_eq!(viewed.source_url, "https://shop.example/products/mug");
    assert_eq!(viewed.payload["path"], "/products/mug");
    assert!(viewed.payload.get("referrer").is_none());

    let added = &events[2];
    assert_eq!(added.payload["productId"], "p-1");
    assert_eq!(added.payload["quantity"], 2);
    assert_eq!(added.client_context.user_agent, "test-agent/1.0");

    let batch = &sink.batches()[0];
    assert_eq!(batch.metadata.domain, "shop.example");
    assert_eq!(batch.metadata.source, "shopify_web_pixel");
}
