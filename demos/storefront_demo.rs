//! Demonstration of the Vakaru pixel on a simulated storefront visit.
//!
//! This example shows how to:
//! 1. Start a pixel with an in-memory identity store
//! 2. Subscribe it to storefront events
//! 3. Publish a shopping journey and watch batches flush
//! 4. Tear down and print session statistics
//!
//! Run with: cargo run --example storefront_demo

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vakaru_pixel::{
    collector::track_navigation, Config, MemorySink, MemoryStore, PageEnvironment, PageSignal,
    Pixel, RawEvent, Subscriptions, COLLECTION_DECLARATION,
};

fn journey() -> Vec<RawEvent> {
    let page = |path: &str, title: &str| {
        RawEvent::new("page_viewed")
            .with_timestamp("2024-05-01T10:00:00Z")
            .with_context(json!({
                "document": {
                    "title": title,
                    "referrer": "",
                    "location": {
                        "href": format!("https://shop.example{path}"),
                        "pathname": path,
                    }
                }
            }))
    };

    vec![
        page("/", "Home"),
        RawEvent::new("search_submitted").with_data(json!({
            "searchResult": { "query": "mug", "productVariants": [{}, {}, {}] }
        })),
        page("/products/mug", "Mug"),
        RawEvent::new("product_viewed").with_data(json!({
            "productVariant": {
                "id": "v-1",
                "price": { "amount": 12.5, "currencyCode": "EUR" },
                "product": { "id": "p-1", "title": "Mug", "type": "Kitchen", "vendor": "Acme" }
            }
        })),
        RawEvent::new("product_added_to_cart").with_data(json!({
            "cartLine": {
                "quantity": 2,
                "cost": { "totalAmount": { "amount": 25.0 } },
                "merchandise": { "id": "v-1", "product": { "id": "p-1" } }
            }
        })),
        RawEvent::new("checkout_started").with_data(json!({
            "checkout": {
                "token": "chk-1",
                "totalPrice": { "amount": 25.0, "currencyCode": "EUR" },
                "lineItems": [{}]
            }
        })),
        RawEvent::new("payment_info_submitted").with_data(json!({ "checkout": { "token": "chk-1" } })),
        RawEvent::new("checkout_completed").with_data(json!({
            "checkout": {
                "order": { "id": "order-42" },
                "totalPrice": { "amount": 25.0, "currencyCode": "EUR" }
            }
        })),
    ]
}

fn main() {
    println!("Vakaru Pixel - Storefront Demo");
    println!("==============================");
    println!();
    println!("{COLLECTION_DECLARATION}");
    println!();

    let config = Config {
        buffer_size: 4,
        flush_interval: Duration::from_secs(60),
        account_id: Some("demo-shop".to_string()),
        ..Config::default()
    };

    let sink = Arc::new(MemorySink::new());
    let environment = Arc::new(PageEnvironment::new("https://shop.example/", "demo-browser/1.0"));
    let pixel = Pixel::start(&config, &MemoryStore::new(), environment.clone(), sink.clone());

    println!("Session: {}", pixel.session().session_id);
    println!("User:    {}", pixel.session().user_id);
    println!();

    let mut subscriptions = Subscriptions::new();
    track_navigation(&mut subscriptions, environment);
    pixel.subscribe(&mut subscriptions);

    for event in journey() {
        subscriptions.publish(&event);
        println!(
            "  {:<24} buffered={} batches={}",
            event.name,
            pixel.pipeline().buffered(),
            sink.batch_count()
        );
    }

    pixel.handle_signal(PageSignal::Hidden);
    pixel.handle_signal(PageSignal::Unload);

    println!();
    println!("Batches delivered:");
    for batch in sink.batches() {
        let types: Vec<&str> = batch.events.iter().map(|e| e.event_type.as_str()).collect();
        println!("  {} ({} events): {}", batch.batch_id, batch.len(), types.join(", "));
    }

    let stats = pixel.stats();
    println!();
    println!("Session Statistics:");
    println!("  Total events: {}", stats.total_events);
    println!("  Session duration: {}", stats.session_duration_label());
    println!("  Top events:");
    for count in stats.top_events(config.top_events) {
        println!("    {count}");
    }
}
