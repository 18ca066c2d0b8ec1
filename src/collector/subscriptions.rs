//! Name-keyed event subscriptions.

use crate::collector::normalize::normalize;
use crate::collector::types::{RawEvent, StorefrontEvent};
use crate::core::EventPipeline;
use crate::environment::PageEnvironment;
use std::collections::HashMap;
use std::sync::Arc;

type Handler = Box<dyn Fn(&RawEvent) + Send + Sync>;

/// Handlers registered per event name, invoked in subscription order.
#[derive(Default)]
pub struct Subscriptions {
    handlers: HashMap<String, Vec<Handler>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&RawEvent) + Send + Sync + 'static,
    {
        self.handlers
            .entry(name.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Deliver an event to every handler subscribed to its name.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &RawEvent) -> usize {
        match self.handlers.get(&event.name) {
            Some(handlers) => {
                for handler in handlers {
                    handler(event);
                }
                handlers.len()
            }
            None => {
                tracing::trace!(name = %event.name, "No subscribers for event");
                0
            }
        }
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Subscribed event names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Subscribe the pipeline to every storefront event.
pub fn subscribe_storefront(subscriptions: &mut Subscriptions, pipeline: Arc<EventPipeline>) {
    for kind in StorefrontEvent::ALL {
        let pipeline = pipeline.clone();
        subscriptions.subscribe(kind.as_str(), move |raw| {
            pipeline.record(kind.as_str(), normalize(kind, raw));
        });
    }
}

/// Keep the environment's page URL in step with `page_viewed` events.
///
/// Register before [`subscribe_storefront`] so the record carries the new URL.
pub fn track_navigation(subscriptions: &mut Subscriptions, environment: Arc<PageEnvironment>) {
    subscriptions.subscribe(StorefrontEvent::PageViewed.as_str(), move |raw| {
        if let Some(url) = raw.page_url() {
            environment.navigate(url);
        }
    });
}
