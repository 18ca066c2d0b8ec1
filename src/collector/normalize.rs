//! Flattening of raw storefront events into record payloads.
//!
//! Each subscribed event has a fixed field table. Fields missing from the raw
//! event are left out of the payload rather than recorded as null.

use crate::collector::types::{RawEvent, StorefrontEvent};
use crate::core::Payload;
use serde_json::Value;

/// Where a payload field comes from.
#[derive(Debug, Clone, Copy)]
enum Field {
    Context(&'static str),
    Data(&'static str),
    /// Length of an array in the data block
    DataLen(&'static str),
    Timestamp,
}

use Field::{Context, Data, DataLen, Timestamp};

const PAGE_VIEWED: &[(&str, Field)] = &[
    ("title", Context("/document/title")),
    ("url", Context("/document/location/href")),
    ("referrer", Context("/document/referrer")),
    ("timestamp", Timestamp),
    ("path", Context("/document/location/pathname")),
];

const PRODUCT_VIEWED: &[(&str, Field)] = &[
    ("productId", Data("/productVariant/product/id")),
    ("variantId", Data("/productVariant/id")),
    ("productTitle", Data("/productVariant/product/title")),
    ("productType", Data("/productVariant/product/type")),
    ("vendor", Data("/productVariant/product/vendor")),
    ("price", Data("/productVariant/price/amount")),
    ("currency", Data("/productVariant/price/currencyCode")),
    ("timestamp", Timestamp),
];

const PRODUCT_ADDED_TO_CART: &[(&str, Field)] = &[
    ("productId", Data("/cartLine/merchandise/product/id")),
    ("variantId", Data("/cartLine/merchandise/id")),
    ("quantity", Data("/cartLine/quantity")),
    ("price", Data("/cartLine/cost/totalAmount/amount")),
    ("cartId", Data("/cartLine/merchandise/product/id")),
    ("timestamp", Timestamp),
];

const PRODUCT_REMOVED_FROM_CART: &[(&str, Field)] = &[
    ("productId", Data("/cartLine/merchandise/product/id")),
    ("variantId", Data("/cartLine/merchandise/id")),
    ("quantity", Data("/cartLine/quantity")),
    ("timestamp", Timestamp),
];

const SEARCH_SUBMITTED: &[(&str, Field)] = &[
    ("searchTerm", Data("/searchResult/query")),
    ("resultsCount", DataLen("/searchResult/productVariants")),
    ("timestamp", Timestamp),
];

const CHECKOUT_STARTED: &[(&str, Field)] = &[
    ("checkoutToken", Data("/checkout/token")),
    ("totalPrice", Data("/checkout/totalPrice/amount")),
    ("currency", Data("/checkout/totalPrice/currencyCode")),
    ("lineItemsCount", DataLen("/checkout/lineItems")),
    ("timestamp", Timestamp),
];

const PAYMENT_INFO_SUBMITTED: &[(&str, Field)] = &[
    ("checkoutToken", Data("/checkout/token")),
    ("timestamp", Timestamp),
];

const CHECKOUT_COMPLETED: &[(&str, Field)] = &[
    ("orderId", Data("/checkout/order/id")),
    ("totalPrice", Data("/checkout/totalPrice/amount")),
    ("currency", Data("/checkout/totalPrice/currencyCode")),
    ("timestamp", Timestamp),
];

fn fields(kind: StorefrontEvent) -> &'static [(&'static str, Field)] {
    match kind {
        StorefrontEvent::PageViewed => PAGE_VIEWED,
        StorefrontEvent::ProductViewed => PRODUCT_VIEWED,
        StorefrontEvent::ProductAddedToCart => PRODUCT_ADDED_TO_CART,
        StorefrontEvent::ProductRemovedFromCart => PRODUCT_REMOVED_FROM_CART,
        StorefrontEvent::SearchSubmitted => SEARCH_SUBMITTED,
        StorefrontEvent::CheckoutStarted => CHECKOUT_STARTED,
        StorefrontEvent::PaymentInfoSubmitted => PAYMENT_INFO_SUBMITTED,
        StorefrontEvent::CheckoutCompleted => CHECKOUT_COMPLETED,
    }
}

fn extract(raw: &RawEvent, field: Field) -> Option<Value> {
    match field {
        Context(pointer) => raw.context_field(pointer).cloned(),
        Data(pointer) => raw.data_field(pointer).cloned(),
        DataLen(pointer) => raw
            .data_field(pointer)
            .and_then(Value::as_array)
            .map(|items| Value::from(items.len())),
        Timestamp => Some(raw.timestamp.clone()).filter(|v| !v.is_null()),
    }
}

/// Build the flat payload for one storefront event.
pub fn normalize(kind: StorefrontEvent, raw: &RawEvent) -> Payload {
    fields(kind)
        .iter()
        .filter_map(|(key, field)| extract(raw, *field).map(|value| (key.to_string(), value)))
        .collect()
}

/// Normalize by event name. `None` for events the pixel does not subscribe to.
pub fn normalize_raw(raw: &RawEvent) -> Option<(StorefrontEvent, Payload)> {
    let kind = StorefrontEvent::from_name(&raw.name)?;
    Some((kind, normalize(kind, raw)))
}
