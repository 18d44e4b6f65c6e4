//! Fuzz target for context item normalization.
//!
//! Run with: cargo +nightly fuzz run fuzz_normalize_items
//!
//! Parses arbitrary bytes as JSON and normalizes the result as one
//! provider's answer.

#![no_main]

use std::collections::HashSet;

use ctxhub_core::item::{self, MAX_IMPORTANCE};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let raw = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let items = item::normalize_all(raw);

    let mut ids = HashSet::new();
    for item in &items {
        assert!(item::is_valid_id(&item.id));
        assert!(ids.insert(item.id.clone()), "duplicate id {}", item.id);
        assert!(item.importance.is_none_or(|i| u64::from(i) <= MAX_IMPORTANCE));
    }
});
