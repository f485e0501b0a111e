//! Type-count aggregator (§4.11): tracks distinct signatures, the number of
//! type DIEs scanned, and the simplified set of compiler producer strings,
//! and emits the final count report as JSON.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct TypeCounts {
    types_seen: AtomicU64,
    signatures: Mutex<HashSet<u64>>,
    producers: Mutex<HashSet<String>>,
}

impl TypeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `(signature, producer)` pair (§4.11): always increments
    /// `types`; increments `unique` only the first time a signature is seen.
    pub fn record(&self, signature: u64, producer: &str) {
        self.types_seen.fetch_add(1, Ordering::Relaxed);
        self.signatures.lock().unwrap().insert(signature);
        self.producers.lock().unwrap().insert(simplify_producer(producer));
    }

    pub fn types(&self) -> u64 {
        self.types_seen.load(Ordering::Relaxed)
    }

    pub fn unique(&self) -> u64 {
        self.signatures.lock().unwrap().len() as u64
    }

    pub fn producer_string(&self) -> String {
        let producers = self.producers.lock().unwrap();
        if producers.is_empty() {
            return "Unknown".to_string();
        }
        let mut sorted: Vec<&String> = producers.iter().collect();
        sorted.sort();
        sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("/")
    }
}

/// Producer simplification (§4.11): split on ASCII whitespace, stop at the
/// first token beginning with `-`, rewrite the word `version` as `v`, rejoin
/// with single spaces.
pub fn simplify_producer(producer: &str) -> String {
    let mut words = Vec::new();
    for token in producer.split_ascii_whitespace() {
        if token.starts_with('-') {
            break;
        }
        words.push(if token == "version" { "v" } else { token });
    }
    words.join(" ")
}

#[derive(serde::Serialize)]
pub struct CountReport {
    pub total: u64,
    pub types: u64,
    pub unique: u64,
    pub producer: String,
}
