//! The COMDAT aggregation map (§3, §4.6) and the per-file digest aggregator
//! (§4.7), each behind a single coarse-grained mutex: every worker holds the
//! lock only for the duration of one update.

use std::collections::HashMap;
use std::sync::Mutex;

use scan_core::md5::Md5;

/// One identifier's running totals across every instance of its group seen
/// so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationEntry {
    pub total_size: u64,
    pub largest: u64,
    pub instances: u32,
}

impl AggregationEntry {
    fn record(&mut self, size: u64) {
        self.total_size += size;
        self.largest = self.largest.max(size);
        self.instances += 1;
    }
}

/// Keyed by the group's identifier symbol. Guarded by a single mutex; each
/// `record` call holds it only long enough to update one entry.
#[derive(Default)]
pub struct AggregationMap {
    entries: Mutex<HashMap<String, AggregationEntry>>,
}

impl AggregationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, identifier: &str, size: u64) {
        let mut guard = self.entries.lock().unwrap();
        guard.entry(identifier.to_string()).or_default().record(size);
    }

    pub fn into_inner(self) -> HashMap<String, AggregationEntry> {
        self.entries.into_inner().unwrap()
    }
}

/// Accumulates per-file digests (§3) and combines them order-independently
/// into a single run digest (§4.7): sort by byte-lex, then hash the sorted
/// concatenation.
#[derive(Default)]
pub struct DigestAggregator {
    digests: Mutex<Vec<[u8; 16]>>,
}

impl DigestAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes and records the per-file digest of `"Bgn\0" || bytes || "End\0"`.
    pub fn record_file(&self, bytes: &[u8]) {
        let mut ctx = Md5::new();
        ctx.update(b"Bgn\0");
        ctx.update(bytes);
        ctx.update(b"End\0");
        let digest = ctx.finalize();
        self.digests.lock().unwrap().push(digest);
    }

    /// Sorts the accumulated digests and folds them into a single run digest.
    /// Deterministic regardless of ingestion order.
    pub fn finalize(&self) -> [u8; 16] {
        let mut digests = self.digests.lock().unwrap().clone();
        digests.sort_unstable();
        let mut ctx = Md5::new();
        for digest in &digests {
            ctx.update(digest);
        }
        ctx.finalize()
    }
}
