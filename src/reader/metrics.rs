// Per-reader-chain operation counters, the in-process diagnostic analogue
// of `observability.rs`'s global atomics but scoped to a single query
// instead of the whole process, since a long-lived server handles many
// queries concurrently and a global counter would conflate them.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    keys_resolved: AtomicU64,
    errors: AtomicU64,
    ref_cache_hits: AtomicU64,
    offloads: AtomicU64,
    query_cache_hits: AtomicU64,
}

impl Metrics {
    pub fn record_key_resolved(&self) {
        self.keys_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ref_cache_hit(&self) {
        self.ref_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offload(&self) {
        self.offloads.fetch_add(1, Ordering::Relaxed);
    }

    /// A key resolution reused a prior `QueryCache` entry instead of
    /// invoking `resolve_child` again.
    pub fn record_cache_hit(&self) {
        self.query_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "keys_resolved": self.keys_resolved.load(Ordering::Relaxed),
            "errors": self.errors.load(Ordering::Relaxed),
            "ref_cache_hits": self.ref_cache_hits.load(Ordering::Relaxed),
            "offloads": self.offloads.load(Ordering::Relaxed),
            "query_cache_hits": self.query_cache_hits.load(Ordering::Relaxed),
        })
    }
}
