// Reference-path conversion and the bounded caches backing it. The hot path
// here is an archive reference URL (`#/entries/<id>/archive/run/0/system/0`
// or `../uploads/<id>#/...`) being turned into the segment list a
// `GraphNode` can `goto` through, over and over for the same handful of
// distinct references within a single walk.
//
// The upstream implementation memoizes this with an unbounded
// `functools.lru_cache`; a long-lived process can't afford that, so eviction
// here is explicit and bounded by `EngineConfig::ref_path_cache_capacity`.

use parking_lot::Mutex;
use std::sync::Arc;

/// A parsed reference, resolved against whatever root the reference string
/// was relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRef {
    /// `None` when the reference is local to the current root (starts with
    /// `#/`); `Some(upload_id)` when it crosses into another upload's
    /// archive (`../uploads/<upload>/archive/<entry>#/...`).
    pub target_upload: Option<String>,
    /// The entry the reference resolves against: the owning entry's own id
    /// for a local reference, or the `<entry>` segment of a cross-upload
    /// reference.
    pub target_entry: Option<String>,
    pub segments: Vec<String>,
}

impl ParsedRef {
    pub fn to_path_string(&self) -> String {
        self.segments.join("/")
    }
}

/// A small bounded cache keyed by the raw reference string. Insertion order
/// is preserved by `IndexMap` so eviction can simply drop the oldest entry,
/// an approximation of LRU that's cheap enough to take a lock around.
struct BoundedCache {
    capacity: usize,
    entries: indexmap::IndexMap<String, ParsedRef>,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: indexmap::IndexMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<ParsedRef> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: ParsedRef) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }
}

/// Caches reference-path conversions for the lifetime of a reader chain.
/// One instance is shared across all readers spawned by a single top-level
/// query, never across queries, so results never leak between requests.
pub struct RefCache {
    inner: Mutex<BoundedCache>,
}

impl RefCache {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(BoundedCache::new(capacity)),
        })
    }

    /// Convert a reference string into its segment list, consulting the
    /// cache first.
    pub fn convert_ref_to_path(&self, reference: &str) -> ParsedRef {
        if let Some(hit) = self.inner.lock().get(reference) {
            return hit;
        }
        let parsed = parse_reference(reference);
        self.inner.lock().insert(reference.to_string(), parsed.clone());
        parsed
    }

    pub fn convert_ref_to_path_string(&self, reference: &str) -> String {
        self.convert_ref_to_path(reference).to_path_string()
    }
}

/// Parse a raw reference string into a [`ParsedRef`]. Handles:
/// - `#/entries/<id>/archive/...` and other local, same-root references
///   (leading `#/`).
/// - `../uploads/<upload>/archive/<entry>#/...`, the canonical cross-upload
///   form: an upload id, a literal `archive` segment, then the entry id the
///   fragment is rooted at.
/// - bracketed index/slice segments (`run[0]`, `system[0:2]`), left intact
///   as single path segments; splitting those further is `parse_key`'s job.
fn parse_reference(reference: &str) -> ParsedRef {
    if let Some(rest) = reference.strip_prefix("../uploads/") {
        if let Some((upload_id, after_upload)) = rest.split_once("/archive/") {
            if let Some((entry_id, suffix)) = after_upload.split_once('#') {
                return ParsedRef {
                    target_upload: Some(upload_id.to_string()),
                    target_entry: Some(entry_id.to_string()),
                    segments: split_fragment(suffix),
                };
            }
        }
    }

    let fragment = reference.strip_prefix('#').unwrap_or(reference);
    ParsedRef {
        target_upload: None,
        target_entry: None,
        segments: split_fragment(fragment),
    }
}

fn split_fragment(fragment: &str) -> Vec<String> {
    fragment
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_reference() {
        let parsed = parse_reference("#/run/0/system/0");
        assert!(parsed.target_upload.is_none());
        assert!(parsed.target_entry.is_none());
        assert_eq!(parsed.segments, vec!["run", "0", "system", "0"]);
    }

    #[test]
    fn test_parse_cross_upload_reference() {
        let parsed = parse_reference("../uploads/A/archive/B#/c");
        assert_eq!(parsed.target_upload.as_deref(), Some("A"));
        assert_eq!(parsed.target_entry.as_deref(), Some("B"));
        assert_eq!(parsed.segments, vec!["c"]);
    }

    #[test]
    fn test_cache_hits_avoid_reparsing() {
        let cache = RefCache::new(4);
        let first = cache.convert_ref_to_path("#/a/b");
        let second = cache.convert_ref_to_path("#/a/b");
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_evicts_oldest_entry_past_capacity() {
        let cache = RefCache::new(2);
        cache.convert_ref_to_path("#/a");
        cache.convert_ref_to_path("#/b");
        cache.convert_ref_to_path("#/c");
        let inner = cache.inner.lock();
        assert_eq!(inner.entries.len(), 2);
        assert!(!inner.entries.contains_key("#/a"));
    }
}
