// Per-reader-chain pooling: upload handles and resolved schema definitions
// are expensive enough to fetch that a single query walking many entries
// under the same upload, or many references into the same package, should
// only fetch each one once. Lazily populated, guarded by `RwLock` the way
// this crate's index structures are.

use crate::backend::{Backends, BackendResult, Record};
use crate::config::RequestConfig;
use crate::error::QueryError;
use crate::types::UploadId;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// A pooled handle to an upload's metadata record, fetched at most once per
/// reader chain no matter how many entries under it are visited.
pub struct UploadPool {
    backends: Backends,
    handles: RwLock<HashMap<UploadId, Arc<Record>>>,
}

impl UploadPool {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, upload_id: &UploadId) -> BackendResult<Arc<Record>> {
        if let Some(hit) = self.handles.read().await.get(upload_id) {
            return Ok(Arc::clone(hit));
        }

        let record = Arc::new(self.backends.documents.get_upload(upload_id).await?);
        self.handles
            .write()
            .await
            .insert(upload_id.clone(), Arc::clone(&record));
        Ok(record)
    }
}

/// A pooled, resolved schema definition, keyed by its `m_def` id. Avoids
/// re-resolving the same shared definition (e.g. a common base section)
/// once per reference that points at it within a single query.
pub struct DefinitionPool {
    backends: Backends,
    definitions: RwLock<HashMap<String, Arc<serde_json::Value>>>,
}

impl DefinitionPool {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            definitions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, definition_id: &str) -> Result<Arc<serde_json::Value>, QueryError> {
        if let Some(hit) = self.definitions.read().await.get(definition_id) {
            return Ok(Arc::clone(hit));
        }

        let resolved = Arc::new(
            self.backends
                .schema
                .resolve_definition(&definition_id.to_string())
                .await?,
        );
        self.definitions
            .write()
            .await
            .insert(definition_id.to_string(), Arc::clone(&resolved));
        Ok(resolved)
    }
}

/// A per-query dedup map (the `__CACHE__` role): once a leaf key's fully
/// materialized result is known for a given identity and configuration, a
/// second key elsewhere in the same required tree that resolves to the
/// same identity under the same configuration reuses it rather than
/// resolving it again. Scoped to a single [`crate::reader::QueryEngine::query`]
/// call, not shared across queries.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<(String, u64), Value>>,
}

impl QueryCache {
    pub fn get(&self, identity: &str, config_hash: u64) -> Option<Value> {
        self.entries
            .lock()
            .expect("query cache mutex poisoned")
            .get(&(identity.to_string(), config_hash))
            .cloned()
    }

    pub fn put(&self, identity: String, config_hash: u64, value: Value) {
        self.entries
            .lock()
            .expect("query cache mutex poisoned")
            .insert((identity, config_hash), value);
    }
}

/// A stable hash of the parts of a `RequestConfig` that affect what a
/// resolved leaf looks like, used as the other half of a `QueryCache` key.
pub fn hash_config(config: &RequestConfig) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    serde_json::to_string(config).unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}
