// The traversal engine itself: a dispatch table from `GraphNode::root` to
// the domain reader that knows how to resolve keys in that domain, and the
// recursive walk that drives it.

pub mod archive;
pub mod dataset;
pub mod definition;
pub mod elastic;
pub mod entry;
pub mod filesystem;
pub mod general;
pub mod metrics;
pub mod mongo;
pub mod upload;
pub mod user;

use crate::backend::Backends;
use crate::cache::{self, DefinitionPool, QueryCache, UploadPool};
use crate::config::{EngineConfig, RequestConfig};
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::{self, NormalisedNode, ParsedKey};
use crate::refs::RefCache;
use crate::result::{get_path_mut, merge_values, populate_result};
use crate::types::UserId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// What resolving a single child key produced.
pub enum ChildOutcome {
    /// A value with nothing further to walk (a scalar, or a fully-formed
    /// plain sub-tree already shaped the way the caller wants it back).
    Leaf(Value),
    /// A value plus a new cursor positioned at it, so the walk continues
    /// into the child's own required sub-tree from here, in the same
    /// domain as the current reader.
    Branch { node: GraphNode, value: Value },
    /// The key crosses into a different backend domain entirely (e.g. an
    /// upload's `files` into `FileSystemReader`, an entry's `archive` into
    /// `ArchiveReader`). `value` seeds the result at this key (typically the
    /// entity's base record) before the walk continues there for any
    /// further nested keys.
    Offload { node: GraphNode, value: Value },
    /// A `resolved` reference whose directive did not set `resolve_inplace`:
    /// the referring key gets `reference_string` written at its own path,
    /// while the resolved `fragment` is written into the shared references
    /// tree at `hoist_path` instead of inline, so the same target fragment
    /// resolved from two different referring paths only materializes once.
    ReferenceHoist {
        node: GraphNode,
        fragment: Value,
        hoist_path: Vec<String>,
        reference_string: Value,
    },
    /// A `__WILDCARD__` key resolved against a document-store-backed
    /// listing (as opposed to a search-index query): one entry per matched
    /// record, each keyed by its own id rather than by the wildcard token,
    /// plus the pagination response to attach at this path's `pagination`
    /// subkey. Every item is walked with the same child required-tree the
    /// wildcard key itself carried.
    WildcardExpand {
        items: Vec<(String, GraphNode, Value)>,
        response: Value,
    },
}

/// The capability every domain reader implements: resolve one child key of
/// a node currently positioned in that domain, and reject request shapes
/// that domain doesn't support.
#[async_trait]
pub trait DomainReader: Send + Sync {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError>;

    /// Reject option combinations this domain's backend can't satisfy
    /// (e.g. `query`/`pagination` on anything but a searchable reader).
    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()>;

    /// The identity a dedup cache should key this child on. Defaults to the
    /// current node's own reference path plus the key name, which is unique
    /// per call site but means two different paths that happen to resolve
    /// to the same underlying record each get their own cache entry. A
    /// reader whose children have an identity independent of where they're
    /// requested from (`DefinitionReader`'s `m_def` ids, `MongoReader`'s
    /// `"me"` shorthand) overrides this so those paths share one entry.
    fn cache_key(&self, node: &GraphNode, key: &ParsedKey, requester: &UserId) -> String {
        let _ = requester;
        format!("{}/{}", node.reference(), key.name)
    }
}

/// Shared state for one top-level query: the backends, the bounded caches,
/// and the pools, all scoped to a single reader chain and discarded once
/// the query returns.
pub struct QueryEngine {
    pub backends: Backends,
    pub engine_config: EngineConfig,
    pub ref_cache: Arc<RefCache>,
    pub upload_pool: Arc<UploadPool>,
    pub definition_pool: Arc<DefinitionPool>,
    pub metrics: metrics::Metrics,
}

impl QueryEngine {
    pub fn new(backends: Backends, engine_config: EngineConfig) -> Self {
        let ref_cache = RefCache::new(engine_config.ref_path_cache_capacity);
        let upload_pool = Arc::new(UploadPool::new(backends.clone()));
        let definition_pool = Arc::new(DefinitionPool::new(backends.clone()));
        Self {
            backends,
            engine_config,
            ref_cache,
            upload_pool,
            definition_pool,
            metrics: metrics::Metrics::default(),
        }
    }

    /// Resolve the `DomainReader` responsible for the domain a node's root
    /// currently identifies. This is the Rust analogue of the searchable
    /// token dispatch table keyed by domain-transition tokens.
    fn reader_for(&self, root: &RootKind) -> Box<dyn DomainReader + '_> {
        match root {
            RootKind::Mongo => Box::new(mongo::MongoReader::new(self)),
            RootKind::Upload { .. } => Box::new(upload::UploadReader::new(self)),
            RootKind::Entry { .. } => Box::new(entry::EntryReader::new(self)),
            RootKind::Dataset { .. } => Box::new(dataset::DatasetReader::new(self)),
            RootKind::User { .. } => Box::new(user::UserReader::new(self)),
            RootKind::Elastic => Box::new(elastic::ElasticSearchReader::new(self)),
            RootKind::FileSystem { .. } => Box::new(filesystem::FileSystemReader::new(self)),
            RootKind::Archive { .. } => Box::new(archive::ArchiveReader::new(self)),
            RootKind::Definition => Box::new(definition::DefinitionReader::new(self)),
        }
    }

    /// The reserved top-level key under which a query's result embeds the
    /// shared references tree (`ref_result_root`): the already-materialized
    /// fragments any `ReferenceHoist` wrote, keyed by canonical reference
    /// path, kept out of the caller's own result shape.
    pub const REFERENCES_KEY: &'static str = "__REFERENCES__";

    /// Run a full query: normalise the raw required tree, then walk it from
    /// `root`, accumulating per-node errors instead of aborting on them.
    /// A malformed required tree aborts before any reader runs, returned as
    /// a `ConfigError` rather than folded into the per-node error list.
    ///
    /// The returned value carries the primary result tree plus, under
    /// [`Self::REFERENCES_KEY`], the sibling references tree that resolved,
    /// non-inplace cross-references were hoisted into.
    pub async fn query(
        &self,
        requester: &UserId,
        root: RootKind,
        required: &Value,
    ) -> Result<(Value, Vec<QueryError>), ConfigError> {
        let normalised = normalizer::normalise_required(required, &RequestConfig::default())?;
        self.reader_for(&root).validate_config(&normalised.config)?;

        let node = GraphNode::new(root);
        let mut result = Value::Object(Default::default());
        let mut ref_root = Value::Object(Default::default());
        let mut errors = Vec::new();
        let query_cache = QueryCache::default();
        self.walk(
            &node,
            &normalised,
            requester,
            &mut result,
            &mut ref_root,
            &query_cache,
            &mut errors,
        )
        .await;
        if let Value::Object(map) = &mut result {
            map.insert(Self::REFERENCES_KEY.to_string(), ref_root);
        }
        Ok((result, errors))
    }

    /// Recursively resolve every child key of `required` against `node`,
    /// writing each resolved value into `result` at that key and collecting
    /// any per-key failure into `errors` rather than stopping the walk.
    /// `ref_root` is the shared references tree a non-inplace resolved
    /// reference hoists its resolved fragment into, threaded alongside
    /// `result` through every recursive call so a reference nested inside
    /// an already-hoisted fragment still lands in the same shared tree.
    /// `query_cache` is the `__CACHE__` dedup map: a leaf key with no
    /// further required children reuses a prior identical (identity,
    /// config) resolution instead of resolving it again.
    #[instrument(skip(self, node, required, result, ref_root, query_cache, errors), fields(reference = %node.reference()))]
    pub async fn walk(
        &self,
        node: &GraphNode,
        required: &NormalisedNode,
        requester: &UserId,
        result: &mut Value,
        ref_root: &mut Value,
        query_cache: &QueryCache,
        errors: &mut Vec<QueryError>,
    ) {
        let reader = self.reader_for(&node.root);
        if let Err(e) = reader.validate_config(&required.config) {
            errors.push(QueryError::general(node.reference(), e.to_string()));
            return;
        }

        for (key, child_required) in &required.children {
            if !child_required.config.if_include(&key.name) {
                continue;
            }

            let reference = node.reference();
            self.metrics.record_key_resolved();

            let is_cacheable_leaf_request = child_required.children.is_empty();
            let cache_identity = reader.cache_key(node, key, requester);
            let config_hash = cache::hash_config(&child_required.config);
            if is_cacheable_leaf_request {
                if let Some(cached) = query_cache.get(&cache_identity, config_hash) {
                    self.metrics.record_cache_hit();
                    populate_result(result, &[key.name.clone()], cached, false);
                    continue;
                }
            }

            match reader
                .resolve_child(self, node, key, &child_required.config, requester)
                .await
            {
                Ok(ChildOutcome::Leaf(value)) => {
                    if is_cacheable_leaf_request {
                        query_cache.put(cache_identity, config_hash, value.clone());
                    }
                    populate_result(result, &[key.name.clone()], value, false);
                }
                Ok(ChildOutcome::Branch { node: child_node, value }) => {
                    populate_result(result, &[key.name.clone()], value, false);
                    if !child_required.children.is_empty() {
                        if let Some(slot) = result.get_mut(&key.name) {
                            Box::pin(self.walk(
                                &child_node,
                                child_required,
                                requester,
                                slot,
                                ref_root,
                                query_cache,
                                errors,
                            ))
                            .await;
                        }
                    }
                }
                Ok(ChildOutcome::Offload { node: child_node, value }) => {
                    self.metrics.record_offload();
                    let mut slot = value;
                    if !child_required.children.is_empty() {
                        Box::pin(self.walk(
                            &child_node,
                            child_required,
                            requester,
                            &mut slot,
                            ref_root,
                            query_cache,
                            errors,
                        ))
                        .await;
                    } else if is_cacheable_leaf_request {
                        // A leaf offload (no nested keys requested) is just as
                        // reusable as a `Leaf` outcome once materialized.
                        query_cache.put(cache_identity.clone(), config_hash, slot.clone());
                    }
                    populate_result(result, &[key.name.clone()], slot, false);
                }
                Ok(ChildOutcome::ReferenceHoist {
                    node: child_node,
                    fragment,
                    hoist_path,
                    reference_string,
                }) => {
                    populate_result(result, &[key.name.clone()], reference_string, false);
                    populate_result(ref_root, &hoist_path, fragment, false);
                    if !child_required.children.is_empty() {
                        if let Some(mut taken) =
                            get_path_mut(ref_root, &hoist_path).map(std::mem::take)
                        {
                            let mut nested_refs = Value::Object(Default::default());
                            Box::pin(self.walk(
                                &child_node,
                                child_required,
                                requester,
                                &mut taken,
                                &mut nested_refs,
                                query_cache,
                                errors,
                            ))
                            .await;
                            populate_result(ref_root, &hoist_path, taken, false);
                            merge_values(ref_root, nested_refs);
                        }
                    }
                }
                Ok(ChildOutcome::WildcardExpand { items, response }) => {
                    for (id, child_node, value) in items {
                        self.metrics.record_offload();
                        let mut slot = value;
                        if !child_required.children.is_empty() {
                            Box::pin(self.walk(
                                &child_node,
                                child_required,
                                requester,
                                &mut slot,
                                ref_root,
                                query_cache,
                                errors,
                            ))
                            .await;
                        }
                        populate_result(result, &[id], slot, false);
                    }
                    populate_result(result, &["pagination".to_string()], response, false);
                }
                Err(e) => {
                    self.metrics.record_error();
                    tracing::debug!(reference = %reference, key = %key.name, error = %e, "key resolution failed");
                    errors.push(e);
                }
            }
        }
    }
}
