// The six capabilities a concrete federation member must provide. The
// engine holds only trait objects over these; it ships no storage, index,
// or archive implementation of its own, and no concrete requester/session
// plumbing either. A caller wires those up and hands the engine a
// `Backends` bundle of `Arc<dyn Trait>`s.

use crate::error::QueryError;
use crate::types::{DatasetId, EntryId, UploadId, UserId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub type BackendResult<T> = std::result::Result<T, QueryError>;

/// A single upload's or entry's metadata record, materialized as JSON
/// rather than a fixed struct since the shape varies by entity and by
/// `RequestConfig::include`/`exclude` projection.
pub type Record = Value;

/// The relational-style metadata store: uploads, entries, datasets, users.
///
/// # Preconditions
/// - The caller has already authorized the requesting user for the record
///   being fetched; `DocumentStore` itself performs no access control.
///
/// # Postconditions
/// - A successful fetch returns a JSON object (never an array or scalar).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_upload(&self, upload_id: &UploadId) -> BackendResult<Record>;
    async fn get_entry(&self, entry_id: &EntryId) -> BackendResult<Record>;
    async fn get_dataset(&self, dataset_id: &DatasetId) -> BackendResult<Record>;
    async fn get_user(&self, user_id: &UserId) -> BackendResult<Record>;

    /// List entries belonging to an upload, in storage order. Used when a
    /// required tree asks for an upload's `entries` without a `query`.
    async fn list_entries_for_upload(&self, upload_id: &UploadId) -> BackendResult<Vec<Record>>;

    /// List entries belonging to a dataset.
    async fn list_entries_for_dataset(&self, dataset_id: &DatasetId) -> BackendResult<Vec<Record>>;

    /// Every upload `requester` is author, reviewer, or coauthor of: the
    /// top-level reader's default visible scope for a bare `uploads`
    /// wildcard carrying no `query` block. Ordered by `upload_id` so cursor
    /// pagination over the result is stable across calls.
    async fn list_visible_uploads(&self, requester: &UserId) -> BackendResult<Vec<Record>>;

    /// Every entry belonging to an upload in `list_visible_uploads`'s
    /// result, the default visible scope for a bare `entries` wildcard.
    async fn list_visible_entries(&self, requester: &UserId) -> BackendResult<Vec<Record>>;

    /// Every dataset owned by `requester`.
    async fn list_owned_datasets(&self, requester: &UserId) -> BackendResult<Vec<Record>>;
}

/// A page of search results plus the total count, mirroring the shape
/// `ElasticSearchReader`/`MongoReader`'s wildcard dispatch hand back.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub hits: Vec<Record>,
    pub total: u64,
}

/// The full-text search index queried by `__WILDCARD__` keys carrying a
/// `query`/`pagination` block.
///
/// # Preconditions
/// - `page` is 1-indexed and `page_size` is positive; the reader normalizes
///   both before calling.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search_entries(
        &self,
        terms: &Value,
        page: u32,
        page_size: u32,
        order_by: Option<&str>,
    ) -> BackendResult<SearchPage>;
}

/// A node of the hierarchical raw-file upload tree: either a directory
/// (with child names) or a file (with a byte size and, for small files, the
/// literal content one would want to inline).
#[derive(Debug, Clone)]
pub enum FileTreeNode {
    Directory { children: Vec<String> },
    File { size: u64 },
}

/// The hierarchical raw-file tree backing `reader::filesystem`.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn stat(&self, upload_id: &UploadId, path: &str) -> BackendResult<FileTreeNode>;
    async fn read_to_string(&self, upload_id: &UploadId, path: &str) -> BackendResult<String>;
}

/// The schema-bearing scientific-archive store: each entry's processed
/// archive data, addressable by path and cross-referenceable into other
/// entries' archives.
///
/// # Invariants
/// - A successful `get_archive_fragment` result is always valid JSON
///   reachable by walking `path` from the entry's archive root; the store
///   never returns a fragment whose shape disagrees with its schema.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn get_archive_fragment(
        &self,
        entry_id: &EntryId,
        path: &[String],
    ) -> BackendResult<Value>;
}

/// A minimal resolved schema definition, enough for `ArchiveReader` to
/// decide whether a quantity or sub-section is a reference that needs
/// following. See [`crate::schema`] for the richer shape.
pub type DefinitionId = String;

/// The pluggable type-definition registry (`m_def` resolution,
/// `include_definition`).
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn resolve_definition(&self, definition_id: &DefinitionId) -> BackendResult<Value>;
}

/// Authorization: whether `requester` may view a given upload/entry/dataset.
/// Kept separate from `DocumentStore` so the same access decision can gate
/// archive and file-tree reads too, without those stores depending on the
/// metadata store.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn can_view_upload(&self, requester: &UserId, upload_id: &UploadId) -> BackendResult<bool>;
    async fn can_view_entry(&self, requester: &UserId, entry_id: &EntryId) -> BackendResult<bool>;
    async fn can_view_dataset(&self, requester: &UserId, dataset_id: &DatasetId) -> BackendResult<bool>;
}

/// The bundle of backends a reader chain is constructed against. Grouped
/// into one struct so a reader only needs a single constructor argument
/// instead of five.
#[derive(Clone)]
pub struct Backends {
    pub documents: Arc<dyn DocumentStore>,
    pub search: Arc<dyn SearchIndex>,
    pub files: Arc<dyn FileStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub schema: Arc<dyn SchemaRegistry>,
    pub access: Arc<dyn AccessControl>,
}
