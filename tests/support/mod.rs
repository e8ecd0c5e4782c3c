// In-memory backend doubles shared by the integration suites. Each fake
// implements exactly one `backend` trait and stores its fixture data in a
// plain `HashMap`, keyed the same way a real store would be keyed (by id,
// or by id-plus-path for the archive and file trees).

#![allow(dead_code)]

use async_trait::async_trait;
use graph_query_reader::backend::{
    AccessControl, ArchiveStore, BackendResult, Backends, DocumentStore, FileStore, FileTreeNode,
    Record, SchemaRegistry, SearchIndex, SearchPage,
};
use graph_query_reader::error::QueryError;
use graph_query_reader::types::{DatasetId, EntryId, UploadId, UserId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
pub struct FakeDocumentStore {
    pub uploads: HashMap<String, Value>,
    pub entries: HashMap<String, Value>,
    pub datasets: HashMap<String, Value>,
    pub users: HashMap<String, Value>,
    /// Explicit viewer grants, keyed by upload id. An upload id absent from
    /// this map is visible to every requester, mirroring
    /// `FakeAccessControl`'s allow-by-default style.
    pub upload_viewers: HashMap<String, HashSet<String>>,
    /// Explicit dataset owner, keyed by dataset id. A dataset id absent from
    /// this map is treated as owned by every requester.
    pub dataset_owners: HashMap<String, String>,
    /// Counts `get_user` calls, so a test can confirm a dedup cache spared
    /// a second fetch of the same user reached by two different keys.
    pub get_user_calls: std::sync::atomic::AtomicUsize,
}

impl FakeDocumentStore {
    fn upload_visible_to(&self, upload_id: &str, requester: &UserId) -> bool {
        match self.upload_viewers.get(upload_id) {
            Some(viewers) => viewers.contains(requester.as_str()),
            None => true,
        }
    }

    fn dataset_owned_by(&self, dataset_id: &str, requester: &UserId) -> bool {
        match self.dataset_owners.get(dataset_id) {
            Some(owner) => owner == requester.as_str(),
            None => true,
        }
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn get_upload(&self, upload_id: &UploadId) -> BackendResult<Record> {
        self.uploads
            .get(upload_id.as_str())
            .cloned()
            .ok_or_else(|| QueryError::not_found(upload_id.as_str(), "no such upload"))
    }

    async fn get_entry(&self, entry_id: &EntryId) -> BackendResult<Record> {
        self.entries
            .get(entry_id.as_str())
            .cloned()
            .ok_or_else(|| QueryError::not_found(entry_id.as_str(), "no such entry"))
    }

    async fn get_dataset(&self, dataset_id: &DatasetId) -> BackendResult<Record> {
        self.datasets
            .get(dataset_id.as_str())
            .cloned()
            .ok_or_else(|| QueryError::not_found(dataset_id.as_str(), "no such dataset"))
    }

    async fn get_user(&self, user_id: &UserId) -> BackendResult<Record> {
        self.get_user_calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.users
            .get(user_id.as_str())
            .cloned()
            .ok_or_else(|| QueryError::not_found(user_id.as_str(), "no such user"))
    }

    async fn list_entries_for_upload(&self, upload_id: &UploadId) -> BackendResult<Vec<Record>> {
        Ok(self
            .entries
            .values()
            .filter(|e| e.get("upload_id").and_then(Value::as_str) == Some(upload_id.as_str()))
            .cloned()
            .collect())
    }

    async fn list_entries_for_dataset(&self, dataset_id: &DatasetId) -> BackendResult<Vec<Record>> {
        Ok(self
            .entries
            .values()
            .filter(|e| {
                e.get("dataset_ids")
                    .and_then(Value::as_array)
                    .map(|ds| ds.iter().any(|d| d.as_str() == Some(dataset_id.as_str())))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_visible_uploads(&self, requester: &UserId) -> BackendResult<Vec<Record>> {
        let mut rows: Vec<(&String, &Value)> = self
            .uploads
            .iter()
            .filter(|(id, _)| self.upload_visible_to(id, requester))
            .collect();
        rows.sort_by_key(|(id, _)| (*id).clone());
        Ok(rows.into_iter().map(|(_, v)| v.clone()).collect())
    }

    async fn list_visible_entries(&self, requester: &UserId) -> BackendResult<Vec<Record>> {
        let visible_uploads: HashSet<&str> = self
            .uploads
            .keys()
            .filter(|id| self.upload_visible_to(id, requester))
            .map(String::as_str)
            .collect();
        let mut rows: Vec<(&String, &Value)> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.get("upload_id")
                    .and_then(Value::as_str)
                    .map(|u| visible_uploads.contains(u))
                    .unwrap_or(false)
            })
            .collect();
        rows.sort_by_key(|(id, _)| (*id).clone());
        Ok(rows.into_iter().map(|(_, v)| v.clone()).collect())
    }

    async fn list_owned_datasets(&self, requester: &UserId) -> BackendResult<Vec<Record>> {
        let mut rows: Vec<(&String, &Value)> = self
            .datasets
            .iter()
            .filter(|(id, _)| self.dataset_owned_by(id, requester))
            .collect();
        rows.sort_by_key(|(id, _)| (*id).clone());
        Ok(rows.into_iter().map(|(_, v)| v.clone()).collect())
    }
}

#[derive(Default)]
pub struct FakeSearchIndex {
    pub entries: Vec<Value>,
}

#[async_trait]
impl SearchIndex for FakeSearchIndex {
    async fn search_entries(
        &self,
        terms: &Value,
        page: u32,
        page_size: u32,
        _order_by: Option<&str>,
    ) -> BackendResult<SearchPage> {
        let matches: Vec<Value> = self
            .entries
            .iter()
            .filter(|entry| matches_terms(entry, terms))
            .cloned()
            .collect();

        let total = matches.len() as u64;
        let start = ((page.saturating_sub(1)) as usize) * page_size as usize;
        let hits = matches.into_iter().skip(start).take(page_size as usize).collect();

        Ok(SearchPage { hits, total })
    }
}

fn matches_terms(entry: &Value, terms: &Value) -> bool {
    let Some(obj) = terms.as_object() else {
        return true;
    };
    obj.iter().all(|(k, v)| entry.get(k) == Some(v))
}

#[derive(Default)]
pub struct FakeFileStore {
    /// Keyed by `"<upload_id>/<path>"`.
    pub nodes: HashMap<String, FileTreeNode>,
    pub contents: HashMap<String, String>,
}

impl FakeFileStore {
    fn key(upload_id: &UploadId, path: &str) -> String {
        format!("{}/{}", upload_id.as_str(), path)
    }
}

#[async_trait]
impl FileStore for FakeFileStore {
    async fn stat(&self, upload_id: &UploadId, path: &str) -> BackendResult<FileTreeNode> {
        self.nodes
            .get(&Self::key(upload_id, path))
            .map(|n| match n {
                FileTreeNode::Directory { children } => FileTreeNode::Directory {
                    children: children.clone(),
                },
                FileTreeNode::File { size } => FileTreeNode::File { size: *size },
            })
            .ok_or_else(|| QueryError::not_found(path, "no such path"))
    }

    async fn read_to_string(&self, upload_id: &UploadId, path: &str) -> BackendResult<String> {
        self.contents
            .get(&Self::key(upload_id, path))
            .cloned()
            .ok_or_else(|| QueryError::not_found(path, "no content for this path"))
    }
}

#[derive(Default)]
pub struct FakeArchiveStore {
    /// Keyed by `"<entry_id>#<path joined by '/'>"`.
    pub fragments: HashMap<String, Value>,
}

impl FakeArchiveStore {
    fn key(entry_id: &EntryId, path: &[String]) -> String {
        format!("{}#{}", entry_id.as_str(), path.join("/"))
    }
}

#[async_trait]
impl ArchiveStore for FakeArchiveStore {
    async fn get_archive_fragment(&self, entry_id: &EntryId, path: &[String]) -> BackendResult<Value> {
        self.fragments
            .get(&Self::key(entry_id, path))
            .cloned()
            .ok_or_else(|| QueryError::not_found(path.join("/"), "no such archive fragment"))
    }
}

#[derive(Default)]
pub struct FakeSchemaRegistry {
    pub definitions: HashMap<String, Value>,
}

#[async_trait]
impl SchemaRegistry for FakeSchemaRegistry {
    async fn resolve_definition(&self, definition_id: &String) -> BackendResult<Value> {
        self.definitions
            .get(definition_id)
            .cloned()
            .ok_or_else(|| QueryError::not_found(definition_id, "no such definition"))
    }
}

/// Allows everything unless a given id is explicitly listed as denied, so
/// most fixtures don't need to populate an allow-list just to pass access
/// checks.
#[derive(Default)]
pub struct FakeAccessControl {
    pub denied_uploads: HashSet<String>,
    pub denied_entries: HashSet<String>,
    pub denied_datasets: HashSet<String>,
}

#[async_trait]
impl AccessControl for FakeAccessControl {
    async fn can_view_upload(&self, _requester: &UserId, upload_id: &UploadId) -> BackendResult<bool> {
        Ok(!self.denied_uploads.contains(upload_id.as_str()))
    }

    async fn can_view_entry(&self, _requester: &UserId, entry_id: &EntryId) -> BackendResult<bool> {
        Ok(!self.denied_entries.contains(entry_id.as_str()))
    }

    async fn can_view_dataset(&self, _requester: &UserId, dataset_id: &DatasetId) -> BackendResult<bool> {
        Ok(!self.denied_datasets.contains(dataset_id.as_str()))
    }
}

/// Builds a `Backends` bundle from the fakes above, fixture by fixture.
#[derive(Default)]
pub struct TestBackendsBuilder {
    documents: FakeDocumentStore,
    search: FakeSearchIndex,
    files: FakeFileStore,
    archive: FakeArchiveStore,
    schema: FakeSchemaRegistry,
    access: FakeAccessControl,
}

impl TestBackendsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(mut self, upload_id: &str, record: Value) -> Self {
        self.documents.uploads.insert(upload_id.to_string(), record);
        self
    }

    pub fn with_entry(mut self, entry_id: &str, record: Value) -> Self {
        self.documents.entries.insert(entry_id.to_string(), record);
        self
    }

    pub fn with_dataset(mut self, dataset_id: &str, record: Value) -> Self {
        self.documents.datasets.insert(dataset_id.to_string(), record);
        self
    }

    pub fn with_user(mut self, user_id: &str, record: Value) -> Self {
        self.documents.users.insert(user_id.to_string(), record);
        self
    }

    pub fn with_upload_viewer(mut self, upload_id: &str, user_id: &str) -> Self {
        self.documents
            .upload_viewers
            .entry(upload_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        self
    }

    pub fn with_dataset_owner(mut self, dataset_id: &str, user_id: &str) -> Self {
        self.documents
            .dataset_owners
            .insert(dataset_id.to_string(), user_id.to_string());
        self
    }

    pub fn with_searchable_entries(mut self, entries: Vec<Value>) -> Self {
        self.search.entries = entries;
        self
    }

    pub fn with_file(mut self, upload_id: &str, path: &str, size: u64, content: Option<&str>) -> Self {
        self.files.nodes.insert(
            format!("{upload_id}/{path}"),
            FileTreeNode::File { size },
        );
        if let Some(content) = content {
            self.files
                .contents
                .insert(format!("{upload_id}/{path}"), content.to_string());
        }
        self
    }

    pub fn with_directory(mut self, upload_id: &str, path: &str, children: Vec<String>) -> Self {
        self.files
            .nodes
            .insert(format!("{upload_id}/{path}"), FileTreeNode::Directory { children });
        self
    }

    pub fn with_archive_fragment(mut self, entry_id: &str, path: &[&str], value: Value) -> Self {
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        self.archive
            .fragments
            .insert(format!("{entry_id}#{}", path.join("/")), value);
        self
    }

    pub fn with_definition(mut self, definition_id: &str, value: Value) -> Self {
        self.schema.definitions.insert(definition_id.to_string(), value);
        self
    }

    pub fn deny_entry(mut self, entry_id: &str) -> Self {
        self.access.denied_entries.insert(entry_id.to_string());
        self
    }

    pub fn deny_upload(mut self, upload_id: &str) -> Self {
        self.access.denied_uploads.insert(upload_id.to_string());
        self
    }

    pub fn build(self) -> Backends {
        Backends {
            documents: Arc::new(self.documents),
            search: Arc::new(self.search),
            files: Arc::new(self.files),
            archive: Arc::new(self.archive),
            schema: Arc::new(self.schema),
            access: Arc::new(self.access),
        }
    }

    /// Like `build`, but also returns a shared handle to the document store
    /// fake so a test can inspect its call counters afterward.
    pub fn build_with_document_store(self) -> (Backends, Arc<FakeDocumentStore>) {
        let documents = Arc::new(self.documents);
        let backends = Backends {
            documents: documents.clone(),
            search: Arc::new(self.search),
            files: Arc::new(self.files),
            archive: Arc::new(self.archive),
            schema: Arc::new(self.schema),
            access: Arc::new(self.access),
        };
        (backends, documents)
    }
}

pub fn user_id(s: &str) -> UserId {
    UserId::new(s).expect("valid user id")
}
