// The hierarchical raw-file tree. A directory node offloads further
// descent within the same filesystem domain when named explicitly, or (for
// a `__WILDCARD__` key) recursively lists its own subtree, bounded by
// `depth` and filtered by `include`/`exclude`. A file node is a leaf; under
// a `resolved` directive, a file that is some entry's main file inlines
// that entry under `entry`.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::backend::FileTreeNode;
use crate::config::{DirectiveType, RequestConfig};
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::{ParsedKey, WILDCARD_NAME};
use crate::types::{EntryId, PathSegment, UploadId, UserId};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'f, T> = Pin<Box<dyn Future<Output = T> + Send + 'f>>;

/// Files larger than this are described by size alone; a caller wanting the
/// bytes of a larger file must request it explicitly rather than receiving
/// it inlined into an otherwise small required-tree response.
const INLINE_CONTENT_LIMIT: u64 = 64 * 1024;

pub struct FileSystemReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> FileSystemReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn upload_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::FileSystem { upload_id } => upload_id,
        _ => unreachable!("FileSystemReader only ever sees RootKind::FileSystem nodes"),
    }
}

fn join_path(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{base}/{child}")
    }
}

#[async_trait]
impl<'e> DomainReader for FileSystemReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let upload_id = UploadId::new(upload_id_of(node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
        super::general::require_upload_access(&engine.backends, requester, &upload_id, &node.reference()).await?;

        let base_path = node.path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("/");

        if key.name == WILDCARD_NAME {
            let value = self
                .list_subtree(engine, &upload_id, &base_path, config, requester, config.depth)
                .await?;
            return Ok(ChildOutcome::Leaf(value));
        }

        let path_str = join_path(&base_path, &key.name);

        match engine.backends.files.stat(&upload_id, &path_str).await? {
            FileTreeNode::Directory { children } => {
                let segment = PathSegment::new(key.name.clone())
                    .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                Ok(ChildOutcome::Branch {
                    node: node.goto_local(segment),
                    value: json!({ "m_is": "Directory", "children": children }),
                })
            }
            FileTreeNode::File { size } => {
                let mut value = self.file_leaf(engine, &upload_id, &path_str, size).await?;
                if config.directive == DirectiveType::Resolved {
                    if let Some(entry) = self.resolve_mainfile_entry(engine, &upload_id, &path_str, requester).await? {
                        value["entry"] = entry;
                    }
                }
                Ok(ChildOutcome::Leaf(value))
            }
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        crate::validation::config::validate_not_searchable(config, "FileSystemReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "query/pagination".to_string(),
                reason: "FileSystemReader is not backed by a searchable index".to_string(),
            })
    }
}

impl<'e> FileSystemReader<'e> {
    async fn file_leaf(
        &self,
        engine: &QueryEngine,
        upload_id: &UploadId,
        path_str: &str,
        size: u64,
    ) -> Result<Value, QueryError> {
        let mut value = json!({ "m_is": "File", "size": size });
        if size <= INLINE_CONTENT_LIMIT {
            if let Ok(content) = engine.backends.files.read_to_string(upload_id, path_str).await {
                value["content"] = json!(content);
            }
        }
        Ok(value)
    }

    /// If `path_str` is the main file of one of the upload's processed
    /// entries, fetch that entry's metadata for inlining. Absence is not an
    /// error: most raw files are not a main file.
    async fn resolve_mainfile_entry(
        &self,
        engine: &QueryEngine,
        upload_id: &UploadId,
        path_str: &str,
        requester: &UserId,
    ) -> Result<Option<Value>, QueryError> {
        let entries = engine.backends.documents.list_entries_for_upload(upload_id).await?;
        let Some(record) = entries.iter().find(|e| e.get("mainfile").and_then(Value::as_str) == Some(path_str)) else {
            return Ok(None);
        };
        let entry_id_str = record
            .get("entry_id")
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError::general(path_str, "entry record has no entry_id"))?;
        let entry_id =
            EntryId::new(entry_id_str).map_err(|e| QueryError::general(path_str, e.to_string()))?;
        super::general::require_entry_access(&engine.backends, requester, &entry_id, path_str).await?;
        Ok(Some(super::mongo::overwrite_entry(record.clone())))
    }

    /// Recursively list a directory's subtree (or describe a single file),
    /// bounded by `depth_budget` (`None` means unlimited) and skipping any
    /// child name `config.if_include` rejects.
    fn list_subtree<'f>(
        &'f self,
        engine: &'f QueryEngine,
        upload_id: &'f UploadId,
        path: &'f str,
        config: &'f RequestConfig,
        requester: &'f UserId,
        depth_budget: Option<usize>,
    ) -> BoxFuture<'f, Result<Value, QueryError>> {
        Box::pin(async move {
            match engine.backends.files.stat(upload_id, path).await? {
                FileTreeNode::File { size } => {
                    let mut value = self.file_leaf(engine, upload_id, path, size).await?;
                    if config.directive == DirectiveType::Resolved {
                        if let Some(entry) = self.resolve_mainfile_entry(engine, upload_id, path, requester).await? {
                            value["entry"] = entry;
                        }
                    }
                    Ok(value)
                }
                FileTreeNode::Directory { children } => {
                    let mut obj = Map::new();
                    obj.insert("m_is".to_string(), json!("Directory"));

                    if depth_budget == Some(0) {
                        obj.insert("children".to_string(), json!(children));
                        return Ok(Value::Object(obj));
                    }

                    let next_budget = depth_budget.map(|d| d - 1);
                    let mut nested = Map::new();
                    for child in &children {
                        if !config.if_include(child) {
                            continue;
                        }
                        let child_path = join_path(path, child);
                        let child_value = self
                            .list_subtree(engine, upload_id, &child_path, config, requester, next_budget)
                            .await?;
                        nested.insert(child.clone(), child_value);
                    }
                    obj.insert("children".to_string(), Value::Object(nested));
                    Ok(Value::Object(obj))
                }
            }
        })
    }
}
