// The root reader for the relational metadata store: dispatches the four
// top-level collections (`uploads`, `entries`, `datasets`, `users`) and, one
// level down, either an id lookup into the matching entity reader or a
// `__WILDCARD__` search handed off to the search index.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::{PaginationConfig, RequestConfig};
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::{ParsedKey, WILDCARD_NAME};
use crate::types::{DatasetId, EntryId, PathSegment, UploadId, UserId};
use async_trait::async_trait;
use serde_json::{Map, Value};

const COLLECTIONS: &[&str] = &["uploads", "entries", "datasets", "users"];

pub struct MongoReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> MongoReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

/// `_overwrite_upload`: rename fields so the materialized record matches
/// what a caller expects rather than the backend's raw column names.
pub fn overwrite_upload(mut record: Value) -> Value {
    if let Some(obj) = record.as_object_mut() {
        if let Some(entries) = obj.remove("entries") {
            let n_entries = entries.as_array().map(|a| a.len()).unwrap_or(0);
            obj.insert("n_entries".to_string(), Value::from(n_entries));
            let successful = entries
                .as_array()
                .map(|a| a.iter().filter(|e| e["processing_status"] == "success").count())
                .unwrap_or(0);
            let failed = n_entries - successful;
            obj.insert("processing_successful".to_string(), Value::from(successful));
            obj.insert("processing_failed".to_string(), Value::from(failed));
        }
    }
    record
}

/// `_overwrite_entry`: `mainfile` -> `mainfile_path`, `datasets` -> `dataset_ids`.
pub fn overwrite_entry(mut record: Value) -> Value {
    if let Some(obj) = record.as_object_mut() {
        if let Some(mainfile) = obj.remove("mainfile") {
            obj.insert("mainfile_path".to_string(), mainfile);
        }
        if let Some(datasets) = obj.remove("datasets") {
            obj.insert("dataset_ids".to_string(), datasets);
        }
    }
    record
}

#[async_trait]
impl<'e> DomainReader for MongoReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        match node.path.len() {
            0 => {
                if COLLECTIONS.contains(&key.name.as_str()) {
                    let segment = PathSegment::new(key.name.clone())
                        .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                    Ok(ChildOutcome::Branch {
                        node: node.goto_local(segment),
                        value: Value::Object(Map::new()),
                    })
                } else {
                    Err(QueryError::not_found(node.reference(), format!("unknown collection '{}'", key.name)))
                }
            }
            1 => {
                let collection = node.path[0].as_str();
                if key.name == WILDCARD_NAME {
                    return self.resolve_wildcard(engine, node, collection, config, requester).await;
                }

                match collection {
                    "uploads" => {
                        let upload_id = UploadId::new(&key.name)
                            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                        super::general::require_upload_access(&engine.backends, requester, &upload_id, &node.reference()).await?;
                        let record = engine.upload_pool.get(&upload_id).await?;
                        let value = overwrite_upload((*record).clone());
                        Ok(ChildOutcome::Offload {
                            node: node.goto_remote(RootKind::Upload { upload_id: upload_id.into_inner() }),
                            value,
                        })
                    }
                    "entries" => {
                        let entry_id = EntryId::new(&key.name)
                            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                        super::general::require_entry_access(&engine.backends, requester, &entry_id, &node.reference()).await?;
                        let record = engine.backends.documents.get_entry(&entry_id).await?;
                        let value = overwrite_entry(record);
                        Ok(ChildOutcome::Offload {
                            node: node.goto_remote(RootKind::Entry { entry_id: entry_id.into_inner() }),
                            value,
                        })
                    }
                    "datasets" => {
                        let dataset_id = DatasetId::new(&key.name)
                            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                        super::general::require_dataset_access(&engine.backends, requester, &dataset_id, &node.reference()).await?;
                        let record = engine.backends.documents.get_dataset(&dataset_id).await?;
                        Ok(ChildOutcome::Offload {
                            node: node.goto_remote(RootKind::Dataset { dataset_id: dataset_id.into_inner() }),
                            value: record,
                        })
                    }
                    "users" => {
                        let user_id = UserId::new(&key.name)
                            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                        let record = super::general::retrieve_user(&engine.backends, requester, &user_id).await?;
                        Ok(ChildOutcome::Offload {
                            node: node.goto_remote(RootKind::User { user_id: user_id.resolve(requester).into_inner() }),
                            value: record,
                        })
                    }
                    other => Err(QueryError::not_found(node.reference(), format!("unknown collection '{other}'"))),
                }
            }
            _ => Err(QueryError::not_found(node.reference(), "mongo root does not nest beyond collection/id")),
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        if config.include_definition {
            return Err(ConfigError::DisallowedOption {
                option: "include_definition".to_string(),
                reason: "only ArchiveReader supports include_definition".to_string(),
            });
        }
        Ok(())
    }

    /// Under `users`, the `"me"` shorthand and the requester's own literal
    /// id name the same person; resolving `"me"` before keying lets a query
    /// that requests both share one cache entry instead of fetching the
    /// requester's record twice.
    fn cache_key(&self, node: &GraphNode, key: &ParsedKey, requester: &UserId) -> String {
        if node.path.len() == 1 && node.path[0].as_str() == "users" {
            if let Ok(user_id) = UserId::new(&key.name) {
                return format!("{}/{}", node.reference(), user_id.resolve(requester).as_str());
            }
        }
        format!("{}/{}", node.reference(), key.name)
    }
}

impl<'e> MongoReader<'e> {
    /// A bare `__WILDCARD__` under `uploads`/`entries`/`datasets`: the
    /// default visible scope for that collection, document-store-backed and
    /// cursor-paginated. An `entries` wildcard carrying a `query` block is
    /// a search, not a listing, and is handed off to the search index
    /// instead. `users` has no default listing; a wildcard there is rejected.
    async fn resolve_wildcard(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        collection: &str,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        if collection == "entries" && config.query.is_some() {
            return super::elastic::run_wildcard_search(engine, config, &node.reference()).await;
        }

        let (records, id_field) = match collection {
            "uploads" => (engine.backends.documents.list_visible_uploads(requester).await?, "upload_id"),
            "entries" => (engine.backends.documents.list_visible_entries(requester).await?, "entry_id"),
            "datasets" => (engine.backends.documents.list_owned_datasets(requester).await?, "dataset_id"),
            other => {
                return Err(QueryError::not_found(
                    node.reference(),
                    format!("'{other}' has no default visible-scope listing"),
                ))
            }
        };

        let pagination = config.pagination.clone().unwrap_or_else(PaginationConfig::default_for_wildcard);
        let (page, response) =
            pagination.paginate(records, |r| r.get(id_field).and_then(Value::as_str).unwrap_or_default().to_string());

        let mut items = Vec::with_capacity(page.len());
        for record in page {
            let id = record.get(id_field).and_then(Value::as_str).unwrap_or_default().to_string();
            let (child_root, value) = match collection {
                "uploads" => (RootKind::Upload { upload_id: id.clone() }, overwrite_upload(record)),
                "entries" => (RootKind::Entry { entry_id: id.clone() }, overwrite_entry(record)),
                "datasets" => (RootKind::Dataset { dataset_id: id.clone() }, record),
                _ => unreachable!("collection already matched above"),
            };
            items.push((id, node.goto_remote(child_root), value));
        }

        Ok(ChildOutcome::WildcardExpand {
            items,
            response: serde_json::to_value(response).unwrap_or(Value::Null),
        })
    }
}
