// A single dataset's member entries.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::RequestConfig;
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::ParsedKey;
use crate::types::{DatasetId, EntryId, PathSegment, UserId};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct DatasetReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> DatasetReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn dataset_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::Dataset { dataset_id } => dataset_id,
        _ => unreachable!("DatasetReader only ever sees RootKind::Dataset nodes"),
    }
}

/// Case-insensitive prefix match on `dataset_name`, the one domain-specific
/// query field a dataset listing accepts.
pub fn matches_prefix(dataset_name: &str, prefix: &str) -> bool {
    dataset_name.to_lowercase().starts_with(&prefix.to_lowercase())
}

#[async_trait]
impl<'e> DomainReader for DatasetReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let dataset_id = DatasetId::new(dataset_id_of(node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;

        match node.path.len() {
            0 => match key.name.as_str() {
                "entries" => {
                    let segment = PathSegment::new("entries".to_string())
                        .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                    Ok(ChildOutcome::Branch {
                        node: node.goto_local(segment),
                        value: Value::Object(Map::new()),
                    })
                }
                other => {
                    let record = engine.backends.documents.get_dataset(&dataset_id).await?;
                    match record.get(other) {
                        Some(value) => Ok(ChildOutcome::Leaf(value.clone())),
                        None => Err(QueryError::not_found(node.reference(), format!("dataset has no field '{other}'"))),
                    }
                }
            },
            1 if node.path[0].as_str() == "entries" => {
                if let Some(prefix) = config.query.as_ref().and_then(|q| q.prefix.as_deref()) {
                    let record = engine.backends.documents.get_dataset(&dataset_id).await?;
                    let name = record.get("dataset_name").and_then(Value::as_str).unwrap_or_default();
                    if !matches_prefix(name, prefix) {
                        return Err(QueryError::not_found(node.reference(), "dataset name does not match prefix filter"));
                    }
                }

                let entry_id = EntryId::new(&key.name)
                    .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                super::general::require_entry_access(&engine.backends, requester, &entry_id, &node.reference()).await?;
                let record = engine.backends.documents.get_entry(&entry_id).await?;
                let value = super::mongo::overwrite_entry(record);
                Ok(ChildOutcome::Offload {
                    node: node.goto_remote(RootKind::Entry {
                        entry_id: entry_id.into_inner(),
                    }),
                    value,
                })
            }
            _ => Err(QueryError::not_found(node.reference(), "path does not nest further under a dataset")),
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        if let Some(query) = &config.query {
            if query.prefix.is_none() && !query.terms.is_empty() {
                return Err(ConfigError::DisallowedOption {
                    option: "query".to_string(),
                    reason: "DatasetReader only accepts a 'prefix' query field".to_string(),
                });
            }
        }
        crate::validation::config::validate_no_include_definition(config, "DatasetReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "include_definition".to_string(),
                reason: "only ArchiveReader supports include_definition".to_string(),
            })
    }
}
