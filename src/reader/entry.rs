// A single entry's metadata fields, its archive, and its parent upload.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::RequestConfig;
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::ParsedKey;
use crate::types::{EntryId, UserId};
use async_trait::async_trait;

pub struct EntryReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> EntryReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn entry_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::Entry { entry_id } => entry_id,
        _ => unreachable!("EntryReader only ever sees RootKind::Entry nodes"),
    }
}

#[async_trait]
impl<'e> DomainReader for EntryReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        _config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let entry_id = EntryId::new(entry_id_of(node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;

        super::general::require_entry_access(&engine.backends, requester, &entry_id, &node.reference()).await?;

        match key.name.as_str() {
            "archive" => Ok(ChildOutcome::Offload {
                node: node.goto_remote(RootKind::Archive {
                    entry_id: entry_id.into_inner(),
                }),
                value: serde_json::Value::Object(Default::default()),
            }),
            "upload" => {
                let record = engine.backends.documents.get_entry(&entry_id).await?;
                let upload_id_str = record
                    .get("upload_id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| QueryError::not_found(node.reference(), "entry has no upload_id"))?;
                let upload_id = crate::types::UploadId::new(upload_id_str)
                    .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                super::general::require_upload_access(&engine.backends, requester, &upload_id, &node.reference()).await?;
                let upload = engine.upload_pool.get(&upload_id).await?;
                let value = super::mongo::overwrite_upload((*upload).clone());
                Ok(ChildOutcome::Offload {
                    node: node.goto_remote(RootKind::Upload {
                        upload_id: upload_id.into_inner(),
                    }),
                    value,
                })
            }
            "metadata" => {
                let record = engine.backends.documents.get_entry(&entry_id).await?;
                Ok(ChildOutcome::Leaf(super::mongo::overwrite_entry(record)))
            }
            other => {
                let record = engine.backends.documents.get_entry(&entry_id).await?;
                match record.get(other) {
                    Some(value) => Ok(ChildOutcome::Leaf(value.clone())),
                    None => Err(QueryError::not_found(node.reference(), format!("entry has no field '{other}'"))),
                }
            }
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        crate::validation::config::validate_not_searchable(config, "EntryReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "query/pagination".to_string(),
                reason: "EntryReader is not backed by a searchable index".to_string(),
            })
    }
}
