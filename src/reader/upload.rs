// An upload's entries (by id), its raw file tree, and its main author.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::RequestConfig;
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::ParsedKey;
use crate::types::{EntryId, PathSegment, UserId};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct UploadReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> UploadReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn upload_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::Upload { upload_id } => upload_id,
        _ => unreachable!("UploadReader only ever sees RootKind::Upload nodes"),
    }
}

#[async_trait]
impl<'e> DomainReader for UploadReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let upload_id = crate::types::UploadId::new(upload_id_of(node))
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
                "files" => Ok(ChildOutcome::Offload {
                    node: node.goto_remote(RootKind::FileSystem {
                        upload_id: upload_id.into_inner(),
                    }),
                    value: Value::Object(Map::new()),
                }),
                "main_author" => {
                    let record = engine.upload_pool.get(&upload_id).await?;
                    let user_id_str = record
                        .get("main_author")
                        .and_then(Value::as_str)
                        .ok_or_else(|| QueryError::not_found(node.reference(), "upload has no main_author"))?;
                    let user_id = crate::types::UserId::new(user_id_str)
                        .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
                    let value = super::general::retrieve_user(&engine.backends, requester, &user_id).await?;
                    Ok(ChildOutcome::Offload {
                        node: node.goto_remote(RootKind::User {
                            user_id: user_id.resolve(requester).into_inner(),
                        }),
                        value,
                    })
                }
                other => Err(QueryError::not_found(node.reference(), format!("unknown upload key '{other}'"))),
            },
            1 if node.path[0].as_str() == "entries" => {
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
            _ => Err(QueryError::not_found(node.reference(), "path does not nest further under an upload")),
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        crate::validation::config::validate_not_searchable(config, "UploadReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "query/pagination".to_string(),
                reason: "UploadReader is not backed by a searchable index".to_string(),
            })?;
        crate::validation::config::validate_no_include_definition(config, "UploadReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "include_definition".to_string(),
                reason: "only ArchiveReader supports include_definition".to_string(),
            })
    }
}
