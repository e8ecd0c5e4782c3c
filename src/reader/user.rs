// A single user's profile fields. Terminal: a user node never offloads
// into another domain.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::RequestConfig;
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::ParsedKey;
use crate::types::UserId;
use async_trait::async_trait;

pub struct UserReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> UserReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn user_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::User { user_id } => user_id,
        _ => unreachable!("UserReader only ever sees RootKind::User nodes"),
    }
}

#[async_trait]
impl<'e> DomainReader for UserReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        _config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let user_id = UserId::new(user_id_of(node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
        let record = super::general::retrieve_user(&engine.backends, requester, &user_id).await?;

        match record.get(&key.name) {
            Some(value) => Ok(ChildOutcome::Leaf(value.clone())),
            None => Err(QueryError::not_found(node.reference(), format!("user has no field '{}'", key.name))),
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        crate::validation::config::validate_not_searchable(config, "UserReader")
            .map_err(|_| ConfigError::DisallowedOption {
                option: "query/pagination".to_string(),
                reason: "UserReader is not backed by a searchable index".to_string(),
            })
    }
}
