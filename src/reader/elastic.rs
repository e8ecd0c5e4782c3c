// The full-text search index, reachable either as a `__WILDCARD__` key
// under `entries` in the metadata store or as a standalone root when a
// caller queries the search domain directly.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::{PaginationConfig, RequestConfig};
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::GraphNode;
use crate::normalizer::{ParsedKey, WILDCARD_NAME};
use crate::types::UserId;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct ElasticSearchReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> ElasticSearchReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

/// Execute the search described by `config.query`/`config.pagination` and
/// shape the result as `{ data: [...], pagination: { page, page_size, total } }`.
pub async fn run_wildcard_search(
    engine: &QueryEngine,
    config: &RequestConfig,
    reference: &str,
) -> Result<ChildOutcome, QueryError> {
    let query = config
        .query
        .as_ref()
        .ok_or_else(|| QueryError::general(reference, "__WILDCARD__ requires a query block"))?;

    let pagination = config
        .pagination
        .clone()
        .unwrap_or_else(PaginationConfig::default_for_wildcard);
    let page_size = pagination.page_size.unwrap_or(20);

    let terms = Value::Object(query.terms.clone());
    let page = engine
        .backends
        .search
        .search_entries(&terms, pagination.page, page_size, pagination.order_by.as_deref())
        .await?;

    let next_page_after_value = page
        .hits
        .last()
        .and_then(|hit| hit.get("entry_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let value = json!({
        "data": page.hits,
        "pagination": {
            "page": pagination.page,
            "page_size": page_size,
            "total": page.total,
            "next_page_after_value": next_page_after_value,
        },
    });

    Ok(ChildOutcome::Leaf(value))
}

#[async_trait]
impl<'e> DomainReader for ElasticSearchReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        _requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        if key.name == WILDCARD_NAME {
            run_wildcard_search(engine, config, &node.reference()).await
        } else {
            Err(QueryError::not_found(
                node.reference(),
                format!("the search domain only accepts a wildcard key, got '{}'", key.name),
            ))
        }
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        if config.query.is_none() {
            return Err(ConfigError::DisallowedOption {
                option: "query".to_string(),
                reason: "the search domain requires a query block".to_string(),
            });
        }
        Ok(())
    }
}
