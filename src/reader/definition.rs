// The pluggable type-definition registry: resolves `m_def` ids into their
// section/quantity shape, used both standalone and when `include_definition`
// asks `ArchiveReader` to attach one alongside resolved data. A `plain`
// directive emits just the definition's own keys; `resolved` walks its
// `base_sections`, `sub_sections`, and `quantities` in turn, bounded by
// `resolve_depth`/`depth` and breaking cycles between mutually-referencing
// definitions.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::{DirectiveType, RequestConfig};
use crate::error::{ConfigError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::ParsedKey;
use crate::schema::Section;
use crate::types::UserId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'f, T> = Pin<Box<dyn Future<Output = T> + Send + 'f>>;

pub struct DefinitionReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> DefinitionReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

/// The `m_def` id a key resolves to, given the definitions already walked
/// to reach this node. Shared by `resolve_child` and `cache_key` so a
/// `Run.system` sub-section path and a direct `System` lookup elsewhere in
/// the same query agree on the identity of the `System` definition.
fn definition_id_for(node: &GraphNode, key: &ParsedKey) -> String {
    if node.path.is_empty() {
        key.name.clone()
    } else {
        format!(
            "{}.{}",
            node.path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("."),
            key.name
        )
    }
}

#[async_trait]
impl<'e> DomainReader for DefinitionReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        _requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let definition_id = definition_id_for(node, key);
        let value = self.expand(&definition_id, engine, node, config).await?;
        Ok(ChildOutcome::Leaf(value))
    }

    fn validate_config(&self, config: &RequestConfig) -> ConfigResult<()> {
        if config.query.is_some() || config.pagination.is_some() {
            return Err(ConfigError::DisallowedOption {
                option: "query/pagination".to_string(),
                reason: "DefinitionReader is not backed by a searchable index".to_string(),
            });
        }
        Ok(())
    }

    fn cache_key(&self, node: &GraphNode, key: &ParsedKey, _requester: &UserId) -> String {
        definition_id_for(node, key)
    }
}

impl<'e> DefinitionReader<'e> {
    async fn expand(
        &self,
        definition_id: &str,
        engine: &QueryEngine,
        node: &GraphNode,
        config: &RequestConfig,
    ) -> Result<Value, QueryError> {
        let raw = engine.definition_pool.get(definition_id).await?;
        if config.directive != DirectiveType::Resolved {
            return Ok((*raw).clone());
        }

        let budget = config
            .resolve_depth
            .or(config.depth)
            .unwrap_or(engine.engine_config.default_resolve_depth);
        let mut visited = HashSet::new();
        visited.insert(definition_id.to_string());
        self.expand_resolved(engine, (*raw).clone(), node, budget, &mut visited).await
    }

    /// Pull in every base section, sub-section target, and quantity
    /// reference target this definition names, recursively, stopping once
    /// `remaining` reaches zero or a target has already been visited.
    fn expand_resolved<'f>(
        &'f self,
        engine: &'f QueryEngine,
        mut raw: Value,
        node: &'f GraphNode,
        remaining: usize,
        visited: &'f mut HashSet<String>,
    ) -> BoxFuture<'f, Result<Value, QueryError>> {
        Box::pin(async move {
            let Ok(section) = serde_json::from_value::<Section>(raw.clone()) else {
                return Ok(raw);
            };
            if remaining == 0 {
                return Ok(raw);
            }

            let mut resolved_bases = Vec::new();
            for base_id in &section.base_sections {
                if let Some(child) = self.expand_reference(engine, base_id, node, remaining, visited).await? {
                    resolved_bases.push(child);
                }
            }

            let mut resolved_sub_sections = Vec::new();
            for sub in &section.sub_sections {
                let Some(target) = &sub.reference else { continue };
                if let Some(child) = self
                    .expand_reference(engine, &target.target_section_def, node, remaining, visited)
                    .await?
                {
                    resolved_sub_sections.push(serde_json::json!({ "name": sub.name, "definition": child }));
                }
            }

            let mut resolved_quantities = Vec::new();
            for quantity in &section.quantities {
                let Some(target) = &quantity.reference else { continue };
                if let Some(child) = self
                    .expand_reference(engine, &target.target_quantity_def, node, remaining, visited)
                    .await?
                {
                    resolved_quantities.push(serde_json::json!({ "name": quantity.name, "definition": child }));
                }
            }

            if let Some(obj) = raw.as_object_mut() {
                if !resolved_bases.is_empty() {
                    obj.insert("resolved_base_sections".to_string(), Value::Array(resolved_bases));
                }
                if !resolved_sub_sections.is_empty() {
                    obj.insert("resolved_sub_sections".to_string(), Value::Array(resolved_sub_sections));
                }
                if !resolved_quantities.is_empty() {
                    obj.insert("resolved_quantities".to_string(), Value::Array(resolved_quantities));
                }
            }
            Ok(raw)
        })
    }

    async fn expand_reference(
        &self,
        engine: &QueryEngine,
        target_id: &str,
        node: &GraphNode,
        remaining: usize,
        visited: &mut HashSet<String>,
    ) -> Result<Option<Value>, QueryError> {
        if !visited.insert(target_id.to_string()) {
            return Ok(None);
        }
        let raw = engine.definition_pool.get(target_id).await?;
        let mut expanded = self
            .expand_resolved(engine, (*raw).clone(), node, remaining - 1, visited)
            .await?;
        if let Some(obj) = expanded.as_object_mut() {
            obj.entry("reference".to_string())
                .or_insert_with(|| Value::String(canonical_definition_ref(target_id)));
        }
        Ok(Some(expanded))
    }
}

/// The canonical reference path string a definition id rewrites to when
/// embedded inside an expanded `resolved` definition.
fn canonical_definition_ref(id: &str) -> String {
    format!("#/definitions/{id}")
}

/// Switch the current root to a different package's definitions while
/// keeping the accumulated path, mirroring a reference that points at a
/// shared definition defined in another schema package.
pub fn switch_root(node: &GraphNode) -> GraphNode {
    node.switch_root(RootKind::Definition)
}
