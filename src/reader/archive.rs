// The schema-bearing archive store. Walks processed entry data, following
// cross-references into other entries' archives (and other uploads'
// entries) when the request directive says to resolve them, and clamping
// oversized containers into `__INTERNAL__` sentinels instead of inlining
// them whole.

use super::{ChildOutcome, DomainReader, QueryEngine};
use crate::config::{DirectiveType, RequestConfig};
use crate::error::{ArchiveError, ConfigResult, QueryError};
use crate::graph_node::{GraphNode, RootKind};
use crate::normalizer::{normalise_index, normalise_slice, IndexSpec, ParsedKey};
use crate::result::internal_ref_sentinel;
use crate::types::{EntryId, PathSegment, UploadId, UserId};
use async_trait::async_trait;
use serde_json::Value;

pub struct ArchiveReader<'e> {
    engine: &'e QueryEngine,
}

impl<'e> ArchiveReader<'e> {
    pub fn new(engine: &'e QueryEngine) -> Self {
        Self { engine }
    }
}

fn entry_id_of(node: &GraphNode) -> &str {
    match &node.root {
        RootKind::Archive { entry_id } => entry_id,
        _ => unreachable!("ArchiveReader only ever sees RootKind::Archive nodes"),
    }
}

/// `true` when a string value is a cross-reference rather than ordinary
/// archive data: either local (`#/...`) or into another upload
/// (`../uploads/<id>/archive/<id>#/...`). Used as a fallback when no schema
/// definition is available for the current node; when one is, `resolve_section`
/// plus `Section::reference_for_key` decides instead.
fn is_reference(value: &str) -> bool {
    value.starts_with("#/") || value.starts_with("../uploads/")
}

/// If `key` carries a bracketed index/slice selector, narrow `items` down to
/// just the selected element(s) as a leaf, rather than handing the whole
/// list back. `None` means the key carried no selector and the caller
/// should fall through to branching over the full list.
fn select_index(items: &[Value], key: &ParsedKey) -> Option<ChildOutcome> {
    match key.index? {
        IndexSpec::Single(i) => {
            let idx = normalise_index(i, items.len())?;
            Some(ChildOutcome::Leaf(items[idx].clone()))
        }
        IndexSpec::Range(start, stop) => {
            let (from, to) = normalise_slice(start, stop, items.len());
            Some(ChildOutcome::Leaf(Value::Array(items[from..to].to_vec())))
        }
    }
}

/// Decide whether the current directive should follow a reference at all.
/// `ResolveType::User`/`UserIfRequired` only follow references the schema
/// marks as user-authored data; here, lacking a full type system, any
/// reference is treated as eligible except under a plain directive.
fn should_resolve(config: &RequestConfig) -> bool {
    match config.directive {
        DirectiveType::Plain => false,
        DirectiveType::Resolved => true,
    }
}

#[async_trait]
impl<'e> DomainReader for ArchiveReader<'e> {
    async fn resolve_child(
        &self,
        engine: &QueryEngine,
        node: &GraphNode,
        key: &ParsedKey,
        config: &RequestConfig,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        let entry_id = EntryId::new(entry_id_of(node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
        super::general::require_entry_access(&engine.backends, requester, &entry_id, &node.reference()).await?;

        let mut full_path: Vec<String> = node.path.iter().map(|s| s.as_str().to_string()).collect();
        full_path.push(key.name.clone());

        let fragment = engine
            .backends
            .archive
            .get_archive_fragment(&entry_id, &full_path)
            .await?;

        let segment = PathSegment::new(key.name.clone())
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;

        let section = self.resolve_section(node).await;
        let schema_reference = section.as_ref().and_then(|s| s.reference_for_key(&key.name));

        match &fragment {
            Value::String(s) if schema_reference.is_some() || is_reference(s) => {
                if !should_resolve(config) {
                    return Ok(ChildOutcome::Leaf(fragment));
                }
                let mut outcome = self.check_reference(node, config, s, requester).await?;
                if let (ChildOutcome::Branch { node: target, .. }, Some(crate::schema::Reference::Section(r))) =
                    (&mut outcome, &schema_reference)
                {
                    *target = target.with_definition(Some(r.target_section_def.clone()));
                }
                Ok(outcome)
            }
            Value::Array(items) => {
                if let Some(max) = config.max_list_size {
                    if items.len() > max {
                        return Ok(ChildOutcome::Leaf(internal_ref_sentinel(&format!(
                            "{}/{}",
                            node.reference(),
                            key.name
                        ))));
                    }
                }
                if let Some(selected) = select_index(items, key) {
                    return Ok(selected);
                }
                Ok(ChildOutcome::Branch {
                    node: node.goto_local(segment),
                    value: fragment,
                })
            }
            Value::Object(obj) => {
                if let Some(max) = config.max_dict_size {
                    if obj.len() > max {
                        return Ok(ChildOutcome::Leaf(internal_ref_sentinel(&format!(
                            "{}/{}",
                            node.reference(),
                            key.name
                        ))));
                    }
                }
                Ok(ChildOutcome::Branch {
                    node: node.goto_local(segment),
                    value: fragment,
                })
            }
            _ => Ok(ChildOutcome::Leaf(fragment)),
        }
    }

    fn validate_config(&self, _config: &RequestConfig) -> ConfigResult<()> {
        Ok(())
    }
}

impl<'e> ArchiveReader<'e> {
    /// Resolve the schema section definition that applies at `node`, if any
    /// is known. Absence (no definition tracked, or the registry's value
    /// doesn't deserialize into a [`crate::schema::Section`]) is not an
    /// error: the caller falls back to the string-prefix heuristic.
    async fn resolve_section(&self, node: &GraphNode) -> Option<crate::schema::Section> {
        let definition_id = node.definition_id.as_ref()?;
        let value = self.engine.definition_pool.get(definition_id).await.ok()?;
        serde_json::from_value((*value).clone()).ok()
    }

    /// Resolve a reference string to the node it points at, enforcing the
    /// `resolve_depth` budget and rejecting only a reference that would
    /// cross into a different installation (`scheme://...`); a reference
    /// into another upload's archive (`../uploads/<upload>/archive/<entry>#/...`)
    /// is resolved via `backends.access`/`backends.archive` like any other.
    async fn check_reference(
        &self,
        node: &GraphNode,
        config: &RequestConfig,
        reference: &str,
        requester: &UserId,
    ) -> Result<ChildOutcome, QueryError> {
        if reference.contains("://") {
            return Err(ArchiveError::new(
                node.reference(),
                "cross-installation references are not supported",
            )
            .into());
        }

        let max_depth = config
            .resolve_depth
            .unwrap_or(self.engine.engine_config.default_resolve_depth);
        if node.ref_hops >= max_depth {
            return Err(ArchiveError::new(node.reference(), "resolve_depth exceeded").into());
        }

        let parsed = self.engine.ref_cache.convert_ref_to_path(reference);
        let segments: Vec<PathSegment> = parsed
            .segments
            .iter()
            .map(|s| PathSegment::new(s.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;

        let target_entry_id = match &parsed.target_entry {
            Some(entry_id) => entry_id.clone(),
            None => entry_id_of(node).to_string(),
        };

        if let Some(upload_id_str) = &parsed.target_upload {
            let upload_id = UploadId::new(upload_id_str)
                .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
            super::general::require_upload_access(&self.engine.backends, requester, &upload_id, &node.reference())
                .await?;
        }

        let target_root = RootKind::Archive {
            entry_id: target_entry_id.clone(),
        };

        if node.has_visited(&GraphNode::peek_reference(&target_root, &segments)) {
            return Err(ArchiveError::new(node.reference(), "reference cycle detected").into());
        }

        let target_node = node.follow_reference(target_root, segments);
        let target_entry = EntryId::new(entry_id_of(&target_node))
            .map_err(|e| QueryError::general(node.reference(), e.to_string()))?;
        super::general::require_entry_access(&self.engine.backends, requester, &target_entry, &node.reference())
            .await?;

        let fragment = self
            .engine
            .backends
            .archive
            .get_archive_fragment(
                &target_entry,
                &target_node.path.iter().map(|s| s.as_str().to_string()).collect::<Vec<_>>(),
            )
            .await?;

        if config.resolve_inplace {
            return Ok(ChildOutcome::Branch {
                node: target_node,
                value: fragment,
            });
        }

        let hoist_path = hoist_path_for(parsed.target_upload.as_deref(), &target_entry_id, &parsed.segments);
        Ok(ChildOutcome::ReferenceHoist {
            node: target_node,
            fragment,
            hoist_path,
            reference_string: Value::String(reference.to_string()),
        })
    }
}

/// Where a resolved reference's fragment lives under the shared references
/// tree: `uploads/<upload>/entries/<entry>/archive/<path>` for a
/// cross-upload reference, `entries/<entry>/archive/<path>` for a local one.
fn hoist_path_for(target_upload: Option<&str>, target_entry: &str, segments: &[String]) -> Vec<String> {
    let mut path = Vec::new();
    if let Some(upload) = target_upload {
        path.push("uploads".to_string());
        path.push(upload.to_string());
    }
    path.push("entries".to_string());
    path.push(target_entry.to_string());
    path.push("archive".to_string());
    path.extend(segments.iter().cloned());
    path
}

impl From<ArchiveError> for QueryError {
    fn from(e: ArchiveError) -> Self {
        QueryError::new(crate::error::QueryErrorKind::ArchiveError, e.path.clone(), e.message)
    }
}
