// The immutable cursor threaded through a walk. Every descent produces a
// new `GraphNode` rather than mutating one in place, so a reader can always
// hand a child node to a sibling call without aliasing concerns.

use crate::types::PathSegment;
use std::collections::HashSet;
use std::sync::Arc;

/// Which backend domain a node is currently positioned in. `goto` crossing
/// a `files`/`entries`/`archive`/`m_def` token switches this, which is how
/// the walk knows to hand off to a different reader mid-traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootKind {
    Mongo,
    Upload { upload_id: String },
    Entry { entry_id: String },
    Dataset { dataset_id: String },
    User { user_id: String },
    Elastic,
    FileSystem { upload_id: String },
    Archive { entry_id: String },
    Definition,
}

/// An immutable traversal cursor: where we are (`root`, `path`), what we've
/// already been through (`visited`, for cycle detection across archive
/// cross-references), and how deep we've gone.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub root: RootKind,
    pub path: Vec<PathSegment>,
    visited: Arc<HashSet<String>>,
    pub depth: usize,
    /// How many archive cross-references have been followed to reach this
    /// node, distinct from `depth`'s count of required-tree levels. Checked
    /// against `RequestConfig::resolve_depth`.
    pub ref_hops: usize,
    /// The schema section definition id that applies at the current archive
    /// path, when known. `ArchiveReader` consults this (via
    /// `SchemaRegistry::resolve_definition`) to decide whether a key is
    /// reference-typed instead of guessing from the runtime value's shape.
    pub definition_id: Option<String>,
}

impl GraphNode {
    pub fn new(root: RootKind) -> Self {
        Self {
            root,
            path: Vec::new(),
            visited: Arc::new(HashSet::new()),
            depth: 0,
            ref_hops: 0,
            definition_id: None,
        }
    }

    /// Attach (or clear) the schema definition id that applies at this node,
    /// keeping everything else about the cursor unchanged.
    pub fn with_definition(&self, definition_id: Option<String>) -> Self {
        Self {
            definition_id,
            ..self.clone()
        }
    }

    /// Descend locally, within the same backend domain, appending `key` to
    /// the path and marking the resulting canonical path as visited.
    pub fn goto_local(&self, key: PathSegment) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        let canonical = Self::canonical_path(&self.root, &path);
        let mut visited = (*self.visited).clone();
        visited.insert(canonical);
        Self {
            root: self.root.clone(),
            path,
            visited: Arc::new(visited),
            depth: self.depth + 1,
            ref_hops: self.ref_hops,
            definition_id: None,
        }
    }

    /// Cross into a different backend domain (a file tree root, a user
    /// lookup, an upload's entry collection) while carrying the
    /// accumulated visited set forward so cycles spanning multiple domains
    /// are still caught. Does not count against `resolve_depth`, since this
    /// is a domain handoff, not an archive cross-reference.
    pub fn goto_remote(&self, new_root: RootKind) -> Self {
        Self {
            root: new_root,
            path: Vec::new(),
            visited: Arc::clone(&self.visited),
            depth: self.depth + 1,
            ref_hops: self.ref_hops,
            definition_id: None,
        }
    }

    /// Follow an archive cross-reference into another entry's archive (or
    /// back into the same one at a different path). Increments `ref_hops`,
    /// which `ArchiveReader` checks against `RequestConfig::resolve_depth`.
    pub fn follow_reference(&self, new_root: RootKind, path: Vec<PathSegment>) -> Self {
        let canonical = Self::canonical_path(&new_root, &path);
        let mut visited = (*self.visited).clone();
        visited.insert(canonical);
        Self {
            root: new_root,
            path,
            visited: Arc::new(visited),
            depth: self.depth + 1,
            ref_hops: self.ref_hops + 1,
            definition_id: None,
        }
    }

    /// Replace the root domain while keeping the current path and visited
    /// set intact. Used when a reference resolves to a different top-level
    /// entity of the same shape (e.g. `DefinitionReader` switching from one
    /// package root to another referenced package).
    pub fn switch_root(&self, new_root: RootKind) -> Self {
        Self {
            root: new_root,
            path: self.path.clone(),
            visited: Arc::clone(&self.visited),
            depth: self.depth,
            ref_hops: self.ref_hops,
            definition_id: self.definition_id.clone(),
        }
    }

    /// The canonical reference string for this node's current position,
    /// used both for cycle detection and for embedding `__INTERNAL__`
    /// sentinels in oversized result branches.
    pub fn reference(&self) -> String {
        Self::canonical_path(&self.root, &self.path)
    }

    pub fn has_visited(&self, reference: &str) -> bool {
        self.visited.contains(reference)
    }

    /// The canonical reference string a `(root, path)` pair would have,
    /// without constructing a node for it. Lets a caller check whether a
    /// reference target has already been visited before committing to the
    /// hop via [`Self::follow_reference`].
    pub fn peek_reference(root: &RootKind, path: &[PathSegment]) -> String {
        Self::canonical_path(root, path)
    }

    fn canonical_path(root: &RootKind, path: &[PathSegment]) -> String {
        let root_prefix = match root {
            RootKind::Mongo => "mongo".to_string(),
            RootKind::Upload { upload_id } => format!("uploads/{upload_id}"),
            RootKind::Entry { entry_id } => format!("entries/{entry_id}"),
            RootKind::Dataset { dataset_id } => format!("datasets/{dataset_id}"),
            RootKind::User { user_id } => format!("users/{user_id}"),
            RootKind::Elastic => "search".to_string(),
            RootKind::FileSystem { upload_id } => format!("uploads/{upload_id}/raw"),
            RootKind::Archive { entry_id } => format!("entries/{entry_id}/archive"),
            RootKind::Definition => "definitions".to_string(),
        };

        if path.is_empty() {
            format!("#/{root_prefix}")
        } else {
            let joined = path
                .iter()
                .map(PathSegment::as_str)
                .collect::<Vec<_>>()
                .join("/");
            format!("#/{root_prefix}/{joined}")
        }
    }
}
