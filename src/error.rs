// Error taxonomy for the traversal engine.
//
// Three distinct shapes exist because they propagate differently:
// `QueryError` accumulates per-node into a result tree's `m_errors` and
// never aborts the walk; `ArchiveError` short-circuits the branch it was
// raised in; `ConfigError` aborts normalization before any reader runs.

use thiserror::Error;

/// The four outcomes `graph_reader.py` distinguishes when a node cannot be
/// produced. The variant controls what, if anything, is written back into
/// the result tree at that key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The requester lacks permission to view this node.
    NoAccess,
    /// The node does not exist in the backing store.
    NotFound,
    /// A schema-bearing archive reference could not be resolved.
    ArchiveError,
    /// Any other failure (malformed key, backend failure, etc.).
    General,
}

impl std::fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryErrorKind::NoAccess => "NOACCESS",
            QueryErrorKind::NotFound => "NOTFOUND",
            QueryErrorKind::ArchiveError => "ARCHIVEERROR",
            QueryErrorKind::General => "GENERAL",
        };
        f.write_str(s)
    }
}

/// A single error attributable to one key of one node in the required
/// tree. Readers accumulate these instead of failing the whole walk.
#[derive(Debug, Error, Clone)]
#[error("{kind}: {message} (at {path})")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub path: String,
    pub message: String,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn no_access(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::NoAccess, path, message)
    }

    pub fn not_found(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::NotFound, path, message)
    }

    pub fn general(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::General, path, message)
    }
}

/// Raised while resolving a cross-reference inside an archive. Unlike
/// `QueryError`, this unwinds the branch currently being resolved: the
/// caller that catches it writes a single error entry at the branch root
/// rather than per-leaf entries.
#[derive(Debug, Error, Clone)]
#[error("archive resolution failed at {path}: {message}")]
pub struct ArchiveError {
    pub path: String,
    pub message: String,
}

impl ArchiveError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Raised during normalization of a raw `required` tree, before any reader
/// has been invoked. A malformed request aborts the whole query instead of
/// being recorded per-node, since there is no node yet to attach it to.
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error("malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("'{directive}' is not a recognised directive")]
    UnknownDirective { directive: String },

    #[error("option '{option}' is not permitted on this reader: {reason}")]
    DisallowedOption { option: String, reason: String },

    #[error("required tree exceeds maximum nesting depth of {max_depth}")]
    TooDeep { max_depth: usize },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
