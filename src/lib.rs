// Graph Query Reader: a federated, read-only traversal engine for
// structured, tree-shaped queries over heterogeneous data sources.
//
// A caller submits a declarative "required tree" describing which fields
// of which entities it wants, optionally resolved across cross-references;
// the engine walks it against whichever backends are wired in and returns
// a single merged JSON result plus any per-node errors encountered along
// the way.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod graph_node;
pub mod normalizer;
pub mod observability;
pub mod reader;
pub mod refs;
pub mod result;
pub mod schema;
pub mod types;
pub mod validation;

pub use backend::Backends;
pub use config::{EngineConfig, RequestConfig};
pub use error::{ArchiveError, ConfigError, QueryError};
pub use graph_node::{GraphNode, RootKind};
pub use reader::QueryEngine;
