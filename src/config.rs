// The declarative shape of a single node's request: what to resolve, how
// deep, and how much of it to keep. Mirrors the `m_request`/`__CONFIG__`
// block a caller may attach at any key of a required tree.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Whether a key's value should be returned as-is or walked further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveType {
    Plain,
    Resolved,
}

impl Default for DirectiveType {
    fn default() -> Self {
        DirectiveType::Plain
    }
}

/// Which kind of cross-reference a `Resolved` directive should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveType {
    /// Follow references that point at user-authored archive data.
    User,
    /// Follow references only when the current node's schema requires it.
    UserIfRequired,
    /// Follow every reference encountered, including into shared definitions.
    Always,
}

/// Restricts which archive definition kind `include_definition` should
/// attach: the section definition, or the narrower quantity definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionType {
    Section,
    Quantity,
}

/// A domain-specific search descriptor. Only meaningful on readers backed
/// by a searchable index (`MongoReader`'s wildcard dispatch,
/// `ElasticSearchReader`, `DatasetReader`'s `prefix` field).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub terms: serde_json::Map<String, serde_json::Value>,
    /// Case-insensitive prefix match on `dataset_name`, `DatasetReader`-only.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Page-based pagination, matching `MongoReader`/`ElasticSearchReader`'s
/// `pagination` block. `page` is 1-indexed, following the legacy default
/// applied when a wildcard search omits `pagination` entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "PaginationConfig::default_page")]
    pub page: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    /// A cursor bookmark: start the page just after the item whose
    /// `order_by` key equals this value, rather than at `page`. Mirrors the
    /// document-store cursor pagination a wildcard listing over `uploads`,
    /// `entries`, or `datasets` without a `query` block hands back as
    /// `next_page_after_value`, for a caller to feed straight back in here.
    #[serde(default)]
    pub page_after_value: Option<String>,
}

impl PaginationConfig {
    fn default_page() -> u32 {
        1
    }

    pub fn default_for_wildcard() -> Self {
        Self {
            page: 1,
            page_size: None,
            order_by: None,
            order: None,
            page_after_value: None,
        }
    }

    /// Slice `items` (already in the store's natural order) into the page
    /// this config describes. `page_after_value` takes precedence over
    /// `page` when both are set, starting just past the item `id_of` marks
    /// as the cursor; an unrecognised cursor starts from the beginning
    /// rather than erroring, since a stale cursor shouldn't abort a request.
    pub fn paginate<T>(&self, items: Vec<T>, id_of: impl Fn(&T) -> String) -> (Vec<T>, PaginationResponse) {
        let total = items.len() as u64;
        let page_size = self.page_size.unwrap_or(20).max(1) as usize;

        let start = match &self.page_after_value {
            Some(cursor) => items
                .iter()
                .position(|item| &id_of(item) == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => (self.page.saturating_sub(1) as usize).saturating_mul(page_size),
        };

        let mut items = items;
        let page_items: Vec<T> = if start < items.len() {
            let end = (start + page_size).min(items.len());
            items.drain(start..end).collect()
        } else {
            Vec::new()
        };

        let next_page_after_value = page_items.last().map(&id_of);
        (
            page_items,
            PaginationResponse {
                page: self.page,
                page_size: self.page_size,
                total,
                next_page_after_value,
            },
        )
    }
}

/// The pagination half of a wildcard listing's response: what page was
/// actually returned and, when more remain, the cursor to request next.
#[derive(Debug, Clone, Serialize)]
pub struct PaginationResponse {
    pub page: u32,
    pub page_size: Option<u32>,
    pub total: u64,
    pub next_page_after_value: Option<String>,
}

/// The fully normalised, per-node request configuration. Every `__CONFIG__`
/// (`m_request`) encountered while walking the required tree is parsed into
/// one of these before a reader ever sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(default)]
    pub directive: DirectiveType,
    #[serde(default)]
    pub resolve_type: Option<ResolveType>,
    #[serde(default)]
    pub resolve_inplace: bool,
    /// Caps how many archive cross-references `goto` follows before giving
    /// up and leaving the reference unresolved.
    #[serde(default)]
    pub resolve_depth: Option<usize>,
    /// Caps how many levels of the required tree itself are walked,
    /// independent of cross-reference following.
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub max_list_size: Option<usize>,
    #[serde(default)]
    pub max_dict_size: Option<usize>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub query: Option<QueryConfig>,
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
    #[serde(default)]
    pub include_definition: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            directive: DirectiveType::Plain,
            resolve_type: None,
            resolve_inplace: false,
            resolve_depth: None,
            depth: None,
            max_list_size: None,
            max_dict_size: None,
            include: Vec::new(),
            exclude: Vec::new(),
            query: None,
            pagination: None,
            include_definition: false,
        }
    }
}

impl RequestConfig {
    /// The three legacy string shorthands, accepted anywhere a
    /// `RequestConfig` is expected (including nested `__CONFIG__` values),
    /// not only at the top level of a query.
    pub fn from_shorthand(token: &str) -> Option<Self> {
        match token {
            "*" | "include" => Some(Self {
                directive: DirectiveType::Plain,
                ..Default::default()
            }),
            "include-resolved" => Some(Self {
                directive: DirectiveType::Resolved,
                resolve_type: Some(ResolveType::UserIfRequired),
                ..Default::default()
            }),
            _ => None,
        }
    }

    /// Merge a child-level override on top of an inherited configuration.
    /// Unset fields on `self` fall through to `parent`; the child always
    /// wins when both specify a value.
    pub fn inherit_from(mut self, parent: &RequestConfig) -> Self {
        if self.resolve_type.is_none() {
            self.resolve_type = parent.resolve_type;
        }
        if self.resolve_depth.is_none() {
            self.resolve_depth = parent.resolve_depth;
        }
        if self.depth.is_none() {
            self.depth = parent.depth;
        }
        if self.max_list_size.is_none() {
            self.max_list_size = parent.max_list_size;
        }
        if self.max_dict_size.is_none() {
            self.max_dict_size = parent.max_dict_size;
        }
        self
    }

    /// Derive a child configuration for descending into `key`, decrementing
    /// any depth budget the current node carries. Returns `None` once the
    /// depth budget is exhausted, signalling the walk should stop here.
    pub fn descend(&self) -> Option<RequestConfig> {
        let depth = match self.depth {
            Some(0) => return None,
            Some(d) => Some(d - 1),
            None => None,
        };
        Some(RequestConfig {
            depth,
            ..self.clone()
        })
    }

    /// `include`/`exclude` are shell-glob-style patterns matched against a
    /// single key name (`*` and `?` wildcards, no path separators). A key
    /// survives if it matches no `exclude` pattern and, whenever `include`
    /// is non-empty, matches at least one `include` pattern.
    pub fn if_include(&self, key: &str) -> bool {
        if self.exclude.iter().any(|pat| glob_match(pat, key)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|pat| glob_match(pat, key))
    }
}

/// Translate a shell-glob pattern (`*`, `?`) into an anchored regex and
/// cache the compiled form; patterns are few and reused across every node
/// of a single walk, so a small process-wide cache is enough.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    static CACHE: OnceLock<dashmap::DashMap<String, Regex>> = OnceLock::new();
    let cache = CACHE.get_or_init(dashmap::DashMap::new);

    if let Some(re) = cache.get(pattern) {
        return re.is_match(candidate);
    }

    let mut anchored = String::with_capacity(pattern.len() * 2 + 2);
    anchored.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => anchored.push_str(".*"),
            '?' => anchored.push('.'),
            c if "\\.+^$()[]{}|".contains(c) => {
                anchored.push('\\');
                anchored.push(c);
            }
            c => anchored.push(c),
        }
    }
    anchored.push('$');

    let re = Regex::new(&anchored).unwrap_or_else(|_| Regex::new("$^").expect("empty regex"));
    let matched = re.is_match(candidate);
    cache.insert(pattern.to_string(), re);
    matched
}

/// Engine-wide tunables that apply across every request rather than being
/// part of any single one: ceilings applied when a request omits its own,
/// and sizing hints for the caches and pools a reader chain keeps alive.
/// Loaded the same way as any other layered runtime setting (environment
/// overrides over compiled-in defaults).
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_resolve_depth")]
    pub default_resolve_depth: usize,
    #[serde(default = "EngineConfig::default_depth")]
    pub default_depth: usize,
    #[serde(default = "EngineConfig::default_ref_cache_capacity")]
    pub ref_path_cache_capacity: usize,
    #[serde(default = "EngineConfig::default_key_cache_capacity")]
    pub parsed_key_cache_capacity: usize,
    #[serde(default = "EngineConfig::default_upload_pool_size")]
    pub upload_pool_size_hint: usize,
}

impl EngineConfig {
    fn default_resolve_depth() -> usize {
        6
    }
    fn default_depth() -> usize {
        32
    }
    fn default_ref_cache_capacity() -> usize {
        4096
    }
    fn default_key_cache_capacity() -> usize {
        4096
    }
    fn default_upload_pool_size() -> usize {
        16
    }

    /// Load from `GRAPH_READER_*` environment variables layered over the
    /// compiled-in defaults above.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .set_default("default_resolve_depth", Self::default_resolve_depth() as i64)?
            .set_default("default_depth", Self::default_depth() as i64)?
            .set_default(
                "ref_path_cache_capacity",
                Self::default_ref_cache_capacity() as i64,
            )?
            .set_default(
                "parsed_key_cache_capacity",
                Self::default_key_cache_capacity() as i64,
            )?
            .set_default("upload_pool_size_hint", Self::default_upload_pool_size() as i64)?
            .add_source(config::Environment::with_prefix("GRAPH_READER"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_resolve_depth: Self::default_resolve_depth(),
            default_depth: Self::default_depth(),
            ref_path_cache_capacity: Self::default_ref_cache_capacity(),
            parsed_key_cache_capacity: Self::default_key_cache_capacity(),
            upload_pool_size_hint: Self::default_upload_pool_size(),
        }
    }
}
