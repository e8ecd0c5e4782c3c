// Turns a raw JSON "required tree" into a tree of [`RequestConfig`]s the
// readers can walk, resolving legacy shorthands and bracketed index/slice
// keys along the way. Everything here runs once, before any backend is
// touched, and aborts the whole query on a malformed shape rather than
// producing a partial result.

use crate::config::{PaginationConfig, RequestConfig};
use crate::error::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// The two config-bearing key names a caller may attach to any node,
/// kept distinct from ordinary child keys during normalization.
const CONFIG_KEYS: &[&str] = &["__CONFIG__", "m_request"];

/// A single `name`, `name[i]`, or `name[a:b]` key, split into its plain
/// name and an optional index/slice selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub name: String,
    pub index: Option<IndexSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSpec {
    Single(i64),
    Range(Option<i64>, Option<i64>),
}

static INDEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z_\d]+)\[(-?\d+)\]$").expect("valid regex"));
static SLICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z_\d]+)\[(-?\d+)?:(-?\d+)?\]$").expect("valid regex"));

/// The reserved key a caller sends to mean "every child visible here",
/// translated at parse time into the sentinel name the readers dispatch on
/// internally.
pub const WILDCARD_TOKEN: &str = "*";
pub const WILDCARD_NAME: &str = "__WILDCARD__";

/// Parse a single required-tree key, recognising the bracketed index/slice
/// forms on top of a plain name, and the reserved `"*"` wildcard key.
pub fn parse_key(key: &str) -> ConfigResult<ParsedKey> {
    if key == WILDCARD_TOKEN {
        return Ok(ParsedKey {
            name: WILDCARD_NAME.to_string(),
            index: None,
        });
    }

    if let Some(caps) = INDEX_RE.captures(key) {
        let name = caps[1].to_string();
        let index: i64 = caps[2]
            .parse()
            .map_err(|_| ConfigError::MalformedKey {
                key: key.to_string(),
                reason: "index is not a valid integer".to_string(),
            })?;
        return Ok(ParsedKey {
            name,
            index: Some(IndexSpec::Single(index)),
        });
    }

    if let Some(caps) = SLICE_RE.captures(key) {
        let name = caps[1].to_string();
        let start = caps
            .get(2)
            .map(|m| m.as_str().parse::<i64>())
            .transpose()
            .map_err(|_| ConfigError::MalformedKey {
                key: key.to_string(),
                reason: "slice start is not a valid integer".to_string(),
            })?;
        let stop = caps
            .get(3)
            .map(|m| m.as_str().parse::<i64>())
            .transpose()
            .map_err(|_| ConfigError::MalformedKey {
                key: key.to_string(),
                reason: "slice stop is not a valid integer".to_string(),
            })?;
        return Ok(ParsedKey {
            name,
            index: Some(IndexSpec::Range(start, stop)),
        });
    }

    if key.contains('[') || key.contains(']') {
        return Err(ConfigError::MalformedKey {
            key: key.to_string(),
            reason: "unbalanced or malformed bracket expression".to_string(),
        });
    }

    Ok(ParsedKey {
        name: key.to_string(),
        index: None,
    })
}

/// Clamp a Python-style index (negative counts from the end) against a
/// collection of length `len`, returning `None` when it falls outside the
/// collection even after clamping.
pub fn normalise_index(index: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        None
    } else {
        Some(resolved as usize)
    }
}

/// Clamp a Python-style slice (either bound may be negative or absent)
/// against a collection of length `len`, returning a `[start, stop)` range
/// that is always in-bounds, possibly empty.
pub fn normalise_slice(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let len_i = len as i64;
    let clamp = |v: i64| -> i64 {
        let v = if v < 0 { v + len_i } else { v };
        v.clamp(0, len_i)
    };
    let start = start.map(clamp).unwrap_or(0);
    let stop = stop.map(clamp).unwrap_or(len_i);
    if stop <= start {
        (start as usize, start as usize)
    } else {
        (start as usize, stop as usize)
    }
}

/// A normalised node of the required tree: the config that applies at this
/// key, plus any children to descend into. Children are `IndexMap`-backed
/// so that ordering in the response mirrors the order a caller requested
/// keys in.
#[derive(Debug, Clone)]
pub struct NormalisedNode {
    pub config: RequestConfig,
    pub children: IndexMap<ParsedKey, NormalisedNode>,
}

impl std::hash::Hash for ParsedKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl NormalisedNode {
    fn leaf(config: RequestConfig) -> Self {
        Self {
            config,
            children: IndexMap::new(),
        }
    }
}

/// Normalise a raw JSON required-tree value into a [`NormalisedNode]`,
/// inheriting `parent_config` fields the node doesn't override. Handles the
/// three legacy string shorthands (`"*"`, `"include"`, `"include-resolved"`)
/// at any nesting level, including as the value of an inner `__CONFIG__`.
pub fn normalise_required(
    raw: &serde_json::Value,
    parent_config: &RequestConfig,
) -> ConfigResult<NormalisedNode> {
    match raw {
        serde_json::Value::String(token) => {
            let config = RequestConfig::from_shorthand(token).ok_or_else(|| ConfigError::MalformedKey {
                key: token.clone(),
                reason: "not a recognised shorthand directive".to_string(),
            })?;
            Ok(NormalisedNode::leaf(config.inherit_from(parent_config)))
        }
        serde_json::Value::Object(map) => {
            let mut config = parent_config.clone();
            for config_key in CONFIG_KEYS {
                if let Some(value) = map.get(*config_key) {
                    config = parse_inline_config(value, parent_config)?;
                }
            }

            let mut children = IndexMap::new();
            for (key, value) in map {
                if CONFIG_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let parsed_key = parse_key(key)?;
                let mut child = normalise_required(value, &config)?;
                if parsed_key.name == WILDCARD_NAME
                    && child.config.query.is_some()
                    && child.config.pagination.is_none()
                {
                    child.config.pagination = Some(PaginationConfig::default_for_wildcard());
                }
                children.insert(parsed_key, child);
            }

            Ok(NormalisedNode { config, children })
        }
        serde_json::Value::Null => Ok(NormalisedNode::leaf(parent_config.clone())),
        other => Err(ConfigError::MalformedKey {
            key: other.to_string(),
            reason: "expected a string shorthand or an object".to_string(),
        }),
    }
}

fn parse_inline_config(
    value: &serde_json::Value,
    parent_config: &RequestConfig,
) -> ConfigResult<RequestConfig> {
    match value {
        serde_json::Value::String(token) => RequestConfig::from_shorthand(token)
            .ok_or_else(|| ConfigError::MalformedKey {
                key: token.clone(),
                reason: "not a recognised shorthand directive".to_string(),
            })
            .map(|c| c.inherit_from(parent_config)),
        serde_json::Value::Object(_) => {
            let parsed: RequestConfig =
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::MalformedKey {
                    key: "__CONFIG__".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(parsed.inherit_from(parent_config))
        }
        other => Err(ConfigError::MalformedKey {
            key: other.to_string(),
            reason: "config block must be a shorthand string or an object".to_string(),
        }),
    }
}
