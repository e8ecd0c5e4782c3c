// Validation layer: runtime enforcement of the preconditions a request must
// satisfy before a reader chain is allowed to walk it.

use anyhow::{bail, Result};
use std::collections::HashMap;

/// Validation errors with detailed context.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Precondition failed: {condition}")]
    PreconditionFailed { condition: String, context: String },

    #[error("Postcondition failed: {condition}")]
    PostconditionFailed { condition: String, context: String },

    #[error("Invariant violated: {invariant}")]
    InvariantViolated { invariant: String, state: String },

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },
}

/// Validation context for better error messages.
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(self, condition: bool, message: &str) -> Result<()> {
        if !condition {
            let context = format!(
                "Operation: {}, Attributes: {:?}",
                self.operation, self.attributes
            );
            bail!(ValidationError::PreconditionFailed {
                condition: message.to_string(),
                context,
            });
        }
        Ok(())
    }
}

/// Canonical reference path validation. A reference path is the `/`-joined
/// form produced by the resolver (`refs::convert_ref_to_path_string`); this
/// module checks shapes coming the other way, from user-supplied strings.
pub mod refpath {
    use super::*;

    const MAX_PATH_LENGTH: usize = 4096;

    /// Validate a reference path string before it is split into segments.
    pub fn validate_reference_path(path: &str) -> Result<()> {
        let ctx = ValidationContext::new("validate_reference_path").with_attribute("path", path);

        ctx.clone()
            .validate(!path.is_empty(), "reference path cannot be empty")?;
        ctx.clone().validate(
            path.len() < MAX_PATH_LENGTH,
            &format!("reference path exceeds maximum length of {MAX_PATH_LENGTH}"),
        )?;
        ctx.clone()
            .validate(!path.contains('\0'), "reference path contains null bytes")?;
        ctx.validate(
            !path.split('/').any(|segment| segment.is_empty() && path != "/"),
            "reference path contains an empty segment",
        )?;

        Ok(())
    }

    /// Validate a single `name[index]` or `name[start:stop]` bracketed key
    /// before it reaches the normalizer's regex parser.
    pub fn validate_key_segment(segment: &str) -> Result<()> {
        let ctx = ValidationContext::new("validate_key_segment").with_attribute("segment", segment);

        ctx.clone()
            .validate(!segment.is_empty(), "key segment cannot be empty")?;
        ctx.validate(!segment.contains('\0'), "key segment contains null bytes")?;

        Ok(())
    }
}

/// Validation of a request's declarative shape, applied by each reader's
/// `validate_config` before any backend is touched.
pub mod config {
    use super::*;
    use crate::config::{DirectiveType, RequestConfig};

    /// Readers that are not backed by a searchable index must reject a
    /// request that carries `query`/`pagination`, since those only make
    /// sense against `ElasticSearchReader`/`MongoReader` wildcard dispatch.
    pub fn validate_not_searchable(config: &RequestConfig, reader_name: &str) -> Result<()> {
        let ctx = ValidationContext::new("validate_not_searchable")
            .with_attribute("reader", reader_name);

        ctx.clone().validate(
            config.query.is_none(),
            &format!("{reader_name} does not accept a query block"),
        )?;
        ctx.validate(
            config.pagination.is_none(),
            &format!("{reader_name} does not accept a pagination block"),
        )?;

        Ok(())
    }

    /// Only an `ArchiveReader` may be asked to include the `m_def` definition
    /// alongside resolved data.
    pub fn validate_no_include_definition(config: &RequestConfig, reader_name: &str) -> Result<()> {
        ValidationContext::new("validate_no_include_definition")
            .with_attribute("reader", reader_name)
            .validate(
                !config.include_definition,
                &format!("{reader_name} does not support include_definition"),
            )
    }

    /// `resolve_depth` caps how many archive cross-references `goto` will
    /// follow before giving up; it must be positive when present.
    pub fn validate_resolve_depth(config: &RequestConfig) -> Result<()> {
        if let Some(depth) = config.resolve_depth {
            ValidationContext::new("validate_resolve_depth")
                .with_attribute("resolve_depth", depth.to_string())
                .validate(depth > 0, "resolve_depth must be greater than zero")?;
        }
        Ok(())
    }

    /// `Resolved` directives without `resolve_type` fall back to the
    /// reader's default; an explicit `Plain` directive must not also carry
    /// `resolve_inplace`, since there is nothing to resolve in place.
    pub fn validate_directive_shape(config: &RequestConfig) -> Result<()> {
        let ctx = ValidationContext::new("validate_directive_shape");
        if config.directive == DirectiveType::Plain {
            ctx.validate(
                !config.resolve_inplace,
                "resolve_inplace has no effect under a plain directive",
            )?;
        }
        Ok(())
    }
}
