// Validated identifier types for the federation's primary entities.
// These wrappers enforce shape invariants at construction so a malformed
// id can never be threaded through a reader chain.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

fn validate_id_shape(field: &'static str, value: &str) -> Result<()> {
    let ctx = crate::validation::ValidationContext::new("identifier")
        .with_attribute("field", field)
        .with_attribute("value", value);

    ctx.clone().validate(!value.is_empty(), "identifier cannot be empty")?;
    ctx.clone()
        .validate(value.len() <= 256, "identifier exceeds maximum length of 256")?;
    ctx.validate(!value.contains('\0'), "identifier contains null bytes")?;
    Ok(())
}

macro_rules! validated_id {
    ($name:ident, $field:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                validate_id_shape($field, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

validated_id!(UploadId, "upload_id");
validated_id!(EntryId, "entry_id");
validated_id!(DatasetId, "dataset_id");

/// The `"me"` shorthand is accepted wherever a [`UserId`] is expected and is
/// resolved against the requesting user before any lookup is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub const ME: &'static str = "me";

    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_id_shape("user_id", &value)?;
        Ok(Self(value))
    }

    pub fn is_me_shorthand(&self) -> bool {
        self.0 == Self::ME
    }

    /// Resolve the `"me"` shorthand against the requesting user's own id.
    pub fn resolve(&self, requester: &UserId) -> UserId {
        if self.is_me_shorthand() {
            requester.clone()
        } else {
            self.clone()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single `/`-delimited segment of a canonical reference path, e.g. the
/// `entries` in `#/entries/<entry_id>/archive`. Distinct from a raw `String`
/// so that path construction can reject empty segments early.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment(String);

impl PathSegment {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        ensure!(!value.is_empty(), "path segment cannot be empty");
        ensure!(!value.contains('/'), "path segment cannot contain '/'");
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A positive, bounded page size used by domain-specific `query`/`pagination`
/// blocks (search and dataset listings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatedPageSize {
    inner: u32,
}

impl ValidatedPageSize {
    const MAX: u32 = 10_000;

    pub fn new(size: u32) -> Result<Self> {
        ensure!(size > 0, "page size must be greater than zero");
        ensure!(size <= Self::MAX, "page size exceeds maximum of {}", Self::MAX);
        Ok(Self { inner: size })
    }

    pub fn get(&self) -> u32 {
        self.inner
    }
}
