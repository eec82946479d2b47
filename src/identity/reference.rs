//! Digest pinning of image locators.
//!
//! The output format is what the external verifier receives, so it must
//! match the signing tooling exactly:
//! - `repo:tag` + `abc` becomes `repo@sha256:abc` (tag dropped)
//! - `repo@sha256:old` + `abc` becomes `repo:abc`
//!
//! The second form is a tag-style suffix. Existing signatures were produced
//! against references in that form, so it is kept as is.

use std::fmt;

use crate::error::{Error, Result};

/// Marker separating a repository from a sha256 digest
pub const DIGEST_MARKER: &str = "@sha256:";

/// Canonical reference handed to the signature verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference(String);

impl ResolvedReference {
    /// Wrap a reference that is already in its final form
    pub fn verbatim(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pin `reference` to `digest_hex`.
///
/// Returns `Ok(None)` when either input is empty (nothing to verify) and
/// `InvalidReference` when the locator carries no `:` at all.
pub fn resolve(reference: &str, digest_hex: &str) -> Result<Option<ResolvedReference>> {
    if reference.is_empty() || digest_hex.is_empty() {
        return Ok(None);
    }

    if !reference.contains(':') {
        return Err(Error::InvalidReference(reference.to_string()));
    }

    let pinned = match reference.split_once(DIGEST_MARKER) {
        Some((repository, _)) => format!("{}:{}", repository, digest_hex),
        None => {
            let (repository, _) = reference
                .split_once(':')
                .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
            format!("{}{}{}", repository, DIGEST_MARKER, digest_hex)
        }
    };

    Ok(Some(ResolvedReference(pinned)))
}
