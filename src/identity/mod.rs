//! Image identity carried by sync-source annotations.
//!
//! A RootSync/RepoSync-like object names the image it is about to sync
//! through well-known annotations. Two identity schemes exist:
//! - `SourceUrlAndCommit`: an image locator plus a content digest, pinned
//!   through [`reference::resolve`]
//! - `ImageToSync`: a single annotation holding the full image reference

pub mod annotations;
pub mod reference;

use std::collections::BTreeMap;
use std::fmt;

pub use annotations::{extract, extract_value};
pub use reference::{ResolvedReference, resolve};

use crate::error::Result;

/// Annotation holding the image locator (repository plus tag or digest)
pub const SOURCE_URL_ANNOTATION: &str = "configsync.gke.io/source-url";
/// Annotation holding the hex content digest of the image to sync
pub const SOURCE_COMMIT_ANNOTATION: &str = "configsync.gke.io/source-commit";
/// Annotation holding a complete image reference (single-field scheme)
pub const IMAGE_TO_SYNC_ANNOTATION: &str = "configsync.gke.io/image-to-sync";

/// Which annotations identify the image on the watched resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityScheme {
    /// `source-url` + `source-commit`, resolved to a digest-pinned reference
    #[default]
    SourceUrlAndCommit,
    /// `image-to-sync`, verified as written
    ImageToSync,
}

impl IdentityScheme {
    /// Annotation keys consulted by this scheme
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            IdentityScheme::SourceUrlAndCommit => {
                &[SOURCE_URL_ANNOTATION, SOURCE_COMMIT_ANNOTATION]
            }
            IdentityScheme::ImageToSync => &[IMAGE_TO_SYNC_ANNOTATION],
        }
    }

    /// Build the identity from an extracted annotation mapping.
    ///
    /// A missing locator reads as the empty string so that "no annotation"
    /// and "empty annotation" compare equal; a missing commit stays absent.
    pub fn identity_from(&self, annotations: &BTreeMap<String, String>) -> ImageIdentity {
        match self {
            IdentityScheme::SourceUrlAndCommit => ImageIdentity::Source {
                url: annotations
                    .get(SOURCE_URL_ANNOTATION)
                    .cloned()
                    .unwrap_or_default(),
                commit: annotations.get(SOURCE_COMMIT_ANNOTATION).cloned(),
            },
            IdentityScheme::ImageToSync => ImageIdentity::Reference(
                annotations
                    .get(IMAGE_TO_SYNC_ANNOTATION)
                    .cloned()
                    .unwrap_or_default(),
            ),
        }
    }
}

impl fmt::Display for IdentityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityScheme::SourceUrlAndCommit => write!(f, "source-url-and-commit"),
            IdentityScheme::ImageToSync => write!(f, "image-to-sync"),
        }
    }
}

/// Comparable identity of the image named by one object snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIdentity {
    /// Image locator and optional content digest
    Source { url: String, commit: Option<String> },
    /// Complete image reference
    Reference(String),
}

impl ImageIdentity {
    /// True when the identity names nothing to verify
    pub fn is_empty(&self) -> bool {
        match self {
            ImageIdentity::Source { url, commit } => {
                url.is_empty() && commit.as_deref().unwrap_or_default().is_empty()
            }
            ImageIdentity::Reference(reference) => reference.is_empty(),
        }
    }

    /// Produce the reference to verify.
    ///
    /// `Ok(None)` means there is nothing to verify, which callers treat as
    /// an automatic pass.
    pub fn resolve(&self) -> Result<Option<ResolvedReference>> {
        match self {
            ImageIdentity::Source { url, commit } => {
                resolve(url, commit.as_deref().unwrap_or_default())
            }
            ImageIdentity::Reference(reference) if reference.is_empty() => Ok(None),
            ImageIdentity::Reference(reference) => {
                Ok(Some(ResolvedReference::verbatim(reference.clone())))
            }
        }
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageIdentity::Source { url, commit } => {
                write!(f, "{}@{}", url, commit.as_deref().unwrap_or("<none>"))
            }
            ImageIdentity::Reference(reference) => write!(f, "{}", reference),
        }
    }
}
