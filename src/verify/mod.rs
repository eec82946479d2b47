//! Image signature verification.
//!
//! Verification itself is delegated to an external capability. The
//! decision engine only sees [`SignatureVerifier`], so tests can substitute
//! a fake.

mod cosign;

pub use cosign::CosignVerifier;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::ResolvedReference;

/// Checks that an image is signed by the holder of a trust anchor
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify `reference` against the public key at `trust_anchor`.
    ///
    /// Failures are reported as `Error::VerificationFailed` carrying the
    /// verifier's diagnostic output verbatim. No retries.
    async fn verify(&self, reference: &ResolvedReference, trust_anchor: &Path) -> Result<()>;
}
