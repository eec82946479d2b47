//! `cosign verify` against a mounted public key.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::SignatureVerifier;
use crate::error::{Error, Result};
use crate::identity::ResolvedReference;
use crate::process::Invocation;

/// Signature verification through the signing tool.
///
/// The transparency log is not consulted; the trust anchor alone decides.
#[derive(Debug, Clone)]
pub struct CosignVerifier {
    cosign_binary: String,
    timeout: Duration,
}

impl CosignVerifier {
    pub fn new(cosign_binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cosign_binary: cosign_binary.into(),
            timeout,
        }
    }

    fn invocation(&self, reference: &ResolvedReference, trust_anchor: &Path) -> Invocation {
        Invocation::new(&self.cosign_binary)
            .arg("verify")
            .arg("--key")
            .arg(trust_anchor.display().to_string())
            .arg("--insecure-ignore-tlog=true")
            .arg(reference.as_str())
    }
}

#[async_trait]
impl SignatureVerifier for CosignVerifier {
    async fn verify(&self, reference: &ResolvedReference, trust_anchor: &Path) -> Result<()> {
        // The key is rotated by remounting, so it is checked on every call.
        let key = tokio::fs::read(trust_anchor).await.map_err(|e| {
            Error::VerificationFailed(format!(
                "error loading public key {}: {}",
                trust_anchor.display(),
                e
            ))
        })?;
        if key.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::VerificationFailed(format!(
                "public key {} is empty",
                trust_anchor.display()
            )));
        }

        let output = self
            .invocation(reference, trust_anchor)
            .run(None, self.timeout)
            .await
            .map_err(|e| Error::VerificationFailed(format!("{}: {}", reference, e)))?;

        if output.success() {
            info!(image = %reference, "Image verified successfully");
            Ok(())
        } else {
            debug!(image = %reference, output = %output.diagnostics(), "Verifier rejected image");
            Err(Error::VerificationFailed(format!(
                "{}: {}",
                reference,
                output.diagnostics()
            )))
        }
    }
}
