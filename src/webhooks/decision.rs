//! Admission decision engine.
//!
//! One synchronous pipeline per request:
//! 1. Parse the review envelope (failure is an HTTP error, not a verdict)
//! 2. Extract the image identity from the old and new snapshots
//! 3. Allow unchanged identities without any external call
//! 4. Otherwise pin the new reference, log in to the registry once per
//!    process, and verify the signature
//!
//! Every other failure becomes a denial. Nothing is retried here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use kube::core::admission::Operation;
use secrecy::SecretString;
use serde_json::value::RawValue;
use tracing::{debug, info, warn};

use crate::config::{AuthFailurePolicy, WebhookConfig};
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::identity::{self, IdentityScheme, ImageIdentity};
use crate::registry::{AuthSession, CosignLogin};
use crate::verify::{CosignVerifier, SignatureVerifier};
use crate::webhooks::review::{AdmissionRequest, AdmissionResponse, AdmissionReview};

/// Outcome of one admission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionVerdict {
    /// Whether the mutation is admitted
    pub allowed: bool,
    /// Machine-readable reason (if not allowed)
    pub reason: Option<String>,
    /// Human-readable message (if not allowed)
    pub message: Option<String>,
}

impl AdmissionVerdict {
    /// Create an allowed verdict
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied verdict.
    ///
    /// The reason is embedded in the message as `[reason] message` since the
    /// API server surfaces only the message to users.
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(format!("[{}] {}", reason, message)),
        }
    }

    fn from_error(context: &str, err: &Error) -> Self {
        Self::denied(err.reason(), &format!("{}: {}", context, err.detail()))
    }
}

/// Drives extraction, authentication and verification for each request
pub struct DecisionEngine {
    scheme: IdentityScheme,
    auth: Arc<AuthSession>,
    verifier: Arc<dyn SignatureVerifier>,
    trust_anchor: PathBuf,
    auth_failure_policy: AuthFailurePolicy,
    health_state: Option<Arc<HealthState>>,
}

impl DecisionEngine {
    /// Create an engine with the default identity scheme and auth policy
    pub fn new(
        auth: Arc<AuthSession>,
        verifier: Arc<dyn SignatureVerifier>,
        trust_anchor: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scheme: IdentityScheme::default(),
            auth,
            verifier,
            trust_anchor: trust_anchor.into(),
            auth_failure_policy: AuthFailurePolicy::default(),
            health_state: None,
        }
    }

    /// Build the production engine backed by the signing tool
    pub fn from_config(
        config: &WebhookConfig,
        credential: Option<SecretString>,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        let login = CosignLogin::new(
            config.cosign_binary.clone(),
            config.registry_host.clone(),
            credential,
            config.login_timeout,
        );
        let mut auth = AuthSession::new(Arc::new(login));
        if let Some(state) = &health_state {
            auth = auth.with_health_state(state.clone());
        }
        let verifier = CosignVerifier::new(config.cosign_binary.clone(), config.verify_timeout);

        let mut engine = Self::new(
            Arc::new(auth),
            Arc::new(verifier),
            config.trust_anchor_path.clone(),
        )
        .with_scheme(config.identity_scheme)
        .with_auth_failure_policy(config.auth_failure_policy);
        engine.health_state = health_state;
        engine
    }

    pub fn with_scheme(mut self, scheme: IdentityScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_auth_failure_policy(mut self, policy: AuthFailurePolicy) -> Self {
        self.auth_failure_policy = policy;
        self
    }

    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Shared registry session
    pub fn auth_session(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    /// Answer one serialized AdmissionReview.
    ///
    /// Returns `Err(MalformedInput)` only when the envelope itself cannot be
    /// decoded; every other outcome is a response carrying the request UID.
    pub async fn review(&self, body: &[u8]) -> Result<AdmissionReview> {
        let (review, request) = match AdmissionReview::parse(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.record_admission("invalid");
                return Err(e);
            }
        };

        let uid = &request.uid;
        debug!(
            uid = %uid,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = ?request.name,
            "Processing admission request"
        );

        let verdict = self.decide(&request).await;
        if verdict.allowed {
            info!(uid = %uid, "Admission request allowed");
            self.record_admission("allowed");
        } else {
            warn!(
                uid = %uid,
                reason = verdict.reason.as_deref().unwrap_or_default(),
                message = verdict.message.as_deref().unwrap_or_default(),
                "Admission request denied"
            );
            self.record_admission("denied");
        }

        Ok(review.respond(AdmissionResponse::from_verdict(uid, &verdict)))
    }

    /// Decide a single admission request
    pub async fn decide(&self, request: &AdmissionRequest) -> AdmissionVerdict {
        // Nothing new to verify when the object goes away.
        if request.operation == Some(Operation::Delete) {
            return AdmissionVerdict::allowed();
        }

        let old = match self.identity(request.old_object.as_deref()) {
            Ok(identity) => identity,
            Err(e) => return AdmissionVerdict::from_error("Failed to extract old annotations", &e),
        };
        let new = match self.identity(request.object.as_deref()) {
            Ok(identity) => identity,
            Err(e) => return AdmissionVerdict::from_error("Failed to extract new annotations", &e),
        };

        if old == new {
            debug!(uid = %request.uid, scheme = %self.scheme, "Image identity unchanged");
            return AdmissionVerdict::allowed();
        }

        info!(
            uid = %request.uid,
            keys = ?self.scheme.keys(),
            old = %old,
            new = %new,
            "Image identity changed, verifying signature"
        );

        match self.verify_change(&new).await {
            Ok(()) => AdmissionVerdict::allowed(),
            Err(e) => AdmissionVerdict::from_error(change_context(&e), &e),
        }
    }

    fn identity(&self, raw: Option<&RawValue>) -> Result<ImageIdentity> {
        let annotations = match raw {
            Some(raw) => identity::extract(raw.get().as_bytes())?,
            None => Default::default(),
        };
        Ok(self.scheme.identity_from(&annotations))
    }

    async fn verify_change(&self, new: &ImageIdentity) -> Result<()> {
        let Some(reference) = new.resolve()? else {
            debug!("New image identity is empty, nothing to verify");
            return Ok(());
        };

        if let Err(e) = self.auth.ensure_authenticated().await {
            match self.auth_failure_policy {
                AuthFailurePolicy::Proceed => {
                    warn!(error = %e, "Proceeding to verification without registry login");
                }
                AuthFailurePolicy::Deny => return Err(e),
            }
        }

        let started = Instant::now();
        let result = self.verifier.verify(&reference, &self.trust_anchor).await;
        if let Some(state) = &self.health_state {
            let outcome = if result.is_ok() { "success" } else { "failure" };
            state
                .metrics
                .record_verification(outcome, started.elapsed().as_secs_f64());
        }
        result
    }

    fn record_admission(&self, verdict: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_admission(verdict);
        }
    }
}

/// Denial context for a failure while checking a changed identity
fn change_context(err: &Error) -> &'static str {
    match err {
        Error::InvalidReference(_) => "Failed to resolve image reference",
        Error::AuthFailure(_) => "Registry login failed",
        _ => "Image verification failed",
    }
}
