//! Runtime configuration.
//!
//! Only the registry host and the credential file path are read from the
//! environment. Everything else is fixed by the deployment manifest (mount
//! paths, ports) and can only be overridden programmatically.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::identity::IdentityScheme;

/// Environment variable naming the registry to log in to
pub const REGISTRY_HOST_ENV: &str = "REGISTRY_HOST";
/// Environment variable naming the registry credential file
pub const REGISTRY_CREDENTIAL_PATH_ENV: &str = "REGISTRY_CREDENTIAL_PATH";

/// Default registry host
pub const DEFAULT_REGISTRY_HOST: &str = "us-docker.pkg.dev";
/// Default path of the mounted registry bearer token
pub const DEFAULT_CREDENTIAL_PATH: &str = "/var/run/secrets/registry/token";
/// Public key used to verify image signatures
pub const TRUST_ANCHOR_PATH: &str = "/cosign-key/cosign.pub";
/// Path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/tls/tls.crt";
/// Path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/tls/tls.key";
/// Webhook server port
pub const WEBHOOK_PORT: u16 = 10250;
/// Health and metrics server port
pub const HEALTH_PORT: u16 = 8080;
/// Upper bound on a single `cosign login`
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a single `cosign verify`
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// What to do when the registry login fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthFailurePolicy {
    /// Log the failure and attempt verification anyway; verification fails
    /// on its own if the registry really refuses access
    #[default]
    Proceed,
    /// Deny the admission request
    Deny,
}

/// Webhook configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub registry_host: String,
    pub credential_path: PathBuf,
    pub trust_anchor_path: PathBuf,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub webhook_port: u16,
    pub health_port: u16,
    /// Signing tool used for both login and verification
    pub cosign_binary: String,
    pub login_timeout: Duration,
    pub verify_timeout: Duration,
    pub auth_failure_policy: AuthFailurePolicy,
    pub identity_scheme: IdentityScheme,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            registry_host: DEFAULT_REGISTRY_HOST.to_string(),
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            trust_anchor_path: PathBuf::from(TRUST_ANCHOR_PATH),
            tls_cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            tls_key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cosign_binary: "cosign".to_string(),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            auth_failure_policy: AuthFailurePolicy::default(),
            identity_scheme: IdentityScheme::default(),
        }
    }
}

impl WebhookConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(REGISTRY_HOST_ENV) {
            let host = host.trim();
            if host.is_empty() {
                return Err(Error::Config(format!("{} is set but empty", REGISTRY_HOST_ENV)));
            }
            config.registry_host = host.to_string();
        }

        if let Some(path) = lookup(REGISTRY_CREDENTIAL_PATH_ENV)
            && !path.trim().is_empty()
        {
            config.credential_path = PathBuf::from(path.trim());
        }

        Ok(config)
    }
}

/// Read the registry bearer token once, trimmed of surrounding whitespace.
///
/// A missing or empty file is not fatal: the webhook still starts, and every
/// login attempt reports an authentication failure.
pub async fn load_credential(path: &Path) -> Option<SecretString> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let token = contents.trim();
            if token.is_empty() {
                warn!(path = %path.display(), "Registry credential file is empty");
                None
            } else {
                info!(path = %path.display(), "Loaded registry credential");
                Some(SecretString::from(token.to_string()))
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Registry credential not available");
            None
        }
    }
}
