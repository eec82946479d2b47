//! `cosign login` against the source registry.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::RegistryLogin;
use crate::error::{Error, Result};
use crate::process::Invocation;

/// Username paired with an OAuth2 access token on Google registries
pub const LOGIN_USERNAME: &str = "oauth2accesstoken";

/// Registry login through the signing tool.
///
/// The token is passed on stdin, never on the command line, so it does not
/// show up in process listings or in the logged invocation.
#[derive(Debug)]
pub struct CosignLogin {
    cosign_binary: String,
    registry_host: String,
    credential: Option<SecretString>,
    timeout: Duration,
}

impl CosignLogin {
    pub fn new(
        cosign_binary: impl Into<String>,
        registry_host: impl Into<String>,
        credential: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            cosign_binary: cosign_binary.into(),
            registry_host: registry_host.into(),
            credential,
            timeout,
        }
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(&self.cosign_binary)
            .arg("login")
            .arg(&self.registry_host)
            .arg("--username")
            .arg(LOGIN_USERNAME)
            .arg("--password-stdin")
    }
}

#[async_trait]
impl RegistryLogin for CosignLogin {
    async fn login(&self) -> Result<()> {
        let Some(credential) = &self.credential else {
            return Err(Error::AuthFailure(
                "no registry credential loaded".to_string(),
            ));
        };

        let output = self
            .invocation()
            .run(Some(credential.expose_secret().as_bytes()), self.timeout)
            .await
            .map_err(|e| Error::AuthFailure(e.to_string()))?;

        debug!(
            registry = %self.registry_host,
            output = %output.diagnostics(),
            "Registry login finished"
        );

        if output.success() {
            Ok(())
        } else {
            Err(Error::AuthFailure(output.diagnostics()))
        }
    }
}
