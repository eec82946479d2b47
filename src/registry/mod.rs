//! Registry authentication.
//!
//! The webhook logs in to the source registry once per process. The
//! [`AuthSession`] memoizes the first successful login; a failed login
//! leaves the session unauthorized so the next request retries.

mod cosign;

pub use cosign::{CosignLogin, LOGIN_USERNAME};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::health::HealthState;

/// One registry login handshake
#[async_trait]
pub trait RegistryLogin: Send + Sync {
    /// Perform the login. Failures are reported as `Error::AuthFailure`.
    async fn login(&self) -> Result<()>;
}

/// Process-wide registry authentication state
pub struct AuthSession {
    /// Held across check, login and set so concurrent requests never log in
    /// twice.
    authorized: Mutex<bool>,
    login: Arc<dyn RegistryLogin>,
    health_state: Option<Arc<HealthState>>,
}

impl AuthSession {
    /// Create an unauthorized session
    pub fn new(login: Arc<dyn RegistryLogin>) -> Self {
        Self {
            authorized: Mutex::new(false),
            login,
            health_state: None,
        }
    }

    /// Record login outcomes in the given health state's metrics
    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Log in unless a previous login already succeeded.
    ///
    /// Success is never reset for the lifetime of the process.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        let mut authorized = self.authorized.lock().await;
        if *authorized {
            debug!("Registry session already authorized");
            return Ok(());
        }

        match self.login.login().await {
            Ok(()) => {
                *authorized = true;
                self.record("success");
                info!("Registry login succeeded");
                Ok(())
            }
            Err(e) => {
                self.record("failure");
                warn!(error = %e, "Registry login failed, will retry on next request");
                Err(e)
            }
        }
    }

    /// Check whether a login has succeeded
    pub async fn is_authorized(&self) -> bool {
        *self.authorized.lock().await
    }

    fn record(&self, outcome: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_login(outcome);
        }
    }
}
