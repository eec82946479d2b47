//! Admission webhook server.
//!
//! Serves `POST /validate` over TLS. The API server is the only client.
//!
//! To enable the webhook:
//! 1. Mount the serving certificate and key at /tls/tls.crt and /tls/tls.key
//! 2. Mount the cosign public key at /cosign-key/cosign.pub
//! 3. Create a ValidatingWebhookConfiguration for RootSync/RepoSync UPDATEs

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::tls_rustls::RustlsConfig;
use tracing::{error, info};

use crate::health::HealthState;
use crate::webhooks::decision::DecisionEngine;

/// Path of the validating endpoint
pub const VALIDATE_PATH: &str = "/validate";

/// Largest review body accepted. A review carries both `object` and
/// `oldObject`, each of which may approach the 1.5 MiB etcd object limit.
pub const MAX_REVIEW_BYTES: usize = 8 * 1024 * 1024;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub engine: Arc<DecisionEngine>,
}

impl WebhookState {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate))
        .layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES))
        .with_state(state)
}

/// Validate handler.
///
/// The pipeline runs on its own task. If the API server gives up and closes
/// the connection this handler is dropped, but the pipeline still finishes
/// (including any registry login in progress) and its result is discarded.
async fn validate(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let engine = state.engine.clone();
    let outcome = tokio::spawn(async move { engine.review(&body).await }).await;

    match outcome {
        Ok(Ok(review)) => (StatusCode::OK, Json(review)).into_response(),
        Ok(Err(e)) if e.is_http_error() => {
            error!(error = %e, "Failed to decode admission review");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "Admission pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Admission pipeline task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "admission pipeline failed".to_string(),
            )
                .into_response()
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// # Arguments
/// * `engine` - Decision engine answering each review
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Port to bind on all interfaces
/// * `health_state` - Marked ready once the listener is configured
pub async fn run_webhook_server(
    engine: Arc<DecisionEngine>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
    health_state: Option<Arc<HealthState>>,
) -> Result<(), WebhookError> {
    let state = Arc::new(WebhookState::new(engine));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, path = VALIDATE_PATH, "Webhook server listening with TLS");

    if let Some(state) = &health_state {
        state.set_ready(true).await;
    }

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
