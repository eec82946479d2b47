//! presync-webhook - validating admission webhook for sync-source image changes.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration and the registry credential
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use presync_webhook::config::load_credential;
use presync_webhook::health::run_health_server;
use presync_webhook::{DecisionEngine, HealthState, WebhookConfig, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("presync_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting presync-webhook");

    // axum-server's rustls acceptor needs a process-wide crypto provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = WebhookConfig::from_env()?;
    info!(
        registry = %config.registry_host,
        credential_path = %config.credential_path.display(),
        trust_anchor = %config.trust_anchor_path.display(),
        "Loaded configuration"
    );

    let credential = load_credential(&config.credential_path).await;

    let health_state = Arc::new(HealthState::new());
    let engine = Arc::new(DecisionEngine::from_config(
        &config,
        credential,
        Some(health_state.clone()),
    ));

    // Start health server immediately so liveness probes work during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // A webhook that cannot bind its TLS listener is useless, so its failure
    // ends the process.
    let webhook_handle = {
        let health_state = health_state.clone();
        let config = config.clone();
        tokio::spawn(async move {
            run_webhook_server(
                engine,
                &config.tls_cert_path,
                &config.tls_key_path,
                config.webhook_port,
                Some(health_state),
            )
            .await
        })
    };

    tokio::select! {
        result = webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server exited"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the API server stops routing reviews here
            health_state.set_ready(false).await;

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut
/// down gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
