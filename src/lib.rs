//! presync-webhook library crate
//!
//! A validating admission webhook that gates changes to the image named by
//! a sync-source object's annotations behind a cosign signature check.
//! Unchanged annotations pass through without re-verification.

pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod process;
pub mod registry;
pub mod verify;
pub mod webhooks;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use health::HealthState;
pub use webhooks::{DecisionEngine, WebhookError, run_webhook_server};
