//! Validating admission webhook for sync-source image changes.
//!
//! - `review`: AdmissionReview envelope types
//! - `decision`: the per-request admission pipeline
//! - `server`: TLS transport

pub mod decision;
pub mod review;
mod server;

pub use decision::{AdmissionVerdict, DecisionEngine};
pub use review::{AdmissionRequest, AdmissionResponse, AdmissionReview};
pub use server::{VALIDATE_PATH, WebhookError, WebhookState, create_webhook_router, run_webhook_server};

// Re-export the kube-rs operation type for contract testing
pub use kube::core::admission::Operation;
