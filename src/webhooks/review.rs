//! `admission.k8s.io/v1` AdmissionReview envelope.
//!
//! Object snapshots are kept as raw JSON so that annotation extraction sees
//! exactly what the API server sent, including non-string values that a
//! typed `ObjectMeta` would reject.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::core::admission::Operation;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::webhooks::decision::AdmissionVerdict;

/// API version of the review envelope
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the review envelope
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// Request/response wrapper exchanged with the API server
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing)]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

fn default_api_version() -> String {
    ADMISSION_API_VERSION.to_string()
}

fn default_kind() -> String {
    ADMISSION_KIND.to_string()
}

/// Fields of the admission request consumed by the webhook
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Correlation identifier echoed on the response
    pub uid: String,
    #[serde(default)]
    pub operation: Option<Operation>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// New object state; absent on DELETE
    #[serde(default)]
    pub object: Option<Box<RawValue>>,
    /// Prior object state; absent on CREATE
    #[serde(default)]
    pub old_object: Option<Box<RawValue>>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

/// Admission response returned to the API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl AdmissionResponse {
    /// Build the response for `uid` from a verdict
    pub fn from_verdict(uid: &str, verdict: &AdmissionVerdict) -> Self {
        let status = match (&verdict.reason, &verdict.message) {
            (None, None) => None,
            (reason, message) => Some(Status {
                reason: reason.clone(),
                message: message.clone(),
                ..Default::default()
            }),
        };
        Self {
            uid: uid.to_string(),
            allowed: verdict.allowed,
            status,
        }
    }

    /// Status message, if any
    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.message.as_deref())
    }
}

impl AdmissionReview {
    /// Decode an inbound review and take its request.
    ///
    /// Any failure here is `MalformedInput`: the body is not a review the
    /// webhook can answer, so no verdict is produced.
    pub fn parse(body: &[u8]) -> Result<(Self, AdmissionRequest)> {
        let mut review: AdmissionReview = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedInput(format!("invalid AdmissionReview: {}", e)))?;
        let request = review
            .request
            .take()
            .ok_or_else(|| Error::MalformedInput("AdmissionReview has no request".to_string()))?;
        Ok((review, request))
    }

    /// Wrap a response in an envelope of the same version and kind
    pub fn respond(self, response: AdmissionResponse) -> Self {
        Self {
            api_version: self.api_version,
            kind: self.kind,
            request: None,
            response: Some(response),
        }
    }
}
