//! End-to-end admission scenarios.

use presync_webhook::Error;
use presync_webhook::config::AuthFailurePolicy;
use presync_webhook::identity::{IMAGE_TO_SYNC_ANNOTATION, IdentityScheme};
use serde_json::Value;

use crate::common::fakes::{FakeLogin, FakeVerifier, TRUST_ANCHOR, engine_with};
use crate::common::fixtures::{ReviewBuilder, SnapshotBuilder, response_of};

#[tokio::test]
async fn test_new_source_is_verified_and_allowed() {
    let login = FakeLogin::succeeding();
    let verifier = FakeVerifier::passing();
    let engine = engine_with(login.clone(), verifier.clone());

    let body = ReviewBuilder::new("uid-a")
        .old_object(SnapshotBuilder::new("root-sync").build())
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let review = engine.review(&body).await.unwrap();
    let response = response_of(&review);

    assert_eq!(response["uid"], "uid-a");
    assert_eq!(response["allowed"], true);
    assert!(response.get("status").is_none());
    assert_eq!(verifier.references(), vec!["registry/img@sha256:deadbeef"]);
    assert_eq!(verifier.trust_anchors()[0].to_str(), Some(TRUST_ANCHOR));
    assert_eq!(login.calls(), 1);
}

#[tokio::test]
async fn test_verifier_failure_is_denied_with_detail() {
    let verifier = FakeVerifier::failing("signature mismatch");
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-b")
        .old_object(SnapshotBuilder::new("root-sync").build())
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());

    assert_eq!(response["uid"], "uid-b");
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["reason"], "VerificationFailed");
    assert_eq!(
        response["status"]["message"],
        "[VerificationFailed] Image verification failed: \
         registry/img@sha256:deadbeef: signature mismatch"
    );
    assert_eq!(verifier.references().len(), 1);
}

#[tokio::test]
async fn test_identical_annotations_make_no_external_calls() {
    let login = FakeLogin::succeeding();
    let verifier = FakeVerifier::failing("must not be called");
    let engine = engine_with(login.clone(), verifier.clone());

    let snapshot = SnapshotBuilder::new("root-sync")
        .source("registry/img:v1", "deadbeef")
        .annotation("owner", "platform-team");
    let body = ReviewBuilder::new("uid-c")
        .old_object(snapshot.clone().build())
        .object(snapshot.annotation("owner", "another-team").build())
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());

    assert_eq!(response["uid"], "uid-c");
    assert_eq!(response["allowed"], true);
    assert!(verifier.references().is_empty());
    assert_eq!(login.calls(), 0);
}

#[tokio::test]
async fn test_create_without_annotations_passes_through() {
    let verifier = FakeVerifier::failing("must not be called");
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-create")
        .operation("CREATE")
        .object(SnapshotBuilder::new("root-sync").build())
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], true);
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_digest_pinned_source_is_resubstituted() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-d")
        .old_object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img@sha256:0ld", "0ld")
                .build(),
        )
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img@sha256:0ld", "abc123")
                .build(),
        )
        .build();

    engine.review(&body).await.unwrap();
    assert_eq!(verifier.references(), vec!["registry/img:abc123"]);
}

#[tokio::test]
async fn test_numeric_commit_annotation_is_read_as_text() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-n")
        .object(
            SnapshotBuilder::new("root-sync")
                .annotation("configsync.gke.io/source-url", "registry/img:v1")
                .raw_annotation("configsync.gke.io/source-commit", Value::from(1234))
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], true);
    assert_eq!(verifier.references(), vec!["registry/img@sha256:1234"]);
}

#[tokio::test]
async fn test_locator_without_separator_is_denied() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-e")
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["uid"], "uid-e");
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["reason"], "InvalidReference");
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_login_failure_still_verifies_by_default() {
    let login = FakeLogin::failing();
    let verifier = FakeVerifier::passing();
    let engine = engine_with(login.clone(), verifier.clone());

    let body = ReviewBuilder::new("uid-f")
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], true);
    assert_eq!(login.calls(), 1);
    assert_eq!(verifier.references().len(), 1);

    // The failed login is retried by the next request that needs it.
    engine.review(&body).await.unwrap();
    assert_eq!(login.calls(), 2);
}

#[tokio::test]
async fn test_login_failure_denies_when_hardened() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::failing(), verifier.clone())
        .with_auth_failure_policy(AuthFailurePolicy::Deny);

    let body = ReviewBuilder::new("uid-g")
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["reason"], "AuthFailure");
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_image_to_sync_scheme_verifies_reference_as_written() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone())
        .with_scheme(IdentityScheme::ImageToSync);

    let body = ReviewBuilder::new("uid-h")
        .old_object(
            SnapshotBuilder::new("root-sync")
                .annotation(IMAGE_TO_SYNC_ANNOTATION, "registry/img@sha256:aaa")
                .build(),
        )
        .object(
            SnapshotBuilder::new("root-sync")
                .annotation(IMAGE_TO_SYNC_ANNOTATION, "registry/img@sha256:bbb")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], true);
    assert_eq!(verifier.references(), vec!["registry/img@sha256:bbb"]);
}

#[tokio::test]
async fn test_non_object_snapshot_fails_closed() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-i")
        .old_object(Value::from("not an object"))
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["uid"], "uid-i");
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["reason"], "ExtractionFailure");
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_delete_is_allowed_without_verification() {
    let verifier = FakeVerifier::failing("must not be called");
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    let body = ReviewBuilder::new("uid-j")
        .operation("DELETE")
        .old_object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", "deadbeef")
                .build(),
        )
        .build();

    let response = response_of(&engine.review(&body).await.unwrap());
    assert_eq!(response["allowed"], true);
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_malformed_envelope_is_an_error_not_a_verdict() {
    let verifier = FakeVerifier::passing();
    let engine = engine_with(FakeLogin::succeeding(), verifier.clone());

    for body in [
        b"".as_slice(),
        b"{\"request\": {\"uid\": \"x\", \"object\": {broken".as_slice(),
        br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#.as_slice(),
    ] {
        let err = engine.review(body).await.unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "unexpected error: {err}");
        assert!(err.is_http_error());
    }
    assert!(verifier.references().is_empty());
}

#[tokio::test]
async fn test_envelope_type_is_echoed() {
    let engine = engine_with(FakeLogin::succeeding(), FakeVerifier::passing());
    let body = ReviewBuilder::new("uid-k").build();

    let review = engine.review(&body).await.unwrap();
    let json = serde_json::to_value(&review).unwrap();
    assert_eq!(json["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(json["kind"], "AdmissionReview");
    assert!(json.get("request").is_none());
}
