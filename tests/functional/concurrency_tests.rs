//! Shared registry session under concurrent and abandoned requests.

use std::sync::Arc;
use std::time::Duration;

use crate::common::fakes::{FakeLogin, FakeVerifier, engine_with};
use crate::common::fixtures::{ReviewBuilder, SnapshotBuilder, response_of};

fn changed_review(uid: &str, commit: &str) -> Vec<u8> {
    ReviewBuilder::new(uid)
        .old_object(SnapshotBuilder::new("root-sync").build())
        .object(
            SnapshotBuilder::new("root-sync")
                .source("registry/img:v1", commit)
                .build(),
        )
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_reviews_log_in_once_and_keep_their_uids() {
    let login = FakeLogin::with(true, Duration::from_millis(50));
    let verifier = FakeVerifier::passing();
    let engine = Arc::new(engine_with(login.clone(), verifier.clone()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let uid = format!("uid-{i}");
                let body = changed_review(&uid, &format!("{i:08x}"));
                let review = engine.review(&body).await.unwrap();
                (uid, response_of(&review))
            })
        })
        .collect();

    for handle in handles {
        let (uid, response) = handle.await.unwrap();
        assert_eq!(response["uid"], uid.as_str());
        assert_eq!(response["allowed"], true);
    }

    assert_eq!(login.calls(), 1);
    assert_eq!(verifier.references().len(), 20);
    assert!(engine.auth_session().is_authorized().await);
}

#[tokio::test]
async fn test_abandoned_request_leaves_session_consistent() {
    let login = FakeLogin::with(true, Duration::from_millis(20));
    let verifier = FakeVerifier::slow(Duration::from_secs(5));
    let engine = Arc::new(engine_with(login.clone(), verifier));

    // The caller goes away while verification is still running.
    let pending = {
        let engine = engine.clone();
        let body = changed_review("uid-gone", "deadbeef");
        tokio::spawn(async move { engine.review(&body).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    // Login completed before the abort and is not repeated.
    assert!(engine.auth_session().is_authorized().await);
    engine.auth_session().ensure_authenticated().await.unwrap();
    assert_eq!(login.calls(), 1);
}
