//! Quota endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn fresh_identity_has_full_quota() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/quota")
        .add_header("x-forwarded-for", "10.0.0.1")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["quota"]["today"], 0);
    assert_eq!(body["quota"]["limit"], 50);
    assert_eq!(body["quota"]["remaining"], 50);
    assert_eq!(body["credits"], 0);
    assert_eq!(body["subscription"], "none");
    assert_eq!(body["plan_type"], "free");
}

#[tokio::test]
async fn quota_reflects_usage_without_consuming_it() {
    let harness = TestHarness::new();

    for _ in 0..3 {
        harness
            .server
            .post("/v1/generate")
            .add_header("x-forwarded-for", "10.0.0.2")
            .json(&json!({"prompt": "hi"}))
            .await
            .assert_status_ok();
    }

    // Reading the quota twice reports the same number: inspection is free.
    for _ in 0..2 {
        let response = harness
            .server
            .get("/v1/quota")
            .add_header("x-forwarded-for", "10.0.0.2")
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["quota"]["today"], 3);
        assert_eq!(body["quota"]["remaining"], 47);
    }
}

#[tokio::test]
async fn funded_account_reports_unlimited_quota() {
    let harness = TestHarness::new();
    harness.seed_account("buyer@example.com", 250);

    let response = harness
        .server
        .get("/v1/quota")
        .add_header("x-user-id", harness.test_user_id.to_string())
        .add_header("x-forwarded-for", "10.0.0.3")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["quota"]["limit"].is_null());
    assert!(body["quota"]["remaining"].is_null());
    assert_eq!(body["credits"], 250);
    assert_eq!(body["plan_type"], "credits");
}

#[tokio::test]
async fn anonymous_identities_are_isolated_by_ip() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/generate")
        .add_header("x-forwarded-for", "10.0.0.4")
        .json(&json!({"prompt": "hi"}))
        .await
        .assert_status_ok();

    let other: serde_json::Value = harness
        .server
        .get("/v1/quota")
        .add_header("x-forwarded-for", "10.0.0.5")
        .await
        .json();

    assert_eq!(other["quota"]["today"], 0);
}

#[tokio::test]
async fn registered_and_anonymous_usage_do_not_mix() {
    let harness = TestHarness::new();
    harness.seed_account("buyer@example.com", 100);

    harness
        .server
        .post("/v1/generate")
        .add_header("x-user-id", harness.test_user_id.to_string())
        .add_header("x-forwarded-for", "10.0.0.6")
        .json(&json!({"prompt": "hi"}))
        .await
        .assert_status_ok();

    // Same IP without the user header is a different identity.
    let anon: serde_json::Value = harness
        .server
        .get("/v1/quota")
        .add_header("x-forwarded-for", "10.0.0.6")
        .await
        .json();

    assert_eq!(anon["quota"]["today"], 0);
}
