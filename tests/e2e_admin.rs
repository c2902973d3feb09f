//! E2E tests for ledger administration endpoints

mod common;

use common::{LEDGER_BUCKET, LEDGER_FILE, TestServer, test_config};
use serde_json::json;
use socialpost::config::LedgerMode;
use socialpost::social::MockSocialNetwork;

#[tokio::test]
async fn test_init_creates_missing_ledger() {
    let server = TestServer::with(test_config(), MockSocialNetwork::new()).await;
    assert!(server.store.object(LEDGER_BUCKET, LEDGER_FILE).is_none());

    let response = server
        .post("/admin/ledger/init")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"social": "created", "tweets": "table_added"}));

    // The fresh ledger accepts appends right away.
    let response = server
        .invoke(
            "/post-tweet-only",
            json!({"network": "twitter", "status": "first"}),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_init_keeps_existing_rows() {
    let server = TestServer::new().await;
    server
        .invoke(
            "/post-to-social",
            json!({"network": "twitter", "status": "keep me"}),
        )
        .await;

    let response = server
        .post("/admin/ledger/init")
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"social": "already_initialized", "tweets": "already_initialized"})
    );
    assert_eq!(server.social_rows().await.len(), 1);
}

#[tokio::test]
async fn test_list_rows_by_entry_point() {
    let server = TestServer::new().await;
    server
        .invoke(
            "/post-to-social",
            json!({"network": "twitter", "status": "listed"}),
        )
        .await;

    let rows: serde_json::Value = server
        .get("/admin/ledger/post-to-social")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["post"], "listed");
    assert_eq!(rows[0]["twitter"], 1);
    assert_eq!(rows[0]["tweet_id"], 1_050_118_621_198_921_728_i64);

    let response = server
        .get("/admin/ledger/nowhere")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_event_log_needs_no_init() {
    let mut config = test_config();
    config.storage.ledger.mode = LedgerMode::EventLog;
    let server = TestServer::with(config, MockSocialNetwork::new()).await;

    let response = server
        .post("/admin/ledger/init")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"social": "already_initialized", "tweets": "already_initialized"})
    );

    let response = server
        .invoke(
            "/post-to-social",
            json!({"network": "twitter", "status": "logged"}),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(server.social_rows().await.len(), 1);
    assert!(server.store.object(LEDGER_BUCKET, LEDGER_FILE).is_none());
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let server = TestServer::with(test_config(), MockSocialNetwork::new()).await;

    let response = server
        .client
        .post(server.url("/admin/ledger/init"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .get(server.url("/admin/ledger/post-to-social"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Nothing was created.
    assert!(server.store.object(LEDGER_BUCKET, LEDGER_FILE).is_none());
}
