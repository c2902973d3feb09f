//! E2E tests for the post-tweet-only entry point

mod common;

use common::{LEDGER_BUCKET, LEDGER_FILE, MEDIA_BUCKET, TestServer};
use serde_json::json;
use socialpost::api::ERROR_KIND_HEADER;
use socialpost::storage::StoreCall;

#[tokio::test]
async fn test_tweet_is_recorded_in_tweets_table() {
    let server = TestServer::new().await;

    let response = server
        .invoke(
            "/post-tweet-only",
            json!({"network": "twitter", "status": "just words"}),
        )
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "🚀");

    let tweets = server.tweet_rows().await;
    assert_eq!(tweets.len(), 1);
    assert_eq!(tweets[0].flags(), (1, 0));
    assert_eq!(tweets[0].post(), "just words");
    assert!(server.social_rows().await.is_empty());
}

#[tokio::test]
async fn test_image_is_uploaded_but_not_archived() {
    let server = TestServer::new().await;

    let response = server
        .invoke(
            "/post-tweet-only",
            json!({"network": "twitter", "status": "pic", "image": "aGVsbG8="}),
        )
        .await;
    assert_eq!(response.status(), 200);

    assert_eq!(server.network.posted()[0].media_ids(), "710511363345354753");
    let media_writes = server
        .store
        .calls()
        .into_iter()
        .filter(|call| matches!(call, StoreCall::Put { bucket, .. } if bucket == MEDIA_BUCKET))
        .count();
    assert_eq!(media_writes, 0);
}

#[tokio::test]
async fn test_instagram_is_not_accepted() {
    let server = TestServer::new().await;

    let response = server
        .invoke(
            "/post-tweet-only",
            json!({
                "network": "instagram",
                "status": "caption",
                "instagram_id": "abc123",
                "image": "aGVsbG8=",
            }),
        )
        .await;

    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()[ERROR_KIND_HEADER], "invalid_request");
    assert!(server.journal().is_empty());
}

#[tokio::test]
async fn test_both_entry_points_share_one_snapshot() {
    let server = TestServer::new().await;

    server
        .invoke(
            "/post-to-social",
            json!({"network": "twitter", "status": "one"}),
        )
        .await;
    server
        .invoke(
            "/post-tweet-only",
            json!({"network": "twitter", "status": "two"}),
        )
        .await;

    assert_eq!(server.social_rows().await.len(), 1);
    assert_eq!(server.tweet_rows().await.len(), 1);
    let snapshot_writes = server
        .journal()
        .into_iter()
        .filter(|line| *line == format!("store:put {}/{}", LEDGER_BUCKET, LEDGER_FILE))
        .count();
    assert_eq!(snapshot_writes, 2);
}
