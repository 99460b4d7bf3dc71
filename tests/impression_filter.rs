//! Scenario 6 (impression filter): posts already recorded as seen for a
//! viewer within the lookback window must not come back from `seen()`, and
//! a query failure must degrade to the empty set rather than propagating.

use feed_core::config::ImpressionStoreConfig;
use feed_core::impressions::ImpressionStoreClient;
use feed_core::models::{PostId, UserId};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_url: String) -> ImpressionStoreClient {
    ImpressionStoreClient::new(&ImpressionStoreConfig {
        base_url,
        timeout_ms: 5_000,
        lookback_hours: 24,
    })
}

#[tokio::test]
async fn seen_returns_posts_reported_by_the_impression_store() {
    let server = MockServer::start().await;
    let post_a = PostId::new(Uuid::new_v4());
    let post_b = PostId::new(Uuid::new_v4());

    Mock::given(method("POST"))
        .and(path("/query/sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resultTable": {
                "rows": [[post_a.to_string()], [post_b.to_string()]]
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(server.uri());
    let viewer = UserId::new(Uuid::new_v4());

    let seen = client.seen(viewer, 24).await;

    assert!(seen.contains(&post_a));
    assert!(seen.contains(&post_b));
    assert_eq!(seen.len(), 2);
}

#[tokio::test]
async fn seen_degrades_to_empty_set_on_store_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/sql"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(server.uri());
    let viewer = UserId::new(Uuid::new_v4());

    let seen = client.seen(viewer, 24).await;

    assert!(seen.is_empty(), "an impression-store error must degrade to the empty set, never propagate");
}

#[test]
fn candidate_filter_drops_only_seen_posts() {
    use feed_core::models::{Candidate, Source};
    use std::collections::HashSet;

    let kept = PostId::new(Uuid::new_v4());
    let dropped = PostId::new(Uuid::new_v4());
    let mut candidates = vec![
        Candidate::new(kept, Source::Social),
        Candidate::new(dropped, Source::Social),
    ];

    let mut seen = HashSet::new();
    seen.insert(dropped);

    candidates.retain(|c| !seen.contains(&c.post_id));

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].post_id, kept);
}
