//! Scenario 5 (ranking fallback): the ranking service times out or errors,
//! and candidates must still end up scored and sorted via the heuristic
//! formula rather than the request failing outright.

use feed_core::config::RankingConfig;
use feed_core::models::{Candidate, PostFeatures, PostId, Source};
use feed_core::ranking::{heuristic_rank, RankingClient};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn candidate(like_count: u64, age_hours: f64) -> Candidate {
    let mut c = Candidate::new(PostId::new(Uuid::new_v4()), Source::Discovery);
    c.post_features = PostFeatures {
        like_count,
        created_at_ts: (chrono::Utc::now().timestamp() as f64 - age_hours * 3600.0) as i64,
        ..Default::default()
    };
    c
}

#[tokio::test]
async fn ranking_service_error_leaves_candidates_for_heuristic_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rank"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = RankingClient::new(&RankingConfig {
        base_url: server.uri(),
        timeout_ms: 2_000,
        candidate_limit: 100,
    });

    let mut candidates = vec![candidate(10, 1.0), candidate(10, 48.0)];
    let user_features = feed_core::models::UserFeatures::default();

    let result = client.rank(&user_features, &mut candidates).await;
    assert!(result.is_err());

    heuristic_rank(&mut candidates);

    assert!(candidates[0].rank_score.unwrap() >= candidates[1].rank_score.unwrap());
}

#[tokio::test]
async fn ranking_service_timeout_is_an_error_not_a_panic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rank"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    // A timeout shorter than the mock's artificial delay forces the client
    // down the same error path a real stalled upstream would take.
    let client = RankingClient::new(&RankingConfig {
        base_url: server.uri(),
        timeout_ms: 5,
        candidate_limit: 100,
    });

    let mut candidates = vec![candidate(5, 2.0)];
    let user_features = feed_core::models::UserFeatures::default();

    let result = client.rank(&user_features, &mut candidates).await;
    assert!(result.is_err());
}
