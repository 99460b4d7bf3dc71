//! `GET /feed` — the ranking pipeline orchestrator (C5), stages 0 through 5.

use crate::config::{FEED_PAGE_SIZE, MAX_AUTHOR_POSTS};
use crate::error::{AppError, Result};
use crate::feature_store::topic_similarity;
use crate::impressions::validate_user_id;
use crate::metrics;
use crate::models::{Candidate, FeedPost, FeedResponse, PostId, UserId};
use crate::ranking::heuristic_rank;
use crate::relational;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    pub user_id: String,
}

pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(state.config.app.request_deadline_ms);
    let viewer = validate_user_id(&query.user_id)?;

    // Stage 0 — viewer resolution.
    let stage_started = Instant::now();
    relational::resolve_viewer(&state.db, viewer).await?;
    metrics::record_stage_latency("viewer_resolution", stage_started.elapsed());

    // Stage 1 — candidate generation.
    let stage_started = Instant::now();
    let candidate_result = crate::candidates::generate_candidates(
        &state.mailbox,
        &state.vector_index,
        &state.config.mailbox,
        &state.config.candidates,
        viewer,
        state.config.ranking.candidate_limit,
    )
    .await;
    metrics::record_stage_latency("candidate_generation", stage_started.elapsed());
    metrics::record_candidates("social", candidate_result.social_count);
    metrics::record_candidates("discovery", candidate_result.discovery_count);

    let before_filter = candidate_result.candidates.len();
    let mut candidates = candidate_result.candidates;

    // Stage 2 — impression discounting.
    let stage_started = Instant::now();
    if Instant::now() < deadline {
        let seen = state
            .impression_store
            .seen(viewer, state.config.impression_store.lookback_hours)
            .await;
        candidates.retain(|c| !seen.contains(&c.post_id));
    }
    metrics::record_stage_latency("impression_filter", stage_started.elapsed());
    let candidates_after_filter = candidates.len();
    if before_filter > 0 {
        metrics::set_recall_ratio(candidates_after_filter as f64 / before_filter as f64);
    }
    candidates.truncate(state.config.candidates.max_candidates);

    // Stage 3 — feature hydration and scoring.
    let stage_started = Instant::now();
    let user_features = hydrate_features(&state, viewer, &mut candidates, deadline).await;
    score_candidates(&state, &user_features, &mut candidates, deadline).await;
    metrics::record_stage_latency("feature_and_ranking", stage_started.elapsed());

    candidates.sort_by(|a, b| {
        b.rank_score
            .partial_cmp(&a.rank_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Stage 4 — re-rank, diversify, hydrate.
    let stage_started = Instant::now();
    let shortlist: Vec<&Candidate> = candidates.iter().take(FEED_PAGE_SIZE * 3).collect();
    let shortlist_ids: Vec<PostId> = shortlist.iter().map(|c| c.post_id).collect();
    let records = relational::load_posts(&state.db, &shortlist_ids).await?;
    let records_by_id: HashMap<PostId, _> = records.into_iter().map(|r| (r.post_id, r)).collect();

    let mut author_counts: HashMap<UserId, usize> = HashMap::new();
    let mut posts = Vec::with_capacity(FEED_PAGE_SIZE);
    let mut served_ids = Vec::with_capacity(FEED_PAGE_SIZE);

    for candidate in shortlist {
        if posts.len() >= FEED_PAGE_SIZE {
            break;
        }
        let Some(record) = records_by_id.get(&candidate.post_id) else {
            continue;
        };
        let count = author_counts.entry(record.author_id).or_insert(0);
        if *count >= MAX_AUTHOR_POSTS {
            continue;
        }
        *count += 1;

        served_ids.push(candidate.post_id);
        posts.push(FeedPost {
            post_id: record.post_id,
            user_id: record.author_id,
            username: record.author_username.clone(),
            display_name: record.author_display_name.clone(),
            content: record.content.clone(),
            media_url: record.media_key.clone().map(|key| presign_media_url(&key)),
            media_type: record.media_type.clone(),
            like_count: record.like_count,
            created_at: record.created_at,
            rank_score: candidate.rank_score.unwrap_or(0.0),
            source: candidate.source,
        });
    }
    metrics::record_stage_latency("rerank_diversify_hydrate", stage_started.elapsed());

    // Stage 5 — impression emission (fire-and-forget).
    spawn_impression_emission(&state, viewer, served_ids);

    info!(user_id = %viewer, posts = posts.len(), "feed served");

    Ok(HttpResponse::Ok().json(FeedResponse {
        user_id: viewer,
        posts,
        candidates_social: candidate_result.social_count,
        candidates_discovery: candidate_result.discovery_count,
        candidates_after_filter,
        latency_ms: started.elapsed().as_millis() as u64,
    }))
}

async fn hydrate_features(
    state: &AppState,
    viewer: UserId,
    candidates: &mut [Candidate],
    deadline: Instant,
) -> crate::models::UserFeatures {
    if candidates.is_empty() {
        return crate::models::UserFeatures::default();
    }

    let post_ids: Vec<PostId> = candidates.iter().map(|c| c.post_id).collect();

    let bundle = if Instant::now() < deadline {
        state.feature_store.get_online_features(viewer, &post_ids).await
    } else {
        Err(AppError::ServiceUnavailable("request deadline exceeded before feature fetch".into()))
    };

    let bundle = match bundle {
        Ok(bundle) => {
            metrics::record_feature_source("feature_store");
            bundle
        }
        Err(e) => {
            warn!(user_id = %viewer, error = %e, "feature store primary path failed, using local feature cache");
            metrics::record_feature_source("redis_fallback");
            let user_features = state
                .local_feature_cache
                .get_user_features(viewer)
                .await
                .unwrap_or_default();
            let post_features = state
                .local_feature_cache
                .batch_get_post_features(&post_ids)
                .await
                .unwrap_or_default();
            crate::models::FeatureBundle {
                user_features,
                post_features,
            }
        }
    };

    let authors: Vec<UserId> = bundle
        .post_features
        .values()
        .filter_map(|f| f.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let affinity = state
        .feature_store
        .get_affinity_scores(viewer, &authors)
        .await
        .unwrap_or_default();

    for candidate in candidates.iter_mut() {
        if let Some(features) = bundle.post_features.get(&candidate.post_id) {
            let mut features = features.clone();
            features.topic_similarity =
                topic_similarity(&bundle.user_features.interest_vector, &features.embedding);
            features.affinity_score = features
                .author_id
                .and_then(|author| affinity.get(&author))
                .copied()
                .unwrap_or(0.0);
            candidate.post_features = features;
        }
    }

    bundle.user_features
}

async fn score_candidates(
    state: &AppState,
    user_features: &crate::models::UserFeatures,
    candidates: &mut Vec<Candidate>,
    deadline: Instant,
) {
    if candidates.is_empty() {
        return;
    }

    let ranked = if Instant::now() < deadline {
        state.ranking.rank(user_features, candidates).await
    } else {
        Err(AppError::ServiceUnavailable("request deadline exceeded before ranking call".into()))
    };

    if let Err(e) = ranked {
        warn!(error = %e, "ranking service failed, applying heuristic fallback");
        metrics::record_ranking_fallback("ranking_service_error");
        heuristic_rank(candidates);
    }
}

fn presign_media_url(media_key: &str) -> String {
    format!("https://media.nova.dev/{}?expires=900", media_key)
}

fn spawn_impression_emission(state: &AppState, viewer: UserId, served_ids: Vec<PostId>) {
    if served_ids.is_empty() {
        return;
    }

    let producer = state.impressions_producer.clone();

    tokio::spawn(async move {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        for post_id in served_ids {
            let _ = producer.send(viewer, post_id, timestamp_ms).await;
        }
    });
}
