//! Feed pipeline Prometheus metrics.

use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, Encoder, Gauge,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static CANDIDATES_BY_SOURCE: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_candidates_total",
        "Candidates produced by source before merge",
        &["source"]
    )
    .expect("failed to register feed_candidates_total")
});

static RECALL_RATIO: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "feed_impression_filter_recall_ratio",
        "Ratio of candidates remaining after impression filtering to candidates before"
    )
    .expect("failed to register feed_impression_filter_recall_ratio")
});

static FEATURE_SOURCE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_feature_source_total",
        "Which feature source served a request",
        &["source"]
    )
    .expect("failed to register feed_feature_source_total")
});

static RANKING_FALLBACK_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_ranking_fallback_total",
        "Count of requests that fell back to the heuristic ranker",
        &["reason"]
    )
    .expect("failed to register feed_ranking_fallback_total")
});

static STAGE_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_stage_latency_seconds",
        "Latency of each pipeline stage",
        &["stage"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
    )
    .expect("failed to register feed_stage_latency_seconds")
});

pub fn record_candidates(source: &str, count: usize) {
    CANDIDATES_BY_SOURCE
        .with_label_values(&[source])
        .inc_by(count as u64);
}

pub fn set_recall_ratio(ratio: f64) {
    RECALL_RATIO.set(ratio);
}

pub fn record_feature_source(source: &str) {
    FEATURE_SOURCE_TOTAL.with_label_values(&[source]).inc();
}

pub fn record_ranking_fallback(reason: &str) {
    RANKING_FALLBACK_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_stage_latency(stage: &str, duration: Duration) {
    STAGE_LATENCY_SECONDS
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
