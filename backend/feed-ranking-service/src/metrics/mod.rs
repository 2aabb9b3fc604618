//! Feed Ranking Metrics
//!
//! Prometheus counters for the degrade paths, served on `/metrics`

use actix_web::HttpResponse;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

static FEED_PAGES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "feed_ranking_pages_total",
        "Feed pages served by surface and ranking mode",
        &["surface", "mode"]
    )
    .expect("Failed to register feed pages metric")
});

static DEADLINE_FALLBACKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "feed_ranking_deadline_fallbacks_total",
        "Requests that hit the ranking deadline, by stage",
        &["surface", "stage"]
    )
    .expect("Failed to register deadline fallback metric")
});

static NEUTRAL_SIGNALS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "feed_ranking_neutral_signals_total",
        "Signal queries that failed or timed out and used the neutral value",
        &["signal", "reason"]
    )
    .expect("Failed to register neutral signal metric")
});

/// Record a served page (surface: home/explore/search, mode: simplified/quality)
pub fn record_page(surface: &str, mode: &str) {
    FEED_PAGES_TOTAL.with_label_values(&[surface, mode]).inc();
}

/// Record a deadline hit (stage: candidates/ranking/exclusion)
pub fn record_deadline_fallback(surface: &str, stage: &str) {
    DEADLINE_FALLBACKS_TOTAL
        .with_label_values(&[surface, stage])
        .inc();
}

/// Record a neutral substitution (reason: error/timeout)
pub fn record_neutral_signal(signal: &str, reason: &str) {
    NEUTRAL_SIGNALS_TOTAL
        .with_label_values(&[signal, reason])
        .inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
