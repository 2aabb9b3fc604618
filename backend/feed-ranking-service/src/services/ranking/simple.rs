use crate::models::{Post, ScoredPost};
use crate::services::signals::RecencyScorer;
use chrono::{DateTime, Utc};

/// Simplified Ranking - 時效排序
///
/// Recency-only ordering over a small pool. No store access, so it cannot
/// fail or stall; used for the `simplified` mode and as the deadline fallback.
pub fn rank_by_recency(
    mut candidates: Vec<Post>,
    limit: usize,
    scorer: &RecencyScorer,
    now: DateTime<Utc>,
) -> Vec<ScoredPost> {
    // stable: equal timestamps keep candidate order
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    candidates.truncate(limit);

    candidates
        .into_iter()
        .map(|post| {
            let score = scorer.score(&post, now);
            ScoredPost::new(post, score)
        })
        .collect()
}
