use super::with_neutral;
use crate::models::Post;
use crate::store::FeedStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const REACTION_WEIGHT: f64 = 2.0;
const COMMENT_WEIGHT: f64 = 3.0;
const VIEW_WEIGHT: f64 = 0.1;

/// Engagement velocity over the engagement window.
///
/// Weighted counts are divided by `max(1, age_hours / 24) * 10`, so a day-old
/// post needs twice the interactions of a fresh one to score the same.
pub struct EngagementScorer {
    store: Arc<dyn FeedStore>,
    window_days: i64,
    timeout: std::time::Duration,
}

impl EngagementScorer {
    pub fn new(store: Arc<dyn FeedStore>, window_days: i64, timeout: std::time::Duration) -> Self {
        Self {
            store,
            window_days,
            timeout,
        }
    }

    pub fn compute(reactions: i64, comments: i64, views: i64, hours_since_posted: f64) -> f64 {
        let weighted = reactions.max(0) as f64 * REACTION_WEIGHT
            + comments.max(0) as f64 * COMMENT_WEIGHT
            + views.max(0) as f64 * VIEW_WEIGHT;
        let age_normalization = (hours_since_posted / 24.0).max(1.0);
        (weighted / (age_normalization * 10.0)).clamp(0.0, 1.0)
    }

    pub async fn score(&self, post: &Post, now: DateTime<Utc>) -> f64 {
        let since = now - Duration::days(self.window_days);
        let (reactions, comments, views) = tokio::join!(
            self.count("engagement.reactions", post.id, self.store.count_reactions(post.id, since)),
            self.count("engagement.comments", post.id, self.store.count_comments(post.id, since)),
            self.count("engagement.views", post.id, self.store.count_views(post.id, since)),
        );

        Self::compute(reactions, comments, views, post.age_hours(now))
    }

    async fn count<F>(&self, signal: &'static str, post_id: Uuid, query: F) -> i64
    where
        F: std::future::Future<Output = crate::error::Result<i64>>,
    {
        with_neutral(signal, post_id, self.timeout, 0, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_engagement_scores_zero() {
        assert_eq!(EngagementScorer::compute(0, 0, 0, 3.0), 0.0);
    }

    #[test]
    fn test_fresh_engagement() {
        // 5 reactions + 1 comment = 13 weighted, fresh post → 13 / 10 capped at 1.0
        assert_eq!(EngagementScorer::compute(5, 1, 0, 2.0), 1.0);
        // 2 reactions = 4 weighted → 0.4
        assert!((EngagementScorer::compute(2, 0, 0, 2.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_age_normalization() {
        let fresh = EngagementScorer::compute(2, 0, 0, 12.0);
        let two_days = EngagementScorer::compute(2, 0, 0, 48.0);
        assert!((two_days - fresh / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_views_weigh_little() {
        let score = EngagementScorer::compute(0, 0, 10, 1.0);
        assert!((score - 0.1).abs() < 1e-12);
    }
}
