//! Ranking Module
//!
//! Full signal-based ranking for a candidate pool.
//!
//! # Workflow
//! 1. Build the viewer's interest profile and follow graph once per request
//! 2. Score every candidate: relationship, engagement and negative feedback
//!    run concurrently, personalization and recency are computed inline
//! 3. Combine with the surface's weight set
//! 4. Drop excluded posts, stable-sort descending
//! 5. Apply the author diversity penalty
//!
//! `simple` holds the recency-only ranking used by the latency path.

pub mod simple;

pub use simple::rank_by_recency;

use crate::cache::TtlCache;
use crate::config::{RankingConfig, RankingWeights};
use crate::models::{Post, ScoredPost, SignalBreakdown};
use crate::services::diversity::AuthorDiversityFilter;
use crate::services::signals::negative_feedback::EXCLUSION_THRESHOLD;
use crate::services::signals::{
    EngagementScorer, InterestProfile, InterestProfileBuilder, NegativeFeedbackScorer,
    PersonalizationScorer, RecencyScorer, RelationshipContext, RelationshipScorer,
};
use crate::store::FeedStore;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Ranker {
    config: Arc<RankingConfig>,
    profiles: InterestProfileBuilder,
    relationship: RelationshipScorer,
    engagement: EngagementScorer,
    negative_feedback: NegativeFeedbackScorer,
    recency: RecencyScorer,
}

impl Ranker {
    pub fn new(
        store: Arc<dyn FeedStore>,
        config: Arc<RankingConfig>,
        profile_cache: Arc<TtlCache<Uuid, Arc<InterestProfile>>>,
    ) -> Self {
        let timeout = config.signal_timeout();
        Self {
            profiles: InterestProfileBuilder::new(
                Arc::clone(&store),
                profile_cache,
                config.interest_window_days,
                timeout,
            ),
            relationship: RelationshipScorer::new(
                Arc::clone(&store),
                config.relationship_window_days,
                timeout,
            ),
            engagement: EngagementScorer::new(
                Arc::clone(&store),
                config.engagement_window_days,
                timeout,
            ),
            negative_feedback: NegativeFeedbackScorer::new(
                store,
                config.global_report_threshold,
                timeout,
            ),
            recency: RecencyScorer::new(config.recency_half_life_hours),
            config,
        }
    }

    pub async fn rank(
        &self,
        candidates: Vec<Post>,
        viewer_id: Option<Uuid>,
        weights: &RankingWeights,
    ) -> Vec<ScoredPost> {
        self.rank_at(candidates, viewer_id, weights, Utc::now()).await
    }

    /// Rank against a fixed clock. Identical inputs give identical output.
    pub async fn rank_at(
        &self,
        candidates: Vec<Post>,
        viewer_id: Option<Uuid>,
        weights: &RankingWeights,
        now: DateTime<Utc>,
    ) -> Vec<ScoredPost> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let input_count = candidates.len();

        let (profile, relationships) = match viewer_id {
            Some(viewer) => tokio::join!(
                self.profiles.build(viewer, now),
                self.relationship.load_context(Some(viewer))
            ),
            None => (
                Arc::new(InterestProfile::new()),
                RelationshipContext::anonymous(),
            ),
        };

        // `buffered` keeps candidate order, which the stable sort relies on.
        let scored: Vec<ScoredPost> = stream::iter(candidates)
            .map(|post| {
                let profile = Arc::clone(&profile);
                let relationships = &relationships;
                async move {
                    let breakdown = self
                        .score_signals(&post, viewer_id, &profile, relationships, now)
                        .await;
                    let score = combine(weights, &breakdown);
                    ScoredPost {
                        post,
                        score,
                        breakdown: Some(breakdown),
                    }
                }
            })
            .buffered(self.config.scoring_concurrency)
            .collect()
            .await;

        let mut ranked: Vec<ScoredPost> = scored.into_iter().filter(is_eligible).collect();
        let excluded = input_count - ranked.len();

        // Vec::sort_by is stable: ties keep candidate order.
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let penalized = AuthorDiversityFilter::new(
            self.config.max_consecutive_same_author,
            weights.author_diversity_penalty,
        )
        .apply(&mut ranked);

        if let Some(top) = ranked.first() {
            debug!(post_id = %top.post.id, score = top.score, breakdown = ?top.breakdown, "Top ranked post");
        }
        info!(
            viewer_id = ?viewer_id,
            candidates = input_count,
            excluded,
            penalized,
            ranked = ranked.len(),
            "Ranking completed"
        );

        ranked
    }

    /// Negative-feedback check alone, for paths that skip signal ranking.
    ///
    /// Keeps candidate order. A post survives only when its negative-feedback
    /// signal is above the exclusion threshold.
    pub async fn filter_excluded(&self, candidates: Vec<Post>, viewer_id: Option<Uuid>) -> Vec<Post> {
        let input_count = candidates.len();

        let checked: Vec<Option<Post>> = stream::iter(candidates)
            .map(|post| async move {
                let negative = self.negative_feedback.score(viewer_id, post.id).await;
                (negative > EXCLUSION_THRESHOLD).then_some(post)
            })
            .buffered(self.config.scoring_concurrency)
            .collect()
            .await;
        let eligible: Vec<Post> = checked.into_iter().flatten().collect();

        debug!(
            viewer_id = ?viewer_id,
            candidates = input_count,
            excluded = input_count - eligible.len(),
            "Exclusion check completed"
        );
        eligible
    }

    async fn score_signals(
        &self,
        post: &Post,
        viewer_id: Option<Uuid>,
        profile: &InterestProfile,
        relationships: &RelationshipContext,
        now: DateTime<Utc>,
    ) -> SignalBreakdown {
        let (relationship, engagement, negative_feedback) = tokio::join!(
            self.relationship
                .score(relationships, post.id, post.author_id, now),
            self.engagement.score(post, now),
            self.negative_feedback.score(viewer_id, post.id),
        );

        SignalBreakdown {
            relationship,
            engagement,
            personalization: PersonalizationScorer::score(profile, post),
            recency: self.recency.score(post, now),
            negative_feedback,
        }
    }
}

/// Weighted sum of the five signals.
///
/// Only the non-negative part of the negative-feedback signal enters the sum;
/// exclusion is handled by [`is_eligible`].
pub fn combine(weights: &RankingWeights, signals: &SignalBreakdown) -> f64 {
    weights.relationship * signals.relationship
        + weights.engagement * signals.engagement
        + weights.personalization * signals.personalization
        + weights.recency * signals.recency
        + weights.negative_feedback * signals.negative_feedback.max(0.0)
}

/// A post is dropped when its negative-feedback signal or its combined score
/// is at or below the exclusion threshold.
fn is_eligible(post: &ScoredPost) -> bool {
    let negative = post
        .breakdown
        .map(|b| b.negative_feedback)
        .unwrap_or(0.0);
    negative > EXCLUSION_THRESHOLD && post.score > EXCLUSION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedRankingError;
    use crate::models::Visibility;
    use crate::store::MockFeedStore;
    use chrono::Duration;

    fn post(author_id: Uuid, hours_ago: i64, text: &str, now: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            content: Some(text.to_string()),
            media_url: None,
            media_type: None,
            visibility: Visibility::Public,
            created_at: now - Duration::hours(hours_ago),
        }
    }

    fn ranker(store: Arc<dyn FeedStore>) -> Ranker {
        Ranker::new(
            store,
            Arc::new(RankingConfig::default()),
            Arc::new(TtlCache::new(std::time::Duration::from_secs(60), 100)),
        )
    }

    #[test]
    fn test_combine_ignores_negative_feedback_magnitude() {
        let signals = SignalBreakdown {
            relationship: 0.9,
            engagement: 0.5,
            personalization: 0.3,
            recency: 1.0,
            negative_feedback: -1.0,
        };
        let with_negative = combine(&RankingWeights::HOME, &signals);
        let without = combine(
            &RankingWeights::HOME,
            &SignalBreakdown {
                negative_feedback: 0.0,
                ..signals
            },
        );
        assert_eq!(with_negative, without);
        assert!((without - (0.35 * 0.9 + 0.25 * 0.5 + 0.2 * 0.3 + 0.2 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_eligibility() {
        let now = Utc::now();
        let mut scored = ScoredPost::new(post(Uuid::new_v4(), 1, "", now), 0.8);
        scored.breakdown = Some(SignalBreakdown {
            negative_feedback: -0.5,
            ..Default::default()
        });
        assert!(!is_eligible(&scored));

        scored.breakdown = Some(SignalBreakdown::default());
        assert!(is_eligible(&scored));
    }

    #[tokio::test]
    async fn test_failing_store_degrades_to_neutral_signals() {
        let mut store = MockFeedStore::new();
        store
            .expect_followees()
            .returning(|_| Err(FeedRankingError::DataUnavailable("graph down".into())));
        store
            .expect_followers()
            .returning(|_| Err(FeedRankingError::DataUnavailable("graph down".into())));
        store
            .expect_viewer_interaction_texts()
            .returning(|_, _, _| Err(FeedRankingError::DataUnavailable("history down".into())));
        store
            .expect_viewer_author_interaction_counts()
            .returning(|_, _, _| Err(FeedRankingError::DataUnavailable("counts down".into())));
        store
            .expect_count_reactions()
            .returning(|_, _| Err(FeedRankingError::DataUnavailable("counts down".into())));
        store
            .expect_count_comments()
            .returning(|_, _| Err(FeedRankingError::DataUnavailable("counts down".into())));
        store
            .expect_count_views()
            .returning(|_, _| Err(FeedRankingError::DataUnavailable("counts down".into())));
        store
            .expect_has_negative_feedback()
            .returning(|_, _, _| Err(FeedRankingError::DataUnavailable("feedback down".into())));

        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let candidates = vec![
            post(Uuid::new_v4(), 30, "older", now),
            post(Uuid::new_v4(), 1, "newer", now),
        ];

        let ranked = ranker(Arc::new(store))
            .rank_at(candidates, Some(viewer), &RankingWeights::HOME, now)
            .await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].post.text(), "newer");
        let breakdown = ranked[0].breakdown.expect("breakdown recorded");
        assert_eq!(breakdown.relationship, 0.1);
        assert_eq!(breakdown.engagement, 0.0);
        assert_eq!(breakdown.negative_feedback, 0.0);
    }

    #[tokio::test]
    async fn test_filter_excluded_keeps_order_and_drops_flagged_posts() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let candidates = vec![
            post(Uuid::new_v4(), 1, "first", now),
            post(Uuid::new_v4(), 2, "hidden", now),
            post(Uuid::new_v4(), 3, "reported", now),
            post(Uuid::new_v4(), 4, "last", now),
        ];
        let hidden_id = candidates[1].id;
        let reported_id = candidates[2].id;

        let mut store = MockFeedStore::new();
        store
            .expect_has_negative_feedback()
            .returning(move |_, post_id, _| Ok(post_id == hidden_id));
        store
            .expect_global_report_count()
            .returning(move |post_id| Ok(if post_id == reported_id { 5 } else { 0 }));

        let kept = ranker(Arc::new(store))
            .filter_excluded(candidates, Some(viewer))
            .await;
        let texts: Vec<&str> = kept.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let store = MockFeedStore::new();
        let ranked = ranker(Arc::new(store))
            .rank(Vec::new(), Some(Uuid::new_v4()), &RankingWeights::HOME)
            .await;
        assert!(ranked.is_empty());
    }
}
