use super::with_neutral;
use crate::models::InteractionCounts;
use crate::store::FeedStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const SELF_SCORE: f64 = 1.0;
pub const MUTUAL_BASE: f64 = 0.9;
/// Either direction, not mutual
pub const FOLLOWING_BASE: f64 = 0.7;
pub const STRANGER_BASE: f64 = 0.1;
pub const MAX_SCORE: f64 = 0.95;
const MAX_BOOST: f64 = 0.25;
const REACTION_BOOST: f64 = 0.02;
const COMMENT_BOOST: f64 = 0.05;

/// Viewer's follow graph, loaded once per ranking request
#[derive(Debug, Clone, Default)]
pub struct RelationshipContext {
    pub viewer_id: Option<Uuid>,
    pub followees: HashSet<Uuid>,
    pub followers: HashSet<Uuid>,
}

impl RelationshipContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Base score from the follow relation alone
    pub fn base_score(&self, author_id: Uuid) -> f64 {
        if self.viewer_id == Some(author_id) {
            return SELF_SCORE;
        }
        let follows = self.followees.contains(&author_id);
        let followed_back = self.followers.contains(&author_id);
        match (follows, followed_back) {
            (true, true) => MUTUAL_BASE,
            (true, false) | (false, true) => FOLLOWING_BASE,
            _ => STRANGER_BASE,
        }
    }
}

pub struct RelationshipScorer {
    store: Arc<dyn FeedStore>,
    window_days: i64,
    timeout: std::time::Duration,
}

impl RelationshipScorer {
    pub fn new(store: Arc<dyn FeedStore>, window_days: i64, timeout: std::time::Duration) -> Self {
        Self {
            store,
            window_days,
            timeout,
        }
    }

    /// Load followees and followers; a failed side is treated as empty
    pub async fn load_context(&self, viewer_id: Option<Uuid>) -> RelationshipContext {
        let Some(viewer) = viewer_id else {
            return RelationshipContext::anonymous();
        };

        let (followees, followers) =
            tokio::join!(self.store.followees(viewer), self.store.followers(viewer));

        let followees = followees.unwrap_or_else(|e| {
            warn!(viewer_id = %viewer, error = %e, "Failed to load followees for relationship signal");
            Vec::new()
        });
        let followers = followers.unwrap_or_else(|e| {
            warn!(viewer_id = %viewer, error = %e, "Failed to load followers for relationship signal");
            Vec::new()
        });

        RelationshipContext {
            viewer_id: Some(viewer),
            followees: followees.into_iter().collect(),
            followers: followers.into_iter().collect(),
        }
    }

    /// `min(reactions * 0.02 + comments * 0.05, 0.25)`
    pub fn interaction_boost(counts: InteractionCounts) -> f64 {
        (counts.reactions.max(0) as f64 * REACTION_BOOST
            + counts.comments.max(0) as f64 * COMMENT_BOOST)
            .min(MAX_BOOST)
    }

    pub fn combine(base: f64, counts: InteractionCounts) -> f64 {
        (base + Self::interaction_boost(counts)).clamp(0.0, MAX_SCORE)
    }

    pub async fn score(
        &self,
        ctx: &RelationshipContext,
        post_id: Uuid,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> f64 {
        let base = ctx.base_score(author_id);
        let viewer = match ctx.viewer_id {
            Some(v) if v != author_id => v,
            _ => return base,
        };

        let since = now - Duration::days(self.window_days);
        let counts = with_neutral(
            "relationship",
            post_id,
            self.timeout,
            InteractionCounts::default(),
            self.store
                .viewer_author_interaction_counts(viewer, author_id, since),
        )
        .await;

        Self::combine(base, counts)
    }
}
