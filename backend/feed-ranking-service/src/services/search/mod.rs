use crate::config::RankingWeights;
use crate::models::{Post, ScoredPost};
use crate::services::ranking::Ranker;
use crate::utils::extract_tags;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const TEXT_WEIGHT: f64 = 0.6;
pub const SOCIAL_WEIGHT: f64 = 0.4;

const SUBSTRING_MATCH: f64 = 0.8;
const REPEAT_BONUS: f64 = 0.1;
const HASHTAG_MATCH: f64 = 0.9;

/// Text relevance of `post` for `query`.
///
/// 0.8 for one case-insensitive occurrence, +0.1 per extra occurrence up to
/// 1.0. A matching hashtag lifts the score to at least 0.9. 0.0 otherwise.
pub fn text_relevance(query: &str, post: &Post) -> f64 {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return 0.0;
    }

    let haystack = post.text().to_lowercase();
    let occurrences = haystack.matches(needle.as_str()).count();
    let mut score = if occurrences == 0 {
        0.0
    } else {
        (SUBSTRING_MATCH + REPEAT_BONUS * (occurrences - 1) as f64).min(1.0)
    };

    let tag = needle.trim_start_matches('#');
    if !tag.is_empty() && extract_tags(post.text()).iter().any(|t| t == tag) {
        score = score.max(HASHTAG_MATCH);
    }

    score
}

pub fn blend(text_relevance: f64, social_score: f64) -> f64 {
    text_relevance * TEXT_WEIGHT + social_score * SOCIAL_WEIGHT
}

fn sort_descending(posts: &mut [ScoredPost]) {
    posts.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Search Blender - 文字相關度 + 社交分數
pub struct SearchBlender {
    ranker: Arc<Ranker>,
    max_candidates: usize,
}

impl SearchBlender {
    pub fn new(ranker: Arc<Ranker>, max_candidates: usize) -> Self {
        Self {
            ranker,
            max_candidates,
        }
    }

    /// Candidates scored and ordered by text relevance alone, top
    /// `max_candidates` kept
    pub fn text_order(&self, query: &str, candidates: Vec<Post>) -> Vec<ScoredPost> {
        let mut scored: Vec<ScoredPost> = candidates
            .into_iter()
            .map(|post| {
                let relevance = text_relevance(query, &post);
                ScoredPost::new(post, relevance)
            })
            .collect();
        sort_descending(&mut scored);
        scored.truncate(self.max_candidates);
        scored
    }

    /// Full search ranking. Anonymous viewers get text order only.
    pub async fn rank(
        &self,
        query: &str,
        candidates: Vec<Post>,
        viewer_id: Option<Uuid>,
        weights: &RankingWeights,
        now: DateTime<Utc>,
    ) -> Vec<ScoredPost> {
        let text_ranked = self.text_order(query, candidates);
        let Some(viewer) = viewer_id else {
            return text_ranked;
        };

        let relevance: HashMap<Uuid, f64> = text_ranked
            .iter()
            .map(|scored| (scored.post.id, scored.score))
            .collect();
        let posts: Vec<Post> = text_ranked.into_iter().map(|scored| scored.post).collect();

        let mut blended: Vec<ScoredPost> = self
            .ranker
            .rank_at(posts, Some(viewer), weights, now)
            .await
            .into_iter()
            .map(|mut scored| {
                let text = relevance.get(&scored.post.id).copied().unwrap_or(0.0);
                scored.score = blend(text, scored.score);
                scored
            })
            .collect();
        sort_descending(&mut blended);

        debug!(viewer_id = %viewer, query = %query, results = blended.len(), "Search blend completed");
        blended
    }
}
