// ============================================
// Interest Profile + Personalization Signal
// ============================================
//
// Profile: tag -> accumulated affinity over the interest window
//   reaction: +2.0 per tag
//   comment:  +3.0 per tag
//   view:     +0.5 per tag
//
// Score for a candidate post:
//   no tags on the post           -> 0.3 (neutral)
//   tags, none in the profile     -> 0.2 (cold-start floor)
//   otherwise                     -> min(mean(matched weights) / 10, 1.0)

use crate::cache::TtlCache;
use crate::error::Result;
use crate::models::{InteractionKind, Post};
use crate::store::FeedStore;
use crate::utils::extract_tags;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const NEUTRAL_SCORE: f64 = 0.3;
pub const COLD_START_SCORE: f64 = 0.2;
const SCORE_DIVISOR: f64 = 10.0;

fn interaction_weight(kind: InteractionKind) -> f64 {
    match kind {
        InteractionKind::Reaction => 2.0,
        InteractionKind::Comment => 3.0,
        InteractionKind::View => 0.5,
    }
}

/// Per-viewer topic affinity, built fresh (or served from the TTL cache)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterestProfile {
    weights: HashMap<String, f64>,
}

impl InterestProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: impl Into<String>, weight: f64) {
        *self.weights.entry(tag.into()).or_insert(0.0) += weight;
    }

    /// Add `weight` to every tag found in `text`
    pub fn absorb_text(&mut self, text: &str, weight: f64) {
        for tag in extract_tags(text) {
            self.add(tag, weight);
        }
    }

    pub fn weight(&self, tag: &str) -> Option<f64> {
        self.weights.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Highest-affinity tags first
    pub fn top_tags(&self, n: usize) -> Vec<(&str, f64)> {
        let mut tags: Vec<(&str, f64)> = self
            .weights
            .iter()
            .map(|(tag, weight)| (tag.as_str(), *weight))
            .collect();
        tags.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        tags.truncate(n);
        tags
    }
}

pub struct InterestProfileBuilder {
    store: Arc<dyn FeedStore>,
    cache: Arc<TtlCache<Uuid, Arc<InterestProfile>>>,
    window_days: i64,
    timeout: std::time::Duration,
}

impl InterestProfileBuilder {
    pub fn new(
        store: Arc<dyn FeedStore>,
        cache: Arc<TtlCache<Uuid, Arc<InterestProfile>>>,
        window_days: i64,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            cache,
            window_days,
            timeout,
        }
    }

    /// Build the viewer's profile. Partial history (one query failed) is used
    /// for this request but not cached.
    pub async fn build(&self, viewer_id: Uuid, now: DateTime<Utc>) -> Arc<InterestProfile> {
        if let Some(profile) = self.cache.get(&viewer_id) {
            debug!(viewer_id = %viewer_id, "Interest profile cache hit");
            return profile;
        }

        let since = now - Duration::days(self.window_days);
        let (reactions, comments, views) = tokio::join!(
            self.texts(viewer_id, InteractionKind::Reaction, since),
            self.texts(viewer_id, InteractionKind::Comment, since),
            self.texts(viewer_id, InteractionKind::View, since),
        );

        let mut profile = InterestProfile::new();
        let mut complete = true;
        for (kind, texts) in [
            (InteractionKind::Reaction, reactions),
            (InteractionKind::Comment, comments),
            (InteractionKind::View, views),
        ] {
            match texts {
                Ok(texts) => {
                    let weight = interaction_weight(kind);
                    for text in &texts {
                        profile.absorb_text(text, weight);
                    }
                }
                Err(e) => {
                    complete = false;
                    warn!(
                        viewer_id = %viewer_id,
                        kind = %kind,
                        error = %e,
                        "Interest history unavailable, building partial profile"
                    );
                }
            }
        }

        debug!(
            viewer_id = %viewer_id,
            tags = profile.len(),
            top = ?profile.top_tags(3),
            "Built interest profile"
        );

        let profile = Arc::new(profile);
        if complete {
            self.cache.insert(viewer_id, Arc::clone(&profile));
        }
        profile
    }

    async fn texts(
        &self,
        viewer_id: Uuid,
        kind: InteractionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        match tokio::time::timeout(
            self.timeout,
            self.store.viewer_interaction_texts(viewer_id, kind, since),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(crate::error::FeedRankingError::DataUnavailable(format!(
                "{} history timed out after {:?}",
                kind, self.timeout
            ))),
        }
    }
}

pub struct PersonalizationScorer;

impl PersonalizationScorer {
    pub fn score(profile: &InterestProfile, post: &Post) -> f64 {
        Self::score_tags(profile, &extract_tags(post.text()))
    }

    pub fn score_tags(profile: &InterestProfile, tags: &[String]) -> f64 {
        if tags.is_empty() {
            return NEUTRAL_SCORE;
        }

        let matched: Vec<f64> = tags.iter().filter_map(|tag| profile.weight(tag)).collect();
        if matched.is_empty() {
            return COLD_START_SCORE;
        }

        let mean = matched.iter().sum::<f64>() / matched.len() as f64;
        (mean / SCORE_DIVISOR).clamp(0.0, 1.0)
    }
}
