use crate::models::Post;
use chrono::{DateTime, Utc};

/// Exponential recency decay. Pure, never touches the store.
#[derive(Debug, Clone, Copy)]
pub struct RecencyScorer {
    half_life_hours: f64,
}

impl RecencyScorer {
    pub fn new(half_life_hours: f64) -> Self {
        Self { half_life_hours }
    }

    /// `e^(-hours / half_life)` clamped to [0, 1]
    pub fn score_age(&self, hours_since_posted: f64) -> f64 {
        (-hours_since_posted.max(0.0) / self.half_life_hours)
            .exp()
            .clamp(0.0, 1.0)
    }

    pub fn score(&self, post: &Post, now: DateTime<Utc>) -> f64 {
        self.score_age(post.age_hours(now))
    }
}
