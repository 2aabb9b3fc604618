use super::with_neutral;
use crate::error::Result;
use crate::models::NegativeFeedbackKind;
use crate::store::FeedStore;
use std::sync::Arc;
use uuid::Uuid;

/// Viewer hid, reported, or marked the post not-interested
pub const VIEWER_FEEDBACK_SCORE: f64 = -1.0;
/// Post crossed the global report threshold
pub const GLOBAL_REPORT_SCORE: f64 = -0.5;
/// Anything at or below this is excluded from ranked output
pub const EXCLUSION_THRESHOLD: f64 = -0.5;

pub struct NegativeFeedbackScorer {
    store: Arc<dyn FeedStore>,
    report_threshold: i64,
    timeout: std::time::Duration,
}

impl NegativeFeedbackScorer {
    pub fn new(store: Arc<dyn FeedStore>, report_threshold: i64, timeout: std::time::Duration) -> Self {
        Self {
            store,
            report_threshold,
            timeout,
        }
    }

    pub fn from_global_reports(report_count: i64, threshold: i64) -> f64 {
        if report_count >= threshold {
            GLOBAL_REPORT_SCORE
        } else {
            0.0
        }
    }

    /// -1.0, -0.5 or 0.0. Viewer-specific records short-circuit the global check.
    pub async fn score(&self, viewer_id: Option<Uuid>, post_id: Uuid) -> f64 {
        with_neutral(
            "negative_feedback",
            post_id,
            self.timeout,
            0.0,
            self.lookup(viewer_id, post_id),
        )
        .await
    }

    async fn lookup(&self, viewer_id: Option<Uuid>, post_id: Uuid) -> Result<f64> {
        if let Some(viewer) = viewer_id {
            for kind in NegativeFeedbackKind::CHECK_ORDER {
                if self.store.has_negative_feedback(viewer, post_id, kind).await? {
                    return Ok(VIEWER_FEEDBACK_SCORE);
                }
            }
        }

        let reports = self.store.global_report_count(post_id).await?;
        Ok(Self::from_global_reports(reports, self.report_threshold))
    }
}
