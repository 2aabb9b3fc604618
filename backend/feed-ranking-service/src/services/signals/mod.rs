//! Signal Scorers
//!
//! Five independent scores for a (viewer, post) pair. Each is clamped to its
//! documented range before the ranker combines them:
//!
//! | signal            | range            | needs I/O |
//! |-------------------|------------------|-----------|
//! | relationship      | [0, 0.95] (1.0 for self) | yes |
//! | engagement        | [0, 1]           | yes       |
//! | personalization   | [0, 1]           | no (profile built once) |
//! | recency           | [0, 1]           | no        |
//! | negative feedback | {-1, -0.5, 0}    | yes       |
//!
//! A failing or slow query never aborts ranking: the signal falls back to its
//! neutral value and the failure is logged.

pub mod engagement;
pub mod negative_feedback;
pub mod personalization;
pub mod recency;
pub mod relationship;

pub use engagement::EngagementScorer;
pub use negative_feedback::NegativeFeedbackScorer;
pub use personalization::{InterestProfile, InterestProfileBuilder, PersonalizationScorer};
pub use recency::RecencyScorer;
pub use relationship::{RelationshipContext, RelationshipScorer};

use crate::error::{FeedRankingError, Result};
use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Run one signal query under `timeout`, substituting `neutral` on failure
pub(crate) async fn with_neutral<T, F>(
    signal: &'static str,
    post_id: Uuid,
    timeout: Duration,
    neutral: T,
    query: F,
) -> T
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, query).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            metrics::record_neutral_signal(signal, "error");
            warn!(
                signal,
                post_id = %post_id,
                error = %e,
                "Signal query failed, using neutral value"
            );
            neutral
        }
        Err(_) => {
            metrics::record_neutral_signal(signal, "timeout");
            let e = FeedRankingError::DataUnavailable(format!("timed out after {:?}", timeout));
            warn!(
                signal,
                post_id = %post_id,
                error = %e,
                "Signal query timed out, using neutral value"
            );
            neutral
        }
    }
}
