//! Read-only storage boundary for the ranking core.
//!
//! Everything the ranker needs from the relational store goes through
//! [`FeedStore`]. No writes originate here.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{InteractionCounts, InteractionKind, MediaType, NegativeFeedbackKind, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryFeedStore;
pub use postgres::PgFeedStore;

/// Which authors a post query may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorFilter {
    Any,
    Include(Vec<Uuid>),
    Exclude(Vec<Uuid>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRule {
    PublicOnly,
    /// Public posts, `followers` posts by the included authors, and anything
    /// authored by the viewer
    Connections,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub authors: AuthorFilter,
    pub viewer_id: Option<Uuid>,
    pub visibility: VisibilityRule,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl PostQuery {
    pub fn recent_public(limit: usize) -> Self {
        Self {
            authors: AuthorFilter::Any,
            viewer_id: None,
            visibility: VisibilityRule::PublicOnly,
            since: None,
            limit,
        }
    }

    /// Whether `post` satisfies this query's author and visibility rules
    pub fn admits(&self, post: &Post) -> bool {
        use crate::models::Visibility;

        let author_ok = match &self.authors {
            AuthorFilter::Any => true,
            AuthorFilter::Include(ids) => ids.contains(&post.author_id),
            AuthorFilter::Exclude(ids) => !ids.contains(&post.author_id),
        };
        if !author_ok {
            return false;
        }
        if let Some(since) = self.since {
            if post.created_at < since {
                return false;
            }
        }
        match self.visibility {
            VisibilityRule::PublicOnly => post.visibility == Visibility::Public,
            VisibilityRule::Connections => {
                let by_viewer = self.viewer_id == Some(post.author_id);
                let connection_author = matches!(
                    &self.authors,
                    AuthorFilter::Include(ids) if ids.contains(&post.author_id)
                );
                post.visibility == Visibility::Public
                    || by_viewer
                    || (post.visibility == Visibility::Followers && connection_author)
            }
        }
    }
}

/// Logical queries issued by the ranking core
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn followees(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    async fn followers(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    /// Posts matching `query`, newest first
    async fn posts_by_authors(&self, query: &PostQuery) -> Result<Vec<Post>>;

    async fn count_reactions(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64>;

    async fn count_comments(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64>;

    async fn count_views(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64>;

    async fn viewer_author_interaction_counts(
        &self,
        viewer_id: Uuid,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<InteractionCounts>;

    /// Text of posts the viewer interacted with in the given way, one entry per
    /// interaction
    async fn viewer_interaction_texts(
        &self,
        viewer_id: Uuid,
        kind: InteractionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    async fn has_negative_feedback(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        kind: NegativeFeedbackKind,
    ) -> Result<bool>;

    async fn global_report_count(&self, post_id: Uuid) -> Result<i64>;

    /// Public posts whose text matches `query`, newest first
    async fn text_search_candidates(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        limit: usize,
    ) -> Result<Vec<Post>>;
}
