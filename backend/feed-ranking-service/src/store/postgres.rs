//! Postgres-backed feed store
//!
//! Schema lives in `migrations/0001_feed_ranking.sql`.

use super::{AuthorFilter, FeedStore, PostQuery, VisibilityRule};
use crate::error::{FeedRankingError, Result};
use crate::models::{
    InteractionCounts, InteractionKind, MediaType, NegativeFeedbackKind, Post, Visibility,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

type PostRow = (
    Uuid,           // id
    Uuid,           // user_id
    Option<String>, // content
    Option<String>, // media_url
    Option<String>, // media_type
    String,         // visibility
    DateTime<Utc>,  // created_at
);

#[derive(Clone)]
pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn count_since(&self, sql: &str, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(sql)
            .bind(post_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count interactions for post {}: {}", post_id, e);
                FeedRankingError::Database(e)
            })
    }
}

fn row_to_post(row: PostRow) -> Result<Post> {
    let (id, author_id, content, media_url, media_type, visibility, created_at) = row;
    let visibility = visibility
        .parse::<Visibility>()
        .map_err(FeedRankingError::DataUnavailable)?;

    Ok(Post {
        id,
        author_id,
        content,
        media_url,
        media_type: media_type.and_then(|m| m.parse::<MediaType>().ok()),
        visibility,
        created_at,
    })
}

fn rows_to_posts(rows: Vec<PostRow>) -> Result<Vec<Post>> {
    rows.into_iter().map(row_to_post).collect()
}

/// Escape `\`, `%` and `_` so the query text matches literally under
/// `LIKE ... ESCAPE '\'`
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn interaction_table(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Reaction => "post_reactions",
        InteractionKind::Comment => "comments",
        InteractionKind::View => "post_views",
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn followees(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT following_id
            FROM follows
            WHERE follower_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT follower_id
            FROM follows
            WHERE following_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn posts_by_authors(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let (include, exclude) = match &query.authors {
            AuthorFilter::Any => (None, None),
            AuthorFilter::Include(ids) => (Some(ids.clone()), None),
            AuthorFilter::Exclude(ids) => (None, Some(ids.clone())),
        };
        let connections = query.visibility == VisibilityRule::Connections;

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, content, media_url, media_type, visibility, created_at
            FROM posts
            WHERE deleted_at IS NULL
              AND ($1::uuid[] IS NULL OR user_id = ANY($1))
              AND ($2::uuid[] IS NULL OR NOT (user_id = ANY($2)))
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND (
                    visibility = 'public'
                 OR ($4 AND visibility = 'followers' AND user_id = ANY($1))
                 OR ($4 AND user_id = $5)
              )
            ORDER BY created_at DESC
            LIMIT $6
            "#,
        )
        .bind(include)
        .bind(exclude)
        .bind(query.since)
        .bind(connections)
        .bind(query.viewer_id)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load candidate posts: {}", e);
            FeedRankingError::Database(e)
        })?;

        rows_to_posts(rows)
    }

    async fn count_reactions(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        self.count_since(
            "SELECT COUNT(*) FROM post_reactions WHERE post_id = $1 AND created_at >= $2",
            post_id,
            since,
        )
        .await
    }

    async fn count_comments(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        self.count_since(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND created_at >= $2 AND deleted_at IS NULL",
            post_id,
            since,
        )
        .await
    }

    async fn count_views(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        self.count_since(
            "SELECT COUNT(*) FROM post_views WHERE post_id = $1 AND created_at >= $2",
            post_id,
            since,
        )
        .await
    }

    async fn viewer_author_interaction_counts(
        &self,
        viewer_id: Uuid,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<InteractionCounts> {
        let (reactions, comments) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*)
                   FROM post_reactions r
                   JOIN posts p ON p.id = r.post_id
                  WHERE r.user_id = $1 AND p.user_id = $2 AND r.created_at >= $3),
                (SELECT COUNT(*)
                   FROM comments c
                   JOIN posts p ON p.id = c.post_id
                  WHERE c.user_id = $1 AND p.user_id = $2 AND c.created_at >= $3
                    AND c.deleted_at IS NULL)
            "#,
        )
        .bind(viewer_id)
        .bind(author_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(InteractionCounts {
            reactions,
            comments,
        })
    }

    async fn viewer_interaction_texts(
        &self,
        viewer_id: Uuid,
        kind: InteractionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        // Table name comes from a closed enum, never from input.
        let sql = format!(
            r#"
            SELECT p.content
            FROM {} i
            JOIN posts p ON p.id = i.post_id
            WHERE i.user_id = $1
              AND i.created_at >= $2
              AND p.content IS NOT NULL
            "#,
            interaction_table(kind)
        );

        let texts = sqlx::query_scalar::<_, String>(&sql)
            .bind(viewer_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(texts)
    }

    async fn has_negative_feedback(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        kind: NegativeFeedbackKind,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_negative_feedback
                WHERE user_id = $1 AND post_id = $2 AND kind = $3
            )
            "#,
        )
        .bind(viewer_id)
        .bind(post_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn global_report_count(&self, post_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM post_negative_feedback
            WHERE post_id = $1 AND kind = 'reported'
            "#,
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn text_search_candidates(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, content, media_url, media_type, visibility, created_at
            FROM posts
            WHERE deleted_at IS NULL
              AND visibility = 'public'
              AND content ILIKE '%' || $1 || '%' ESCAPE '\'
              AND ($2::text IS NULL OR media_type = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(escape_like(needle))
        .bind(media_type.map(|m| m.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Text search query failed: {}", e);
            FeedRankingError::Database(e)
        })?;

        rows_to_posts(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_post_rejects_unknown_visibility() {
        let row: PostRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            None,
            None,
            "friends".to_string(),
            Utc::now(),
        );
        assert!(matches!(
            row_to_post(row),
            Err(FeedRankingError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("rust"), "rust");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like(r"C:\dir"), r"C:\\dir");
        assert_eq!(escape_like("%_"), r"\%\_");
    }

    #[test]
    fn test_row_to_post_tolerates_unknown_media_type() {
        let row: PostRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some("hi".to_string()),
            Some("https://cdn/x.gif".to_string()),
            Some("gif".to_string()),
            "public".to_string(),
            Utc::now(),
        );
        let post = row_to_post(row).unwrap();
        assert_eq!(post.media_type, None);
        assert_eq!(post.visibility, Visibility::Public);
    }
}
