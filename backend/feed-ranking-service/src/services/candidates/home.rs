use super::{sort_newest_first, CandidateStrategy};
use crate::config::RankingConfig;
use crate::error::Result;
use crate::models::{Post, Surface};
use crate::store::{AuthorFilter, FeedStore, PostQuery, VisibilityRule};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Home candidates: posts from the viewer and their first-degree connections.
///
/// Fallbacks, in order:
/// 1. no connections (or anonymous) -> most recent public posts
/// 2. connection query fails -> most recent public posts
///
/// When connections are sparse the pool is topped up with recent public
/// posts from outside the author set, bounded by `home_recommended_ratio`.
pub struct HomeCandidates {
    store: Arc<dyn FeedStore>,
    config: Arc<RankingConfig>,
}

impl HomeCandidates {
    pub fn new(store: Arc<dyn FeedStore>, config: Arc<RankingConfig>) -> Self {
        Self { store, config }
    }

    async fn recent_public(&self, pool_size: usize) -> Result<Vec<Post>> {
        self.store
            .posts_by_authors(&PostQuery::recent_public(pool_size))
            .await
    }

    async fn recommended_fill(
        &self,
        viewer_id: Uuid,
        authors: Vec<Uuid>,
        count: usize,
    ) -> Vec<Post> {
        let query = PostQuery {
            authors: AuthorFilter::Exclude(authors),
            viewer_id: Some(viewer_id),
            visibility: VisibilityRule::PublicOnly,
            since: None,
            limit: count,
        };
        match self.store.posts_by_authors(&query).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(viewer_id = %viewer_id, error = %e, "Home recommended fill failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CandidateStrategy for HomeCandidates {
    async fn generate(
        &self,
        viewer_id: Option<Uuid>,
        pool_size: usize,
        _now: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let Some(viewer) = viewer_id else {
            return self.recent_public(pool_size).await;
        };

        let (followees, followers) =
            tokio::join!(self.store.followees(viewer), self.store.followers(viewer));
        let followees = followees.unwrap_or_else(|e| {
            warn!(viewer_id = %viewer, surface = "home", error = %e, "Followee lookup failed");
            Vec::new()
        });
        let followers = followers.unwrap_or_else(|e| {
            warn!(viewer_id = %viewer, surface = "home", error = %e, "Follower lookup failed");
            Vec::new()
        });

        let authors = author_set(viewer, &followees, &followers, self.config.home_author_cap);
        if authors.len() <= 1 {
            info!(viewer_id = %viewer, "No connections, falling back to recent public posts");
            return self.recent_public(pool_size).await;
        }

        let query = PostQuery {
            authors: AuthorFilter::Include(authors.clone()),
            viewer_id: Some(viewer),
            visibility: VisibilityRule::Connections,
            since: None,
            limit: pool_size,
        };
        let mut posts = match self.store.posts_by_authors(&query).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(
                    viewer_id = %viewer,
                    surface = "home",
                    error = %e,
                    "Connection posts unavailable, falling back to recent public posts"
                );
                return self.recent_public(pool_size).await;
            }
        };

        let fill = recommended_fill_size(pool_size, posts.len(), self.config.home_recommended_ratio);
        if fill > 0 {
            let extra = self.recommended_fill(viewer, authors, fill).await;
            debug!(viewer_id = %viewer, requested = fill, added = extra.len(), "Home recommended fill");
            posts.extend(extra);
            sort_newest_first(&mut posts);
        }

        Ok(posts)
    }

    fn surface(&self) -> Surface {
        Surface::Home
    }
}

/// `{viewer} ∪ followees ∪ followers` in that order, without duplicates,
/// capped at `cap` authors. Second-degree connections are never included.
pub(crate) fn author_set(
    viewer_id: Uuid,
    followees: &[Uuid],
    followers: &[Uuid],
    cap: usize,
) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    std::iter::once(&viewer_id)
        .chain(followees)
        .chain(followers)
        .copied()
        .filter(|id| seen.insert(*id))
        .take(cap.max(1))
        .collect()
}

/// Slots left in the pool, but never more than `ratio * pool_size`
pub(crate) fn recommended_fill_size(pool_size: usize, have: usize, ratio: f64) -> usize {
    let budget = (ratio * pool_size as f64).floor() as usize;
    pool_size.saturating_sub(have).min(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use crate::store::InMemoryFeedStore;
    use chrono::Duration;

    fn post(author_id: Uuid, visibility: Visibility, hours_ago: i64) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            content: None,
            media_url: None,
            media_type: None,
            visibility,
            created_at: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_author_set_dedupes_and_caps() {
        let viewer = Uuid::new_v4();
        let mutual = Uuid::new_v4();
        let followee = Uuid::new_v4();
        let follower = Uuid::new_v4();

        let set = author_set(viewer, &[mutual, followee], &[mutual, follower], 100);
        assert_eq!(set, vec![viewer, mutual, followee, follower]);

        let capped = author_set(viewer, &[mutual, followee], &[follower], 2);
        assert_eq!(capped, vec![viewer, mutual]);
    }

    #[test]
    fn test_recommended_fill_size() {
        assert_eq!(recommended_fill_size(100, 10, 0.2), 20);
        assert_eq!(recommended_fill_size(100, 95, 0.2), 5);
        assert_eq!(recommended_fill_size(100, 100, 0.2), 0);
        assert_eq!(recommended_fill_size(100, 10, 0.0), 0);
    }

    #[tokio::test]
    async fn test_connections_and_visibility() {
        let store = Arc::new(InMemoryFeedStore::new());
        let viewer = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        store.follow(viewer, friend);

        let own_private = post(viewer, Visibility::Private, 1);
        let friend_followers = post(friend, Visibility::Followers, 2);
        let friend_private = post(friend, Visibility::Private, 3);
        let stranger_public = post(stranger, Visibility::Public, 4);
        for p in [&own_private, &friend_followers, &friend_private, &stranger_public] {
            store.add_post(p.clone());
        }

        let config = RankingConfig {
            home_recommended_ratio: 0.0,
            ..Default::default()
        };
        let home = HomeCandidates::new(store, Arc::new(config));
        let ids: Vec<Uuid> = home
            .generate(Some(viewer), 50, Utc::now())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(ids, vec![own_private.id, friend_followers.id]);
    }

    #[tokio::test]
    async fn test_recommended_fill_adds_outside_posts() {
        let store = Arc::new(InMemoryFeedStore::new());
        let viewer = Uuid::new_v4();
        let friend = Uuid::new_v4();
        store.follow(friend, viewer);
        store.add_post(post(friend, Visibility::Public, 1));
        for hours in 2..10 {
            store.add_post(post(Uuid::new_v4(), Visibility::Public, hours));
        }

        let home = HomeCandidates::new(store, Arc::new(RankingConfig::default()));
        let pool = home.generate(Some(viewer), 10, Utc::now()).await.unwrap();

        // 1 connection post + floor(0.2 * 10) recommended
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0].author_id, friend);
    }

    #[tokio::test]
    async fn test_no_connections_falls_back_to_public() {
        let store = Arc::new(InMemoryFeedStore::new());
        let viewer = Uuid::new_v4();
        let other = post(Uuid::new_v4(), Visibility::Public, 1);
        let hidden = post(Uuid::new_v4(), Visibility::Followers, 2);
        store.add_post(other.clone());
        store.add_post(hidden);

        let home = HomeCandidates::new(store, Arc::new(RankingConfig::default()));
        let pool = home.generate(Some(viewer), 10, Utc::now()).await.unwrap();
        assert_eq!(pool, vec![other]);
    }
}
