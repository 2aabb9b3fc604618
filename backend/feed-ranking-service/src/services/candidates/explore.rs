use super::{sort_newest_first, CandidateStrategy};
use crate::config::RankingConfig;
use crate::error::Result;
use crate::models::{Post, Surface};
use crate::store::{AuthorFilter, FeedStore, PostQuery, VisibilityRule};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Explore candidates: public posts from people the viewer does not follow.
///
/// - anonymous viewer: all public posts
/// - authenticated: followees and the viewer are excluded; a sparse
///   time-windowed result is retried once without the window
/// - posts by the viewer's followers are capped at
///   `(1 - explore_non_followed_ratio) * pool` while strangers are available
pub struct ExploreCandidates {
    store: Arc<dyn FeedStore>,
    config: Arc<RankingConfig>,
}

impl ExploreCandidates {
    pub fn new(store: Arc<dyn FeedStore>, config: Arc<RankingConfig>) -> Self {
        Self { store, config }
    }

    fn follower_cap(&self, pool_size: usize) -> usize {
        ((1.0 - self.config.explore_non_followed_ratio) * pool_size as f64).floor() as usize
    }
}

#[async_trait]
impl CandidateStrategy for ExploreCandidates {
    async fn generate(
        &self,
        viewer_id: Option<Uuid>,
        pool_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let Some(viewer) = viewer_id else {
            return self
                .store
                .posts_by_authors(&PostQuery::recent_public(pool_size))
                .await;
        };

        let (followees, followers) =
            tokio::join!(self.store.followees(viewer), self.store.followers(viewer));

        // Without the followee list the exclusion cannot be honoured.
        let followees = followees?;
        let followers: HashSet<Uuid> = followers
            .unwrap_or_else(|e| {
                warn!(viewer_id = %viewer, surface = "explore", error = %e, "Follower lookup failed, skipping follower cap");
                Vec::new()
            })
            .into_iter()
            .collect();

        let mut excluded = followees;
        excluded.push(viewer);

        let cap = self.follower_cap(pool_size);
        let mut query = PostQuery {
            authors: AuthorFilter::Exclude(excluded),
            viewer_id: Some(viewer),
            visibility: VisibilityRule::PublicOnly,
            since: Some(now - Duration::days(self.config.explore_window_days)),
            limit: pool_size + cap,
        };

        let windowed = self.store.posts_by_authors(&query).await;
        let posts = match windowed {
            Ok(posts) if posts.len() >= self.config.explore_retry_threshold => posts,
            first => {
                match &first {
                    Ok(posts) => info!(
                        viewer_id = %viewer,
                        found = posts.len(),
                        "Explore window too sparse, retrying without time window"
                    ),
                    Err(e) => warn!(
                        viewer_id = %viewer,
                        surface = "explore",
                        error = %e,
                        "Windowed explore query failed, retrying without time window"
                    ),
                }
                query.since = None;
                match self.store.posts_by_authors(&query).await {
                    Ok(posts) => posts,
                    Err(e) => {
                        warn!(viewer_id = %viewer, surface = "explore", error = %e, "Unwindowed explore query failed");
                        first?
                    }
                }
            }
        };

        let selected = cap_follower_posts(posts, &followers, pool_size, cap);
        debug!(viewer_id = %viewer, candidates = selected.len(), follower_cap = cap, "Explore pool assembled");
        Ok(selected)
    }

    fn surface(&self) -> Surface {
        Surface::Explore
    }
}

/// Keep at most `cap` follower-authored posts while others are available.
/// Skipped follower posts backfill the pool if it is still short.
pub(crate) fn cap_follower_posts(
    posts: Vec<Post>,
    followers: &HashSet<Uuid>,
    pool_size: usize,
    cap: usize,
) -> Vec<Post> {
    let mut selected = Vec::with_capacity(pool_size);
    let mut overflow = Vec::new();
    let mut follower_posts = 0;

    for post in posts {
        if selected.len() == pool_size {
            break;
        }
        if followers.contains(&post.author_id) {
            if follower_posts < cap {
                follower_posts += 1;
                selected.push(post);
            } else {
                overflow.push(post);
            }
        } else {
            selected.push(post);
        }
    }

    if selected.len() < pool_size && !overflow.is_empty() {
        let missing = pool_size - selected.len();
        selected.extend(overflow.into_iter().take(missing));
        sort_newest_first(&mut selected);
    }

    selected
}
