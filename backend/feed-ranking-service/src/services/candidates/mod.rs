//! Candidate generation per surface.
//!
//! Each surface has a [`CandidateStrategy`] that owns its own fallback
//! sequence. The generator wraps them: it dedupes, bounds the pool, and turns
//! an exhausted strategy into an empty pool instead of an error.

mod explore;
mod home;

pub use explore::ExploreCandidates;
pub use home::HomeCandidates;

use crate::config::RankingConfig;
use crate::error::Result;
use crate::models::{MediaType, Post, Surface};
use crate::store::FeedStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[async_trait]
pub trait CandidateStrategy: Send + Sync {
    /// Unranked pool, newest first. `pool_size` is already bounded.
    async fn generate(
        &self,
        viewer_id: Option<Uuid>,
        pool_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Post>>;

    fn surface(&self) -> Surface;
}

pub struct CandidateGenerator {
    home: HomeCandidates,
    explore: ExploreCandidates,
    store: Arc<dyn FeedStore>,
    config: Arc<RankingConfig>,
}

impl CandidateGenerator {
    pub fn new(store: Arc<dyn FeedStore>, config: Arc<RankingConfig>) -> Self {
        Self {
            home: HomeCandidates::new(Arc::clone(&store), Arc::clone(&config)),
            explore: ExploreCandidates::new(Arc::clone(&store), Arc::clone(&config)),
            store,
            config,
        }
    }

    pub async fn generate(
        &self,
        surface: Surface,
        viewer_id: Option<Uuid>,
        pool_size: usize,
        now: DateTime<Utc>,
    ) -> Vec<Post> {
        let strategy: &dyn CandidateStrategy = match surface {
            Surface::Home => &self.home,
            Surface::Explore => &self.explore,
            Surface::Search => {
                warn!("Search candidates come from the text prefilter, not a strategy");
                return Vec::new();
            }
        };
        self.run(strategy, viewer_id, pool_size, now).await
    }

    async fn run(
        &self,
        strategy: &dyn CandidateStrategy,
        viewer_id: Option<Uuid>,
        pool_size: usize,
        now: DateTime<Utc>,
    ) -> Vec<Post> {
        let pool_size = pool_size.min(self.config.max_candidates);
        if pool_size == 0 {
            return Vec::new();
        }

        match strategy.generate(viewer_id, pool_size, now).await {
            Ok(posts) => {
                let mut posts = dedupe(posts);
                posts.truncate(pool_size);
                info!(
                    surface = %strategy.surface(),
                    viewer_id = ?viewer_id,
                    candidates = posts.len(),
                    "Candidate generation completed"
                );
                posts
            }
            Err(e) => {
                warn!(
                    surface = %strategy.surface(),
                    viewer_id = ?viewer_id,
                    error = %e,
                    "Candidate fallbacks exhausted, returning empty pool"
                );
                Vec::new()
            }
        }
    }

    /// Raw text matches for the search surface, capped at `limit`
    pub async fn search_prefilter(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        limit: usize,
    ) -> Vec<Post> {
        let query = query.trim();
        let limit = limit.min(self.config.max_candidates);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self
            .store
            .text_search_candidates(query, media_type, limit)
            .await
        {
            Ok(posts) => {
                debug!(query = %query, candidates = posts.len(), "Search prefilter completed");
                dedupe(posts)
            }
            Err(e) => {
                warn!(
                    surface = %Surface::Search,
                    query = %query,
                    error = %e,
                    "Search prefilter failed, returning empty pool"
                );
                Vec::new()
            }
        }
    }
}

/// Drop repeated post ids, keeping the first occurrence
pub fn dedupe(posts: Vec<Post>) -> Vec<Post> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(posts.len());
    posts.into_iter().filter(|post| seen.insert(post.id)).collect()
}

/// Newest first; equal timestamps keep their relative order
pub(crate) fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedRankingError;
    use crate::models::Visibility;
    use crate::store::{InMemoryFeedStore, MockFeedStore};

    fn post(author_id: Uuid, text: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            content: Some(text.to_string()),
            media_url: None,
            media_type: None,
            visibility: Visibility::Public,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let a = post(Uuid::new_v4(), "a");
        let b = post(Uuid::new_v4(), "b");
        let deduped = dedupe(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(deduped, vec![a, b]);
    }

    #[tokio::test]
    async fn test_pool_bounded_by_max_candidates() {
        let store = Arc::new(InMemoryFeedStore::new());
        for i in 0..20 {
            store.add_post(post(Uuid::new_v4(), &format!("post {}", i)));
        }
        let config = RankingConfig {
            max_candidates: 5,
            min_candidates: 1,
            ..Default::default()
        };
        let generator = CandidateGenerator::new(store, Arc::new(config));

        let pool = generator
            .generate(Surface::Explore, None, 50, Utc::now())
            .await;
        assert_eq!(pool.len(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_strategy_yields_empty_pool() {
        let mut store = MockFeedStore::new();
        store
            .expect_posts_by_authors()
            .returning(|_| Err(FeedRankingError::DataUnavailable("posts down".into())));

        let generator = CandidateGenerator::new(Arc::new(store), Arc::new(RankingConfig::default()));
        let pool = generator
            .generate(Surface::Home, None, 20, Utc::now())
            .await;
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_search_prefilter_ignores_blank_query() {
        let store = MockFeedStore::new();
        let generator = CandidateGenerator::new(Arc::new(store), Arc::new(RankingConfig::default()));
        assert!(generator.search_prefilter("   ", None, 10).await.is_empty());
    }
}
