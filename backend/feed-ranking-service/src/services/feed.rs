//! Feed orchestration: candidate generation, ranking and pagination for the
//! three surfaces.
//!
//! Every entry point returns a page. Ranking failures degrade (neutral
//! signals, fallback candidates, simplified ranking on deadline) and are
//! logged; they never reach the caller as errors.
//!
//! Negative-feedback exclusion runs on every path, simplified ones included.
//! If the exclusion check itself cannot finish in time the page is empty.

use crate::cache::TtlCache;
use crate::config::{RankingConfig, WeightTable};
use crate::error::FeedRankingError;
use crate::metrics;
use crate::models::{FeedPage, MediaType, PageRequest, Post, RankingMode, ScoredPost, Surface};
use crate::services::candidates::CandidateGenerator;
use crate::services::ranking::{rank_by_recency, Ranker};
use crate::services::search::SearchBlender;
use crate::services::signals::{InterestProfile, RecencyScorer};
use crate::store::FeedStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub struct FeedOrchestrator {
    candidates: CandidateGenerator,
    ranker: Arc<Ranker>,
    search: SearchBlender,
    recency: RecencyScorer,
    config: Arc<RankingConfig>,
    weights: WeightTable,
}

impl FeedOrchestrator {
    pub fn new(
        store: Arc<dyn FeedStore>,
        config: Arc<RankingConfig>,
        weights: WeightTable,
        profile_cache: Arc<TtlCache<Uuid, Arc<InterestProfile>>>,
    ) -> Self {
        let ranker = Arc::new(Ranker::new(
            Arc::clone(&store),
            Arc::clone(&config),
            profile_cache,
        ));
        Self {
            candidates: CandidateGenerator::new(store, Arc::clone(&config)),
            search: SearchBlender::new(Arc::clone(&ranker), config.max_candidates),
            recency: RecencyScorer::new(config.recency_half_life_hours),
            ranker,
            config,
            weights,
        }
    }

    pub async fn get_home_feed(
        &self,
        viewer_id: Option<Uuid>,
        page: PageRequest,
        mode: RankingMode,
    ) -> FeedPage {
        self.ranked_feed(Surface::Home, viewer_id, page, mode).await
    }

    pub async fn get_explore_feed(
        &self,
        viewer_id: Option<Uuid>,
        page: PageRequest,
        mode: RankingMode,
    ) -> FeedPage {
        self.ranked_feed(Surface::Explore, viewer_id, page, mode).await
    }

    /// Search results ranked by blended text and social score. Text order only
    /// for anonymous viewers or when the deadline is hit.
    pub async fn rank_search_results(
        &self,
        viewer_id: Option<Uuid>,
        query: &str,
        media_type: Option<MediaType>,
        page: PageRequest,
    ) -> FeedPage {
        let now = Utc::now();
        let deadline = Instant::now() + self.config.request_deadline();

        let candidates = match timeout_at(
            deadline,
            self.candidates
                .search_prefilter(query, media_type, self.config.max_candidates),
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(_) => {
                metrics::record_deadline_fallback(Surface::Search.as_str(), "candidates");
                warn!(viewer_id = ?viewer_id, surface = "search", "Deadline exceeded during search prefilter");
                Vec::new()
            }
        };

        let (ranked, mode) = match viewer_id {
            None => {
                let eligible = self
                    .eligible(Surface::Search, viewer_id, candidates, deadline)
                    .await;
                (self.search.text_order(query, eligible), RankingMode::Simplified)
            }
            Some(_) => {
                match timeout_at(
                    deadline,
                    self.search.rank(
                        query,
                        candidates.clone(),
                        viewer_id,
                        &self.weights.search,
                        now,
                    ),
                )
                .await
                {
                    Ok(ranked) => (ranked, RankingMode::Quality),
                    Err(_) => {
                        let err = FeedRankingError::DeadlineExceeded(self.config.request_deadline());
                        metrics::record_deadline_fallback(Surface::Search.as_str(), "ranking");
                        warn!(
                            viewer_id = ?viewer_id,
                            surface = "search",
                            error = %err,
                            "Returning text relevance order"
                        );
                        let eligible = self
                            .eligible(Surface::Search, viewer_id, candidates, self.grace_deadline())
                            .await;
                        (self.search.text_order(query, eligible), RankingMode::Simplified)
                    }
                }
            }
        };

        self.paginate(Surface::Search, viewer_id, ranked, page, mode)
    }

    async fn ranked_feed(
        &self,
        surface: Surface,
        viewer_id: Option<Uuid>,
        page: PageRequest,
        mode: RankingMode,
    ) -> FeedPage {
        let now = Utc::now();
        let deadline = Instant::now() + self.config.request_deadline();

        let pool_size = match mode {
            RankingMode::Simplified => self.simplified_pool(surface),
            RankingMode::Quality => self.config.clamp_pool(page.depth()),
        };

        let candidates = match timeout_at(
            deadline,
            self.candidates.generate(surface, viewer_id, pool_size, now),
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(_) => {
                metrics::record_deadline_fallback(surface.as_str(), "candidates");
                warn!(viewer_id = ?viewer_id, surface = %surface, "Deadline exceeded during candidate generation");
                Vec::new()
            }
        };

        let (ranked, used) = match mode {
            RankingMode::Simplified => (
                self.simplified(surface, viewer_id, candidates, now, deadline)
                    .await,
                RankingMode::Simplified,
            ),
            RankingMode::Quality => {
                let weights = self.weights.for_surface(surface);
                match timeout_at(
                    deadline,
                    self.ranker.rank_at(candidates.clone(), viewer_id, weights, now),
                )
                .await
                {
                    Ok(ranked) => (ranked, RankingMode::Quality),
                    Err(_) => {
                        let err = FeedRankingError::DeadlineExceeded(self.config.request_deadline());
                        metrics::record_deadline_fallback(surface.as_str(), "ranking");
                        warn!(
                            viewer_id = ?viewer_id,
                            surface = %surface,
                            error = %err,
                            "Switching to simplified ranking"
                        );
                        (
                            self.simplified(surface, viewer_id, candidates, now, self.grace_deadline())
                                .await,
                            RankingMode::Simplified,
                        )
                    }
                }
            }
        };

        self.paginate(surface, viewer_id, ranked, page, used)
    }

    fn simplified_pool(&self, surface: Surface) -> usize {
        match surface {
            Surface::Home => self.config.simplified_home_pool,
            _ => self.config.simplified_explore_pool,
        }
    }

    /// Budget for the exclusion check once the request deadline has passed
    fn grace_deadline(&self) -> Instant {
        Instant::now() + self.config.signal_timeout()
    }

    async fn simplified(
        &self,
        surface: Surface,
        viewer_id: Option<Uuid>,
        candidates: Vec<Post>,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> Vec<ScoredPost> {
        let eligible = self.eligible(surface, viewer_id, candidates, deadline).await;
        rank_by_recency(eligible, self.simplified_pool(surface), &self.recency, now)
    }

    /// Candidates minus excluded posts. Nothing is served when the check
    /// cannot complete before `deadline`.
    async fn eligible(
        &self,
        surface: Surface,
        viewer_id: Option<Uuid>,
        candidates: Vec<Post>,
        deadline: Instant,
    ) -> Vec<Post> {
        match timeout_at(deadline, self.ranker.filter_excluded(candidates, viewer_id)).await {
            Ok(eligible) => eligible,
            Err(_) => {
                metrics::record_deadline_fallback(surface.as_str(), "exclusion");
                warn!(
                    viewer_id = ?viewer_id,
                    surface = %surface,
                    "Exclusion check did not finish in time, serving empty page"
                );
                Vec::new()
            }
        }
    }

    fn paginate(
        &self,
        surface: Surface,
        viewer_id: Option<Uuid>,
        ranked: Vec<ScoredPost>,
        page: PageRequest,
        mode: RankingMode,
    ) -> FeedPage {
        let total = ranked.len();
        let posts: Vec<Post> = page
            .slice(ranked)
            .into_iter()
            .map(|scored| scored.post)
            .collect();

        metrics::record_page(surface.as_str(), mode.as_str());
        info!(
            surface = %surface,
            viewer_id = ?viewer_id,
            mode = mode.as_str(),
            page = page.page,
            returned = posts.len(),
            ranked = total,
            "Feed page served"
        );

        FeedPage {
            posts,
            page: page.page,
            limit: page.limit,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use crate::store::InMemoryFeedStore;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn orchestrator(store: Arc<InMemoryFeedStore>, config: RankingConfig) -> FeedOrchestrator {
        FeedOrchestrator::new(
            store,
            Arc::new(config),
            WeightTable::default(),
            Arc::new(TtlCache::new(StdDuration::from_secs(60), 100)),
        )
    }

    fn seed_public(store: &InMemoryFeedStore, count: i64) {
        for i in 0..count {
            store.add_post(Post {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                content: Some(format!("post {}", i)),
                media_url: None,
                media_type: None,
                visibility: Visibility::Public,
                created_at: Utc::now() - Duration::minutes(i),
            });
        }
    }

    #[tokio::test]
    async fn test_simplified_home_pool_limits_depth() {
        let store = Arc::new(InMemoryFeedStore::new());
        seed_public(&store, 60);
        let feed = orchestrator(store, RankingConfig::default());

        let first = feed
            .get_home_feed(None, PageRequest::new(1, 20), RankingMode::Simplified)
            .await;
        let second = feed
            .get_home_feed(None, PageRequest::new(2, 20), RankingMode::Simplified)
            .await;

        assert_eq!(first.posts.len(), 20);
        // simplified home pool is 30
        assert_eq!(second.posts.len(), 10);
        assert_eq!(second.mode, RankingMode::Simplified);
    }

    #[tokio::test]
    async fn test_quality_explore_reports_mode() {
        let store = Arc::new(InMemoryFeedStore::new());
        seed_public(&store, 10);
        let feed = orchestrator(store, RankingConfig::default());

        let page = feed
            .get_explore_feed(Some(Uuid::new_v4()), PageRequest::new(1, 5), RankingMode::Quality)
            .await;
        assert_eq!(page.posts.len(), 5);
        assert_eq!(page.mode, RankingMode::Quality);
        assert_eq!((page.page, page.limit), (1, 5));
    }

    /// Delegates to the in-memory store but never answers reaction counts
    struct StalledStore(InMemoryFeedStore);

    #[async_trait::async_trait]
    impl FeedStore for StalledStore {
        async fn followees(&self, user_id: Uuid) -> crate::error::Result<Vec<Uuid>> {
            self.0.followees(user_id).await
        }
        async fn followers(&self, user_id: Uuid) -> crate::error::Result<Vec<Uuid>> {
            self.0.followers(user_id).await
        }
        async fn posts_by_authors(
            &self,
            query: &crate::store::PostQuery,
        ) -> crate::error::Result<Vec<Post>> {
            self.0.posts_by_authors(query).await
        }
        async fn count_reactions(
            &self,
            _post_id: Uuid,
            _since: DateTime<Utc>,
        ) -> crate::error::Result<i64> {
            tokio::time::sleep(StdDuration::from_secs(30)).await;
            Ok(0)
        }
        async fn count_comments(&self, post_id: Uuid, since: DateTime<Utc>) -> crate::error::Result<i64> {
            self.0.count_comments(post_id, since).await
        }
        async fn count_views(&self, post_id: Uuid, since: DateTime<Utc>) -> crate::error::Result<i64> {
            self.0.count_views(post_id, since).await
        }
        async fn viewer_author_interaction_counts(
            &self,
            viewer_id: Uuid,
            author_id: Uuid,
            since: DateTime<Utc>,
        ) -> crate::error::Result<crate::models::InteractionCounts> {
            self.0
                .viewer_author_interaction_counts(viewer_id, author_id, since)
                .await
        }
        async fn viewer_interaction_texts(
            &self,
            viewer_id: Uuid,
            kind: crate::models::InteractionKind,
            since: DateTime<Utc>,
        ) -> crate::error::Result<Vec<String>> {
            self.0.viewer_interaction_texts(viewer_id, kind, since).await
        }
        async fn has_negative_feedback(
            &self,
            viewer_id: Uuid,
            post_id: Uuid,
            kind: crate::models::NegativeFeedbackKind,
        ) -> crate::error::Result<bool> {
            self.0.has_negative_feedback(viewer_id, post_id, kind).await
        }
        async fn global_report_count(&self, post_id: Uuid) -> crate::error::Result<i64> {
            self.0.global_report_count(post_id).await
        }
        async fn text_search_candidates(
            &self,
            query: &str,
            media_type: Option<MediaType>,
            limit: usize,
        ) -> crate::error::Result<Vec<Post>> {
            self.0.text_search_candidates(query, media_type, limit).await
        }
    }

    #[tokio::test]
    async fn test_deadline_switches_to_simplified_ranking() {
        let inner = InMemoryFeedStore::new();
        seed_public(&inner, 10);
        let config = RankingConfig {
            request_deadline_ms: 50,
            signal_timeout_ms: 60_000,
            ..Default::default()
        };
        let feed = FeedOrchestrator::new(
            Arc::new(StalledStore(inner)),
            Arc::new(config),
            WeightTable::default(),
            Arc::new(TtlCache::new(StdDuration::from_secs(60), 100)),
        );

        let page = feed
            .get_explore_feed(Some(Uuid::new_v4()), PageRequest::new(1, 20), RankingMode::Quality)
            .await;
        assert_eq!(page.mode, RankingMode::Simplified);
        assert_eq!(page.posts.len(), 10);
        // simplified order is newest first
        assert!(page
            .posts
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn test_anonymous_search_is_text_order() {
        let store = Arc::new(InMemoryFeedStore::new());
        seed_public(&store, 3);
        let feed = orchestrator(store, RankingConfig::default());

        let page = feed
            .rank_search_results(None, "post", None, PageRequest::new(1, 20))
            .await;
        assert_eq!(page.posts.len(), 3);
        assert_eq!(page.mode, RankingMode::Simplified);
    }
}
