//! In-process [`FeedStore`] used by tests and `FEED_STORE=memory` runs

use super::{FeedStore, PostQuery};
use crate::error::Result;
use crate::models::{
    FollowEdge, InteractionCounts, InteractionKind, InteractionRecord, MediaType,
    NegativeFeedbackKind, NegativeFeedbackRecord, Post, Visibility,
};
use crate::utils::extract_tags;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryData {
    posts: Vec<Post>,
    follows: Vec<FollowEdge>,
    interactions: Vec<InteractionRecord>,
    negative_feedback: Vec<NegativeFeedbackRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    data: RwLock<MemoryData>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self, post: Post) {
        self.data.write().posts.push(post);
    }

    pub fn follow(&self, follower_id: Uuid, followee_id: Uuid) {
        self.data.write().follows.push(FollowEdge {
            follower_id,
            followee_id,
        });
    }

    pub fn add_interaction(&self, record: InteractionRecord) {
        self.data.write().interactions.push(record);
    }

    pub fn add_negative_feedback(&self, record: NegativeFeedbackRecord) {
        self.data.write().negative_feedback.push(record);
    }

    fn count_interactions(&self, post_id: Uuid, kind: InteractionKind, since: DateTime<Utc>) -> i64 {
        self.data
            .read()
            .interactions
            .iter()
            .filter(|r| r.post_id == post_id && r.kind == kind && r.created_at >= since)
            .count() as i64
    }
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn followees(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .data
            .read()
            .follows
            .iter()
            .filter(|edge| edge.follower_id == user_id)
            .map(|edge| edge.followee_id)
            .collect())
    }

    async fn followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .data
            .read()
            .follows
            .iter()
            .filter(|edge| edge.followee_id == user_id)
            .map(|edge| edge.follower_id)
            .collect())
    }

    async fn posts_by_authors(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let data = self.data.read();
        let mut posts: Vec<Post> = data
            .posts
            .iter()
            .filter(|post| query.admits(post))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(query.limit);
        Ok(posts)
    }

    async fn count_reactions(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.count_interactions(post_id, InteractionKind::Reaction, since))
    }

    async fn count_comments(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.count_interactions(post_id, InteractionKind::Comment, since))
    }

    async fn count_views(&self, post_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.count_interactions(post_id, InteractionKind::View, since))
    }

    async fn viewer_author_interaction_counts(
        &self,
        viewer_id: Uuid,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<InteractionCounts> {
        let data = self.data.read();
        let authors: HashMap<Uuid, Uuid> = data.posts.iter().map(|p| (p.id, p.author_id)).collect();

        let mut counts = InteractionCounts::default();
        for record in data.interactions.iter().filter(|r| {
            r.actor_id == viewer_id
                && r.created_at >= since
                && authors.get(&r.post_id) == Some(&author_id)
        }) {
            match record.kind {
                InteractionKind::Reaction => counts.reactions += 1,
                InteractionKind::Comment => counts.comments += 1,
                InteractionKind::View => {}
            }
        }
        Ok(counts)
    }

    async fn viewer_interaction_texts(
        &self,
        viewer_id: Uuid,
        kind: InteractionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let data = self.data.read();
        let texts: HashMap<Uuid, &str> = data.posts.iter().map(|p| (p.id, p.text())).collect();

        Ok(data
            .interactions
            .iter()
            .filter(|r| r.actor_id == viewer_id && r.kind == kind && r.created_at >= since)
            .filter_map(|r| texts.get(&r.post_id))
            .filter(|text| !text.is_empty())
            .map(|text| text.to_string())
            .collect())
    }

    async fn has_negative_feedback(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        kind: NegativeFeedbackKind,
    ) -> Result<bool> {
        Ok(self
            .data
            .read()
            .negative_feedback
            .iter()
            .any(|r| r.actor_id == viewer_id && r.post_id == post_id && r.kind == kind))
    }

    async fn global_report_count(&self, post_id: Uuid) -> Result<i64> {
        Ok(self
            .data
            .read()
            .negative_feedback
            .iter()
            .filter(|r| r.post_id == post_id && r.kind == NegativeFeedbackKind::Reported)
            .count() as i64)
    }

    async fn text_search_candidates(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let tag = needle.trim_start_matches('#');

        let data = self.data.read();
        let mut posts: Vec<Post> = data
            .posts
            .iter()
            .filter(|p| p.visibility == Visibility::Public)
            .filter(|p| media_type.is_none() || p.media_type == media_type)
            .filter(|p| {
                let text = p.text().to_lowercase();
                text.contains(&needle) || extract_tags(&text).iter().any(|t| t == tag)
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AuthorFilter, VisibilityRule};
    use chrono::Duration;

    fn post(author_id: Uuid, visibility: Visibility, hours_ago: i64, content: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            content: Some(content.to_string()),
            media_url: None,
            media_type: None,
            visibility,
            created_at: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn test_connections_visibility() {
        let store = InMemoryFeedStore::new();
        let viewer = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        store.add_post(post(friend, Visibility::Followers, 1, "friends only"));
        store.add_post(post(friend, Visibility::Private, 1, "private"));
        store.add_post(post(viewer, Visibility::Private, 2, "my draft"));
        store.add_post(post(stranger, Visibility::Followers, 1, "not for you"));

        let query = PostQuery {
            authors: AuthorFilter::Include(vec![viewer, friend]),
            viewer_id: Some(viewer),
            visibility: VisibilityRule::Connections,
            since: None,
            limit: 10,
        };
        let posts = store.posts_by_authors(&query).await.unwrap();
        let texts: Vec<&str> = posts.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["friends only", "my draft"]);
    }

    #[tokio::test]
    async fn test_viewer_author_counts_ignore_views() {
        let store = InMemoryFeedStore::new();
        let viewer = Uuid::new_v4();
        let author = Uuid::new_v4();
        let p = post(author, Visibility::Public, 1, "hello");
        let post_id = p.id;
        store.add_post(p);

        for kind in [
            InteractionKind::Reaction,
            InteractionKind::Comment,
            InteractionKind::View,
        ] {
            store.add_interaction(InteractionRecord {
                actor_id: viewer,
                post_id,
                kind,
                reaction_type: None,
                created_at: Utc::now(),
            });
        }

        let counts = store
            .viewer_author_interaction_counts(viewer, author, Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(counts, InteractionCounts { reactions: 1, comments: 1 });
    }

    #[tokio::test]
    async fn test_text_search_matches_hashtags() {
        let store = InMemoryFeedStore::new();
        let author = Uuid::new_v4();
        store.add_post(post(author, Visibility::Public, 1, "Weekend #Hiking trip"));
        store.add_post(post(author, Visibility::Private, 1, "#hiking alone"));

        let posts = store.text_search_candidates("#hiking", None, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text(), "Weekend #Hiking trip");
    }
}
