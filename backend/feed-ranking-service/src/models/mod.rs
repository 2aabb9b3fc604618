use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Post visibility as stored by content-service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Followers,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Followers => "followers",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "followers" => Ok(Visibility::Followers),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(format!("unknown media type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Hours since the post was created, never negative
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.created_at).num_seconds().max(0);
        seconds as f64 / 3600.0
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Reaction,
    Comment,
    View,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Reaction => "reaction",
            InteractionKind::Comment => "comment",
            InteractionKind::View => "view",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub actor_id: Uuid,
    pub post_id: Uuid,
    pub kind: InteractionKind,
    /// Reaction flavour (like, love, ...) when `kind` is `Reaction`
    pub reaction_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeFeedbackKind {
    Hidden,
    NotInterested,
    Reported,
}

impl NegativeFeedbackKind {
    /// Lookup order used by the negative-feedback signal
    pub const CHECK_ORDER: [NegativeFeedbackKind; 3] = [
        NegativeFeedbackKind::Hidden,
        NegativeFeedbackKind::NotInterested,
        NegativeFeedbackKind::Reported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NegativeFeedbackKind::Hidden => "hidden",
            NegativeFeedbackKind::NotInterested => "not_interested",
            NegativeFeedbackKind::Reported => "reported",
        }
    }
}

impl fmt::Display for NegativeFeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeFeedbackRecord {
    pub actor_id: Uuid,
    pub post_id: Uuid,
    pub kind: NegativeFeedbackKind,
    pub created_at: DateTime<Utc>,
}

/// Viewer → author interaction totals over the relationship window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionCounts {
    pub reactions: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Home,
    Explore,
    Search,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Home => "home",
            Surface::Explore => "explore",
            Surface::Search => "search",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a feed request is ranked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Recency-only sort over a small pool (latency path)
    #[default]
    Simplified,
    /// Full signal-based ranking
    Quality,
}

impl RankingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMode::Simplified => "simplified",
            RankingMode::Quality => "quality",
        }
    }
}

/// Per-signal values behind a combined score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalBreakdown {
    pub relationship: f64,
    pub engagement: f64,
    pub personalization: f64,
    pub recency: f64,
    pub negative_feedback: f64,
}

/// A post with its request-scoped ranking score
#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post: Post,
    pub score: f64,
    pub breakdown: Option<SignalBreakdown>,
}

impl ScoredPost {
    pub fn new(post: Post, score: f64) -> Self {
        Self {
            post,
            score,
            breakdown: None,
        }
    }
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Number of ranked items needed to fill this page
    pub fn depth(&self) -> usize {
        self.page as usize * self.limit as usize
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub page: u32,
    pub limit: u32,
    pub mode: RankingMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(0, 500);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, PageRequest::MAX_LIMIT);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_slice() {
        let page = PageRequest::new(2, 3);
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(page.slice(items), vec![3, 4, 5]);
        assert_eq!(page.depth(), 6);
    }

    #[test]
    fn test_age_hours_never_negative() {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: None,
            media_url: None,
            media_type: None,
            visibility: Visibility::Public,
            created_at: now + Duration::hours(1),
        };
        assert_eq!(post.age_hours(now), 0.0);
    }

    #[test]
    fn test_visibility_round_trip_names() {
        assert_eq!("followers".parse::<Visibility>(), Ok(Visibility::Followers));
        assert!("friends".parse::<Visibility>().is_err());
    }
}
