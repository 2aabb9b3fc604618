use crate::error::{FeedRankingError, Result};
use crate::models::Surface;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Tolerance for the positive-coefficient sum of a weight set
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub ranking: RankingConfig,
    pub weights: WeightTable,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Process-wide ranking constants. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub max_candidates: usize,
    pub min_candidates: usize,
    pub engagement_window_days: i64,
    pub relationship_window_days: i64,
    pub interest_window_days: i64,
    pub explore_window_days: i64,
    pub recency_half_life_hours: f64,
    pub max_consecutive_same_author: usize,
    pub explore_non_followed_ratio: f64,
    pub home_recommended_ratio: f64,
    /// Upper bound on distinct authors in the home author set
    pub home_author_cap: usize,
    pub simplified_home_pool: usize,
    pub simplified_explore_pool: usize,
    pub request_deadline_ms: u64,
    pub signal_timeout_ms: u64,
    pub scoring_concurrency: usize,
    pub profile_cache_ttl_secs: u64,
    pub profile_cache_max_entries: usize,
    /// Explore retries without the time window below this many results
    pub explore_retry_threshold: usize,
    pub global_report_threshold: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_candidates: 400,
            min_candidates: 50,
            engagement_window_days: 7,
            relationship_window_days: 30,
            interest_window_days: 30,
            explore_window_days: 7,
            recency_half_life_hours: 24.0,
            max_consecutive_same_author: 3,
            explore_non_followed_ratio: 0.8,
            home_recommended_ratio: 0.2,
            home_author_cap: 100,
            simplified_home_pool: 30,
            simplified_explore_pool: 100,
            request_deadline_ms: 12_000,
            signal_timeout_ms: 2_000,
            scoring_concurrency: 32,
            profile_cache_ttl_secs: 300,
            profile_cache_max_entries: 10_000,
            explore_retry_threshold: 5,
            global_report_threshold: 5,
        }
    }
}

impl RankingConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn profile_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_cache_ttl_secs)
    }

    /// Clamp a requested pool size into `[min_candidates, max_candidates]`
    pub fn clamp_pool(&self, requested: usize) -> usize {
        requested.clamp(self.min_candidates, self.max_candidates)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_candidates == 0 || self.min_candidates > self.max_candidates {
            return Err(FeedRankingError::Config(format!(
                "candidate bounds invalid: min={} max={}",
                self.min_candidates, self.max_candidates
            )));
        }
        if !(self.recency_half_life_hours.is_finite() && self.recency_half_life_hours > 0.0) {
            return Err(FeedRankingError::Config(
                "recency_half_life_hours must be positive".to_string(),
            ));
        }
        for (name, ratio) in [
            ("explore_non_followed_ratio", self.explore_non_followed_ratio),
            ("home_recommended_ratio", self.home_recommended_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(FeedRankingError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.max_consecutive_same_author == 0 {
            return Err(FeedRankingError::Config(
                "max_consecutive_same_author must be at least 1".to_string(),
            ));
        }
        if self.scoring_concurrency == 0 || self.home_author_cap == 0 {
            return Err(FeedRankingError::Config(
                "scoring_concurrency and home_author_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coefficients for combining the five signals on one surface.
///
/// Every field is required when loaded from a file; a missing coefficient is
/// rejected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingWeights {
    pub relationship: f64,
    pub engagement: f64,
    pub personalization: f64,
    pub recency: f64,
    /// Always negative
    pub negative_feedback: f64,
    /// Multiplier applied to a post that breaks a same-author run
    pub author_diversity_penalty: f64,
}

impl RankingWeights {
    pub const HOME: Self = Self {
        relationship: 0.35,
        engagement: 0.25,
        personalization: 0.20,
        recency: 0.20,
        negative_feedback: -1.0,
        author_diversity_penalty: 0.9,
    };

    pub const EXPLORE: Self = Self {
        relationship: 0.10,
        engagement: 0.35,
        personalization: 0.30,
        recency: 0.25,
        negative_feedback: -1.0,
        author_diversity_penalty: 0.9,
    };

    pub const SEARCH: Self = Self {
        relationship: 0.20,
        engagement: 0.30,
        personalization: 0.30,
        recency: 0.20,
        negative_feedback: -1.0,
        author_diversity_penalty: 0.9,
    };

    pub fn positive_sum(&self) -> f64 {
        self.relationship + self.engagement + self.personalization + self.recency
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let coefficients = [
            ("relationship", self.relationship),
            ("engagement", self.engagement),
            ("personalization", self.personalization),
            ("recency", self.recency),
            ("negative_feedback", self.negative_feedback),
            ("author_diversity_penalty", self.author_diversity_penalty),
        ];
        for (field, value) in coefficients {
            if !value.is_finite() {
                return Err(FeedRankingError::InvalidWeights(format!(
                    "{}.{} is not finite",
                    name, field
                )));
            }
        }
        for (field, value) in &coefficients[..4] {
            if *value < 0.0 {
                return Err(FeedRankingError::InvalidWeights(format!(
                    "{}.{} must be non-negative, got {}",
                    name, field, value
                )));
            }
        }
        if self.negative_feedback >= 0.0 {
            return Err(FeedRankingError::InvalidWeights(format!(
                "{}.negative_feedback must be negative, got {}",
                name, self.negative_feedback
            )));
        }
        let sum = self.positive_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FeedRankingError::InvalidWeights(format!(
                "{} positive coefficients sum to {:.3}, expected 1.0",
                name, sum
            )));
        }
        if !(self.author_diversity_penalty > 0.0 && self.author_diversity_penalty <= 1.0) {
            return Err(FeedRankingError::InvalidWeights(format!(
                "{}.author_diversity_penalty must be within (0, 1], got {}",
                name, self.author_diversity_penalty
            )));
        }
        Ok(())
    }
}

/// The three named weight sets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTable {
    pub home: RankingWeights,
    pub explore: RankingWeights,
    pub search: RankingWeights,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            home: RankingWeights::HOME,
            explore: RankingWeights::EXPLORE,
            search: RankingWeights::SEARCH,
        }
    }
}

impl WeightTable {
    pub fn for_surface(&self, surface: Surface) -> &RankingWeights {
        match surface {
            Surface::Home => &self.home,
            Surface::Explore => &self.explore,
            Surface::Search => &self.search,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let table: WeightTable = serde_json::from_str(raw)
            .map_err(|e| FeedRankingError::InvalidWeights(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FeedRankingError::InvalidWeights(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.home.validate("home")?;
        self.explore.validate("explore")?;
        self.search.validate("search")
    }
}

impl Config {
    /// Load and validate configuration. Any weight problem fails here, before
    /// the service accepts traffic.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env::var("FEED_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(FeedRankingError::Config(format!(
                    "FEED_STORE must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let url = env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && url.is_none() {
            return Err(FeedRankingError::Config(
                "DATABASE_URL is required when FEED_STORE=postgres".to_string(),
            ));
        }

        let ranking: RankingConfig = envy::prefixed("RANKING_").from_env()?;
        ranking.validate()?;

        let weights = match env::var("RANKING_WEIGHTS_PATH") {
            Ok(path) => WeightTable::from_file(Path::new(&path))?,
            Err(_) => WeightTable::default(),
        };
        weights.validate()?;

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: parse_env("APP_PORT", 8080)?,
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "feed-ranking-service".to_string()),
            },
            database: DatabaseConfig {
                backend,
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            ranking,
            weights,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| FeedRankingError::Config(format!("{} has an invalid value", key))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_weight_sums() {
        for (name, weights) in [
            ("home", RankingWeights::HOME),
            ("explore", RankingWeights::EXPLORE),
            ("search", RankingWeights::SEARCH),
        ] {
            assert!(
                (weights.positive_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
                "{} weights do not sum to 1.0",
                name
            );
            assert!(weights.negative_feedback < 0.0);
            weights.validate(name).unwrap();
        }
    }

    #[test]
    fn test_missing_coefficient_is_rejected() {
        let raw = r#"{
            "home": {"relationship": 0.35, "engagement": 0.25, "personalization": 0.2,
                     "negative_feedback": -1.0, "author_diversity_penalty": 0.9},
            "explore": {"relationship": 0.1, "engagement": 0.35, "personalization": 0.3,
                        "recency": 0.25, "negative_feedback": -1.0, "author_diversity_penalty": 0.9},
            "search": {"relationship": 0.2, "engagement": 0.3, "personalization": 0.3,
                       "recency": 0.2, "negative_feedback": -1.0, "author_diversity_penalty": 0.9}
        }"#;
        let err = WeightTable::from_json(raw).unwrap_err();
        assert!(matches!(err, FeedRankingError::InvalidWeights(_)));
        assert!(err.to_string().contains("recency"));
    }

    #[test]
    fn test_positive_negative_feedback_weight_is_rejected() {
        let mut weights = RankingWeights::HOME;
        weights.negative_feedback = 0.5;
        assert!(matches!(
            weights.validate("home"),
            Err(FeedRankingError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_weight_sum_out_of_tolerance_is_rejected() {
        let mut weights = RankingWeights::EXPLORE;
        weights.engagement = 0.6;
        assert!(weights.validate("explore").is_err());
    }

    #[test]
    fn test_full_table_from_json() {
        let table = WeightTable::default();
        let raw = serde_json::to_string(&table).unwrap();
        assert_eq!(WeightTable::from_json(&raw).unwrap(), table);
    }

    #[test]
    fn test_ranking_config_validation() {
        let config = RankingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.clamp_pool(10), 50);
        assert_eq!(config.clamp_pool(1000), 400);

        let bad = RankingConfig {
            home_recommended_ratio: 1.5,
            ..RankingConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
