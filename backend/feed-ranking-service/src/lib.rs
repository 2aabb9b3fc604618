pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{FeedRankingError, Result};
pub use services::{
    AuthorDiversityFilter, CandidateGenerator, FeedOrchestrator, Ranker, SearchBlender,
};
pub use store::{FeedStore, InMemoryFeedStore, PgFeedStore};
