pub mod candidates;
pub mod diversity;
pub mod feed;
pub mod ranking;
pub mod search;
pub mod signals;

pub use candidates::{CandidateGenerator, CandidateStrategy};
pub use diversity::AuthorDiversityFilter;
pub use feed::FeedOrchestrator;
pub use ranking::Ranker;
pub use search::SearchBlender;
