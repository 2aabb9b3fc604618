pub mod feed;

pub use feed::{configure, get_explore_feed, get_home_feed, search_posts, AppState, VIEWER_HEADER};
