// Utility functions for feed-ranking-service

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Matches #tag where tag is letters, digits or underscores (any script)
static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("Invalid hashtag regex"));

/// Extract topic tags from post text.
///
/// Returns lowercase tags without the `#`, deduplicated in first-seen order.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tags() {
        assert_eq!(
            extract_tags("Sunset run #Running #fitness"),
            vec!["running", "fitness"]
        );
    }

    #[test]
    fn test_extract_tags_dedupes_case_insensitively() {
        assert_eq!(extract_tags("#Rust and #rust and #RUST"), vec!["rust"]);
    }

    #[test]
    fn test_extract_tags_none() {
        assert!(extract_tags("no tags here, just # spaces").is_empty());
    }

    #[test]
    fn test_extract_tags_unicode() {
        assert_eq!(extract_tags("週末 #旅行 楽しい"), vec!["旅行"]);
    }
}
