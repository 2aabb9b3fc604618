use crate::models::ScoredPost;
use std::collections::HashMap;
use uuid::Uuid;

/// Author Diversity Filter - 同一作者連續出現懲罰
///
/// Single forward pass over an already sorted list. Each author has a run
/// counter; when it reaches `max_consecutive` the post's score is multiplied
/// by `penalty` and the counter resets to 0. Posts by other authors in
/// between do not reset it, so interleaved authors are counted too.
///
/// The list is not re-sorted afterwards, so a penalized post keeps its
/// position even if its new score is below a later post.
pub struct AuthorDiversityFilter {
    max_consecutive: usize,
    penalty: f64,
}

impl AuthorDiversityFilter {
    pub fn new(max_consecutive: usize, penalty: f64) -> Self {
        Self {
            max_consecutive,
            penalty,
        }
    }

    /// Returns how many posts were penalized
    pub fn apply(&self, posts: &mut [ScoredPost]) -> usize {
        let mut runs: HashMap<Uuid, usize> = HashMap::new();
        let mut penalized = 0;

        for post in posts.iter_mut() {
            let run = runs.entry(post.post.author_id).or_insert(0);
            if *run >= self.max_consecutive {
                post.score *= self.penalty;
                *run = 0;
                penalized += 1;
            } else {
                *run += 1;
            }
        }

        penalized
    }
}
