//! Reviewer selection policy.
//!
//! Pool building and sampling are pure functions of their inputs; the only
//! source of non-determinism is the RNG, which tests seed.

use crate::models::User;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

/// Reviewers drawn when a pull request is opened.
pub const CREATE_REVIEWER_COUNT: usize = 2;

/// Reviewers drawn by a swap.
pub const SWAP_REVIEWER_COUNT: usize = 1;

/// Picks reviewers from an already-filtered candidate pool.
pub trait ReviewerSelector: Send + Sync {
    /// Draw up to `count` distinct members of `pool`. Returns fewer when the
    /// pool is smaller than `count`.
    fn select(&self, pool: &[User], count: usize) -> Vec<User>;
}

pub type SharedSelector = Arc<dyn ReviewerSelector>;

/// Uniform sampling without replacement.
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selector for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl ReviewerSelector for RandomSelector {
    fn select(&self, pool: &[User], count: usize) -> Vec<User> {
        // A panic elsewhere cannot leave the RNG in a bad state
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pool.choose_multiple(&mut *rng, count).cloned().collect()
    }
}

/// Eligible reviewers among `members`: active, not the author, not excluded.
///
/// The result is sorted by user id so that a seeded selector is
/// reproducible regardless of the order the store returned rows in.
pub fn candidate_pool(members: Vec<User>, author_id: &str, excluded: &[&str]) -> Vec<User> {
    let mut pool: Vec<User> = members
        .into_iter()
        .filter(|u| u.is_active && u.id != author_id && !excluded.contains(&u.id.as_str()))
        .collect();
    pool.sort_by(|a, b| a.id.cmp(&b.id));
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn user(id: &str, active: bool) -> User {
        User {
            id: id.to_string(),
            username: id.to_uppercase(),
            team_name: "Payments".to_string(),
            is_active: active,
        }
    }

    #[test]
    fn test_pool_excludes_author_inactive_and_excluded() {
        let members = vec![
            user("a", true),
            user("r1", true),
            user("r2", true),
            user("r3", false),
            user("r4", true),
        ];
        let pool = candidate_pool(members, "a", &["r4"]);
        let ids: Vec<&str> = pool.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_select_is_distinct_and_bounded() {
        let selector = RandomSelector::seeded(7);
        let pool: Vec<User> = (0..6).map(|i| user(&format!("u{}", i), true)).collect();

        for _ in 0..50 {
            let picked = selector.select(&pool, CREATE_REVIEWER_COUNT);
            assert_eq!(picked.len(), 2);
            let unique: HashSet<_> = picked.iter().map(|u| u.id.clone()).collect();
            assert_eq!(unique.len(), 2);
        }
    }

    #[test]
    fn test_select_returns_what_is_available() {
        let selector = RandomSelector::seeded(1);
        assert!(selector.select(&[], CREATE_REVIEWER_COUNT).is_empty());

        let pool = vec![user("only", true)];
        let picked = selector.select(&pool, CREATE_REVIEWER_COUNT);
        assert_eq!(picked, pool);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let pool: Vec<User> = (0..10).map(|i| user(&format!("u{}", i), true)).collect();
        let first = RandomSelector::seeded(42).select(&pool, 2);
        let second = RandomSelector::seeded(42).select(&pool, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_candidate_is_reachable() {
        let selector = RandomSelector::seeded(99);
        let pool: Vec<User> = (0..4).map(|i| user(&format!("u{}", i), true)).collect();

        let mut seen = HashSet::new();
        for _ in 0..200 {
            for u in selector.select(&pool, SWAP_REVIEWER_COUNT) {
                seen.insert(u.id);
            }
        }
        assert_eq!(seen.len(), 4);
    }
}
