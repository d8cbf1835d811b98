use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::models::{Recommendation, RecommendedItem, ScoredCandidate, UserId};

pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 100;

/// Orders scored candidates, applies the diversity pass, and paginates
pub struct Ranker {
    max_per_category: usize,
}

impl Ranker {
    pub fn new(max_per_category: usize) -> Self {
        Self { max_per_category }
    }

    /// Validates paging input; shared with the orchestrator so bad input is
    /// rejected before any pipeline work happens
    pub fn check_paging(page: usize, page_size: usize) -> AppResult<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::InvalidPageSize {
                got: page_size,
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
            });
        }
        if page == 0 {
            return Err(AppError::InvalidInput(
                "page numbers are 1-indexed".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rank(
        &self,
        mut scored: Vec<ScoredCandidate>,
        user_id: UserId,
        page: usize,
        page_size: usize,
    ) -> AppResult<Recommendation> {
        Self::check_paging(page, page_size)?;

        // Score descending; ties broken by item id ascending so repeated calls
        // with identical inputs page identically
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });

        // One entry per item id; the best-scored occurrence wins
        let mut seen = HashSet::new();
        scored.retain(|c| seen.insert(c.item_id));

        let ordered = self.diversity_pass(scored);

        let total = ordered.len();
        let start = (page - 1).saturating_mul(page_size);
        let items: Vec<RecommendedItem> = ordered
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(RecommendedItem::from)
            .collect();

        Ok(Recommendation {
            user_id,
            items,
            page,
            page_size,
            total,
            generated_at: Utc::now(),
        })
    }

    /// Greedy single-pass re-ordering bounding consecutive same-category runs
    ///
    /// Once `max_per_category` items of one category stand at the tail of the
    /// result, the next candidate from any other category is pulled forward.
    /// Category comparison is case- and whitespace-insensitive; the candidate
    /// itself keeps its verbatim category text. When only one category remains
    /// the run is allowed to exceed the cap; the output is deliberately
    /// locally suboptimal rather than a global optimization.
    fn diversity_pass(&self, mut remaining: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let mut result: Vec<ScoredCandidate> = Vec::with_capacity(remaining.len());
        let mut run_category: Option<String> = None;
        let mut run_length = 0usize;

        while !remaining.is_empty() {
            let pick = if run_length >= self.max_per_category {
                let capped = run_category.as_deref().unwrap_or_default();
                remaining
                    .iter()
                    .position(|c| normalized_category(c) != capped)
                    .unwrap_or(0)
            } else {
                0
            };

            let candidate = remaining.remove(pick);
            let category = normalized_category(&candidate);
            match &run_category {
                Some(current) if *current == category => run_length += 1,
                _ => {
                    run_category = Some(category);
                    run_length = 1;
                }
            }
            result.push(candidate);
        }

        result
    }
}

fn normalized_category(candidate: &ScoredCandidate) -> String {
    candidate.category.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, ScoreComponents};
    use uuid::Uuid;

    fn scored(category: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            item_id: Uuid::new_v4(),
            name: format!("{} {}", category, score),
            kind: ItemKind::Place,
            category: category.to_string(),
            score,
            components: ScoreComponents {
                content: score,
                collaborative: 0.0,
                popularity: 0.0,
                proximity: 0.0,
            },
        }
    }

    fn ranker() -> Ranker {
        Ranker::new(3)
    }

    #[test]
    fn test_orders_by_score_descending() {
        let user = Uuid::new_v4();
        let input = vec![scored("a", 0.2), scored("b", 0.9), scored("c", 0.5)];
        let rec = ranker().rank(input, user, 1, 10).unwrap();
        let scores: Vec<f64> = rec.items.iter().map(|i| i.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_ties_break_by_item_id_ascending() {
        let user = Uuid::new_v4();
        let mut a = scored("a", 0.5);
        let mut b = scored("b", 0.5);
        a.item_id = Uuid::from_u128(2);
        b.item_id = Uuid::from_u128(1);

        // Insertion order must not matter
        let rec1 = ranker().rank(vec![a.clone(), b.clone()], user, 1, 10).unwrap();
        let rec2 = ranker().rank(vec![b, a], user, 1, 10).unwrap();

        assert_eq!(rec1.items[0].item_id, Uuid::from_u128(1));
        let ids1: Vec<_> = rec1.items.iter().map(|i| i.item_id).collect();
        let ids2: Vec<_> = rec2.items.iter().map(|i| i.item_id).collect();
        assert_eq!(ids1, ids2);
    }

    #[test]
    fn test_duplicate_item_ids_are_collapsed() {
        let user = Uuid::new_v4();
        let mut low = scored("a", 0.3);
        let mut high = scored("a", 0.8);
        let shared = Uuid::new_v4();
        low.item_id = shared;
        high.item_id = shared;

        let rec = ranker()
            .rank(vec![low, high, scored("b", 0.5)], user, 1, 10)
            .unwrap();
        assert_eq!(rec.items.len(), 2);
        let kept = rec.items.iter().find(|i| i.item_id == shared).unwrap();
        assert_eq!(kept.score, 0.8);
    }

    #[test]
    fn test_diversity_window_cap() {
        let user = Uuid::new_v4();
        // Nine museums outscore every park; without the pass the whole top
        // nine would be museums
        let mut input: Vec<ScoredCandidate> =
            (0..9).map(|i| scored("museum", 0.9 - i as f64 * 0.01)).collect();
        input.extend((0..3).map(|i| scored("park", 0.5 - i as f64 * 0.01)));

        let rec = ranker().rank(input, user, 1, 20).unwrap();
        let categories: Vec<&str> = rec.items.iter().map(|i| i.category.as_str()).collect();

        for window in categories.windows(4) {
            assert!(
                !window.iter().all(|c| *c == window[0]),
                "found 4 consecutive {} in {:?}",
                window[0],
                categories
            );
        }
        // Order within a category is still score-descending
        let museum_scores: Vec<f64> = rec
            .items
            .iter()
            .filter(|i| i.category == "museum")
            .map(|i| i.score)
            .collect();
        assert!(museum_scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_diversity_run_grows_once_alternatives_run_out() {
        let user = Uuid::new_v4();
        let mut input: Vec<ScoredCandidate> =
            (0..6).map(|i| scored("museum", 0.9 - i as f64 * 0.01)).collect();
        input.push(scored("park", 0.5));

        let rec = ranker().rank(input, user, 1, 20).unwrap();
        let categories: Vec<&str> = rec.items.iter().map(|i| i.category.as_str()).collect();
        // The lone park breaks the first run; the tail is all museum because
        // nothing else is left
        assert_eq!(
            categories,
            vec!["museum", "museum", "museum", "park", "museum", "museum", "museum"]
        );
    }

    #[test]
    fn test_diversity_compares_categories_case_insensitively() {
        let user = Uuid::new_v4();
        // Mixed casing of one category must still count as a single run
        let mut input = vec![
            scored("Museum", 0.9),
            scored("museum", 0.8),
            scored("MUSEUM", 0.7),
            scored("Museum", 0.6),
        ];
        input.push(scored("park", 0.1));

        let rec = ranker().rank(input, user, 1, 10).unwrap();
        let categories: Vec<String> = rec
            .items
            .iter()
            .map(|i| i.category.to_lowercase())
            .collect();
        assert_eq!(
            categories,
            vec!["museum", "museum", "museum", "park", "museum"]
        );
        // Verbatim casing survives into the result
        assert_eq!(rec.items[0].category, "Museum");
        assert_eq!(rec.items[2].category, "MUSEUM");
    }

    #[test]
    fn test_single_category_may_exceed_cap() {
        let user = Uuid::new_v4();
        let input: Vec<ScoredCandidate> =
            (0..5).map(|i| scored("museum", 0.9 - i as f64 * 0.01)).collect();
        let rec = ranker().rank(input, user, 1, 10).unwrap();
        assert_eq!(rec.items.len(), 5);
    }

    #[test]
    fn test_pagination_partial_last_page() {
        let user = Uuid::new_v4();
        let input: Vec<ScoredCandidate> =
            (0..25).map(|i| scored("a", 1.0 - i as f64 * 0.01)).collect();

        let page3 = ranker().rank(input.clone(), user, 3, 10).unwrap();
        assert_eq!(page3.items.len(), 5);
        assert_eq!(page3.total, 25);

        let page10 = ranker().rank(input, user, 10, 10).unwrap();
        assert!(page10.items.is_empty());
        assert_eq!(page10.total, 25);
    }

    #[test]
    fn test_page_size_bounds() {
        let user = Uuid::new_v4();
        let err = ranker().rank(vec![scored("a", 0.5)], user, 1, 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidPageSize { got: 0, .. }));

        let err = ranker().rank(vec![scored("a", 0.5)], user, 1, 101).unwrap_err();
        assert!(matches!(err, AppError::InvalidPageSize { got: 101, .. }));
    }

    #[test]
    fn test_page_zero_rejected() {
        let user = Uuid::new_v4();
        let err = ranker().rank(vec![scored("a", 0.5)], user, 0, 10).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_ranking_is_deterministic_across_calls() {
        let user = Uuid::new_v4();
        let input: Vec<ScoredCandidate> = (0..30)
            .map(|i| scored(if i % 2 == 0 { "a" } else { "b" }, (i % 7) as f64 / 7.0))
            .collect();

        let first = ranker().rank(input.clone(), user, 1, 30).unwrap();
        let second = ranker().rank(input, user, 1, 30).unwrap();
        let ids1: Vec<_> = first.items.iter().map(|i| i.item_id).collect();
        let ids2: Vec<_> = second.items.iter().map(|i| i.item_id).collect();
        assert_eq!(ids1, ids2);
    }

    #[test]
    fn test_no_duplicate_ids_in_result() {
        let user = Uuid::new_v4();
        let input: Vec<ScoredCandidate> =
            (0..40).map(|i| scored("cat", (i as f64) / 40.0)).collect();
        let rec = ranker().rank(input, user, 1, 40).unwrap();
        let mut ids: Vec<_> = rec.items.iter().map(|i| i.item_id).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
