use std::collections::HashMap;

use crate::config::ScoringWeights;
use crate::engine::features::FeatureVector;
use crate::error::AppResult;
use crate::models::{CandidateSet, ItemId, ScoreComponents, ScoredCandidate};

/// A scoring signal with a uniform `compute` contract
///
/// New strategies (an ML-based one, say) slot in as further variants without
/// the ranker ever changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreStrategy {
    Content,
    Collaborative,
    Popularity,
    Proximity,
}

impl ScoreStrategy {
    /// Reads this strategy's normalized component out of the feature vector;
    /// always within [0, 1]
    pub fn compute(&self, features: &FeatureVector) -> f64 {
        match self {
            ScoreStrategy::Content => features.content,
            ScoreStrategy::Collaborative => features.affinity,
            ScoreStrategy::Popularity => features.popularity,
            ScoreStrategy::Proximity => features.proximity,
        }
    }
}

/// Combines the normalized components into one relevance score per candidate
///
/// A fixed linear weighting, validated once at construction. Scoring is fully
/// deterministic: identical inputs always produce identical scores, which is
/// what makes paging reproducible.
#[derive(Debug)]
pub struct ScoringEngine {
    strategies: Vec<(ScoreStrategy, f64)>,
}

impl ScoringEngine {
    /// Fails fast with `InvalidWeightConfig` when the weights do not sum to
    /// 1.0; called at startup, never per request
    pub fn new(weights: ScoringWeights) -> AppResult<Self> {
        weights.validate()?;
        Ok(Self {
            strategies: vec![
                (ScoreStrategy::Content, weights.content),
                (ScoreStrategy::Collaborative, weights.collaborative),
                (ScoreStrategy::Popularity, weights.popularity),
                (ScoreStrategy::Proximity, weights.proximity),
            ],
        })
    }

    pub fn score(
        &self,
        candidates: &CandidateSet,
        features: &HashMap<ItemId, FeatureVector>,
    ) -> Vec<ScoredCandidate> {
        candidates
            .items
            .iter()
            .map(|item| {
                let vector = features.get(&item.id).copied().unwrap_or(FeatureVector {
                    content: 0.0,
                    affinity: 0.0,
                    popularity: 0.0,
                    proximity: 0.0,
                });

                let score: f64 = self
                    .strategies
                    .iter()
                    .map(|(strategy, weight)| weight * strategy.compute(&vector))
                    .sum();

                ScoredCandidate {
                    item_id: item.id,
                    name: item.name.clone(),
                    kind: item.kind,
                    // Verbatim catalog text; callers see the original casing
                    category: item.category.clone(),
                    // Weights and components are in [0, 1], so the sum is too
                    score: if score.is_finite() { score } else { 0.0 },
                    components: ScoreComponents {
                        content: vector.content,
                        collaborative: vector.affinity,
                        popularity: vector.popularity,
                        proximity: vector.proximity,
                    },
                }
            })
            .collect()
    }
}
