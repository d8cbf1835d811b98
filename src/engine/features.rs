use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::models::{CandidateSet, Item, ItemId, UserContext};

/// The four normalized feature components computed per (user, candidate) pair
///
/// Every value is guaranteed finite and within [0, 1] before it reaches the
/// scoring engine; anything undefined collapses to a zero contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub content: f64,
    pub affinity: f64,
    pub popularity: f64,
    pub proximity: f64,
}

/// Computes feature vectors for every candidate in a request
#[derive(Clone)]
pub struct FeatureBuilder {
    config: Arc<EngineConfig>,
}

impl FeatureBuilder {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Builds one feature vector per candidate
    ///
    /// `interacted_items` is the snapshot of catalog records for the items the
    /// user's interaction history references; interactions whose item is gone
    /// from the catalog simply contribute nothing.
    pub fn build(
        &self,
        ctx: &UserContext,
        candidates: &CandidateSet,
        interacted_items: &HashMap<ItemId, Item>,
    ) -> HashMap<ItemId, FeatureVector> {
        let preferred = preferred_terms(ctx);
        let category_affinity = self.decayed_category_affinity(ctx, interacted_items);
        let category_max_popularity = max_popularity_per_category(candidates);

        candidates
            .items
            .iter()
            .map(|item| {
                let category = item.category.trim().to_lowercase();

                let content = match &ctx.profile.preference_weights {
                    Some(weights) => weighted_cosine(weights, &item.category_terms()),
                    None => jaccard(&preferred, &item.category_terms()),
                };

                let raw_affinity = category_affinity.get(&category).copied().unwrap_or(0.0);
                // Squash the unbounded decayed sum into [0, 1)
                let affinity = 1.0 - (-raw_affinity).exp();

                let popularity = category_max_popularity
                    .get(&category)
                    .map(|max| item.popularity / max)
                    .unwrap_or(0.0);

                let distance = ctx.location.distance_km(&item.location);
                let proximity = 1.0 - distance / self.config.distance_cutoff_km;

                let vector = FeatureVector {
                    content: sanitize(content),
                    affinity: sanitize(affinity),
                    popularity: sanitize(popularity),
                    proximity: sanitize(proximity),
                };
                (item.id, vector)
            })
            .collect()
    }

    /// Exponentially decayed interaction strength accumulated per category
    ///
    /// Each interaction contributes `strength * 0.5^(age / half_life)` to the
    /// category of the item it touched. A user with no history gets an empty
    /// map, which downstream turns into affinity 0 for every candidate: the
    /// cold-start path, not an error.
    fn decayed_category_affinity(
        &self,
        ctx: &UserContext,
        interacted_items: &HashMap<ItemId, Item>,
    ) -> HashMap<String, f64> {
        let mut affinity: HashMap<String, f64> = HashMap::new();
        for interaction in &ctx.interactions {
            let Some(item) = interacted_items.get(&interaction.item_id) else {
                continue;
            };
            let age_days = (ctx.now - interaction.at).num_seconds() as f64 / 86_400.0;
            if age_days < 0.0 {
                continue;
            }
            let decay = 0.5_f64.powf(age_days / self.config.half_life_days);
            let contribution = interaction.strength() * decay;
            if contribution.is_finite() {
                *affinity
                    .entry(item.category.trim().to_lowercase())
                    .or_default() += contribution;
            }
        }
        affinity
    }
}

fn preferred_terms(ctx: &UserContext) -> HashSet<String> {
    ctx.profile
        .preferred_categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Set-overlap similarity between the user's preferred categories and an
/// item's category vocabulary
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Cosine similarity between an explicit preference-weight map and the binary
/// term vector of an item
fn weighted_cosine(weights: &HashMap<String, f64>, terms: &HashSet<String>) -> f64 {
    let normalized: HashMap<String, f64> = weights
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), *v))
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();
    if normalized.is_empty() || terms.is_empty() {
        return 0.0;
    }

    let dot: f64 = terms
        .iter()
        .filter_map(|t| normalized.get(t))
        .sum();
    let weight_norm: f64 = normalized.values().map(|v| v * v).sum::<f64>().sqrt();
    let term_norm = (terms.len() as f64).sqrt();
    dot / (weight_norm * term_norm)
}

fn max_popularity_per_category(candidates: &CandidateSet) -> HashMap<String, f64> {
    let mut max: HashMap<String, f64> = HashMap::new();
    for item in &candidates.items {
        if !item.popularity.is_finite() || item.popularity <= 0.0 {
            continue;
        }
        let entry = max.entry(item.category.trim().to_lowercase()).or_default();
        if item.popularity > *entry {
            *entry = item.popularity;
        }
    }
    max
}

/// Undefined values become a zero contribution; everything else is clamped
/// into [0, 1]
fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
