use std::collections::HashSet;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{CandidateSet, InteractionKind, Item, ItemId, UserContext};
use crate::stores::{with_read_retry, CatalogStore};

/// Produces the bounded set of items eligible for ranking in one request
///
/// Geofilters the catalog with an expanding radius ladder until enough
/// candidates are found, then drops expired events and recently visited items.
/// Read-only: the generator never writes to any store.
#[derive(Clone)]
pub struct CandidateGenerator {
    catalog: Arc<dyn CatalogStore>,
    config: Arc<EngineConfig>,
}

impl CandidateGenerator {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: Arc<EngineConfig>) -> Self {
        Self { catalog, config }
    }

    pub async fn generate(&self, ctx: &UserContext) -> AppResult<CandidateSet> {
        let visited = self.visited_within_window(ctx);

        let mut eligible: Vec<Item> = Vec::new();
        let mut used_radius = self.config.radius_ladder_km[0];

        for &radius_km in &self.config.radius_ladder_km {
            used_radius = radius_km;

            let found = with_read_retry(
                "find_items_near",
                self.config.store_read_retries,
                self.config.retry_backoff,
                || {
                    self.catalog.find_items_near(
                        ctx.location,
                        radius_km,
                        ctx.category_filter.clone(),
                    )
                },
            )
            .await?;

            eligible = found
                .into_iter()
                .filter(|item| !item.is_expired(ctx.now))
                .filter(|item| !visited.contains(&item.id))
                .collect();

            if eligible.len() >= self.config.min_candidates {
                break;
            }
        }

        tracing::debug!(
            user_id = %ctx.profile.id,
            radius_km = used_radius,
            count = eligible.len(),
            "Candidate generation finished"
        );

        if eligible.is_empty() {
            return Err(AppError::EmptyCandidateSet {
                user_id: ctx.profile.id,
                radius_km: used_radius,
            });
        }

        // Deterministic base order; downstream stages re-sort by score
        eligible.sort_by_key(|item| item.id);
        eligible.dedup_by_key(|item| item.id);
        eligible.truncate(self.config.max_candidates);

        Ok(CandidateSet {
            items: eligible,
            radius_km: used_radius,
        })
    }

    /// Item ids the user marked visited within the exclusion window
    fn visited_within_window(&self, ctx: &UserContext) -> HashSet<ItemId> {
        let threshold = ctx.now - self.config.exclusion_window;
        ctx.interactions
            .iter()
            .filter(|i| i.kind == InteractionKind::Visit && i.at >= threshold)
            .map(|i| i.item_id)
            .collect()
    }
}
