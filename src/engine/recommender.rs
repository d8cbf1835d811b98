use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::EngineConfig;
use crate::engine::cache::{CacheKey, RecommendationCache};
use crate::engine::candidates::CandidateGenerator;
use crate::engine::features::FeatureBuilder;
use crate::engine::ranking::Ranker;
use crate::engine::scoring::ScoringEngine;
use crate::error::{AppError, AppResult};
use crate::models::{
    GeoPoint, Interaction, InteractionKind, Item, ItemId, Recommendation, UserContext, UserId,
    UserProfile,
};
use crate::stores::{with_read_retry, CatalogStore, InteractionStore, ProfileStore};

/// One recommendation request as the caller hands it in
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub user_id: UserId,
    pub location: Option<GeoPoint>,
    pub category: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

/// Runs the full pipeline: candidates, features, scoring, ranking, behind the
/// coalescing cache
///
/// All store reads happen once at pipeline start into a per-request snapshot;
/// the rest of the pipeline is pure computation, so a result is always
/// internally consistent regardless of concurrent writes.
#[derive(Clone)]
pub struct Recommender {
    catalog: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionStore>,
    profiles: Arc<dyn ProfileStore>,
    config: Arc<EngineConfig>,
    generator: CandidateGenerator,
    features: FeatureBuilder,
    scoring: Arc<ScoringEngine>,
    cache: RecommendationCache,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender").finish_non_exhaustive()
    }
}

impl Recommender {
    /// Wires the pipeline together; fails fast when the configured weights
    /// are invalid
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionStore>,
        profiles: Arc<dyn ProfileStore>,
        config: EngineConfig,
    ) -> AppResult<Self> {
        let config = Arc::new(config);
        let scoring = Arc::new(ScoringEngine::new(config.weights)?);
        Ok(Self {
            generator: CandidateGenerator::new(Arc::clone(&catalog), Arc::clone(&config)),
            features: FeatureBuilder::new(Arc::clone(&config)),
            cache: RecommendationCache::new(config.cache_ttl),
            catalog,
            interactions,
            profiles,
            config,
            scoring,
        })
    }

    /// The one caller-facing operation: an ordered, paginated recommendation
    /// for a user
    pub async fn recommend(&self, request: RecommendRequest) -> AppResult<Recommendation> {
        // Contract violations are rejected before any store or cache work
        Ranker::check_paging(request.page, request.page_size)?;
        if let Some(location) = &request.location {
            if !location.is_valid() {
                return Err(AppError::InvalidInput(format!(
                    "invalid coordinates: lat {} lon {}",
                    location.lat, location.lon
                )));
            }
        }

        let profile = self.load_profile(request.user_id).await?;
        let location = request
            .location
            .or(profile.home)
            .ok_or(AppError::MissingLocation {
                user_id: request.user_id,
            })?;

        let key = CacheKey {
            user_id: request.user_id,
            geo_bucket: location.bucket(),
            category: request.category.clone(),
            page: request.page,
            page_size: request.page_size,
        };

        let pipeline = self.clone();
        self.cache
            .get_or_compute(key, move || async move {
                pipeline.run_pipeline(profile, location, request).await
            })
            .await
    }

    /// Records an interaction and drops the user's cached recommendations
    ///
    /// The write itself is attempted exactly once; redelivery on transient
    /// failure belongs to the persistence layer, not the core.
    pub async fn record_interaction(&self, interaction: Interaction) -> AppResult<()> {
        match interaction.kind {
            InteractionKind::Rate => match interaction.rating {
                Some(r) if (1..=5).contains(&r) => {}
                Some(r) => {
                    return Err(AppError::InvalidInput(format!(
                        "rating must be between 1 and 5, got {}",
                        r
                    )))
                }
                None => {
                    return Err(AppError::InvalidInput(
                        "rate interactions require a rating".to_string(),
                    ))
                }
            },
            _ if interaction.rating.is_some() => {
                return Err(AppError::InvalidInput(
                    "only rate interactions carry a rating".to_string(),
                ));
            }
            _ => {}
        }

        // Every interaction must reference an existing user and item
        self.load_profile(interaction.user_id).await?;
        let item = with_read_retry(
            "get_item",
            self.config.store_read_retries,
            self.config.retry_backoff,
            || self.catalog.get_item(interaction.item_id),
        )
        .await?;
        if item.is_none() {
            return Err(AppError::NotFound(format!(
                "item {}",
                interaction.item_id
            )));
        }

        let user_id = interaction.user_id;
        self.interactions.record(interaction).await?;
        self.cache.invalidate_user(user_id);

        tracing::info!(user_id = %user_id, "Interaction recorded, cache invalidated");
        Ok(())
    }

    async fn load_profile(&self, user_id: UserId) -> AppResult<UserProfile> {
        with_read_retry(
            "get_profile",
            self.config.store_read_retries,
            self.config.retry_backoff,
            || self.profiles.get_profile(user_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    async fn run_pipeline(
        &self,
        profile: UserProfile,
        location: GeoPoint,
        request: RecommendRequest,
    ) -> AppResult<Recommendation> {
        let now = Utc::now();
        // Fetch back to the wider of the two windows: a visit inside the
        // exclusion window must be visible even when the affinity lookback
        // is configured shorter
        let since = now
            - std::cmp::max(
                self.config.interaction_lookback,
                self.config.exclusion_window,
            );

        let interactions = with_read_retry(
            "recent_interactions",
            self.config.store_read_retries,
            self.config.retry_backoff,
            || self.interactions.recent_interactions(request.user_id, since),
        )
        .await?;

        let ctx = UserContext {
            profile,
            location,
            category_filter: request.category.clone(),
            interactions,
            now,
        };

        let candidates = self.generator.generate(&ctx).await?;
        let interacted = self.interacted_snapshot(&ctx).await?;
        let features = self.features.build(&ctx, &candidates, &interacted);
        let scored = self.scoring.score(&candidates, &features);

        let ranker = Ranker::new(self.config.max_per_category);
        let recommendation = ranker.rank(scored, request.user_id, request.page, request.page_size)?;

        tracing::info!(
            user_id = %request.user_id,
            candidates = candidates.len(),
            returned = recommendation.items.len(),
            page = request.page,
            radius_km = candidates.radius_km,
            "Recommendation computed"
        );

        Ok(recommendation)
    }

    /// Catalog snapshot of the items the user's history references, fetched
    /// once so affinity is computed against consistent data
    async fn interacted_snapshot(&self, ctx: &UserContext) -> AppResult<HashMap<ItemId, Item>> {
        let mut distinct: Vec<ItemId> = ctx.interactions.iter().map(|i| i.item_id).collect();
        distinct.sort();
        distinct.dedup();

        let mut snapshot = HashMap::with_capacity(distinct.len());
        for item_id in distinct {
            let item = with_read_retry(
                "get_item",
                self.config.store_read_retries,
                self.config.retry_backoff,
                || self.catalog.get_item(item_id),
            )
            .await?;
            // Items deleted from the catalog simply stop contributing
            if let Some(item) = item {
                snapshot.insert(item_id, item);
            }
        }
        Ok(snapshot)
    }
}
