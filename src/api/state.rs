use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::Recommender;
use crate::error::AppResult;
use crate::stores::{
    CatalogStore, InMemoryCatalog, InMemoryInteractions, InMemoryProfiles, InteractionStore,
    ProfileStore,
};

/// Shared application state
///
/// Stores are trait objects so the in-memory backends can be swapped for
/// persistent ones without touching the handlers or the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub catalog: Arc<dyn CatalogStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    /// Builds the state on in-memory stores; fails when the engine
    /// configuration is invalid
    pub fn in_memory(config: EngineConfig) -> AppResult<Self> {
        let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());
        let interactions: Arc<dyn InteractionStore> = Arc::new(InMemoryInteractions::new());
        let profiles: Arc<dyn ProfileStore> = Arc::new(InMemoryProfiles::new());

        let recommender = Recommender::new(
            Arc::clone(&catalog),
            Arc::clone(&interactions),
            Arc::clone(&profiles),
            config,
        )?;

        Ok(Self {
            recommender,
            catalog,
            interactions,
            profiles,
        })
    }
}
