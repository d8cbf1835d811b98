//! In-memory store implementations backing the server and the test suite.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::{GeoPoint, Interaction, Item, ItemId, UserId, UserProfile};
use crate::stores::{CatalogStore, InteractionStore, ProfileStore};

/// Catalog of places and events held in process memory
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<ItemId, Item>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_items_near(
        &self,
        location: GeoPoint,
        radius_km: f64,
        category: Option<String>,
    ) -> AppResult<Vec<Item>> {
        let items = self.items.read().await;
        let mut matches: Vec<Item> = items
            .values()
            .filter(|item| item.location.distance_km(&location) <= radius_km)
            .filter(|item| match &category {
                Some(c) => item.category.eq_ignore_ascii_case(c),
                None => true,
            })
            .cloned()
            .collect();

        // Stable order so repeated scans of the same data agree
        matches.sort_by_key(|item| item.id);
        Ok(matches)
    }

    async fn get_item(&self, id: ItemId) -> AppResult<Option<Item>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn upsert_item(&self, item: Item) -> AppResult<()> {
        self.items.write().await.insert(item.id, item);
        Ok(())
    }
}

/// Append-only interaction log held in process memory
#[derive(Clone, Default)]
pub struct InMemoryInteractions {
    by_user: Arc<RwLock<HashMap<UserId, Vec<Interaction>>>>,
}

impl InMemoryInteractions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InteractionStore for InMemoryInteractions {
    async fn record(&self, interaction: Interaction) -> AppResult<()> {
        self.by_user
            .write()
            .await
            .entry(interaction.user_id)
            .or_default()
            .push(interaction);
        Ok(())
    }

    async fn recent_interactions(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Interaction>> {
        let by_user = self.by_user.read().await;
        let mut recent: Vec<Interaction> = by_user
            .get(&user_id)
            .map(|all| all.iter().filter(|i| i.at >= since).cloned().collect())
            .unwrap_or_default();
        recent.sort_by_key(|i| i.at);
        Ok(recent)
    }
}

/// User profiles held in process memory
#[derive(Clone, Default)]
pub struct InMemoryProfiles {
    profiles: Arc<RwLock<HashMap<UserId, UserProfile>>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfiles {
    async fn get_profile(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<()> {
        self.profiles.write().await.insert(profile.id, profile);
        Ok(())
    }
}
