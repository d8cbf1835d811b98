use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{GeoPoint, Interaction, Item, ItemId, UserId, UserProfile};

pub mod memory;

pub use memory::{InMemoryCatalog, InMemoryInteractions, InMemoryProfiles};

/// Read access to the place/event catalog
///
/// The catalog is owned by an external ingestion process; the recommendation
/// core only reads from it. `upsert_item` exists for that ingestion path and
/// the in-memory backing used by the server and tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// All non-deleted items within `radius_km` of `location`, optionally
    /// restricted to one category
    async fn find_items_near(
        &self,
        location: GeoPoint,
        radius_km: f64,
        category: Option<String>,
    ) -> AppResult<Vec<Item>>;

    async fn get_item(&self, id: ItemId) -> AppResult<Option<Item>>;

    async fn upsert_item(&self, item: Item) -> AppResult<()>;
}

/// Append-only log of user-item interactions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionStore: Send + Sync {
    /// Records one interaction. Never retried by the core: at-most-once from
    /// this side, redelivery is the persistence layer's concern.
    async fn record(&self, interaction: Interaction) -> AppResult<()>;

    /// Interactions for one user at or after `since`, oldest first
    async fn recent_interactions(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Interaction>>;
}

/// User profile lookup and explicit profile updates
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: UserId) -> AppResult<Option<UserProfile>>;

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<()>;
}

/// Runs a read-only store call, retrying transient failures a bounded number
/// of times with linear backoff
///
/// Only errors flagged transient (store I/O) are retried; contract violations
/// and data conditions pass straight through. Write calls must not go through
/// this helper.
pub async fn with_read_retry<T, F, Fut>(
    op: &'static str,
    retries: u32,
    backoff: Duration,
    f: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                tracing::warn!(op, attempt, error = %e, "Transient store failure, retrying");
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}
