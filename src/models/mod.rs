use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type ItemId = Uuid;

/// Mean earth radius in kilometers, used for haversine distance
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Grid size in degrees for cache-key location bucketing (~1.1 km at the
/// equator). Requests from nearby locations share a bucket and a cache entry.
const GEO_BUCKET_DEGREES: f64 = 0.01;

/// A WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to another point, in kilometers
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }

    /// Snaps the point onto the bucketing grid used in cache keys
    pub fn bucket(&self) -> (i32, i32) {
        (
            (self.lat / GEO_BUCKET_DEGREES).floor() as i32,
            (self.lon / GEO_BUCKET_DEGREES).floor() as i32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Place,
    Event,
}

/// A recommendable catalog entry: a tourist place or an event
///
/// Places are permanent; events carry a validity window and stop being
/// eligible once `ends_at` has passed. Popularity is maintained by an
/// external ingestion process and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub location: GeoPoint,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl Item {
    /// An event past its end is no longer recommendable; places never expire
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.kind {
            ItemKind::Place => false,
            ItemKind::Event => self.ends_at.map(|end| end < now).unwrap_or(false),
        }
    }

    /// Lowercased category plus tags, the vocabulary content matching runs on
    pub fn category_terms(&self) -> HashSet<String> {
        let mut terms: HashSet<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        terms.insert(self.category.trim().to_lowercase());
        terms
    }
}

/// A user's profile as the recommendation core sees it: read-only, mutated
/// only through explicit profile-update calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    /// Optional explicit per-category weights; presence switches content
    /// similarity from Jaccard overlap to weighted cosine
    #[serde(default)]
    pub preference_weights: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub home: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Click,
    Share,
    Save,
    Visit,
    Like,
    Rate,
}

/// A single user-item interaction event; append-only from the core's view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: InteractionKind,
    /// 1-5, required for `rate`; recording rejects it on any other kind
    #[serde(default)]
    pub rating: Option<u8>,
    pub at: DateTime<Utc>,
}

impl Interaction {
    /// Affinity strength of this interaction before time decay
    ///
    /// Ratings map linearly onto [0.2, 1.0] so a 1-star rating still counts
    /// for less than a like.
    pub fn strength(&self) -> f64 {
        match self.kind {
            InteractionKind::View => 0.1,
            InteractionKind::Click => 0.2,
            InteractionKind::Share => 0.3,
            InteractionKind::Save => 0.5,
            InteractionKind::Visit => 0.7,
            InteractionKind::Like => 0.8,
            InteractionKind::Rate => match self.rating {
                Some(r) => f64::from(r.clamp(1, 5)) / 5.0,
                None => 0.0,
            },
        }
    }
}

/// The per-request snapshot a pipeline run computes from
///
/// Everything the pipeline needs is fetched once when the request starts;
/// concurrent writes by other requests are never reflected mid-pipeline.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub profile: UserProfile,
    pub location: GeoPoint,
    pub category_filter: Option<String>,
    pub interactions: Vec<Interaction>,
    pub now: DateTime<Utc>,
}

/// Transient, per-request set of items eligible for scoring
///
/// Carries full item records rather than ids so downstream stages work from
/// the same catalog snapshot the generator saw.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub items: Vec<Item>,
    /// The ladder radius that satisfied the minimum candidate count
    pub radius_km: f64,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Normalized per-component scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub content: f64,
    pub collaborative: f64,
    pub popularity: f64,
    pub proximity: f64,
}

/// A candidate with its combined score and the components it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub item_id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    pub score: f64,
    pub components: ScoreComponents,
}

/// One entry of a final recommendation page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    pub score: f64,
    pub components: ScoreComponents,
}

impl From<ScoredCandidate> for RecommendedItem {
    fn from(c: ScoredCandidate) -> Self {
        Self {
            item_id: c.item_id,
            name: c.name,
            kind: c.kind,
            category: c.category,
            score: c.score,
            components: c.components,
        }
    }
}

/// Final ordered recommendation page for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub items: Vec<RecommendedItem>,
    pub page: usize,
    pub page_size: usize,
    /// Ranked candidates across all pages
    pub total: usize,
    pub generated_at: DateTime<Utc>,
}
