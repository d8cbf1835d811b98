use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::RecommendRequest;
use crate::error::{AppError, AppResult};
use crate::models::{
    GeoPoint, Interaction, InteractionKind, Item, ItemKind, Recommendation, UserProfile,
};

use super::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: Uuid,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct RecordInteractionRequest {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub kind: InteractionKind,
    pub rating: Option<u8>,
    /// Defaults to the server clock when absent
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub location: GeoPoint,
    #[serde(default)]
    pub popularity: f64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    pub preference_weights: Option<std::collections::HashMap<String, f64>>,
    pub home: Option<GeoPoint>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ordered, paginated recommendations for a user
pub async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> AppResult<Json<Recommendation>> {
    let location = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        (None, None) => None,
        _ => {
            return Err(AppError::InvalidInput(
                "lat and lon must be provided together".to_string(),
            ))
        }
    };

    let recommendation = state
        .recommender
        .recommend(RecommendRequest {
            user_id: query.user_id,
            location,
            category: query.category,
            page: query.page,
            page_size: query.page_size,
        })
        .await?;

    Ok(Json(recommendation))
}

/// Records one user-item interaction
pub async fn record_interaction(
    State(state): State<AppState>,
    Json(request): Json<RecordInteractionRequest>,
) -> AppResult<StatusCode> {
    state
        .recommender
        .record_interaction(Interaction {
            user_id: request.user_id,
            item_id: request.item_id,
            kind: request.kind,
            rating: request.rating,
            at: request.at.unwrap_or_else(Utc::now),
        })
        .await?;

    Ok(StatusCode::CREATED)
}

/// Adds a place or event to the catalog
pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<Item>)> {
    if !request.location.is_valid() {
        return Err(AppError::InvalidInput(format!(
            "invalid coordinates: lat {} lon {}",
            request.location.lat, request.location.lon
        )));
    }
    if let (Some(starts), Some(ends)) = (request.starts_at, request.ends_at) {
        if ends < starts {
            return Err(AppError::InvalidInput(
                "ends_at must not precede starts_at".to_string(),
            ));
        }
    }

    let item = Item {
        id: Uuid::new_v4(),
        name: request.name,
        kind: request.kind,
        category: request.category,
        tags: request.tags,
        location: request.location,
        popularity: request.popularity,
        starts_at: request.starts_at,
        ends_at: request.ends_at,
    };

    state.catalog.upsert_item(item.clone()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Fetches one catalog item by id
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    state
        .catalog
        .get_item(item_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))
}

/// Registers a user profile
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    if let Some(home) = &request.home {
        if !home.is_valid() {
            return Err(AppError::InvalidInput(format!(
                "invalid coordinates: lat {} lon {}",
                home.lat, home.lon
            )));
        }
    }

    let profile = UserProfile {
        id: Uuid::new_v4(),
        name: request.name,
        preferred_categories: request.preferred_categories,
        preference_weights: request.preference_weights,
        home: request.home,
    };

    state.profiles.upsert_profile(profile.clone()).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Fetches one user profile by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    state
        .profiles
        .get_profile(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
}
