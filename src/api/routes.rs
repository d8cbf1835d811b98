use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", get(handlers::recommend))
        .route("/interactions", post(handlers::record_interaction))
        .route("/items", post(handlers::create_item))
        .route("/items/:id", get(handlers::get_item))
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
}
