use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Application-level errors
///
/// Every failure carries its kind plus enough context for the API layer to map
/// it without parsing message text. The enum is `Clone` so a single pipeline
/// failure can be handed to every coalesced cache waiter.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AppError {
    #[error("no location available for user {user_id}")]
    MissingLocation { user_id: Uuid },

    #[error("no eligible candidates for user {user_id} within {radius_km} km")]
    EmptyCandidateSet { user_id: Uuid, radius_km: f64 },

    #[error("invalid scoring weights: {reason}")]
    InvalidWeightConfig { reason: String },

    #[error("invalid page size {got}: must be between {min} and {max}")]
    InvalidPageSize { got: usize, min: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("store error during {op}: {message}")]
    Store { op: &'static str, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, exposed in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingLocation { .. } => "missing_location",
            AppError::EmptyCandidateSet { .. } => "empty_candidate_set",
            AppError::InvalidWeightConfig { .. } => "invalid_weight_config",
            AppError::InvalidPageSize { .. } => "invalid_page_size",
            AppError::InvalidConfig(_) => "invalid_config",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Store { .. } => "store_error",
            AppError::Internal(_) => "internal",
        }
    }

    /// Transient failures are eligible for read-retry; everything else is not
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Store { .. })
    }

    /// User-input/data conditions that surface as an empty result with a
    /// reason rather than a failure status
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            AppError::MissingLocation { .. } | AppError::EmptyCandidateSet { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Empty-result conditions are not failures from the caller's view
        if self.is_empty_result() {
            let body = Json(json!({
                "items": [],
                "reason": self.to_string(),
                "kind": self.kind(),
            }));
            return (StatusCode::OK, body).into_response();
        }

        let status = match self {
            AppError::InvalidWeightConfig { .. }
            | AppError::InvalidPageSize { .. }
            | AppError::InvalidConfig(_)
            | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_transient() {
        let err = AppError::Store {
            op: "find_items_near",
            message: "connection reset".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.kind(), "store_error");
    }

    #[test]
    fn test_config_errors_are_not_transient() {
        let err = AppError::InvalidWeightConfig {
            reason: "sum is 0.9".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_empty_result());
    }

    #[test]
    fn test_empty_result_conditions() {
        let missing = AppError::MissingLocation {
            user_id: Uuid::new_v4(),
        };
        let empty = AppError::EmptyCandidateSet {
            user_id: Uuid::new_v4(),
            radius_km: 50.0,
        };
        assert!(missing.is_empty_result());
        assert!(empty.is_empty_result());
    }
}
