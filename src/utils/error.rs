use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::repository::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient capacity: {0}")]
    CapacityError(String),

    #[error("Conflict: {0}")]
    ConflictError(String),

    #[error("Database error")]
    DatabaseError(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityError(_) => StatusCode::CONFLICT,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CapacityError(_) => "CAPACITY_ERROR",
            AppError::ConflictError(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::CapacityError(msg)
            | AppError::ConflictError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::CapacityError(msg)
            | AppError::ConflictError(msg) => msg.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_and_conflict_both_map_to_409() {
        let capacity = AppError::CapacityError("not enough seats".to_string());
        let conflict = AppError::ConflictError("concurrent update".to_string());

        assert_eq!(capacity.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        // Distinct codes let clients tell "ask for fewer seats" from "retry".
        assert_ne!(capacity.code(), conflict.code());
    }

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::ValidationError("seats must be positive".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
