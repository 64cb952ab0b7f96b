use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::workflow::WorkflowError;

/// API-boundary error taxonomy. Every failure renders the same envelope:
/// `{"success": false, "error": <message>}` with the mapped status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn not_found(what: &str, id: &str) -> ApiError {
        ApiError::NotFound(format!("{what} with ID {id} not found"))
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidStatus(_) => ApiError::Validation(err.to_string()),
            WorkflowError::Unauthorized => ApiError::Forbidden(err.to_string()),
            WorkflowError::AlreadyFinalized(_) | WorkflowError::StaleStatus { .. } => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Database(err) = self {
            log::error!("Database error: {err}");
        }
        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "error": self.to_string() }))
    }
}

/// Malformed or mistyped JSON bodies surface as 400s in the same envelope
/// as every other validation failure.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    let message = err.to_string();
    actix_web::error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(json!({ "success": false, "error": message })),
    )
    .into()
}
