use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::payments::GatewayError;
use super::principal::DirectoryError;
use super::repository::StoreError;

/// User-visible failure taxonomy for every marketplace operation.
///
/// Business-rule failures are recovered at the operation boundary and
/// rendered as one of these; nothing is silently swallowed. Internal detail
/// is logged at the HTTP boundary and never serialized to the caller.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),
    #[error("missing or invalid session")]
    Authentication,
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("payment gateway failure: {0}")]
    ExternalService(String),
    #[error("unexpected internal failure")]
    Internal(String),
}

impl MarketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketError::Validation(_) => StatusCode::BAD_REQUEST,
            MarketError::Authentication => StatusCode::UNAUTHORIZED,
            MarketError::Authorization(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Conflict(_) => StatusCode::CONFLICT,
            MarketError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            MarketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        if let MarketError::Internal(detail) = &self {
            tracing::error!(%detail, "internal failure surfaced to caller");
        }
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<StoreError> for MarketError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict => {
                MarketError::Conflict("conflicting concurrent update".to_string())
            }
            StoreError::NotFound => MarketError::NotFound("record not found".to_string()),
            StoreError::Unavailable(detail) => MarketError::Internal(detail),
        }
    }
}

impl From<DirectoryError> for MarketError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound => MarketError::NotFound("principal not found".to_string()),
            DirectoryError::Unavailable(detail) => MarketError::Internal(detail),
        }
    }
}

impl From<GatewayError> for MarketError {
    fn from(value: GatewayError) -> Self {
        MarketError::ExternalService(value.to_string())
    }
}
