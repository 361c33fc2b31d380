use std::collections::HashMap;

use auth_identity::{IdentityError, PaginationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;
use validator::ValidationErrors;

const INVALID_REQUEST_MESSAGE: &str = "invalid request: some or all request parameters are invalid";

/// Error body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Stable machine-readable code, e.g. `USER_EXISTS`
    pub code: String,
    pub message: String,
    /// Correlates the response with the server log line
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    InvalidRequest {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("user with the given email or username already exists")]
    UserExists,

    #[error("resource not found with given parameters")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("pagination query is invalid: {0}")]
    Pagination(#[from] PaginationError),

    #[error("internal server error occurred")]
    Internal(#[source] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest { .. } | ApiError::UserExists | ApiError::Pagination(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest { .. } => "INVALID_REQUEST",
            ApiError::UserExists => "USER_EXISTS",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Pagination(_) => "PAGINATION_QUERY_MISSING",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound => ApiError::NotFound,
            IdentityError::Conflict => ApiError::UserExists,
            IdentityError::Unauthorized => ApiError::Unauthorized,
            IdentityError::MissingFields => ApiError::invalid_request(
                "invalid request: at least one of username, email, role or avatar must be provided",
            ),
            IdentityError::Internal(cause) => ApiError::Internal(cause),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        ApiError::InvalidRequest {
            message: INVALID_REQUEST_MESSAGE.to_string(),
            field_errors: Some(field_errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        match &self {
            ApiError::Internal(cause) => error!(
                error_id = %error_id,
                code = self.code(),
                status_code = status_code.as_u16(),
                error = %format!("{cause:#}"),
                "request failed"
            ),
            _ => warn!(
                error_id = %error_id,
                code = self.code(),
                status_code = status_code.as_u16(),
                error = %self,
                "request rejected"
            ),
        }

        let code = self.code().to_string();
        // Display for Internal is the fixed generic message; causes stay in the log.
        let message = self.to_string();
        let field_errors = match self {
            ApiError::InvalidRequest { field_errors, .. } => field_errors,
            _ => None,
        };

        let body = ApiErrorResponse {
            code,
            message,
            error_id,
            field_errors,
            timestamp: chrono::Utc::now(),
        };

        (status_code, Json(body)).into_response()
    }
}
