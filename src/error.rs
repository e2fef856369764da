use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Why a credential did not resolve to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, wrong scheme, or an empty bearer token.
    NoToken,
    /// Signature, expiry or structure check failed.
    InvalidToken,
    /// The token is valid but its subject no longer exists.
    UserNotFound,
    /// `check_role` was reached without a resolved caller.
    NoCaller,
    /// Login with an unknown email or a wrong password.
    InvalidCredentials,
}

/// ApiError
///
/// The structured outcome of a failed guard or handler. Every variant maps to
/// one HTTP status and one stable machine-readable code, and is rendered as
/// `{"error": ..., "code": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized(AuthFailure),
    #[error("role not permitted for this operation")]
    Forbidden,
    #[error("resource belongs to another user")]
    NotOwner,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotOwner => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(AuthFailure::NoToken) => "NO_TOKEN",
            Self::Unauthorized(AuthFailure::InvalidToken) => "INVALID_TOKEN",
            Self::Unauthorized(AuthFailure::UserNotFound) => "USER_NOT_FOUND",
            Self::Unauthorized(AuthFailure::NoCaller) => "UNAUTHENTICATED",
            Self::Unauthorized(AuthFailure::InvalidCredentials) => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::NotOwner => "NOT_OWNER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }
}

/// ErrorBody
///
/// JSON body returned for every API failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// RepositoryError
///
/// Failures surfaced by the persistence collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => ApiError::Conflict(message),
            RepositoryError::Database(e) => {
                tracing::error!(error = ?e, "repository failure");
                ApiError::Internal
            }
        }
    }
}
