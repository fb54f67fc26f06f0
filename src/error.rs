/// Unified error types for the CrashKB backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the knowledge base core
#[derive(Error, Debug)]
pub enum KbError {
    /// Registration conflicts
    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Email already registered")]
    DuplicateEmail,

    /// Login failure; deliberately does not say which field was wrong
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Malformed, badly signed, superseded or revoked token
    #[error("Invalid token")]
    InvalidToken,

    /// Refresh token past its expiry; the caller must log in again
    #[error("Token expired, please log in again")]
    TokenExpired,

    /// No authenticated principal on a protected call
    #[error("Authentication required")]
    Unauthorized,

    #[error("User not found")]
    UserNotFound,

    #[error("Account is disabled")]
    AccountDisabled,

    /// Role or ownership check failed
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Workflow precondition violated
    #[error("Cannot {action}: current status must be {required}")]
    InvalidStateTransition {
        action: &'static str,
        required: &'static str,
    },

    #[error("Account already holds the admin role")]
    AlreadyPrivileged,

    #[error("Account does not hold the admin role")]
    NotPrivileged,

    #[error("A pending application already exists")]
    DuplicatePendingApplication,

    #[error("Admin application not found")]
    ApplicationNotFound,

    #[error("Admin application is not pending")]
    InvalidApplicationStatus,

    #[error("Solution not found")]
    SolutionNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Signing library faults (never a rejected token)
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KbError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            KbError::DuplicateUsername => "DuplicateUsername",
            KbError::DuplicateEmail => "DuplicateEmail",
            KbError::InvalidCredentials => "InvalidCredentials",
            KbError::InvalidToken => "InvalidToken",
            KbError::TokenExpired => "TokenExpired",
            KbError::Unauthorized => "Unauthorized",
            KbError::UserNotFound => "UserNotFound",
            KbError::AccountDisabled => "AccountDisabled",
            KbError::PermissionDenied(_) => "PermissionDenied",
            KbError::InvalidStateTransition { .. } => "InvalidStateTransition",
            KbError::AlreadyPrivileged => "AlreadyPrivileged",
            KbError::NotPrivileged => "NotPrivileged",
            KbError::DuplicatePendingApplication => "DuplicatePendingApplication",
            KbError::ApplicationNotFound => "ApplicationNotFound",
            KbError::InvalidApplicationStatus => "InvalidApplicationStatus",
            KbError::SolutionNotFound => "SolutionNotFound",
            KbError::CategoryNotFound => "CategoryNotFound",
            KbError::Validation(_) => "InvalidRequest",
            KbError::Database(_) | KbError::Jwt(_) | KbError::Internal(_) => {
                "InternalServerError"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            KbError::DuplicateUsername
            | KbError::DuplicateEmail
            | KbError::DuplicatePendingApplication => StatusCode::CONFLICT,
            KbError::InvalidCredentials
            | KbError::InvalidToken
            | KbError::TokenExpired
            | KbError::Unauthorized => StatusCode::UNAUTHORIZED,
            KbError::AccountDisabled | KbError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            KbError::UserNotFound
            | KbError::ApplicationNotFound
            | KbError::SolutionNotFound
            | KbError::CategoryNotFound => StatusCode::NOT_FOUND,
            KbError::InvalidStateTransition { .. }
            | KbError::AlreadyPrivileged
            | KbError::NotPrivileged
            | KbError::InvalidApplicationStatus
            | KbError::Validation(_) => StatusCode::BAD_REQUEST,
            KbError::Database(_) | KbError::Jwt(_) | KbError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body returned to API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert KbError to HTTP response
impl IntoResponse for KbError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            KbError::Database(_) | KbError::Jwt(_) | KbError::Internal(_) => {
                tracing::error!(error = %self, "Internal failure while handling request");
                "Internal server error".to_string() // Don't leak details
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for knowledge base operations
pub type KbResult<T> = Result<T, KbError>;
