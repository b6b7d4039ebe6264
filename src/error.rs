use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::{otp::OtpError, password::HashError, repo::StoreError};

/// Caller-visible failure classes. Transports map these to their own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("user not found")]
    UserNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email not verified")]
    NotVerified,

    #[error("account is blocked")]
    Blocked,

    #[error("invalid otp")]
    InvalidOtp,

    #[error("otp expired")]
    OtpExpired,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::InvalidOtp | AuthError::OtpExpired => {
                ErrorKind::Validation
            }
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => ErrorKind::Unauthorized,
            AuthError::NotVerified | AuthError::Blocked | AuthError::Forbidden(_) => {
                ErrorKind::Forbidden
            }
            AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AuthError::Validation(msg.into())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict("users.email") => AuthError::EmailTaken,
            StoreError::Conflict(what) => {
                AuthError::Internal(anyhow::anyhow!("unique constraint violated: {what}"))
            }
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(e: HashError) -> Self {
        AuthError::Internal(e.into())
    }
}

impl From<OtpError> for AuthError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::UnknownUser => AuthError::UserNotFound,
            OtpError::NotFound => AuthError::InvalidOtp,
            OtpError::Expired => AuthError::OtpExpired,
            OtpError::Store(e) => e.into(),
        }
    }
}
