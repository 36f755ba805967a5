//! Auth API errors
//! Mission: Map failures to generic client responses without leaking internals

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Invalid or expired session")]
    InvalidSession,
    #[error("User not found")]
    UserNotFound,
    #[error("Too many login attempts")]
    TooManyAttempts { retry_after_secs: u64 },
    #[error("Internal server error")]
    Internal,
}

impl AuthApiError {
    /// Log the underlying cause server-side and hand back the generic 500.
    pub fn internal(context: &str, cause: impl Display) -> Self {
        error!("{}: {:#}", context, cause);
        AuthApiError::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthApiError::MissingCredentials => StatusCode::BAD_REQUEST,
            AuthApiError::InvalidCredentials
            | AuthApiError::Unauthenticated
            | AuthApiError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthApiError::UserNotFound => StatusCode::NOT_FOUND,
            AuthApiError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        let mut response = (self.status(), body).into_response();

        if let AuthApiError::TooManyAttempts { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
