//! OAuth2 protocol error taxonomy
//!
//! Every rejection the simulators produce is one of these variants. The
//! wire shape is fixed: `{"error": "<code>", "error_description": "<text>"}`
//! with the status returned by [`OAuthError::status`]. The proxy under test
//! keys its retry/redirect decisions off both, so neither may drift.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Description used whenever the `Authorization` header is absent.
pub const FULL_AUTHENTICATION_REQUIRED: &str =
    "Full authentication is required to access this resource";

/// Protocol validation errors surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_client: {0}")]
    InvalidClient(String),

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid_token: {0}")]
    InvalidToken(String),

    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    #[error("invalid_scope: {0}")]
    InvalidScope(String),
}

/// JSON error body. Field order is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl OAuthError {
    /// The RFC 6749 style error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidToken(_) => "invalid_token",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) | Self::Unauthorized(_) | Self::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedResponseType(_)
            | Self::InvalidScope(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::Unauthorized(d)
            | Self::InvalidToken(d)
            | Self::UnsupportedResponseType(d)
            | Self::InvalidScope(d) => d,
        }
    }

    /// Single mapping from a variant to its `(status, body)` pair.
    pub fn to_parts(&self) -> (StatusCode, ErrorBody) {
        (
            self.status(),
            ErrorBody {
                error: self.code().to_owned(),
                error_description: self.description().to_owned(),
            },
        )
    }

    /// Missing `Authorization` header.
    pub fn authentication_required() -> Self {
        Self::Unauthorized(FULL_AUTHENTICATION_REQUIRED.to_owned())
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_parts();
        (status, Json(body)).into_response()
    }
}
