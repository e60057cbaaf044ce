//! Failure taxonomy shared by every admin operation.
//!
//! Handlers never let a raw error escape: everything is folded into
//! [`AdminError`] and rendered as `{ "error": message }` with a 4xx/5xx status.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::permissions::GrantRejected;

/// Fixed message shown whenever the server rejects the session's credentials.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Why a connection could not be handed out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    #[error("database server unreachable: {0}")]
    Unreachable(String),
    #[error("timed out connecting to database server")]
    Timeout,
    #[error("credentials rejected by database server")]
    Unauthorized,
}

#[derive(Debug, Error)]
pub enum AdminError {
    /// Missing or malformed request fields, reported verbatim.
    #[error("{0}")]
    Validation(String),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("{0}")]
    ConnectFailure(ConnectFailure),
    #[error("{}", INVALID_CREDENTIALS)]
    Unauthorized,
    /// The server refused the administrative command; message comes from the server.
    #[error("{0}")]
    CommandRejected(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdminError {
    pub fn validation(message: impl Into<String>) -> Self {
        AdminError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::Validation(_) => StatusCode::BAD_REQUEST,
            AdminError::Unauthenticated | AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::ConnectFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::CommandRejected(_) | AdminError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the response body. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AdminError::ConnectFailure(_) => "Failed to connect to database server".to_string(),
            AdminError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ConnectFailure> for AdminError {
    fn from(failure: ConnectFailure) -> Self {
        match failure {
            ConnectFailure::Unauthorized => AdminError::Unauthorized,
            other => AdminError::ConnectFailure(other),
        }
    }
}

impl From<GrantRejected> for AdminError {
    fn from(rejected: GrantRejected) -> Self {
        AdminError::Validation(rejected.to_string())
    }
}

impl From<JsonRejection> for AdminError {
    fn from(rejection: JsonRejection) -> Self {
        AdminError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match &self {
            AdminError::ConnectFailure(failure) => {
                tracing::warn!(%failure, "connection to database server failed")
            }
            AdminError::CommandRejected(message) => {
                tracing::warn!(%message, "administrative command rejected")
            }
            AdminError::Internal(detail) => tracing::error!(%detail, "internal failure"),
            _ => {}
        }

        let status = self.status();
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_connect_failure_uses_fixed_message() {
        let err = AdminError::from(ConnectFailure::Unauthorized);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), INVALID_CREDENTIALS);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AdminError::Internal("bson encode blew up".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");

        let err = AdminError::from(ConnectFailure::Timeout);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.public_message(), "Failed to connect to database server");
    }

    #[test]
    fn test_command_rejection_passes_server_message() {
        let err = AdminError::CommandRejected("User \"alice@admin\" already exists".into());
        assert_eq!(err.public_message(), "User \"alice@admin\" already exists");
    }
}
