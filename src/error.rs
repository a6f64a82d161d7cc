use thiserror::Error;

use crate::models::envelope::Envelope;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The backing store is unreachable or rejected the credentials.
    #[error("Connection failed: {0}")]
    ConnectFailure(String),

    /// A statement reached the store and failed there.
    #[error("Query failed: {0}")]
    QueryFailure(String),

    /// The pool had no idle connection and a fresh one could not be opened.
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The session token is unknown.
    #[error("Invalid token")]
    InvalidToken,

    /// The session token was found but its inactivity window has elapsed.
    #[error("Expired token")]
    ExpiredToken,

    /// The request envelope could not be decoded.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No handler is registered under the requested API name.
    #[error("API not found: {0}")]
    RouteNotFound(String),

    /// A handler was registered twice under the same API name.
    #[error("Duplicate route: {0}")]
    DuplicateRoute(String),

    /// A column was missing or had an unexpected type.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A valid session without the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP-style status code carried in the response envelope.
    pub fn code(&self) -> u16 {
        match self {
            AppError::MalformedRequest(_) | AppError::Validation(_) => 400,
            AppError::InvalidToken | AppError::ExpiredToken | AppError::Authentication(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::RouteNotFound(_) | AppError::NotFound(_) => 404,
            AppError::DuplicateRoute(_) | AppError::Conflict(_) => 409,
            AppError::ConnectFailure(_)
            | AppError::QueryFailure(_)
            | AppError::PoolExhausted(_)
            | AppError::MissingData(_)
            | AppError::Internal(_)
            | AppError::Io(_) => 500,
        }
    }

    /// Logs the error and converts it into an error envelope.
    ///
    /// Store and pool failures are reported to the caller with a generic
    /// message; their details only reach the log.
    pub fn into_envelope(self) -> Envelope {
        let code = self.code();
        let message = match self {
            AppError::ConnectFailure(ref e) => {
                tracing::error!("Connection failure: {}", e);
                "Internal server error".to_string()
            }

            AppError::QueryFailure(ref e) => {
                tracing::error!("Query failure: {}", e);
                "Internal server error".to_string()
            }

            AppError::PoolExhausted(ref e) => {
                tracing::error!("Connection pool exhausted: {}", e);
                "Internal server error".to_string()
            }

            AppError::MissingData(ref e) => {
                tracing::error!("Row decode failure: {}", e);
                "Internal server error".to_string()
            }

            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                "Internal server error".to_string()
            }

            AppError::InvalidToken => {
                tracing::warn!("Rejected unknown session token");
                "Invalid authentication token".to_string()
            }

            AppError::ExpiredToken => {
                tracing::warn!("Rejected expired session token");
                "Authentication token expired".to_string()
            }

            AppError::Authentication(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg
            }

            AppError::Forbidden(msg) => {
                tracing::warn!("Authorization failed: {}", msg);
                msg
            }

            AppError::MalformedRequest(msg) => {
                tracing::debug!("Malformed request: {}", msg);
                msg
            }

            AppError::RouteNotFound(api) => {
                tracing::debug!("Unknown API: {}", api);
                format!("API not found: {}", api)
            }

            AppError::DuplicateRoute(api) => {
                tracing::error!("Duplicate route registration: {}", api);
                format!("Duplicate route: {}", api)
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                msg
            }

            AppError::Conflict(msg) => {
                tracing::debug!("Conflict: {}", msg);
                msg
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg
            }
        };

        Envelope::error(code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_error_taxonomy() {
        assert_eq!(AppError::MalformedRequest("x".into()).code(), 400);
        assert_eq!(AppError::ExpiredToken.code(), 401);
        assert_eq!(AppError::Forbidden("x".into()).code(), 403);
        assert_eq!(AppError::RouteNotFound("x".into()).code(), 404);
        assert_eq!(AppError::DuplicateRoute("x".into()).code(), 409);
        assert_eq!(AppError::PoolExhausted("x".into()).code(), 500);
    }

    #[test]
    fn resource_errors_do_not_leak_details() {
        let envelope =
            AppError::ConnectFailure("password authentication failed for user admin".into())
                .into_envelope();
        assert_eq!(envelope.code, 500);
        assert_eq!(envelope.message, "Internal server error");
        assert!(!envelope.encode().contains("admin"));
    }
}
