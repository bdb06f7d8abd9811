// Error types for the NativiWeb client.
// Every failure leaving the HTTP layer is one of these tagged variants.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend could not be reached at all (refused connection, DNS, network).
    #[error("Backend unavailable at {base_url} ({detail})")]
    Connection { base_url: String, detail: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {message}")]
    Unauthorized { message: String },

    #[error("Access denied: {message}")]
    Forbidden { message: String },

    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// 4xx carrying a server-provided, user-facing message.
    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ApiError::Connection { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }

    /// HTTP status the error was classified from, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing directly to a user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Connection { base_url, .. } => format!(
                "Backend unavailable at {}. Start the backend server and try again.",
                base_url
            ),
            ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::Validation { message, .. }
            | ApiError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_message_names_backend() {
        let err = ApiError::Connection {
            base_url: "http://localhost:8001".to_string(),
            detail: "connection refused".to_string(),
        };
        assert!(err.is_connection_error());
        assert!(err.user_message().contains("http://localhost:8001"));
        assert!(err.user_message().contains("Start the backend server"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_validation_displays_server_message() {
        let err = ApiError::Validation {
            status: 422,
            message: "name is required".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");
        assert_eq!(err.user_message(), "name is required");
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_status_mapping() {
        let unauthorized = ApiError::Unauthorized {
            message: "expired".to_string(),
        };
        assert_eq!(unauthorized.status(), Some(401));
        assert!(ApiError::Timeout.is_timeout());
        assert_eq!(ApiError::Timeout.status(), None);
    }
}
