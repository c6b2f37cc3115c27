use reqwest::StatusCode;
use thiserror::Error;

/// Why a shows request produced no events.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Shows service refused the request: {0}")]
    AccessDenied(String),

    #[error("Sign-in required for the shows service")]
    Unauthorized,

    #[error("Shows endpoint not found: {0}")]
    NotFound(String),

    #[error("Too many requests to the shows service")]
    RateLimited,

    #[error("Shows service unavailable: {0}")]
    ServerError(String),

    #[error("Could not reach the shows service: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unreadable shows response: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Cut a response body down to a loggable size on a char boundary.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let end = (0..=MAX_ERROR_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = Self::truncate_body(body);
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::AccessDenied(body),
            StatusCode::NOT_FOUND => ApiError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            s if s.is_server_error() => ApiError::ServerError(body),
            s => ApiError::InvalidResponse(format!("HTTP {}: {}", s.as_u16(), body)),
        }
    }

    /// Message shown in the status line when a fetch fails.
    pub fn user_message(&self) -> String {
        format!("Failed to fetch shows: {}", self)
    }
}
