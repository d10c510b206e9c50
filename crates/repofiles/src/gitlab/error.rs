//! GitLab API error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::{HttpHeaders, header_get};

/// Errors that can occur when interacting with the GitLab API.
#[derive(Debug, Error)]
pub enum GitLabError {
    /// Transport-level failure (connection, TLS, timeout).
    #[error("HTTP request error: {0}")]
    Http(String),

    /// Response body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned a non-success status.
    #[error("GitLab API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The requested project, branch or file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File content returned by GitLab was not valid base64.
    #[error("Invalid content encoding for {path}: {message}")]
    Decode { path: String, message: String },
}

impl GitLabError {
    /// Classify an HTTP status code and response body into a typed error.
    ///
    /// GitLab reports failures as `{"message": ...}` or `{"error": ...}`;
    /// the extracted message is kept verbatim.
    pub fn from_status(status: u16, headers: &HttpHeaders, body: &[u8]) -> Self {
        let message = error_message(body);
        match status {
            401 | 403 => Self::Auth(format!("{}: {}", status, message)),
            404 => Self::NotFound(message),
            429 => Self::RateLimited {
                reset_at: reset_at(headers),
            },
            _ => Self::Api { status, message },
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn error_message(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body).trim().to_string();
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return raw;
    };
    match value.get("message").or_else(|| value.get("error")) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => raw,
    }
}

/// When the throttle window ends, from `RateLimit-Reset` (epoch seconds).
fn reset_at(headers: &HttpHeaders) -> DateTime<Utc> {
    header_get(headers, "ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::minutes(1))
}

impl From<crate::http::HttpError> for GitLabError {
    fn from(err: crate::http::HttpError) -> Self {
        Self::Http(err.to_string())
    }
}

/// Check if an error indicates a rate limit.
pub fn is_rate_limit_error(e: &GitLabError) -> bool {
    match e {
        GitLabError::RateLimited { .. } => true,
        GitLabError::Api { status, .. } => *status == 429,
        _ => false,
    }
}

/// Get a short error message suitable for log lines.
pub fn short_error_message(err: &GitLabError) -> String {
    match err {
        GitLabError::Http(_) => "Network error".to_string(),
        GitLabError::Json(_) => "JSON parse error".to_string(),
        GitLabError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        GitLabError::NotFound(what) => format!("Not found: {}", what),
        GitLabError::RateLimited { .. } => "Rate limited".to_string(),
        GitLabError::Auth(_) => "Authentication failed".to_string(),
        GitLabError::Config(msg) => format!("Config: {}", msg),
        GitLabError::Decode { path, .. } => format!("Bad encoding: {}", path),
    }
}
