//! Error types for Navigator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {message}")]
    Provider {
        /// HTTP status reported by the upstream provider, if any.
        status: Option<u16>,
        message: String,
    },

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Provider {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code this error should surface as.
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Provider {
                status: Some(code), ..
            } if (400..600).contains(code) => *code,
            Error::Config(_) => 503,
            _ => 500,
        }
    }

    /// Stable snake_case tag, used in stream error markers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Provider { .. } => "provider_error",
            Error::Retrieval(_) => "retrieval_error",
            Error::Parse(_) => "parse_error",
            Error::Config(_) => "config_error",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Validation("empty".into()).status(), 400);
        assert_eq!(Error::Retrieval("down".into()).status(), 500);
        assert_eq!(Error::Parse("bad".into()).status(), 500);
        assert_eq!(Error::Config("no key".into()).status(), 503);
    }

    #[test]
    fn test_provider_status_passthrough() {
        assert_eq!(Error::provider(Some(429), "rate limited").status(), 429);
        assert_eq!(Error::provider(None, "connection reset").status(), 500);
        // A success code from upstream is not a usable error status.
        assert_eq!(Error::provider(Some(200), "truncated").status(), 500);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::Parse("x".into()).kind(), "parse_error");
        assert_eq!(Error::provider(None, "x").kind(), "provider_error");
        assert_eq!(Error::Internal("x".into()).kind(), "internal_error");
    }
}
