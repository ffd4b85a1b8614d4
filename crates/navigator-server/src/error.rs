//! Mapping of pipeline errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use navigator_core::Error;

/// Handler error: `(status, {"error": message})`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = self.0.kind(), "Request failed: {}", self.0);
        } else {
            warn!(kind = self.0.kind(), "Request rejected: {}", self.0);
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_kind() {
        let cases = [
            (Error::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (Error::provider(Some(429), "slow down"), StatusCode::TOO_MANY_REQUESTS),
            (Error::provider(None, "connection reset"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Config("no key".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Retrieval("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
