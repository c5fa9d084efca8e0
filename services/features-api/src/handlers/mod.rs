//! HTTP request handlers for the features API.

pub mod collections;
pub mod health;
pub mod items;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use features_protocol::{ErrorResult, WrapperError};

/// Render an error record with its code as the HTTP status.
pub fn error_response(error: ErrorResult) -> Response {
    let status = StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error)).into_response()
}

/// Fallback for every non-GET method on a known route.
pub async fn method_not_allowed() -> Response {
    error_response(WrapperError::MethodNotAllowed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_method_not_allowed_is_405() {
        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_error_status_follows_code() {
        let response = error_response(ErrorResult::api(414, "too long"));
        assert_eq!(response.status(), StatusCode::URI_TOO_LONG);
    }
}
