//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use webgl_host_store::StoreError;

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Static delivery answers in plain text, like any file server
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "File not found").into_response(),
            ApiError::Internal(err) => {
                error!("request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            ApiError::PayloadTooLarge(msg) => {
                json_error(StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", msg)
            }
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "BadRequest", msg),
        }
    }
}

fn json_error(status: StatusCode, error_name: &str, message: String) -> Response {
    let body = Json(json!({
        "error": error_name,
        "message": message,
    }));

    (status, body).into_response()
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TooLarge { limit } => {
                ApiError::PayloadTooLarge(format!("file exceeds {} bytes", limit))
            }
            StoreError::InvalidFilename(name) => {
                ApiError::BadRequest(format!("invalid filename: {:?}", name))
            }
            StoreError::RootMissing(path) => {
                ApiError::Internal(anyhow::anyhow!("asset root missing: {:?}", path))
            }
            StoreError::Io(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = ApiError::Internal(anyhow::anyhow!("/srv/app/Build: permission denied"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal server error");
    }

    #[tokio::test]
    async fn test_not_found_is_plain_text() {
        let response = ApiError::NotFound("x".into()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "File not found");
    }

    #[test]
    fn test_store_errors_map_to_status() {
        let too_large: ApiError = StoreError::TooLarge { limit: 10 }.into();
        assert_eq!(too_large.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bad_name: ApiError = StoreError::InvalidFilename("..".into()).into();
        assert_eq!(bad_name.into_response().status(), StatusCode::BAD_REQUEST);

        let io: ApiError = StoreError::Io(std::io::Error::other("disk")).into();
        assert_eq!(io.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
