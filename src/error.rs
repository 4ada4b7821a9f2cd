use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no persistence backend configured")]
    StoreUnavailable,

    #[error("{0}")]
    InvalidPayload(String),

    #[error("index {index} out of range for a day holding {len} meals")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("store file {path} is unreadable: {reason}")]
    StoreUnreadable { path: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidPayload(_) | AppError::IndexOutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Backend causes stay in the logs.
        let message = if status.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "request failed");
            match self {
                AppError::StoreUnavailable => "storage unavailable".to_string(),
                _ => "internal server error".to_string(),
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_keep_their_message() {
        let res = AppError::IndexOutOfRange { index: 5, len: 2 }.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["error"], "index 5 out of range for a day holding 2 meals");
    }

    #[tokio::test]
    async fn backend_errors_are_masked() {
        let err = AppError::StoreUnreadable {
            path: "/secret/meals.json".into(),
            reason: "expected value at line 1".into(),
        };
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn unavailable_store_maps_to_503() {
        let res = AppError::StoreUnavailable.into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(res).await["error"], "storage unavailable");
    }
}
