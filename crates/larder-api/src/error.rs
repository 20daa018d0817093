use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use larder_gateway::chat::ChatError;
use larder_types::api::StatusMessage;
use larder_types::bucket::BucketError;

/// Error type returned by every handler. The display text is what the
/// client sees in `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }
        (self.status(), Json(StatusMessage::new(self.to_string()))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<BucketError> for ApiError {
    fn from(e: BucketError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        let msg = e.to_string();
        match e {
            ChatError::EmptyText | ChatError::TooLong | ChatError::SelfMessage => Self::BadRequest(msg),
            ChatError::UnknownRecipient | ChatError::NotFound => Self::NotFound(msg),
            ChatError::NotSender => Self::Forbidden(msg),
            ChatError::Storage(source) => Self::Internal(source),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e))
    }
}

/// Parse an id path segment, answering 400 instead of axum's plain-text
/// rejection.
pub fn parse_id(raw: &str) -> Result<uuid::Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {raw}")))
}

/// Run database work on the blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = ApiError::from(anyhow::anyhow!("disk I/O error at /var/lib/larder.db"));
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn chat_errors_map_to_statuses() {
        assert_eq!(ApiError::from(ChatError::SelfMessage).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChatError::UnknownRecipient).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(ChatError::NotSender).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        assert!(parse_id("not-a-uuid").is_err_and(|e| e.status() == StatusCode::BAD_REQUEST));
        assert!(parse_id(&uuid::Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn bucket_errors_are_bad_requests() {
        let err = ApiError::from(BucketError::InvalidMode("week".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid mode parameter: week");
    }
}
