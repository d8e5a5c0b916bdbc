//! HTTP error envelope.
//!
//! Every failure leaves the server as
//! `{"error":{"category":..., "message":...}}` with a matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;
use thiserror::Error;
use victoweb_core::model::validation::ValidationError;
use victoweb_core::repo::RepoError;
use victoweb_core::service::account_service::AccountServiceError;
use victoweb_core::service::chat_service::ChatServiceError;
use victoweb_core::service::post_service::PostServiceError;
use victoweb_core::service::video_service::VideoServiceError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Authentication required.")]
    Unauthorized,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    category: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidCredentials(_) | Self::Unauthorized => "authentication",
            Self::Forbidden => "permission",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(details) => {
                error!(
                    "event=http_error module=http status=error category=internal error={}",
                    details
                );
                "Internal server error.".to_string()
            }
            Self::Validation(err) => err.message.clone(),
            other => other.to_string(),
        };
        let field = match &self {
            Self::Validation(err) => Some(err.field),
            _ => None,
        };
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                category: self.category(),
                message,
                field,
            },
        };
        (self.status(), Json(envelope)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { .. } => Self::NotFound(value.to_string()),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(value: AccountServiceError) -> Self {
        match value {
            AccountServiceError::Validation(err) => Self::Validation(err),
            AccountServiceError::UsernameTaken(_) => Self::Conflict(value.to_string()),
            AccountServiceError::InvalidCredentials => Self::InvalidCredentials(value.to_string()),
            AccountServiceError::Repo(err) => err.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(value: PostServiceError) -> Self {
        match value {
            PostServiceError::Validation(err) => Self::Validation(err),
            PostServiceError::PostNotFound(_)
            | PostServiceError::SlugNotFound(_)
            | PostServiceError::CommitteeNotFound(_) => Self::NotFound(value.to_string()),
            PostServiceError::Repo(err) => err.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<VideoServiceError> for ApiError {
    fn from(value: VideoServiceError) -> Self {
        match value {
            VideoServiceError::Validation(err) => Self::Validation(err),
            VideoServiceError::VideoNotFound(_) => Self::NotFound(value.to_string()),
            VideoServiceError::Repo(err) => err.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(value: ChatServiceError) -> Self {
        match value {
            ChatServiceError::Validation(err) => Self::Validation(err),
            ChatServiceError::MessageNotFound(_)
            | ChatServiceError::TaskNotFound(_)
            | ChatServiceError::TodoNotFound(_) => Self::NotFound(value.to_string()),
            ChatServiceError::Repo(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_categories() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.category(), "permission");
        let validation = ApiError::from(ValidationError::new("title", "This field is required."));
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        let missing = ApiError::from(RepoError::not_found("post", 7));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let taken = ApiError::from(AccountServiceError::UsernameTaken("dana".to_string()));
        assert_eq!(taken.status(), StatusCode::CONFLICT);
    }
}
