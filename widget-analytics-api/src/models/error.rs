use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::core::storage::StorageError;
use crate::models::envelope::ErrorResponse;
use crate::models::input::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The message is what the client sees; the source is only logged.
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: StorageError,
    },
}

impl ApiError {
    pub fn storage(message: &'static str, source: StorageError) -> Self {
        ApiError::Storage { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::UnsupportedOperation(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            },
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage { message, source } = &self {
            error!("{}: {}", message, source);
        }

        let body = ErrorResponse::new(self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
