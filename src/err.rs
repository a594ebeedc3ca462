use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub async fn handler404(path: Uri) -> Response {
    Error::NotFound(format!("Invalid path: {}", path)).into_response()
}

/// Every failure a request can end in. Each variant maps onto one status code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("Access denied")]
    AccessDenied,
    #[error("Storage failure")]
    Store(StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Error {
        Error::Validation(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Conflict(_) | Error::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AccessDenied => StatusCode::FORBIDDEN,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Error::Store(inner) => ErrorBody {
                message: self.to_string(),
                error: Some(inner.to_string()),
            },
            other => ErrorBody {
                message: other.to_string(),
                error: None,
            },
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { collection, key } => Error::Conflict(format!(
                "Document with key `{}` already exists in {}",
                key, collection
            )),
            other => Error::Store(other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Error::Store(inner) => log::error!("request failed on storage: {}", inner),
            Error::AccessDenied => {}
            other => log::warn!("request rejected ({}): {}", status, other),
        }
        (status, Json(self.body())).into_response()
    }
}
