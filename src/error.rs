use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::rate_table::TableError;

/// Failures while building a rate table from its source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("rate source {source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },
    #[error("malformed rate source: {0}")]
    MalformedSource(String),
}

impl LoadError {
    pub fn unavailable(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSource(message.into())
    }
}

impl From<zip::result::ZipError> for LoadError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::MalformedSource(format!("unreadable archive: {e}"))
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        Self::MalformedSource(format!("unreadable csv: {e}"))
    }
}

impl From<TableError> for LoadError {
    fn from(e: TableError) -> Self {
        Self::MalformedSource(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("a reload is already in progress")]
    InProgress,
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::SourceUnavailable { .. } => Self::Upstream(e.to_string()),
            LoadError::MalformedSource(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ReloadError> for ApiError {
    fn from(e: ReloadError) -> Self {
        match e {
            ReloadError::InProgress => Self::Conflict(e.to_string()),
            ReloadError::Load(e) => e.into(),
        }
    }
}
