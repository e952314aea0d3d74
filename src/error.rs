//! API error type and its HTTP mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the body is always
//! `{"detail": "<message>"}`.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::slug::SlugError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("Authentication credentials were not provided or are invalid.")]
  NotAuthenticated,

  #[error("{0}")]
  PermissionDenied(String),

  #[error("{0} not found.")]
  NotFound(&'static str),

  #[error("{0}")]
  Conflict(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
      ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn staff_only() -> Self {
    ApiError::PermissionDenied("Only staff users can do this.".into())
  }
}

impl From<SlugError> for ApiError {
  fn from(e: SlugError) -> Self {
    match e {
      SlugError::Empty => ApiError::Validation(e.to_string()),
      SlugError::Exhausted { .. } => ApiError::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "quizbank", error = %self, "Request failed");
    }
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}
