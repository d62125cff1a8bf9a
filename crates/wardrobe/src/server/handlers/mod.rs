pub mod gallery;
pub mod recommend;
pub mod status;

use axum::{http::StatusCode, response::Json};

use crate::error::RecommendError;
use crate::server::types::ErrorResponse;

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ErrorResponse>);

pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
  (status, Json(ErrorResponse::new(message)))
}

impl From<RecommendError> for ErrorResponse {
  fn from(error: RecommendError) -> Self {
    ErrorResponse::new(error.to_string())
  }
}

pub(crate) fn error_failure(error: RecommendError) -> ApiFailure {
  (error.status_code(), Json(error.into()))
}
