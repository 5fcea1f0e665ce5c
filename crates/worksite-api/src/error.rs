//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use worksite_core::{Error as CoreError, allocator::Allocation};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The confirmed site sequence was taken concurrently; the body carries a
  /// fresh allocation for the client to re-confirm.
  #[error("site sequence {requested} was taken concurrently")]
  SequenceTaken { requested: u32, fresh: Allocation },

  #[error("final identity ({name:?}, {code:?}) still collides")]
  FinalIdentityConflict { name: String, code: String },

  #[error("store error: {0}")]
  Store(#[source] CoreError),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      CoreError::EntityNotFound(id) => {
        ApiError::NotFound(format!("entity {id} not found"))
      }
      CoreError::MissingField(_)
      | CoreError::NoTargetSelected
      | CoreError::NotACustomer(_)
      | CoreError::SelfMerge
      | CoreError::UnknownSurvivor(_)
      | CoreError::SitesAttached { .. } => ApiError::BadRequest(e.to_string()),
      CoreError::SequenceTaken { requested, fresh } => {
        ApiError::SequenceTaken { requested, fresh }
      }
      CoreError::FinalIdentityConflict { name, code } => {
        ApiError::FinalIdentityConflict { name, code }
      }
      other => ApiError::Store(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match &self {
      ApiError::NotFound(m) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response()
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::SequenceTaken { requested, fresh } => (
        StatusCode::CONFLICT,
        Json(json!({
          "error": self.to_string(),
          "requested": requested,
          "fresh": fresh,
        })),
      )
        .into_response(),
      ApiError::FinalIdentityConflict { .. } => {
        (StatusCode::CONFLICT, Json(json!({ "error": self.to_string() })))
          .into_response()
      }
      ApiError::Store(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
      )
        .into_response(),
    }
  }
}
