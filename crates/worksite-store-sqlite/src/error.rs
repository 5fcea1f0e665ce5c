//! Error type for `worksite-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] worksite_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column value could not be decoded into its domain type.
  #[error("column decode error: {0}")]
  Decode(String),

  /// A commit op referenced a row that no longer exists; the whole batch
  /// was rolled back.
  #[error("stale reference in atomic commit: {0}")]
  StaleReference(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
