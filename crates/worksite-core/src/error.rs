//! Error types for `worksite-core`.
//!
//! Store failures are boxed so the policy layer stays generic over the
//! backend. The variant records which phase failed: a read during conflict
//! detection fails closed ([`Error::Detection`] — never interpreted as "no
//! conflict"), a failed atomic commit rolls back entirely
//! ([`Error::Commit`]).

use thiserror::Error;
use uuid::Uuid;

use crate::allocator::Allocation;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("required field missing: {0}")]
  MissingField(&'static str),

  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  #[error("entity {0} is not a top-level customer")]
  NotACustomer(Uuid),

  #[error("no transfer target selected")]
  NoTargetSelected,

  /// Sentinel deletion refuses an entity that still parents sites; the
  /// caller must pick a transfer target so the sites can follow it.
  #[error("entity {id} still parents {count} sites; delete with a transfer target instead")]
  SitesAttached { id: Uuid, count: usize },

  #[error("cannot merge an entity with itself")]
  SelfMerge,

  #[error("merge survivor {0} is neither side of the merge")]
  UnknownSurvivor(Uuid),

  #[error(
    "final identity ({name:?}, {code:?}) still collides with another entity"
  )]
  FinalIdentityConflict { name: String, code: String },

  /// The sequence the caller was about to use was taken by a concurrent
  /// allocation. Carries a fresh allocation the caller must confirm.
  #[error("site sequence {requested} was taken concurrently; next free is {}", fresh.sequence)]
  SequenceTaken { requested: u32, fresh: Allocation },

  #[error("conflict check failed: {0}")]
  Detection(#[source] BoxError),

  #[error("commit failed: {0}")]
  Commit(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Box a backend error as a plain store failure.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  /// Box a backend error that occurred during a conflict-detection read.
  pub fn detection<E: std::error::Error + Send + Sync + 'static>(
    e: E,
  ) -> Self {
    Self::Detection(Box::new(e))
  }

  /// Box a backend error that occurred during an atomic commit.
  pub fn commit<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Commit(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
