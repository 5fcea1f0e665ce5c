//! The `EntityStore` trait and supporting query/commit types.
//!
//! The trait is implemented by storage backends (e.g.
//! `worksite-store-sqlite`). The policy layer ([`crate::registry`],
//! [`crate::merge`], [`crate::transfer`]) depends on this abstraction, not on
//! any concrete backend.
//!
//! Reads are equality queries combined by AND; all writes go through
//! [`EntityStore::commit`], an all-or-nothing batch. The policy layer relies
//! on that atomicity — dependents are never observably half-re-pointed.

use std::future::Future;

use uuid::Uuid;

use crate::entity::{
  ApprovalState, Entity, EntityChange, TimesheetRecord,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Equality filter for [`EntityStore::list_entities`]. All set fields must
/// match; `exclude_id` drops a single entity from the result.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
  pub name:       Option<String>,
  pub code:       Option<String>,
  /// `Some(Some(id))` — sites of that parent; `Some(None)` — top-level
  /// customers only; `None` — no parent constraint.
  pub parent_id:  Option<Option<Uuid>>,
  pub approval:   Option<ApprovalState>,
  pub exclude_id: Option<Uuid>,
}

impl EntityFilter {
  pub fn by_name(name: impl Into<String>) -> Self {
    Self { name: Some(name.into()), ..Self::default() }
  }

  pub fn by_code(code: impl Into<String>) -> Self {
    Self { code: Some(code.into()), ..Self::default() }
  }

  /// All sites under `parent`.
  pub fn sites_of(parent: Uuid) -> Self {
    Self { parent_id: Some(Some(parent)), ..Self::default() }
  }
}

// ─── Commit operations ───────────────────────────────────────────────────────

/// One operation inside an atomic batch. The batch either fully applies or
/// leaves both collections untouched.
#[derive(Debug, Clone)]
pub enum CommitOp {
  CreateEntity(Entity),
  UpdateEntity {
    id:     Uuid,
    change: EntityChange,
  },
  DeleteEntity(Uuid),
  CreateTimesheet(TimesheetRecord),
  /// Rewrite a timesheet's denormalized identity snapshot.
  RepointTimesheet {
    id:   Uuid,
    name: String,
    code: String,
  },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a worksite storage backend.
///
/// Implementations must make [`commit`](Self::commit) all-or-nothing: an
/// update, delete, or re-point against a row that no longer exists aborts and
/// rolls back the entire batch.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve an entity by id. Returns `None` if not found.
  fn get_entity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// List entities matching `filter`.
  fn list_entities<'a>(
    &'a self,
    filter: &'a EntityFilter,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// All timesheets whose denormalized name equals `customer_name`.
  fn timesheets_by_customer<'a>(
    &'a self,
    customer_name: &'a str,
  ) -> impl Future<Output = Result<Vec<TimesheetRecord>, Self::Error>>
  + Send
  + 'a;

  /// Retrieve a timesheet by id. Returns `None` if not found.
  fn get_timesheet(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TimesheetRecord>, Self::Error>>
  + Send
  + '_;

  /// Apply `ops` as one atomic batch.
  fn commit(
    &self,
    ops: Vec<CommitOp>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
