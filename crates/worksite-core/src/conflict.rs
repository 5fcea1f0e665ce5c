//! Conflict detection.
//!
//! Every create and edit runs a proposed (name, code) pair through
//! [`detect`] before any write. The same contract serves all flows — add,
//! edit, merge validation — parameterised only by the exemption set, so the
//! uniqueness rule lives in exactly one place.
//!
//! Detection fails closed: a store error during the check blocks the write
//! ([`Error::Detection`]) rather than risking a silent duplicate.

use uuid::Uuid;

use crate::{
  Result,
  entity::Entity,
  error::Error,
  store::{EntityFilter, EntityStore},
};

// ─── Exemptions ──────────────────────────────────────────────────────────────

/// Identities allowed to match without counting as a conflict — typically
/// the record being edited, or both sides of an in-progress merge.
#[derive(Debug, Clone, Default)]
pub struct Exemptions {
  pub ids:   Vec<Uuid>,
  pub names: Vec<String>,
  pub codes: Vec<String>,
}

impl Exemptions {
  /// No exemptions — every match is a conflict.
  pub fn none() -> Self {
    Self::default()
  }

  /// Exempt `entity`'s id and both its generic and site-specific identity
  /// fields.
  pub fn of(entity: &Entity) -> Self {
    Self::default().and(entity)
  }

  /// Add another exempt entity (e.g. the other side of a merge).
  pub fn and(mut self, entity: &Entity) -> Self {
    self.ids.push(entity.id);
    self.names.push(entity.name.clone());
    self.codes.push(entity.code.clone());
    if let Some(n) = &entity.site_name {
      self.names.push(n.clone());
    }
    if let Some(c) = &entity.site_code {
      self.codes.push(c.clone());
    }
    self
  }

  fn covers(&self, name: &str, code: &str) -> bool {
    self.names.iter().any(|n| n == name)
      && self.codes.iter().any(|c| c == code)
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// Outcome of a conflict check. `Conflict` is control flow, not an error —
/// it hands the colliding record to the caller for merge resolution.
#[derive(Debug, Clone)]
pub enum ConflictResult {
  NoConflict,
  Conflict(Entity),
}

impl ConflictResult {
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::Conflict(_))
  }
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Check whether (`name`, `code`) collides with a third-party entity.
///
/// Empty fields never conflict here — required-field validation happens
/// before, and emptiness must not suppress a real duplicate elsewhere. A pair
/// fully covered by the exemption set short-circuits without touching the
/// store. Otherwise name and code are queried independently; a name match is
/// preferred over a code match when both exist.
pub async fn detect<S: EntityStore>(
  store: &S,
  name: &str,
  code: &str,
  exemptions: &Exemptions,
) -> Result<ConflictResult> {
  if name.is_empty() || code.is_empty() {
    return Ok(ConflictResult::NoConflict);
  }
  if exemptions.covers(name, code) {
    return Ok(ConflictResult::NoConflict);
  }

  let by_name = store
    .list_entities(&EntityFilter::by_name(name))
    .await
    .map_err(Error::detection)?;
  if let Some(hit) = first_non_exempt(by_name, exemptions) {
    tracing::warn!(%hit.id, name, "name collision detected");
    return Ok(ConflictResult::Conflict(hit));
  }

  let by_code = store
    .list_entities(&EntityFilter::by_code(code))
    .await
    .map_err(Error::detection)?;
  if let Some(hit) = first_non_exempt(by_code, exemptions) {
    tracing::warn!(%hit.id, code, "code collision detected");
    return Ok(ConflictResult::Conflict(hit));
  }

  Ok(ConflictResult::NoConflict)
}

fn first_non_exempt(
  candidates: Vec<Entity>,
  exemptions: &Exemptions,
) -> Option<Entity> {
  candidates
    .into_iter()
    .find(|e| !exemptions.ids.contains(&e.id))
}
