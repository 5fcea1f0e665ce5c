//! Merge resolution.
//!
//! When a create or edit collides with an existing entity, the two records
//! are reconciled into one surviving identity. The user supplies the final
//! (name, code) pair and names the survivor; neither side is privileged. The
//! commit re-points every dependent timesheet from both sides' identities to
//! the final one, updates the survivor, and deletes the loser — all in one
//! atomic batch, so a failure leaves both collections untouched.

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Result,
  conflict::{self, ConflictResult, Exemptions},
  entity::{Entity, EntityChange, EntityIdentity, TimesheetRecord},
  error::Error,
  store::{CommitOp, EntityStore},
};

// ─── State ───────────────────────────────────────────────────────────────────

/// Where a merge flow currently stands. A failed commit returns the flow to
/// `AwaitingResolution`; `Cancelled` and `Done` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
  AwaitingResolution,
  /// The atomic commit has been issued; no cancellation from here — it
  /// either fully applies or fully fails.
  Committing,
  Cancelled,
  Done,
}

/// Result of a committed merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
  pub survivor:  Entity,
  /// How many dependent timesheets were re-pointed to the final identity.
  pub repointed: usize,
}

// ─── Flow ────────────────────────────────────────────────────────────────────

/// An in-progress merge between two colliding entities.
#[derive(Debug, Clone)]
pub struct MergeFlow {
  left:  Entity,
  right: Entity,
  state: MergeState,
}

impl MergeFlow {
  /// Start a merge between two distinct entities. A self-merge (the same
  /// entity reached via two lookups) is rejected outright.
  pub fn begin(left: Entity, right: Entity) -> Result<Self> {
    if left.id == right.id {
      return Err(Error::SelfMerge);
    }
    Ok(Self { left, right, state: MergeState::AwaitingResolution })
  }

  pub fn left(&self) -> &Entity {
    &self.left
  }

  pub fn right(&self) -> &Entity {
    &self.right
  }

  pub fn state(&self) -> MergeState {
    self.state
  }

  /// Both sides' ids and identity fields are exempt while resolving.
  fn exemptions(&self) -> Exemptions {
    Exemptions::of(&self.left).and(&self.right)
  }

  /// Re-check a proposed final identity while the user edits it. Any new
  /// collision with a third party is a blocking validation outcome; the flow
  /// stays in `AwaitingResolution` either way.
  pub async fn validate<S: EntityStore>(
    &self,
    store: &S,
    proposed: &EntityIdentity,
  ) -> Result<ConflictResult> {
    conflict::detect(store, &proposed.name, &proposed.code, &self.exemptions())
      .await
  }

  /// Abandon the merge. No reads or writes have to be undone.
  pub fn cancel(&mut self) {
    self.state = MergeState::Cancelled;
  }

  /// Commit the merge: re-point all dependents of either side to `final_id`,
  /// rewrite the survivor, delete the loser. `survivor_id` must be one of the
  /// two sides.
  pub async fn commit<S: EntityStore>(
    &mut self,
    store: &S,
    survivor_id: Uuid,
    final_id: &EntityIdentity,
  ) -> Result<MergeOutcome> {
    debug_assert_eq!(self.state, MergeState::AwaitingResolution);

    if final_id.name.is_empty() {
      return Err(Error::MissingField("name"));
    }
    if final_id.code.is_empty() {
      return Err(Error::MissingField("code"));
    }

    let (survivor, loser) = if survivor_id == self.left.id {
      (&self.left, &self.right)
    } else if survivor_id == self.right.id {
      (&self.right, &self.left)
    } else {
      return Err(Error::UnknownSurvivor(survivor_id));
    };

    // The user-chosen pair must itself be conflict-free, exempting both
    // sides of the merge.
    if let ConflictResult::Conflict(_) = self.validate(store, final_id).await?
    {
      return Err(Error::FinalIdentityConflict {
        name: final_id.name.clone(),
        code: final_id.code.clone(),
      });
    }

    let dependents = dependents_of_both(store, &self.left, &self.right).await?;
    let repointed = dependents.len();

    let mut ops: Vec<CommitOp> = dependents
      .into_iter()
      .map(|t| CommitOp::RepointTimesheet {
        id:   t.id,
        name: final_id.name.clone(),
        code: final_id.code.clone(),
      })
      .collect();

    let mut change = EntityChange::identity(final_id, Utc::now());
    if survivor.is_site() {
      // Keep the site-specific snapshot in step with the generic pair.
      change.site_name = Some(final_id.name.clone());
      change.site_code = Some(final_id.code.clone());
    }
    ops.push(CommitOp::UpdateEntity { id: survivor.id, change });
    ops.push(CommitOp::DeleteEntity(loser.id));

    let survivor_id = survivor.id;
    let loser_id = loser.id;

    self.state = MergeState::Committing;
    if let Err(e) = store.commit(ops).await {
      self.state = MergeState::AwaitingResolution;
      return Err(Error::commit(e));
    }

    tracing::info!(
      %survivor_id,
      %loser_id,
      repointed,
      name = %final_id.name,
      code = %final_id.code,
      "merge committed"
    );

    let mut survivor = if survivor_id == self.left.id {
      self.left.clone()
    } else {
      self.right.clone()
    };
    survivor.name = final_id.name.clone();
    survivor.code = final_id.code.clone();
    if survivor.is_site() {
      survivor.site_name = Some(final_id.name.clone());
      survivor.site_code = Some(final_id.code.clone());
    }

    self.state = MergeState::Done;
    Ok(MergeOutcome { survivor, repointed })
  }
}

/// All timesheets referencing either side's current identity, deduplicated
/// by id (both sides may resolve to the same name).
async fn dependents_of_both<S: EntityStore>(
  store: &S,
  left: &Entity,
  right: &Entity,
) -> Result<Vec<TimesheetRecord>> {
  let left_name = left.identity().name;
  let right_name = right.identity().name;

  let mut sheets = store
    .timesheets_by_customer(&left_name)
    .await
    .map_err(Error::store)?;

  if right_name != left_name {
    sheets.extend(
      store
        .timesheets_by_customer(&right_name)
        .await
        .map_err(Error::store)?,
    );
  }

  sheets.sort_by_key(|t| t.id);
  sheets.dedup_by_key(|t| t.id);
  Ok(sheets)
}
