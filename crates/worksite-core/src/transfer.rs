//! Dependent-record transfer.
//!
//! Moves every timesheet referencing a source entity's identity onto a
//! target entity's identity. Unlike a merge, source and target need not be in
//! conflict and the source is not deleted — deletion is a separate,
//! caller-driven step ([`delete_with_transfer`]) that also re-parents any
//! child sites so they never reference a deleted parent.

use chrono::Utc;

use crate::{
  Result,
  entity::{Entity, EntityChange, EntityIdentity},
  error::Error,
  store::{CommitOp, EntityFilter, EntityStore},
};

/// Result of a transfer. Zero transferred records is a valid outcome, not an
/// error.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
  pub transferred: usize,
  pub source:      EntityIdentity,
  pub target:      EntityIdentity,
}

/// Re-point all timesheets matching `source`'s identity to `target`'s, as
/// one atomic batch. The source entity is left in place.
pub async fn transfer<S: EntityStore>(
  store: &S,
  source: &Entity,
  target: &Entity,
) -> Result<TransferOutcome> {
  let ops = repoint_ops(store, source, target).await?;
  let transferred = ops.len();

  if !ops.is_empty() {
    store.commit(ops).await.map_err(Error::commit)?;
  }

  tracing::info!(
    source = %source.id,
    target = %target.id,
    transferred,
    "timesheets transferred"
  );

  Ok(TransferOutcome {
    transferred,
    source: source.identity(),
    target: target.identity(),
  })
}

/// Transfer all dependents to `target`, re-parent the source's child sites
/// to `target`, and delete the source — one atomic commit.
pub async fn delete_with_transfer<S: EntityStore>(
  store: &S,
  source: &Entity,
  target: &Entity,
) -> Result<TransferOutcome> {
  let mut ops = repoint_ops(store, source, target).await?;
  let transferred = ops.len();

  // Orphan prevention: any site still pointing at the source must follow
  // the dependents to the target.
  let sites = store
    .list_entities(&EntityFilter::sites_of(source.id))
    .await
    .map_err(Error::store)?;
  let now = Utc::now();
  for site in &sites {
    let mut change = EntityChange::at(now);
    change.parent_id = Some(target.id);
    ops.push(CommitOp::UpdateEntity { id: site.id, change });
  }

  ops.push(CommitOp::DeleteEntity(source.id));
  store.commit(ops).await.map_err(Error::commit)?;

  tracing::info!(
    source = %source.id,
    target = %target.id,
    transferred,
    reparented = sites.len(),
    "entity deleted with transfer"
  );

  Ok(TransferOutcome {
    transferred,
    source: source.identity(),
    target: target.identity(),
  })
}

/// Delete `source` without a target: dependents are stamped with the
/// sentinel identity instead of being re-pointed. Fails with
/// [`Error::SitesAttached`] if the source still parents sites, since there
/// is no target to re-parent them onto.
pub async fn delete_with_sentinel<S: EntityStore>(
  store: &S,
  source: &Entity,
) -> Result<TransferOutcome> {
  // A deleted parent must never leave sites behind it. With no target to
  // re-parent them onto, refuse instead.
  let sites = store
    .list_entities(&EntityFilter::sites_of(source.id))
    .await
    .map_err(Error::store)?;
  if !sites.is_empty() {
    return Err(Error::SitesAttached {
      id:    source.id,
      count: sites.len(),
    });
  }

  let sentinel = EntityIdentity::deleted();
  let source_name = source.identity().name;

  let sheets = store
    .timesheets_by_customer(&source_name)
    .await
    .map_err(Error::store)?;
  let transferred = sheets.len();

  let mut ops: Vec<CommitOp> = sheets
    .into_iter()
    .map(|t| CommitOp::RepointTimesheet {
      id:   t.id,
      name: sentinel.name.clone(),
      code: sentinel.code.clone(),
    })
    .collect();
  ops.push(CommitOp::DeleteEntity(source.id));

  store.commit(ops).await.map_err(Error::commit)?;

  tracing::info!(
    source = %source.id,
    stamped = transferred,
    "entity deleted; dependents stamped with sentinel"
  );

  Ok(TransferOutcome {
    transferred,
    source: source.identity(),
    target: sentinel,
  })
}

/// The shared re-point primitive: one `RepointTimesheet` op per timesheet
/// matching the source identity, aimed at the target identity.
async fn repoint_ops<S: EntityStore>(
  store: &S,
  source: &Entity,
  target: &Entity,
) -> Result<Vec<CommitOp>> {
  let source_name = source.identity().name;
  let target_id = target.identity();

  let sheets = store
    .timesheets_by_customer(&source_name)
    .await
    .map_err(Error::store)?;

  Ok(
    sheets
      .into_iter()
      .map(|t| CommitOp::RepointTimesheet {
        id:   t.id,
        name: target_id.name.clone(),
        code: target_id.code.clone(),
      })
      .collect(),
  )
}
