//! The `Registry` — the operation surface composing allocator, conflict
//! detection, merge, and transfer over an [`EntityStore`].
//!
//! Every mutating operation takes an explicit `actor` (the authenticated
//! user-identity string) rather than reading it from ambient context, and
//! re-reads what it needs at invocation time; nothing is cached across
//! operations.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Result,
  allocator::{self, Allocation, next_sequence},
  conflict::{self, ConflictResult, Exemptions},
  entity::{
    ApprovalState, Entity, EntityChange, EntityIdentity, NewCustomer,
    NewSite, NewTimesheet, TimesheetRecord,
  },
  error::Error,
  merge::{MergeFlow, MergeOutcome},
  store::{CommitOp, EntityFilter, EntityStore},
  transfer,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Outcome of a create or edit. A conflict is not an error: the colliding
/// record is handed back so the caller can open a merge flow against it.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
  Written {
    entity:    Entity,
    /// Dependent timesheets re-pointed because the identity changed.
    repointed: usize,
  },
  Conflict(Entity),
}

/// Partial edit accepted by [`Registry::update_entity`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityUpdate {
  pub name:  Option<String>,
  pub code:  Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  /// Flip a provisional entity to [`ApprovalState::Approved`].
  #[serde(default)]
  pub approve: bool,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Policy layer over a storage backend.
#[derive(Clone)]
pub struct Registry<S> {
  store: S,
}

impl<S: EntityStore> Registry<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn entity(&self, id: Uuid) -> Result<Entity> {
    self
      .store
      .get_entity(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::EntityNotFound(id))
  }

  pub async fn entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
    self.store.list_entities(filter).await.map_err(Error::store)
  }

  pub async fn timesheets(
    &self,
    customer_name: &str,
  ) -> Result<Vec<TimesheetRecord>> {
    self
      .store
      .timesheets_by_customer(customer_name)
      .await
      .map_err(Error::store)
  }

  // ── Customers ─────────────────────────────────────────────────────────

  /// Create a top-level customer. The (name, code) pair must pass conflict
  /// detection with no exemptions.
  pub async fn create_customer(
    &self,
    actor: &str,
    input: NewCustomer,
  ) -> Result<WriteOutcome> {
    if input.name.is_empty() {
      return Err(Error::MissingField("name"));
    }
    if input.code.is_empty() {
      return Err(Error::MissingField("code"));
    }

    let check =
      conflict::detect(&self.store, &input.name, &input.code, &Exemptions::none())
        .await?;
    if let ConflictResult::Conflict(other) = check {
      return Ok(WriteOutcome::Conflict(other));
    }

    let now = Utc::now();
    let entity = Entity {
      id: Uuid::new_v4(),
      name: input.name,
      code: input.code,
      parent_id: None,
      approval: ApprovalState::Approved,
      site_count: 0,
      phone: input.phone,
      email: input.email,
      site_name: None,
      site_code: None,
      created_at: now,
      updated_at: now,
    };

    self
      .store
      .commit(vec![CommitOp::CreateEntity(entity.clone())])
      .await
      .map_err(Error::commit)?;

    tracing::info!(actor, id = %entity.id, name = %entity.name, "customer created");
    Ok(WriteOutcome::Written { entity, repointed: 0 })
  }

  // ── Sites ─────────────────────────────────────────────────────────────

  /// Preview the next site code under `parent_id` without writing anything.
  pub async fn preview_site_code(&self, parent_id: Uuid) -> Result<Allocation> {
    let parent = self.customer(parent_id).await?;
    allocator::allocate(&self.store, &parent).await
  }

  /// Create a site under `parent_id`.
  ///
  /// With `confirmed: None` the sequence is allocated fresh. With
  /// `Some(allocation)` — a previously previewed number the user accepted —
  /// the scan is re-run at write time; if the number was taken concurrently
  /// the create aborts with [`Error::SequenceTaken`] carrying a fresh
  /// allocation the caller must confirm before retrying.
  pub async fn create_site(
    &self,
    actor: &str,
    parent_id: Uuid,
    input: NewSite,
    confirmed: Option<Allocation>,
  ) -> Result<WriteOutcome> {
    if input.name.is_empty() {
      return Err(Error::MissingField("name"));
    }
    let parent = self.customer(parent_id).await?;

    let sites = self
      .store
      .list_entities(&EntityFilter::sites_of(parent.id))
      .await
      .map_err(Error::store)?;

    let sequence = match confirmed {
      Some(a) => {
        let taken = sites.iter().filter_map(Entity::sequence).any(|s| s == a.sequence);
        if taken {
          let fresh = Allocation::new(&parent.code, next_sequence(&sites));
          tracing::warn!(
            actor,
            parent = %parent.id,
            requested = a.sequence,
            fresh = fresh.sequence,
            "site sequence taken concurrently"
          );
          return Err(Error::SequenceTaken { requested: a.sequence, fresh });
        }
        a.sequence
      }
      None => next_sequence(&sites),
    };
    let allocation = Allocation::new(&parent.code, sequence);

    let check = conflict::detect(
      &self.store,
      &input.name,
      &allocation.code,
      &Exemptions::none(),
    )
    .await?;
    if let ConflictResult::Conflict(other) = check {
      return Ok(WriteOutcome::Conflict(other));
    }

    let now = Utc::now();
    let site = Entity {
      id: Uuid::new_v4(),
      name: input.name.clone(),
      code: allocation.code.clone(),
      parent_id: Some(parent.id),
      approval: ApprovalState::Approved,
      site_count: 0,
      phone: input.phone,
      email: input.email,
      site_name: Some(input.name),
      site_code: Some(allocation.code.clone()),
      created_at: now,
      updated_at: now,
    };

    // site_count rides along in the same commit but is informational only;
    // the allocator never trusts it.
    let mut parent_change = EntityChange::at(now);
    parent_change.site_count = Some(parent.site_count + 1);

    self
      .store
      .commit(vec![
        CommitOp::CreateEntity(site.clone()),
        CommitOp::UpdateEntity { id: parent.id, change: parent_change },
      ])
      .await
      .map_err(Error::commit)?;

    tracing::info!(actor, id = %site.id, code = %site.code, "site created");
    Ok(WriteOutcome::Written { entity: site, repointed: 0 })
  }

  // ── Edits ─────────────────────────────────────────────────────────────

  /// Apply a partial edit. If the identity (name or code) changes, every
  /// dependent timesheet is re-pointed to the new identity in the same
  /// commit, so no dependent is left carrying a stale identity. A collision
  /// with a third party comes back as
  /// [`WriteOutcome::Conflict`] for the caller to resolve via merge.
  pub async fn update_entity(
    &self,
    actor: &str,
    id: Uuid,
    update: EntityUpdate,
  ) -> Result<WriteOutcome> {
    if update.name.as_deref() == Some("") {
      return Err(Error::MissingField("name"));
    }
    if update.code.as_deref() == Some("") {
      return Err(Error::MissingField("code"));
    }

    let entity = self.entity(id).await?;
    let new_name = update.name.clone().unwrap_or_else(|| entity.name.clone());
    let new_code = update.code.clone().unwrap_or_else(|| entity.code.clone());

    let check =
      conflict::detect(&self.store, &new_name, &new_code, &Exemptions::of(&entity))
        .await?;
    if let ConflictResult::Conflict(other) = check {
      return Ok(WriteOutcome::Conflict(other));
    }

    let now = Utc::now();
    let mut updated = entity.clone();
    updated.name = new_name.clone();
    updated.code = new_code.clone();
    updated.updated_at = now;
    if entity.is_site() {
      if update.name.is_some() {
        updated.site_name = Some(new_name.clone());
      }
      if update.code.is_some() {
        updated.site_code = Some(new_code.clone());
      }
    }
    if let Some(p) = &update.phone {
      updated.phone = Some(p.clone());
    }
    if let Some(e) = &update.email {
      updated.email = Some(e.clone());
    }
    if update.approve {
      updated.approval = ApprovalState::Approved;
    }

    let old_identity = entity.identity();
    let new_identity = updated.identity();

    let mut ops = Vec::new();
    let mut repointed = 0;
    if new_identity != old_identity {
      let sheets = self
        .store
        .timesheets_by_customer(&old_identity.name)
        .await
        .map_err(Error::store)?;
      repointed = sheets.len();
      ops.extend(sheets.into_iter().map(|t| CommitOp::RepointTimesheet {
        id:   t.id,
        name: new_identity.name.clone(),
        code: new_identity.code.clone(),
      }));
    }

    let mut change = EntityChange::at(now);
    change.name = update.name;
    change.code = update.code;
    change.phone = update.phone;
    change.email = update.email;
    if entity.is_site() {
      change.site_name = change.name.clone();
      change.site_code = change.code.clone();
    }
    if update.approve {
      change.approval = Some(ApprovalState::Approved);
    }
    ops.push(CommitOp::UpdateEntity { id, change });

    self.store.commit(ops).await.map_err(Error::commit)?;

    tracing::info!(actor, %id, repointed, "entity updated");
    Ok(WriteOutcome::Written { entity: updated, repointed })
  }

  // ── Merge ─────────────────────────────────────────────────────────────

  /// Open a merge flow between two colliding entities.
  pub async fn begin_merge(&self, id: Uuid, other_id: Uuid) -> Result<MergeFlow> {
    let left = self.entity(id).await?;
    let right = self.entity(other_id).await?;
    MergeFlow::begin(left, right)
  }

  /// Resolve a merge in one call: open the flow and commit it with the
  /// user-confirmed survivor and final identity.
  pub async fn resolve_merge(
    &self,
    actor: &str,
    id: Uuid,
    other_id: Uuid,
    survivor_id: Uuid,
    final_id: &EntityIdentity,
  ) -> Result<MergeOutcome> {
    let mut flow = self.begin_merge(id, other_id).await?;
    let outcome = flow.commit(&self.store, survivor_id, final_id).await?;
    tracing::info!(
      actor,
      survivor = %outcome.survivor.id,
      repointed = outcome.repointed,
      "merge resolved"
    );
    Ok(outcome)
  }

  // ── Transfer / deletion ───────────────────────────────────────────────

  /// Move all dependents from `source_id` to `target`, keeping the source.
  pub async fn transfer(
    &self,
    actor: &str,
    source_id: Uuid,
    target: Option<Uuid>,
  ) -> Result<transfer::TransferOutcome> {
    let target_id = target.ok_or(Error::NoTargetSelected)?;
    let source = self.entity(source_id).await?;
    let target = self.entity(target_id).await?;
    let outcome = transfer::transfer(&self.store, &source, &target).await?;
    tracing::info!(actor, transferred = outcome.transferred, "transfer done");
    Ok(outcome)
  }

  /// Delete `source_id`, moving dependents and child sites to `target`.
  pub async fn delete_with_transfer(
    &self,
    actor: &str,
    source_id: Uuid,
    target: Option<Uuid>,
  ) -> Result<transfer::TransferOutcome> {
    let target_id = target.ok_or(Error::NoTargetSelected)?;
    let source = self.entity(source_id).await?;
    let target = self.entity(target_id).await?;
    let outcome =
      transfer::delete_with_transfer(&self.store, &source, &target).await?;
    tracing::info!(actor, transferred = outcome.transferred, "delete+transfer done");
    Ok(outcome)
  }

  /// Delete `source_id` without a target; dependents get the sentinel
  /// identity.
  pub async fn delete_with_sentinel(
    &self,
    actor: &str,
    source_id: Uuid,
  ) -> Result<transfer::TransferOutcome> {
    let source = self.entity(source_id).await?;
    let outcome = transfer::delete_with_sentinel(&self.store, &source).await?;
    tracing::info!(actor, stamped = outcome.transferred, "delete+sentinel done");
    Ok(outcome)
  }

  // ── Timesheets ────────────────────────────────────────────────────────

  /// Record a timesheet against `entity_id`, snapshotting its current
  /// identity.
  pub async fn record_timesheet(
    &self,
    actor: &str,
    entity_id: Uuid,
    input: NewTimesheet,
  ) -> Result<TimesheetRecord> {
    let entity = self.entity(entity_id).await?;
    let identity = entity.identity();

    let record = TimesheetRecord {
      id:            Uuid::new_v4(),
      customer_name: identity.name,
      customer_code: identity.code,
      work_date:     input.work_date,
      hours:         input.hours,
      operator:      input.operator,
      machine:       input.machine,
      note:          input.note,
      created_at:    Utc::now(),
    };

    self
      .store
      .commit(vec![CommitOp::CreateTimesheet(record.clone())])
      .await
      .map_err(Error::commit)?;

    tracing::info!(actor, id = %record.id, "timesheet recorded");
    Ok(record)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  /// Fetch `id` and require it to be a top-level customer.
  async fn customer(&self, id: Uuid) -> Result<Entity> {
    let entity = self.entity(id).await?;
    if entity.is_site() {
      return Err(Error::NotACustomer(id));
    }
    Ok(entity)
  }
}
