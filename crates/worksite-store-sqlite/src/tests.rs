//! Integration tests for the policy layer over an in-memory SQLite store.

use chrono::NaiveDate;
use uuid::Uuid;
use worksite_core::{
  Error as CoreError,
  allocator::Allocation,
  conflict::ConflictResult,
  entity::{
    ApprovalState, DELETED_SENTINEL, Entity, EntityIdentity, NewCustomer,
    NewSite, NewTimesheet,
  },
  merge::MergeState,
  registry::{EntityUpdate, Registry, WriteOutcome},
  store::{CommitOp, EntityFilter, EntityStore},
};

use crate::SqliteStore;

const ACTOR: &str = "tester";

async fn registry() -> Registry<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Registry::new(store)
}

fn new_customer(name: &str, code: &str) -> NewCustomer {
  NewCustomer {
    name:  name.into(),
    code:  code.into(),
    phone: None,
    email: None,
  }
}

fn new_site(name: &str) -> NewSite {
  NewSite { name: name.into(), phone: None, email: None }
}

fn timesheet(hours: f64) -> NewTimesheet {
  NewTimesheet {
    work_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    hours,
    operator:  Some("op-1".into()),
    machine:   None,
    note:      None,
  }
}

fn written(outcome: WriteOutcome) -> Entity {
  match outcome {
    WriteOutcome::Written { entity, .. } => entity,
    WriteOutcome::Conflict(other) => {
      panic!("unexpected conflict with {}", other.id)
    }
  }
}

async fn customer(reg: &Registry<SqliteStore>, name: &str, code: &str) -> Entity {
  written(
    reg
      .create_customer(ACTOR, new_customer(name, code))
      .await
      .unwrap(),
  )
}

// ─── Customers ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_customer() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let fetched = reg.entity(acme.id).await.unwrap();
  assert_eq!(fetched.name, "Acme");
  assert_eq!(fetched.code, "100");
  assert!(fetched.parent_id.is_none());
  assert_eq!(fetched.approval, ApprovalState::Approved);
}

#[tokio::test]
async fn create_customer_duplicate_name_conflicts() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let outcome = reg
    .create_customer(ACTOR, new_customer("Acme", "200"))
    .await
    .unwrap();
  match outcome {
    WriteOutcome::Conflict(other) => assert_eq!(other.id, acme.id),
    WriteOutcome::Written { .. } => panic!("duplicate name slipped through"),
  }
}

#[tokio::test]
async fn create_customer_duplicate_code_conflicts() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let outcome = reg
    .create_customer(ACTOR, new_customer("Other", "100"))
    .await
    .unwrap();
  match outcome {
    WriteOutcome::Conflict(other) => assert_eq!(other.id, acme.id),
    WriteOutcome::Written { .. } => panic!("duplicate code slipped through"),
  }
}

#[tokio::test]
async fn create_customer_empty_fields_rejected() {
  let reg = registry().await;

  let err = reg
    .create_customer(ACTOR, new_customer("", "100"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MissingField("name")));

  let err = reg
    .create_customer(ACTOR, new_customer("Acme", ""))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::MissingField("code")));
}

// ─── Store queries ───────────────────────────────────────────────────────────

/// Every filter field is independent, so each single-field shape (and a
/// combination) must bind exactly the parameters its WHERE clause uses.
#[tokio::test]
async fn each_filter_shape_queries_cleanly() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  let north =
    written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());
  let store = reg.store();

  let by_name =
    store.list_entities(&EntityFilter::by_name("Acme")).await.unwrap();
  assert_eq!(by_name.len(), 1);
  assert_eq!(by_name[0].id, acme.id);

  let by_code =
    store.list_entities(&EntityFilter::by_code("200")).await.unwrap();
  assert_eq!(by_code.len(), 1);
  assert_eq!(by_code[0].id, apex.id);

  let sites =
    store.list_entities(&EntityFilter::sites_of(acme.id)).await.unwrap();
  assert_eq!(sites.len(), 1);
  assert_eq!(sites[0].id, north.id);

  let top_level = store
    .list_entities(&EntityFilter { parent_id: Some(None), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(top_level.len(), 2);

  let pending = store
    .list_entities(&EntityFilter {
      approval: Some(ApprovalState::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(pending.is_empty());

  let excluded = store
    .list_entities(&EntityFilter {
      name:       Some("Acme".into()),
      exclude_id: Some(acme.id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(excluded.is_empty());

  let all = store.list_entities(&EntityFilter::default()).await.unwrap();
  assert_eq!(all.len(), 3);
}

#[test]
fn unknown_approval_column_value_is_a_decode_error() {
  let err = crate::encode::decode_approval("rejected").unwrap_err();
  assert!(matches!(err, crate::Error::Decode(_)));
}

// ─── Allocator ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_site_gets_sequence_one() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let preview = reg.preview_site_code(acme.id).await.unwrap();
  assert_eq!(preview, Allocation::new("100", 1));

  let site =
    written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());
  assert_eq!(site.code, "100/1");
  assert_eq!(site.parent_id, Some(acme.id));
  assert_eq!(site.site_code.as_deref(), Some("100/1"));
}

#[tokio::test]
async fn freed_sequence_is_reused() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  written(reg.create_site(ACTOR, acme.id, new_site("One"), None).await.unwrap());
  let two =
    written(reg.create_site(ACTOR, acme.id, new_site("Two"), None).await.unwrap());
  written(reg.create_site(ACTOR, acme.id, new_site("Three"), None).await.unwrap());

  reg.delete_with_sentinel(ACTOR, two.id).await.unwrap();

  // Sites 100/1 and 100/3 remain; the gap comes first.
  let preview = reg.preview_site_code(acme.id).await.unwrap();
  assert_eq!(preview, Allocation::new("100", 2));

  let filled =
    written(reg.create_site(ACTOR, acme.id, new_site("Again"), None).await.unwrap());
  assert_eq!(filled.code, "100/2");
}

#[tokio::test]
async fn site_creation_increments_parent_count() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());
  written(reg.create_site(ACTOR, acme.id, new_site("South"), None).await.unwrap());

  let parent = reg.entity(acme.id).await.unwrap();
  assert_eq!(parent.site_count, 2);
}

#[tokio::test]
async fn confirmed_sequence_accepted_when_still_free() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let preview = reg.preview_site_code(acme.id).await.unwrap();
  let site = written(
    reg
      .create_site(ACTOR, acme.id, new_site("North"), Some(preview))
      .await
      .unwrap(),
  );
  assert_eq!(site.code, "100/1");
}

#[tokio::test]
async fn concurrent_sequence_take_is_detected() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  // One tab previews 100/1 ...
  let preview = reg.preview_site_code(acme.id).await.unwrap();
  // ... another tab creates a site first, taking the number.
  written(reg.create_site(ACTOR, acme.id, new_site("Other tab"), None).await.unwrap());

  let err = reg
    .create_site(ACTOR, acme.id, new_site("North"), Some(preview))
    .await
    .unwrap_err();
  match err {
    CoreError::SequenceTaken { requested, fresh } => {
      assert_eq!(requested, 1);
      assert_eq!(fresh, Allocation::new("100", 2));
    }
    other => panic!("expected SequenceTaken, got {other:?}"),
  }

  // Nothing was written by the aborted attempt.
  let sites = reg.entities(&EntityFilter::sites_of(acme.id)).await.unwrap();
  assert_eq!(sites.len(), 1);
}

#[tokio::test]
async fn sites_cannot_parent_sites() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let site =
    written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());

  let err = reg
    .create_site(ACTOR, site.id, new_site("Nested"), None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotACustomer(id) if id == site.id));
}

// ─── Edits ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rename_repoints_dependent_timesheets() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();
  reg.record_timesheet(ACTOR, acme.id, timesheet(4.5)).await.unwrap();

  let update = EntityUpdate { name: Some("Acme AS".into()), ..Default::default() };
  let outcome = reg.update_entity(ACTOR, acme.id, update).await.unwrap();
  match outcome {
    WriteOutcome::Written { entity, repointed } => {
      assert_eq!(entity.name, "Acme AS");
      assert_eq!(repointed, 2);
    }
    WriteOutcome::Conflict(_) => panic!("unexpected conflict"),
  }

  assert!(reg.timesheets("Acme").await.unwrap().is_empty());
  let sheets = reg.timesheets("Acme AS").await.unwrap();
  assert_eq!(sheets.len(), 2);
  assert!(sheets.iter().all(|t| t.customer_code == "100"));
}

#[tokio::test]
async fn edit_keeping_own_identity_is_not_a_conflict() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let update = EntityUpdate {
    name: Some("Acme".into()),
    code: Some("100".into()),
    phone: Some("555-0100".into()),
    ..Default::default()
  };
  let entity = written(reg.update_entity(ACTOR, acme.id, update).await.unwrap());
  assert_eq!(entity.phone.as_deref(), Some("555-0100"));
}

#[tokio::test]
async fn edit_colliding_with_third_party_reports_conflict() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;

  let update = EntityUpdate { name: Some("Acme".into()), ..Default::default() };
  let outcome = reg.update_entity(ACTOR, apex.id, update).await.unwrap();
  match outcome {
    WriteOutcome::Conflict(other) => assert_eq!(other.id, acme.id),
    WriteOutcome::Written { .. } => panic!("collision slipped through"),
  }

  // The colliding edit wrote nothing.
  assert_eq!(reg.entity(apex.id).await.unwrap().name, "Apex");
}

#[tokio::test]
async fn approve_flips_pending_entity() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  // Provisional stubs are created by flows outside the registry; emulate one
  // directly through the store.
  let mut stub = acme.clone();
  stub.id = Uuid::new_v4();
  stub.name = "Unknown Co".into();
  stub.code = "900".into();
  stub.approval = ApprovalState::Pending;
  reg
    .store()
    .commit(vec![CommitOp::CreateEntity(stub.clone())])
    .await
    .unwrap();

  let pending = reg
    .entities(&EntityFilter {
      approval: Some(ApprovalState::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);

  let update = EntityUpdate { approve: true, ..Default::default() };
  let entity = written(reg.update_entity(ACTOR, stub.id, update).await.unwrap());
  assert_eq!(entity.approval, ApprovalState::Approved);
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Scenario A: an edit collides, the user confirms the existing identity,
/// all dependents of both sides land on it, the edited record is deleted.
#[tokio::test]
async fn merge_combines_dependents_under_surviving_identity() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;

  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();
  reg.record_timesheet(ACTOR, acme.id, timesheet(6.0)).await.unwrap();
  for hours in [1.0, 2.0, 3.0] {
    reg.record_timesheet(ACTOR, apex.id, timesheet(hours)).await.unwrap();
  }

  let update = EntityUpdate { name: Some("Acme".into()), ..Default::default() };
  let other = match reg.update_entity(ACTOR, apex.id, update).await.unwrap() {
    WriteOutcome::Conflict(other) => other,
    WriteOutcome::Written { .. } => panic!("expected a conflict"),
  };
  assert_eq!(other.id, acme.id);

  let outcome = reg
    .resolve_merge(
      ACTOR,
      apex.id,
      acme.id,
      acme.id,
      &EntityIdentity::new("Acme", "100"),
    )
    .await
    .unwrap();
  assert_eq!(outcome.repointed, 5);
  assert_eq!(outcome.survivor.id, acme.id);

  // All five timesheets carry the surviving identity.
  let sheets = reg.timesheets("Acme").await.unwrap();
  assert_eq!(sheets.len(), 5);
  assert!(sheets.iter().all(|t| t.customer_code == "100"));
  assert!(reg.timesheets("Apex").await.unwrap().is_empty());

  // The loser is gone; the survivor holds the final identity.
  assert!(matches!(
    reg.entity(apex.id).await.unwrap_err(),
    CoreError::EntityNotFound(id) if id == apex.id
  ));
  let survivor = reg.entity(acme.id).await.unwrap();
  assert_eq!(survivor.name, "Acme");
  assert_eq!(survivor.code, "100");
}

#[tokio::test]
async fn merge_can_keep_the_edited_side_instead() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();

  // Survivorship is whichever side the user names — here the "new" record
  // wins and takes over the old identity.
  let outcome = reg
    .resolve_merge(
      ACTOR,
      apex.id,
      acme.id,
      apex.id,
      &EntityIdentity::new("Acme", "100"),
    )
    .await
    .unwrap();
  assert_eq!(outcome.survivor.id, apex.id);
  assert_eq!(outcome.repointed, 1);

  assert!(reg.entity(acme.id).await.is_err());
  let survivor = reg.entity(apex.id).await.unwrap();
  assert_eq!(survivor.name, "Acme");
  assert_eq!(survivor.code, "100");
}

#[tokio::test]
async fn self_merge_is_rejected() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let err = reg.begin_merge(acme.id, acme.id).await.unwrap_err();
  assert!(matches!(err, CoreError::SelfMerge));
}

#[tokio::test]
async fn merge_survivor_must_be_one_of_the_sides() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  let stranger = Uuid::new_v4();

  let err = reg
    .resolve_merge(
      ACTOR,
      acme.id,
      apex.id,
      stranger,
      &EntityIdentity::new("Acme", "100"),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::UnknownSurvivor(id) if id == stranger));
}

#[tokio::test]
async fn merge_final_identity_must_not_collide_with_third_party() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  let beta = customer(&reg, "Beta", "300").await;

  let mut flow = reg.begin_merge(acme.id, apex.id).await.unwrap();

  // Live validation flags the collision ...
  let check = flow
    .validate(reg.store(), &EntityIdentity::new("Beta", "300"))
    .await
    .unwrap();
  assert!(check.is_conflict());

  // ... and the commit refuses it outright.
  let err = flow
    .commit(reg.store(), acme.id, &EntityIdentity::new("Beta", "300"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::FinalIdentityConflict { .. }));
  assert_eq!(flow.state(), MergeState::AwaitingResolution);

  // Both sides and the third party are untouched.
  assert_eq!(reg.entity(acme.id).await.unwrap().name, "Acme");
  assert_eq!(reg.entity(apex.id).await.unwrap().name, "Apex");
  assert_eq!(reg.entity(beta.id).await.unwrap().name, "Beta");
}

#[tokio::test]
async fn merge_validation_exempts_both_sides() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;

  let flow = reg.begin_merge(acme.id, apex.id).await.unwrap();

  // Either side's current identity is a legal final choice.
  for proposal in [
    EntityIdentity::new("Acme", "100"),
    EntityIdentity::new("Apex", "200"),
    EntityIdentity::new("Acme", "200"),
  ] {
    let check = flow.validate(reg.store(), &proposal).await.unwrap();
    assert!(
      matches!(check, ConflictResult::NoConflict),
      "{proposal:?} should be exempt"
    );
  }
}

#[tokio::test]
async fn cancelled_merge_has_no_side_effects() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();

  let mut flow = reg.begin_merge(acme.id, apex.id).await.unwrap();
  flow.cancel();
  assert_eq!(flow.state(), MergeState::Cancelled);

  assert_eq!(reg.entity(acme.id).await.unwrap().name, "Acme");
  assert_eq!(reg.entity(apex.id).await.unwrap().name, "Apex");
  assert_eq!(reg.timesheets("Acme").await.unwrap().len(), 1);
}

/// A failure mid-commit leaves both collections at their pre-commit
/// state. The failure is injected by deleting the loser out from under the
/// flow, so the batch's delete hits zero rows and rolls everything back.
#[tokio::test]
async fn failed_merge_commit_rolls_back_everything() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();
  reg.record_timesheet(ACTOR, apex.id, timesheet(3.0)).await.unwrap();

  let mut flow = reg.begin_merge(acme.id, apex.id).await.unwrap();

  // Concurrent session removes the loser before our commit lands.
  reg
    .store()
    .commit(vec![CommitOp::DeleteEntity(apex.id)])
    .await
    .unwrap();

  let err = flow
    .commit(reg.store(), acme.id, &EntityIdentity::new("Acme", "100"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Commit(_)));
  assert_eq!(flow.state(), MergeState::AwaitingResolution);

  // No timesheet was re-pointed even though re-points preceded the failing
  // delete inside the batch.
  assert_eq!(reg.timesheets("Acme").await.unwrap().len(), 1);
  assert_eq!(reg.timesheets("Apex").await.unwrap().len(), 1);
  assert_eq!(reg.entity(acme.id).await.unwrap().name, "Acme");
}

// ─── Transfer ────────────────────────────────────────────────────────────────

/// Scenario C: five matching timesheets move; the source entity survives.
#[tokio::test]
async fn transfer_moves_dependents_and_keeps_source() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  for hours in [1.0, 2.0, 3.0, 4.0, 5.0] {
    reg.record_timesheet(ACTOR, acme.id, timesheet(hours)).await.unwrap();
  }

  let outcome =
    reg.transfer(ACTOR, acme.id, Some(apex.id)).await.unwrap();
  assert_eq!(outcome.transferred, 5);

  let moved = reg.timesheets("Apex").await.unwrap();
  assert_eq!(moved.len(), 5);
  assert!(moved.iter().all(|t| t.customer_code == "200"));
  assert!(reg.timesheets("Acme").await.unwrap().is_empty());

  // Non-destructive: the source entity still exists.
  assert!(reg.entity(acme.id).await.is_ok());
}

#[tokio::test]
async fn transfer_with_zero_matches_is_a_valid_outcome() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;

  let outcome =
    reg.transfer(ACTOR, acme.id, Some(apex.id)).await.unwrap();
  assert_eq!(outcome.transferred, 0);
}

#[tokio::test]
async fn transfer_without_target_is_rejected_before_any_read() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let err = reg.transfer(ACTOR, acme.id, None).await.unwrap_err();
  assert!(matches!(err, CoreError::NoTargetSelected));
}

#[tokio::test]
async fn transfer_to_dangling_target_is_rejected() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let ghost = Uuid::new_v4();

  let err = reg.transfer(ACTOR, acme.id, Some(ghost)).await.unwrap_err();
  assert!(matches!(err, CoreError::EntityNotFound(id) if id == ghost));
}

#[tokio::test]
async fn transfer_from_site_uses_site_identity() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let site =
    written(reg.create_site(ACTOR, acme.id, new_site("Acme North"), None).await.unwrap());
  let apex = customer(&reg, "Apex", "200").await;

  reg.record_timesheet(ACTOR, site.id, timesheet(7.0)).await.unwrap();
  let sheets = reg.timesheets("Acme North").await.unwrap();
  assert_eq!(sheets.len(), 1);
  assert_eq!(sheets[0].customer_code, "100/1");

  let outcome = reg.transfer(ACTOR, site.id, Some(apex.id)).await.unwrap();
  assert_eq!(outcome.transferred, 1);
  assert_eq!(reg.timesheets("Apex").await.unwrap().len(), 1);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_with_transfer_reparents_child_sites() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let apex = customer(&reg, "Apex", "200").await;
  let north =
    written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());
  let south =
    written(reg.create_site(ACTOR, acme.id, new_site("South"), None).await.unwrap());
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();

  let outcome = reg
    .delete_with_transfer(ACTOR, acme.id, Some(apex.id))
    .await
    .unwrap();
  assert_eq!(outcome.transferred, 1);

  // Source gone, dependents moved, no orphaned sites.
  assert!(reg.entity(acme.id).await.is_err());
  assert_eq!(reg.timesheets("Apex").await.unwrap().len(), 1);
  for id in [north.id, south.id] {
    let site = reg.entity(id).await.unwrap();
    assert_eq!(site.parent_id, Some(apex.id));
  }
  let adopted = reg.entities(&EntityFilter::sites_of(apex.id)).await.unwrap();
  assert_eq!(adopted.len(), 2);
}

#[tokio::test]
async fn delete_with_sentinel_stamps_dependents() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();
  reg.record_timesheet(ACTOR, acme.id, timesheet(2.0)).await.unwrap();

  let outcome = reg.delete_with_sentinel(ACTOR, acme.id).await.unwrap();
  assert_eq!(outcome.transferred, 2);

  assert!(reg.entity(acme.id).await.is_err());
  let stamped = reg.timesheets(DELETED_SENTINEL).await.unwrap();
  assert_eq!(stamped.len(), 2);
  assert!(stamped.iter().all(|t| t.customer_code == DELETED_SENTINEL));
}

/// With no target to re-parent sites onto, sentinel deletion must refuse a
/// customer that still has them rather than leave dangling parent links.
#[tokio::test]
async fn sentinel_delete_refuses_customer_with_sites() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;
  let north =
    written(reg.create_site(ACTOR, acme.id, new_site("North"), None).await.unwrap());

  let err = reg.delete_with_sentinel(ACTOR, acme.id).await.unwrap_err();
  assert!(
    matches!(err, CoreError::SitesAttached { id, count } if id == acme.id && count == 1)
  );

  // Nothing was deleted.
  assert!(reg.entity(acme.id).await.is_ok());
  assert_eq!(reg.entity(north.id).await.unwrap().parent_id, Some(acme.id));
}

// ─── Timesheets ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn timesheet_snapshots_entity_identity_at_record_time() {
  let reg = registry().await;
  let acme = customer(&reg, "Acme", "100").await;

  let record =
    reg.record_timesheet(ACTOR, acme.id, timesheet(8.0)).await.unwrap();
  assert_eq!(record.customer_name, "Acme");
  assert_eq!(record.customer_code, "100");

  let stored = reg
    .store()
    .get_timesheet(record.id)
    .await
    .unwrap()
    .expect("stored timesheet");
  assert_eq!(stored.hours, 8.0);
  assert_eq!(stored.operator.as_deref(), Some("op-1"));
}
