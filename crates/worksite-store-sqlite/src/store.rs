//! [`SqliteStore`] — the SQLite implementation of [`EntityStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;
use worksite_core::{
  entity::{Entity, EntityChange, TimesheetRecord},
  store::{CommitOp, EntityFilter, EntityStore},
};

use crate::{
  Error, Result,
  encode::{
    RawEntity, RawTimesheet, encode_approval, encode_date, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A worksite store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Per-op SQL ──────────────────────────────────────────────────────────────

fn insert_entity(
  tx: &rusqlite::Transaction<'_>,
  e: &Entity,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO entities (
       id, name, code, parent_id, approval, site_count,
       phone, email, site_name, site_code, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    rusqlite::params![
      encode_uuid(e.id),
      e.name,
      e.code,
      e.parent_id.map(encode_uuid),
      encode_approval(e.approval),
      e.site_count as i64,
      e.phone,
      e.email,
      e.site_name,
      e.site_code,
      encode_dt(e.created_at),
      encode_dt(e.updated_at),
    ],
  )?;
  Ok(())
}

/// `None` fields coalesce to the stored value; `updated_at` always writes.
/// Returns the number of affected rows so the caller can detect a stale id.
fn update_entity(
  tx: &rusqlite::Transaction<'_>,
  id: Uuid,
  change: &EntityChange,
) -> rusqlite::Result<usize> {
  tx.execute(
    "UPDATE entities SET
       name       = COALESCE(?2, name),
       code       = COALESCE(?3, code),
       parent_id  = COALESCE(?4, parent_id),
       approval   = COALESCE(?5, approval),
       site_count = COALESCE(?6, site_count),
       phone      = COALESCE(?7, phone),
       email      = COALESCE(?8, email),
       site_name  = COALESCE(?9, site_name),
       site_code  = COALESCE(?10, site_code),
       updated_at = ?11
     WHERE id = ?1",
    rusqlite::params![
      encode_uuid(id),
      change.name,
      change.code,
      change.parent_id.map(encode_uuid),
      change.approval.map(encode_approval),
      change.site_count.map(|c| c as i64),
      change.phone,
      change.email,
      change.site_name,
      change.site_code,
      encode_dt(change.updated_at),
    ],
  )
}

fn insert_timesheet(
  tx: &rusqlite::Transaction<'_>,
  t: &TimesheetRecord,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO timesheets (
       id, customer_name, customer_code, work_date, hours,
       operator, machine, note, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(t.id),
      t.customer_name,
      t.customer_code,
      encode_date(t.work_date),
      t.hours,
      t.operator,
      t.machine,
      t.note,
      encode_dt(t.created_at),
    ],
  )?;
  Ok(())
}

/// Apply one batch inside `tx`. Returns `Err(id)` when an update, delete, or
/// re-point hit a row that no longer exists; the caller must roll back.
fn apply_ops(
  tx: &rusqlite::Transaction<'_>,
  ops: &[CommitOp],
) -> rusqlite::Result<std::result::Result<(), Uuid>> {
  for op in ops {
    let (affected, subject) = match op {
      CommitOp::CreateEntity(e) => {
        insert_entity(tx, e)?;
        continue;
      }
      CommitOp::CreateTimesheet(t) => {
        insert_timesheet(tx, t)?;
        continue;
      }
      CommitOp::UpdateEntity { id, change } => {
        (update_entity(tx, *id, change)?, *id)
      }
      CommitOp::DeleteEntity(id) => (
        tx.execute(
          "DELETE FROM entities WHERE id = ?1",
          rusqlite::params![encode_uuid(*id)],
        )?,
        *id,
      ),
      CommitOp::RepointTimesheet { id, name, code } => (
        tx.execute(
          "UPDATE timesheets SET customer_name = ?2, customer_code = ?3
           WHERE id = ?1",
          rusqlite::params![encode_uuid(*id), name, code],
        )?,
        *id,
      ),
    };
    if affected == 0 {
      return Ok(Err(subject));
    }
  }
  Ok(Ok(()))
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM entities WHERE id = ?1",
                RawEntity::COLUMNS
              ),
              rusqlite::params![id_str],
              RawEntity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
    let name = filter.name.clone();
    let code = filter.code.clone();
    let parent = filter.parent_id;
    let approval = filter.approval.map(encode_approval).map(str::to_owned);
    let exclude = filter.exclude_id.map(encode_uuid);

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        // Build the WHERE clause and its parameter list together; every
        // filter value is TEXT, so the params stay a plain Vec<String>.
        let mut conds: Vec<&'static str> = vec![];
        let mut params: Vec<String> = vec![];
        if let Some(name) = name {
          conds.push("name = ?");
          params.push(name);
        }
        if let Some(code) = code {
          conds.push("code = ?");
          params.push(code);
        }
        match parent {
          Some(Some(id)) => {
            conds.push("parent_id = ?");
            params.push(encode_uuid(id));
          }
          Some(None) => conds.push("parent_id IS NULL"),
          None => {}
        }
        if let Some(approval) = approval {
          conds.push("approval = ?");
          params.push(approval);
        }
        if let Some(exclude) = exclude {
          conds.push("id != ?");
          params.push(exclude);
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {} FROM entities {where_clause} ORDER BY code",
          RawEntity::COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawEntity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn timesheets_by_customer(
    &self,
    customer_name: &str,
  ) -> Result<Vec<TimesheetRecord>> {
    let name = customer_name.to_owned();

    let raws: Vec<RawTimesheet> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM timesheets WHERE customer_name = ?1
           ORDER BY work_date, created_at",
          RawTimesheet::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![name], RawTimesheet::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTimesheet::into_timesheet).collect()
  }

  async fn get_timesheet(&self, id: Uuid) -> Result<Option<TimesheetRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTimesheet> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM timesheets WHERE id = ?1",
                RawTimesheet::COLUMNS
              ),
              rusqlite::params![id_str],
              RawTimesheet::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTimesheet::into_timesheet).transpose()
  }

  async fn commit(&self, ops: Vec<CommitOp>) -> Result<()> {
    let stale: std::result::Result<(), Uuid> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = apply_ops(&tx, &ops)?;
        match outcome {
          Ok(()) => {
            tx.commit()?;
            Ok(Ok(()))
          }
          // Dropping the transaction without commit rolls everything back.
          Err(id) => Ok(Err(id)),
        }
      })
      .await?;

    stale.map_err(Error::StaleReference)
  }
}
