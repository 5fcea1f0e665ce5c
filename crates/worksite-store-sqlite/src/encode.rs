//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, work dates as ISO 8601
//! dates. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use worksite_core::entity::{ApprovalState, Entity, TimesheetRecord};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(format!("bad date: {s:?}")))
}

// ─── ApprovalState ───────────────────────────────────────────────────────────

pub fn encode_approval(a: ApprovalState) -> &'static str {
  match a {
    ApprovalState::Pending => "pending",
    ApprovalState::Approved => "approved",
  }
}

pub fn decode_approval(s: &str) -> Result<ApprovalState> {
  match s {
    "pending" => Ok(ApprovalState::Pending),
    "approved" => Ok(ApprovalState::Approved),
    other => Err(Error::Decode(format!("unknown approval state: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub id:         String,
  pub name:       String,
  pub code:       String,
  pub parent_id:  Option<String>,
  pub approval:   String,
  pub site_count: i64,
  pub phone:      Option<String>,
  pub email:      Option<String>,
  pub site_name:  Option<String>,
  pub site_code:  Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawEntity {
  pub const COLUMNS: &'static str = "id, name, code, parent_id, approval, \
     site_count, phone, email, site_name, site_code, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      code:       row.get(2)?,
      parent_id:  row.get(3)?,
      approval:   row.get(4)?,
      site_count: row.get(5)?,
      phone:      row.get(6)?,
      email:      row.get(7)?,
      site_name:  row.get(8)?,
      site_code:  row.get(9)?,
      created_at: row.get(10)?,
      updated_at: row.get(11)?,
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      id:         decode_uuid(&self.id)?,
      name:       self.name,
      code:       self.code,
      parent_id:  self.parent_id.as_deref().map(decode_uuid).transpose()?,
      approval:   decode_approval(&self.approval)?,
      site_count: self.site_count as u32,
      phone:      self.phone,
      email:      self.email,
      site_name:  self.site_name,
      site_code:  self.site_code,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `timesheets` row.
pub struct RawTimesheet {
  pub id:            String,
  pub customer_name: String,
  pub customer_code: String,
  pub work_date:     String,
  pub hours:         f64,
  pub operator:      Option<String>,
  pub machine:       Option<String>,
  pub note:          Option<String>,
  pub created_at:    String,
}

impl RawTimesheet {
  pub const COLUMNS: &'static str = "id, customer_name, customer_code, \
     work_date, hours, operator, machine, note, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      customer_name: row.get(1)?,
      customer_code: row.get(2)?,
      work_date:     row.get(3)?,
      hours:         row.get(4)?,
      operator:      row.get(5)?,
      machine:       row.get(6)?,
      note:          row.get(7)?,
      created_at:    row.get(8)?,
    })
  }

  pub fn into_timesheet(self) -> Result<TimesheetRecord> {
    Ok(TimesheetRecord {
      id:            decode_uuid(&self.id)?,
      customer_name: self.customer_name,
      customer_code: self.customer_code,
      work_date:     decode_date(&self.work_date)?,
      hours:         self.hours,
      operator:      self.operator,
      machine:       self.machine,
      note:          self.note,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
