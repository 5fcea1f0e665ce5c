//! Entity and timesheet models.
//!
//! An entity is either a customer (top-level, `parent_id: None`) or a site
//! (child of exactly one customer — no deeper nesting). Timesheets reference
//! an entity only through a denormalized (name, code) snapshot, which is why
//! every identity-changing operation must re-point them explicitly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name/code written onto timesheets whose entity was deleted without a
/// transfer target — dependents are never silently orphaned.
pub const DELETED_SENTINEL: &str = "(deleted)";

// ─── Approval ────────────────────────────────────────────────────────────────

/// Whether an entity is authoritative or a provisional stub created as a side
/// effect of referencing an unknown name elsewhere.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
  Pending,
  #[default]
  Approved,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The denormalized (name, code) pair that timesheets carry. Changing an
/// entity's identity means rewriting this snapshot on every dependent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdentity {
  pub name: String,
  pub code: String,
}

impl EntityIdentity {
  pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
    Self { name: name.into(), code: code.into() }
  }

  /// The sentinel identity for delete-without-transfer.
  pub fn deleted() -> Self {
    Self::new(DELETED_SENTINEL, DELETED_SENTINEL)
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A customer or site record.
///
/// Sites carry optional site-specific name/code fields alongside the generic
/// pair; identity resolution prefers them (see [`Entity::identity`]). `code`
/// of a site has the form `<parentCode>/<sequence>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub id:         Uuid,
  pub name:       String,
  pub code:       String,
  /// `None` for customers; `Some(customer_id)` for sites.
  pub parent_id:  Option<Uuid>,
  pub approval:   ApprovalState,
  /// Count of sites ever allocated under this entity. Informational only —
  /// the allocator always re-scans live sites instead of trusting this.
  pub site_count: u32,
  pub phone:      Option<String>,
  pub email:      Option<String>,
  pub site_name:  Option<String>,
  pub site_code:  Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Entity {
  pub fn is_site(&self) -> bool { self.parent_id.is_some() }

  /// The identity dependents are keyed on: a site prefers its site-specific
  /// fields and falls back to the generic pair; a customer always uses the
  /// generic pair.
  pub fn identity(&self) -> EntityIdentity {
    if self.is_site() {
      EntityIdentity {
        name: self.site_name.clone().unwrap_or_else(|| self.name.clone()),
        code: self.site_code.clone().unwrap_or_else(|| self.code.clone()),
      }
    } else {
      EntityIdentity { name: self.name.clone(), code: self.code.clone() }
    }
  }

  /// The trailing `/`-delimited numeric suffix of a site code, if any.
  /// `"100/3"` → `Some(3)`; `"100"` and `"100/x"` → `None`.
  pub fn sequence(&self) -> Option<u32> {
    self.code.rsplit_once('/').and_then(|(_, tail)| tail.parse().ok())
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input for creating a top-level customer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
  pub name:  String,
  pub code:  String,
  pub phone: Option<String>,
  pub email: Option<String>,
}

/// Input for creating a site under an existing customer. The code is minted
/// by the allocator, not supplied here.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSite {
  pub name:  String,
  pub phone: Option<String>,
  pub email: Option<String>,
}

/// Partial update applied to an entity inside an atomic commit. `None` fields
/// are left untouched; `updated_at` is always written.
#[derive(Debug, Clone)]
pub struct EntityChange {
  pub name:       Option<String>,
  pub code:       Option<String>,
  pub parent_id:  Option<Uuid>,
  pub approval:   Option<ApprovalState>,
  pub site_count: Option<u32>,
  pub phone:      Option<String>,
  pub email:      Option<String>,
  pub site_name:  Option<String>,
  pub site_code:  Option<String>,
  pub updated_at: DateTime<Utc>,
}

impl EntityChange {
  /// An empty change stamped with `updated_at`.
  pub fn at(updated_at: DateTime<Utc>) -> Self {
    Self {
      name: None,
      code: None,
      parent_id: None,
      approval: None,
      site_count: None,
      phone: None,
      email: None,
      site_name: None,
      site_code: None,
      updated_at,
    }
  }

  /// A change that rewrites the generic identity pair.
  pub fn identity(id: &EntityIdentity, updated_at: DateTime<Utc>) -> Self {
    Self {
      name: Some(id.name.clone()),
      code: Some(id.code.clone()),
      ..Self::at(updated_at)
    }
  }
}

// ─── Timesheets ──────────────────────────────────────────────────────────────

/// A work-log record. Links to its entity only via the denormalized
/// (customer_name, customer_code) snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimesheetRecord {
  pub id:            Uuid,
  pub customer_name: String,
  pub customer_code: String,
  pub work_date:     NaiveDate,
  pub hours:         f64,
  pub operator:      Option<String>,
  pub machine:       Option<String>,
  pub note:          Option<String>,
  pub created_at:    DateTime<Utc>,
}

/// Input for recording a timesheet against an entity; the identity snapshot
/// is taken from the entity at record time.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimesheet {
  pub work_date: NaiveDate,
  pub hours:     f64,
  pub operator:  Option<String>,
  pub machine:   Option<String>,
  pub note:      Option<String>,
}
