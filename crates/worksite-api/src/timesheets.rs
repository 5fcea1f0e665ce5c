//! Handlers for `/timesheets` endpoints.
//!
//! Timesheets are managed by flows outside this service; these endpoints
//! exist so dependent re-pointing is observable end to end.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use worksite_core::{
  entity::{NewTimesheet, TimesheetRecord},
  registry::Registry,
  store::EntityStore,
};

use crate::{ApiError, actor};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Required: the denormalized customer name to look up.
  pub customer_name: String,
}

/// `GET /timesheets?customer_name=<name>`
pub async fn list<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<TimesheetRecord>>, ApiError> {
  Ok(Json(registry.timesheets(&params.customer_name).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  /// The entity the work was done for; its current identity is snapshotted
  /// onto the record.
  pub entity_id: Uuid,
  pub work_date: NaiveDate,
  pub hours:     f64,
  pub operator:  Option<String>,
  pub machine:   Option<String>,
  pub note:      Option<String>,
}

/// `POST /timesheets` — returns 201 + the stored record.
pub async fn create<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  headers: HeaderMap,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewTimesheet {
    work_date: body.work_date,
    hours:     body.hours,
    operator:  body.operator,
    machine:   body.machine,
    note:      body.note,
  };
  let record = registry
    .record_timesheet(&actor(&headers), body.entity_id, input)
    .await?;
  Ok((StatusCode::CREATED, Json(record)))
}
