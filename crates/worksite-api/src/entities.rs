//! Handlers for `/entities` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/entities` | Optional equality filters |
//! | `POST`   | `/entities` | Create customer; 409 on collision |
//! | `GET`    | `/entities/:id` | 404 if not found |
//! | `PUT`    | `/entities/:id` | Partial edit; 409 on collision |
//! | `DELETE` | `/entities/:id` | `?mode=transfer&target_id=..` or `?mode=sentinel` |
//! | `GET`    | `/entities/:id/next-code` | Allocation preview |
//! | `POST`   | `/entities/:id/sites` | Create site; 409 on sequence race |
//! | `POST`   | `/entities/:id/transfer` | Move dependents, keep source |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use worksite_core::{
  allocator::Allocation,
  entity::{ApprovalState, Entity, NewCustomer, NewSite},
  registry::{EntityUpdate, Registry, WriteOutcome},
  store::{EntityFilter, EntityStore},
  transfer::TransferOutcome,
};

use crate::{ApiError, actor};

/// Render a write outcome: 409 with the colliding record's full field set,
/// or the given success status with the written entity and re-point count.
fn write_response(outcome: WriteOutcome, success: StatusCode) -> Response {
  match outcome {
    WriteOutcome::Written { entity, repointed } => (
      success,
      Json(json!({ "entity": entity, "repointed": repointed })),
    )
      .into_response(),
    WriteOutcome::Conflict(other) => (
      StatusCode::CONFLICT,
      Json(json!({ "error": "identity collides with an existing entity",
                   "conflict": other })),
    )
      .into_response(),
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub name:      Option<String>,
  pub code:      Option<String>,
  /// Sites of this customer.
  pub parent_id: Option<Uuid>,
  /// If `true`, only top-level customers.
  #[serde(default)]
  pub top_level: bool,
  pub approval:  Option<ApprovalState>,
}

/// `GET /entities[?name=..][&code=..][&parent_id=..][&top_level=true][&approval=pending]`
pub async fn list<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Entity>>, ApiError> {
  let parent_id = match (params.parent_id, params.top_level) {
    (Some(id), _) => Some(Some(id)),
    (None, true) => Some(None),
    (None, false) => None,
  };
  let filter = EntityFilter {
    name: params.name,
    code: params.code,
    parent_id,
    approval: params.approval,
    exclude_id: None,
  };
  Ok(Json(registry.entities(&filter).await?))
}

// ─── Create customer ──────────────────────────────────────────────────────────

/// `POST /entities` — body: [`NewCustomer`].
pub async fn create_customer<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  headers: HeaderMap,
  Json(body): Json<NewCustomer>,
) -> Result<Response, ApiError> {
  let outcome = registry.create_customer(&actor(&headers), body).await?;
  Ok(write_response(outcome, StatusCode::CREATED))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /entities/:id`
pub async fn get_one<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Entity>, ApiError> {
  Ok(Json(registry.entity(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /entities/:id` — body: [`EntityUpdate`].
pub async fn update<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<EntityUpdate>,
) -> Result<Response, ApiError> {
  let outcome = registry.update_entity(&actor(&headers), id, body).await?;
  Ok(write_response(outcome, StatusCode::OK))
}

// ─── Allocation preview ───────────────────────────────────────────────────────

/// `GET /entities/:id/next-code`
pub async fn next_code<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Allocation>, ApiError> {
  Ok(Json(registry.preview_site_code(id).await?))
}

// ─── Create site ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSiteBody {
  pub name:  String,
  pub phone: Option<String>,
  pub email: Option<String>,
  /// A previously previewed sequence the user confirmed. Absent means
  /// "allocate fresh at write time".
  pub sequence: Option<u32>,
}

/// `POST /entities/:id/sites` — 409 with a fresh allocation if the confirmed
/// sequence was taken concurrently.
pub async fn create_site<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(parent_id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<CreateSiteBody>,
) -> Result<Response, ApiError> {
  let parent = registry.entity(parent_id).await?;
  let confirmed = body
    .sequence
    .map(|seq| Allocation::new(&parent.code, seq));
  let input = NewSite { name: body.name, phone: body.phone, email: body.email };

  let outcome = registry
    .create_site(&actor(&headers), parent_id, input, confirmed)
    .await?;
  Ok(write_response(outcome, StatusCode::CREATED))
}

// ─── Transfer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransferBody {
  pub target_id: Option<Uuid>,
}

/// `POST /entities/:id/transfer` — body: `{"target_id": "..."}`.
pub async fn transfer<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransferBody>,
) -> Result<Json<TransferSummary>, ApiError> {
  let outcome = registry
    .transfer(&actor(&headers), id, body.target_id)
    .await?;
  Ok(Json(TransferSummary::from(outcome)))
}

/// JSON shape reported for transfer and deletion outcomes.
#[derive(Debug, serde::Serialize)]
pub struct TransferSummary {
  pub transferred: usize,
  pub source_name: String,
  pub target_name: String,
  pub target_code: String,
}

impl From<TransferOutcome> for TransferSummary {
  fn from(o: TransferOutcome) -> Self {
    Self {
      transferred: o.transferred,
      source_name: o.source.name,
      target_name: o.target.name,
      target_code: o.target.code,
    }
  }
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
  Transfer,
  Sentinel,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  pub mode:      DeleteMode,
  pub target_id: Option<Uuid>,
}

/// `DELETE /entities/:id?mode=transfer&target_id=..` or `?mode=sentinel`.
///
/// The caller must pick how dependents are handled — an entity is never
/// deleted with its timesheets left dangling.
pub async fn delete<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Query(params): Query<DeleteParams>,
) -> Result<Json<TransferSummary>, ApiError> {
  let actor = actor(&headers);
  let outcome = match params.mode {
    DeleteMode::Transfer => {
      registry
        .delete_with_transfer(&actor, id, params.target_id)
        .await?
    }
    DeleteMode::Sentinel => registry.delete_with_sentinel(&actor, id).await?,
  };
  Ok(Json(TransferSummary::from(outcome)))
}
