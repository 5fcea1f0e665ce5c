//! Handler for `POST /entities/:id/merge`.
//!
//! The client has already seen both colliding records (the 409 body of a
//! create or edit) and the user has confirmed a survivor and a final
//! identity. A final pair that still collides with a third party comes back
//! as 409; the client re-opens the resolution form.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worksite_core::{
  entity::{Entity, EntityIdentity},
  registry::Registry,
  store::EntityStore,
};

use crate::{ApiError, actor};

#[derive(Debug, Deserialize)]
pub struct MergeBody {
  /// The other side of the collision.
  pub other_id:    Uuid,
  /// Which of the two records survives; must be one of the two sides.
  pub survivor_id: Uuid,
  pub final_name:  String,
  pub final_code:  String,
}

#[derive(Debug, Serialize)]
pub struct MergeSummary {
  pub survivor:  Entity,
  pub repointed: usize,
}

/// `POST /entities/:id/merge` — body: [`MergeBody`].
pub async fn resolve<S: EntityStore>(
  State(registry): State<Arc<Registry<S>>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<MergeBody>,
) -> Result<Json<MergeSummary>, ApiError> {
  let final_id = EntityIdentity::new(body.final_name, body.final_code);
  let outcome = registry
    .resolve_merge(
      &actor(&headers),
      id,
      body.other_id,
      body.survivor_id,
      &final_id,
    )
    .await?;
  Ok(Json(MergeSummary {
    survivor:  outcome.survivor,
    repointed: outcome.repointed,
  }))
}
