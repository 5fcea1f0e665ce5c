//! JSON REST API for the worksite directory.
//!
//! Exposes an axum [`Router`] backed by any
//! [`worksite_core::store::EntityStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility; the acting user is taken from the
//! `x-actor` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", worksite_api::api_router(registry.clone()))
//! ```

pub mod entities;
pub mod error;
pub mod merge;
pub mod timesheets;

use std::sync::Arc;

use axum::{
  Router, http::HeaderMap,
  routing::{get, post},
};
use worksite_core::{registry::Registry, store::EntityStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `registry`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(registry: Arc<Registry<S>>) -> Router<()>
where
  S: EntityStore + 'static,
{
  Router::new()
    // Entities
    .route(
      "/entities",
      get(entities::list::<S>).post(entities::create_customer::<S>),
    )
    .route(
      "/entities/{id}",
      get(entities::get_one::<S>)
        .put(entities::update::<S>)
        .delete(entities::delete::<S>),
    )
    .route("/entities/{id}/next-code", get(entities::next_code::<S>))
    .route("/entities/{id}/sites", post(entities::create_site::<S>))
    .route("/entities/{id}/merge", post(merge::resolve::<S>))
    .route("/entities/{id}/transfer", post(entities::transfer::<S>))
    // Timesheets
    .route(
      "/timesheets",
      get(timesheets::list::<S>).post(timesheets::create::<S>),
    )
    .with_state(registry)
}

/// The acting user identity, from the `x-actor` header.
pub(crate) fn actor(headers: &HeaderMap) -> String {
  headers
    .get("x-actor")
    .and_then(|v| v.to_str().ok())
    .unwrap_or("anonymous")
    .to_owned()
}
