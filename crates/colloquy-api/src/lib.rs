//! JSON REST API for Colloquy.
//!
//! Exposes an axum [`Router`] backed by any [`colloquy_core::store::ColloquyStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", colloquy_api::api_router(store.clone()))
//! ```

pub mod discussions;
pub mod error;
pub mod extract;
pub mod identities;
pub mod mentions;
pub mod notes;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use colloquy_core::{
  noteable::{NoteableKind, NoteableRef},
  store::ColloquyStore,
};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ColloquyStore + Clone + 'static,
{
  Router::new()
    // Identities
    .route("/users", post(identities::create_user::<S>))
    .route("/groups", post(identities::create_group::<S>))
    .route("/projects", post(identities::create_project::<S>))
    // Notes & discussions
    .route("/noteables/{kind}/{id}/notes", post(notes::create::<S>))
    .route("/noteables/{kind}/{id}/discussions", get(discussions::list::<S>))
    .route(
      "/noteables/{kind}/{id}/discussions/{discussion_id}/resolve",
      post(discussions::resolve::<S>),
    )
    .route(
      "/noteables/{kind}/{id}/discussions/{discussion_id}/unresolve",
      post(discussions::unresolve::<S>),
    )
    .route("/noteables/{kind}/{id}/active_lines", put(discussions::set_active_lines::<S>))
    // Mentions
    .route("/noteables/{kind}/{id}/description", put(mentions::update_description::<S>))
    .route("/noteables/{kind}/{id}/mentions", get(mentions::get_one::<S>))
    .with_state(store)
}

/// Parse the `{kind}/{id}` path segments into a noteable.
pub(crate) fn noteable_from_path(kind: &str, id: &str) -> Result<NoteableRef, ApiError> {
  let kind = NoteableKind::parse(kind)?;
  Ok(NoteableRef::from_parts(kind, id)?)
}
