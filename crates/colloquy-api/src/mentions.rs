//! Handlers for mention endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/noteables/:kind/:id/description` | Body: `{"description":"..."}` |
//! | `GET`  | `/noteables/:kind/:id/mentions` | Optional `?note_id=N` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use colloquy_core::{
  mention::{ResolvedMentions, UserMention, build_mention, resolve_mentions},
  store::ColloquyStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  error::ApiError,
  extract::{ApiJson, ApiQuery},
  noteable_from_path,
};

/// A mention record with its ids looked up.
#[derive(Debug, Serialize)]
pub struct MentionView {
  pub note_id:      Option<i64>,
  pub has_mentions: bool,
  #[serde(flatten)]
  pub resolved:     ResolvedMentions,
}

async fn view<S>(store: &S, mention: &UserMention) -> Result<MentionView, ApiError>
where
  S: ColloquyStore,
{
  let resolved = resolve_mentions(store, mention)
    .await
    .map_err(ApiError::store)?;
  Ok(MentionView {
    note_id: mention.note_id,
    has_mentions: mention.has_mentions(),
    resolved,
  })
}

// ─── Description ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
  pub description: String,
}

/// `PUT /noteables/:kind/:id/description`: re-parse the body of the
/// noteable itself and replace its mention record.
pub async fn update_description<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, String)>,
  ApiJson(body): ApiJson<DescriptionBody>,
) -> Result<Json<MentionView>, ApiError>
where
  S: ColloquyStore,
{
  let target = noteable_from_path(&kind, &id)?;
  let mention = build_mention(store.as_ref(), target, None, &body.description)
    .await
    .map_err(ApiError::store)?;
  let mention = store.save_mention(mention).await.map_err(ApiError::store)?;
  tracing::info!(target = %mention.target, has_mentions = mention.has_mentions(), "description mentions saved");

  Ok(Json(view(store.as_ref(), &mention).await?))
}

// ─── Get ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MentionParams {
  pub note_id: Option<i64>,
}

/// `GET /noteables/:kind/:id/mentions[?note_id=N]`
///
/// A target without a stored record answers with an empty one.
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, String)>,
  ApiQuery(params): ApiQuery<MentionParams>,
) -> Result<Json<MentionView>, ApiError>
where
  S: ColloquyStore,
{
  let target = noteable_from_path(&kind, &id)?;
  let mention = store
    .get_mention(&target, params.note_id)
    .await
    .map_err(ApiError::store)?
    .unwrap_or_else(|| UserMention::new(target, params.note_id));

  Ok(Json(view(store.as_ref(), &mention).await?))
}
