//! Handlers for discussion endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/noteables/:kind/:id/discussions` | Optional `?commits=sha,sha` |
//! | `POST` | `/noteables/:kind/:id/discussions/:discussion_id/resolve` | Body: `{"user_id":1}` |
//! | `POST` | `/noteables/:kind/:id/discussions/:discussion_id/unresolve` | |
//! | `PUT`  | `/noteables/:kind/:id/active_lines` | Body: `["<line code>", ...]` |
//!
//! Discussions are rebuilt from the stored notes on every request.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use colloquy_core::{
  Discussion, DiscussionId, DiscussionKind,
  note::{LineCode, Note},
  noteable::NoteableRef,
  store::ColloquyStore,
  thread::{LineActivity, ReplyId},
};
use serde::{Deserialize, Serialize};

use crate::{
  error::ApiError,
  extract::{ApiJson, ApiQuery},
  noteable_from_path,
};

// ─── View ─────────────────────────────────────────────────────────────────────

/// A discussion as rendered for one noteable.
///
/// Replies go to `noteable` with `reply_id` as `in_reply_to`. For threads
/// folded in from another noteable, `noteable` is where their notes live.
#[derive(Debug, Serialize)]
pub struct DiscussionView {
  pub id:              DiscussionId,
  pub kind:            DiscussionKind,
  pub noteable:        NoteableRef,
  pub reply_id:        ReplyId,
  pub individual_note: bool,
  pub resolvable:      bool,
  pub resolved:        bool,
  pub expanded:        bool,
  pub participant_ids: Vec<i64>,
  pub last_updated_at: DateTime<Utc>,
  pub notes:           Vec<Note>,
}

impl DiscussionView {
  pub fn new(discussion: Discussion, lines: &impl LineActivity) -> Self {
    Self {
      id:              discussion.id().clone(),
      kind:            discussion.kind(),
      noteable:        discussion.noteable().clone(),
      reply_id:        discussion.reply_id(),
      individual_note: discussion.individual_note(),
      resolvable:      discussion.resolvable(),
      resolved:        discussion.resolved(),
      expanded:        discussion.expanded(lines),
      participant_ids: discussion.participant_ids(),
      last_updated_at: discussion.last_updated_at(),
      notes:           discussion.into_notes(),
    }
  }
}

/// Load the thread `raw_id` among the notes of `noteable`.
pub(crate) async fn find_discussion<S>(
  store: &S,
  noteable: &NoteableRef,
  raw_id: &str,
) -> Result<Discussion, ApiError>
where
  S: ColloquyStore,
{
  let id = DiscussionId::parse(raw_id)?;
  let notes = store
    .list_notes(std::slice::from_ref(noteable))
    .await
    .map_err(ApiError::store)?;

  Discussion::build_collection(notes, Some(noteable))
    .into_iter()
    .find(|d| *d.id() == id)
    .ok_or_else(|| ApiError::NotFound(format!("discussion {id} not found on {noteable}")))
}

/// Load the thread of `noteable` that `reply` points at.
pub(crate) async fn find_reply_thread<S>(
  store: &S,
  noteable: &NoteableRef,
  reply: &ReplyId,
) -> Result<Discussion, ApiError>
where
  S: ColloquyStore,
{
  let notes = store
    .list_notes(std::slice::from_ref(noteable))
    .await
    .map_err(ApiError::store)?;

  Discussion::build_collection(notes, Some(noteable))
    .into_iter()
    .find(|d| d.accepts_reply(reply))
    .ok_or_else(|| ApiError::NotFound(format!("{reply} not found on {noteable}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Comma-separated commit SHAs whose notes are shown alongside.
  pub commits: Option<String>,
}

/// `GET /noteables/:kind/:id/discussions[?commits=<sha,...>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, String)>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<DiscussionView>>, ApiError>
where
  S: ColloquyStore,
{
  let noteable = noteable_from_path(&kind, &id)?;

  let mut sources = vec![noteable.clone()];
  if let Some(commits) = params.commits.as_deref() {
    sources.extend(
      commits
        .split(',')
        .map(str::trim)
        .filter(|sha| !sha.is_empty())
        .map(|sha| NoteableRef::Commit(sha.to_owned())),
    );
  }

  let notes = store.list_notes(&sources).await.map_err(ApiError::store)?;
  let lines = store.active_lines(&noteable).await.map_err(ApiError::store)?;

  let views = Discussion::build_collection(notes, Some(&noteable))
    .into_iter()
    .map(|d| DiscussionView::new(d, &lines))
    .collect();
  Ok(Json(views))
}

// ─── Resolve / unresolve ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub user_id: i64,
}

/// `POST /noteables/:kind/:id/discussions/:discussion_id/resolve`
pub async fn resolve<S>(
  State(store): State<Arc<S>>,
  Path((kind, id, discussion_id)): Path<(String, String, String)>,
  ApiJson(body): ApiJson<ResolveBody>,
) -> Result<Json<DiscussionView>, ApiError>
where
  S: ColloquyStore,
{
  let noteable = noteable_from_path(&kind, &id)?;
  let mut discussion = find_discussion(store.as_ref(), &noteable, &discussion_id).await?;
  if !discussion.resolvable() {
    return Err(ApiError::BadRequest(format!(
      "discussion {} is not resolvable",
      discussion.id()
    )));
  }

  let touched = discussion.resolve(body.user_id, Utc::now());
  store
    .update_notes(discussion.notes())
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    discussion_id = %discussion.id(),
    user_id = body.user_id,
    notes = touched.len(),
    "discussion resolved"
  );

  let lines = store.active_lines(&noteable).await.map_err(ApiError::store)?;
  Ok(Json(DiscussionView::new(discussion, &lines)))
}

/// `POST /noteables/:kind/:id/discussions/:discussion_id/unresolve`
pub async fn unresolve<S>(
  State(store): State<Arc<S>>,
  Path((kind, id, discussion_id)): Path<(String, String, String)>,
) -> Result<Json<DiscussionView>, ApiError>
where
  S: ColloquyStore,
{
  let noteable = noteable_from_path(&kind, &id)?;
  let mut discussion = find_discussion(store.as_ref(), &noteable, &discussion_id).await?;

  let touched = discussion.unresolve(Utc::now());
  if !touched.is_empty() {
    store
      .update_notes(discussion.notes())
      .await
      .map_err(ApiError::store)?;
  }
  tracing::info!(discussion_id = %discussion.id(), notes = touched.len(), "discussion unresolved");

  let lines = store.active_lines(&noteable).await.map_err(ApiError::store)?;
  Ok(Json(DiscussionView::new(discussion, &lines)))
}

// ─── Active lines ─────────────────────────────────────────────────────────────

/// `PUT /noteables/:kind/:id/active_lines`: replaces the set of diff lines
/// that legacy diff threads are checked against.
pub async fn set_active_lines<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, String)>,
  ApiJson(codes): ApiJson<Vec<LineCode>>,
) -> Result<StatusCode, ApiError>
where
  S: ColloquyStore,
{
  let noteable = noteable_from_path(&kind, &id)?;
  let count = codes.len();
  store
    .set_active_lines(&noteable, codes)
    .await
    .map_err(ApiError::store)?;
  tracing::debug!(%noteable, lines = count, "active lines replaced");
  Ok(StatusCode::NO_CONTENT)
}
