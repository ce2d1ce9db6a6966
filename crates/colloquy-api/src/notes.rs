//! Handler for `POST /noteables/:kind/:id/notes`.
//!
//! A note either starts a new thread or, with `in_reply_to`, joins an existing
//! one. `in_reply_to` takes the `reply_id` a discussion listing hands out, and
//! the reply is posted to the noteable that listing reports for the thread.
//! Replying to a standalone note first converts it into a thread. The note
//! body is scanned for mentions, which are saved alongside.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use colloquy_core::{
  Discussion,
  mention::build_mention,
  note::{NewNote, NoteType},
  noteable::NoteableRef,
  store::ColloquyStore,
  thread::ReplyId,
};
use serde::Deserialize;

use crate::{
  discussions::find_reply_thread, error::ApiError, extract::ApiJson,
  noteable_from_path,
};

/// JSON body accepted by `POST /noteables/:kind/:id/notes`.
#[derive(Debug, Deserialize)]
pub struct CreateNoteBody {
  pub author_id:   i64,
  pub body:        String,
  #[serde(default)]
  pub note_type:   NoteType,
  /// The commit a merge request note was made against.
  #[serde(default)]
  pub commit_id:   Option<String>,
  #[serde(default)]
  pub system:      bool,
  /// The `reply_id` of the thread to reply to.
  #[serde(default)]
  pub in_reply_to: Option<ReplyId>,
}

/// `POST /noteables/:kind/:id/notes`: returns 201 + the stored
/// [`Note`](colloquy_core::note::Note).
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(String, String)>,
  ApiJson(body): ApiJson<CreateNoteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ColloquyStore,
{
  let noteable = noteable_from_path(&kind, &id)?;
  if body.body.trim().is_empty() {
    return Err(ApiError::BadRequest("note body must not be empty".into()));
  }

  let input = match body.in_reply_to {
    None => NewNote {
      noteable:    noteable.clone(),
      commit_id:   body.commit_id,
      author_id:   body.author_id,
      body:        body.body,
      note_type:   body.note_type,
      system:      body.system,
      in_reply_to: None,
    },
    Some(reply) => {
      let discussion = reply_thread(store.as_ref(), &noteable, &reply).await?;

      // Replies take their locator from the thread they join.
      let first = discussion.first_note();
      NewNote {
        noteable:    noteable.clone(),
        commit_id:   first.commit_id.clone(),
        author_id:   body.author_id,
        body:        body.body,
        note_type:   first.note_type.clone(),
        system:      body.system,
        in_reply_to: Some(first.discussion_id.clone()),
      }
    }
  };

  let note = store.create_note(input).await.map_err(ApiError::store)?;
  tracing::info!(
    note_id = note.id,
    discussion_id = %note.discussion_id,
    %noteable,
    "note created"
  );

  let mention = build_mention(store.as_ref(), noteable, Some(note.id), &note.body)
    .await
    .map_err(ApiError::store)?;
  if mention.has_mentions() {
    store.save_mention(mention).await.map_err(ApiError::store)?;
  }

  Ok((StatusCode::CREATED, Json(note)))
}

/// Load the thread `reply` points at, converting a standalone note first.
///
/// The conversion is only written if the note still carries the id it was
/// loaded with. Otherwise another reply converted it first and this one joins
/// the stored thread.
async fn reply_thread<S>(
  store: &S,
  noteable: &NoteableRef,
  reply: &ReplyId,
) -> Result<Discussion, ApiError>
where
  S: ColloquyStore,
{
  let mut discussion = find_reply_thread(store, noteable, reply).await?;
  if !discussion.individual_note() {
    return Ok(discussion);
  }

  let note_id = discussion.first_note().id;
  let previous = discussion.first_note().discussion_id.clone();
  discussion.convert_to_discussion()?;
  let converted = store
    .convert_note(discussion.first_note(), &previous)
    .await
    .map_err(ApiError::store)?;
  if converted {
    tracing::info!(discussion_id = %discussion.id(), "note converted to discussion");
    return Ok(discussion);
  }

  tracing::debug!(note_id, "note already converted, reloading");
  find_reply_thread(store, noteable, &ReplyId::Note(note_id)).await
}
