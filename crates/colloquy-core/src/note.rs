//! Notes, the atomic comments that discussions are built from.
//!
//! A note is persisted with the discussion id it was minted with (or the id of
//! the thread it replied to). Some discussion kinds override that id at read
//! time; see [`Note::discussion_id`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{
  discussion::{DiscussionId, DiscussionKind},
  noteable::NoteableRef,
};

// ─── Diff locators ───────────────────────────────────────────────────────────

/// A structured locator pinning a note to a line of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffPosition {
  pub old_path: Option<String>,
  pub new_path: Option<String>,
  pub old_line: Option<i64>,
  pub new_line: Option<i64>,
}

impl DiffPosition {
  /// The ordered key tuple used when deriving discussion ids.
  pub fn key(
    &self,
  ) -> (Option<&str>, Option<&str>, Option<i64>, Option<i64>) {
    (
      self.old_path.as_deref(),
      self.new_path.as_deref(),
      self.old_line,
      self.new_line,
    )
  }

  /// The path the position points at on the new side, falling back to the
  /// old side for deleted files.
  pub fn file_path(&self) -> Option<&str> {
    self.new_path.as_deref().or(self.old_path.as_deref())
  }
}

/// Legacy string locator for a diff line: `<sha1(path)>_<old>_<new>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineCode(pub String);

impl LineCode {
  pub fn new(path: &str, old_line: i64, new_line: i64) -> Self {
    let digest = hex::encode(Sha1::digest(path.as_bytes()));
    Self(format!("{digest}_{old_line}_{new_line}"))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for LineCode {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

// ─── NoteType ────────────────────────────────────────────────────────────────

/// What kind of note this is; decides which discussion kind it starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteType {
  /// A standalone comment. Never grouped with other notes.
  #[default]
  Regular,
  /// The first note of a thread that accepts replies.
  Discussion,
  /// A comment on a diff line, located by a [`DiffPosition`].
  Diff { position: DiffPosition },
  /// A comment on a diff line, located by a legacy [`LineCode`].
  LegacyDiff { line_code: LineCode },
}

impl NoteType {
  /// The discriminant stored in the `note_type` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Regular => "regular",
      Self::Discussion => "discussion",
      Self::Diff { .. } => "diff",
      Self::LegacyDiff { .. } => "legacy_diff",
    }
  }
}

// ─── Note ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub id:            i64,
  pub noteable:      NoteableRef,
  /// For notes on a merge request made against one of its commits.
  pub commit_id:     Option<String>,
  pub author_id:     i64,
  pub body:          String,
  pub note_type:     NoteType,
  /// The stored thread id; see [`Note::discussion_id`] for the effective one.
  pub discussion_id: DiscussionId,
  /// System notes (status changes etc.) never take part in resolution.
  pub system:        bool,
  pub resolved_at:   Option<DateTime<Utc>>,
  pub resolved_by:   Option<i64>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Note {
  pub fn position(&self) -> Option<&DiffPosition> {
    match &self.note_type {
      NoteType::Diff { position } => Some(position),
      _ => None,
    }
  }

  pub fn line_code(&self) -> Option<&LineCode> {
    match &self.note_type {
      NoteType::LegacyDiff { line_code } => Some(line_code),
      _ => None,
    }
  }

  pub fn for_merge_request(&self) -> bool {
    matches!(self.noteable, NoteableRef::MergeRequest(_))
  }

  pub fn for_commit(&self) -> bool { self.noteable.is_commit() }

  /// The discussion kind this note belongs to when shown in `context`.
  ///
  /// `context` is the noteable whose page is being rendered; notes from other
  /// noteables (e.g. commit notes on a merge request page) are out of context.
  pub fn discussion_kind(&self, context: Option<&NoteableRef>) -> DiscussionKind {
    if context.is_some_and(|c| *c != self.noteable) {
      return DiscussionKind::OutOfContext;
    }
    DiscussionKind::for_note_type(self)
  }

  /// The effective thread id when shown in `context`.
  pub fn discussion_id(&self, context: Option<&NoteableRef>) -> DiscussionId {
    self
      .discussion_kind(context)
      .override_discussion_id(self)
      .unwrap_or_else(|| self.discussion_id.clone())
  }

  /// Whether this note takes part in resolution at all.
  pub fn resolvable(&self) -> bool {
    !self.system && self.discussion_kind(None).potentially_resolvable()
  }

  pub fn resolved(&self) -> bool {
    self.resolvable() && self.resolved_at.is_some()
  }
}

// ─── NewNote ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ColloquyStore::create_note`].
///
/// Timestamps, the note id and (unless replying) the discussion id are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
  pub noteable:    NoteableRef,
  #[serde(default)]
  pub commit_id:   Option<String>,
  pub author_id:   i64,
  pub body:        String,
  #[serde(default)]
  pub note_type:   NoteType,
  #[serde(default)]
  pub system:      bool,
  /// Join this existing thread instead of starting a new one.
  #[serde(default)]
  pub in_reply_to: Option<DiscussionId>,
}

impl NewNote {
  pub fn new(noteable: NoteableRef, author_id: i64, body: impl Into<String>) -> Self {
    Self {
      noteable,
      commit_id: None,
      author_id,
      body: body.into(),
      note_type: NoteType::Regular,
      system: false,
      in_reply_to: None,
    }
  }

  pub fn with_type(mut self, note_type: NoteType) -> Self {
    self.note_type = note_type;
    self
  }

  pub fn replying_to(mut self, discussion_id: DiscussionId) -> Self {
    self.in_reply_to = Some(discussion_id);
    self
  }

  /// Materialise the note with store-assigned fields.
  ///
  /// A fresh discussion id is minted from the note's own discussion kind
  /// unless the input replies to an existing thread.
  pub fn into_note(self, id: i64, now: DateTime<Utc>) -> crate::Result<Note> {
    let mut note = Note {
      id,
      noteable: self.noteable,
      commit_id: self.commit_id,
      author_id: self.author_id,
      body: self.body,
      note_type: self.note_type,
      discussion_id: DiscussionId::empty(),
      system: self.system,
      resolved_at: None,
      resolved_by: None,
      created_at: now,
      updated_at: now,
    };
    note.discussion_id = match self.in_reply_to {
      Some(existing) => existing,
      None => note.discussion_kind(None).discussion_id(&note)?,
    };
    Ok(note)
  }
}
