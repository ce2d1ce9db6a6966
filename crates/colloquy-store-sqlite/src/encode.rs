//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Diff positions and mention id
//! lists are stored as compact JSON. Noteables are split into a kind
//! discriminant and a string key.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use colloquy_core::{
  discussion::DiscussionId,
  identity::{Group, Project, User},
  mention::UserMention,
  note::{DiffPosition, LineCode, Note, NoteType},
  noteable::{NoteableKind, NoteableRef},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NoteableRef ─────────────────────────────────────────────────────────────

/// `(kind, key)` column pair.
pub fn encode_noteable(n: &NoteableRef) -> (String, String) {
  (n.kind().as_str().to_owned(), n.key())
}

pub fn decode_noteable(kind: &str, key: &str) -> Result<NoteableRef> {
  let kind = NoteableKind::parse(kind)?;
  Ok(NoteableRef::from_parts(kind, key)?)
}

// ─── NoteType ────────────────────────────────────────────────────────────────

/// `(note_type, position, line_code)` columns.
pub fn encode_note_type(
  t: &NoteType,
) -> Result<(&'static str, Option<String>, Option<String>)> {
  let position = match t {
    NoteType::Diff { position } => Some(serde_json::to_string(position)?),
    _ => None,
  };
  let line_code = match t {
    NoteType::LegacyDiff { line_code } => Some(line_code.as_str().to_owned()),
    _ => None,
  };
  Ok((t.discriminant(), position, line_code))
}

pub fn decode_note_type(
  discriminant: &str,
  position: Option<&str>,
  line_code: Option<&str>,
) -> Result<NoteType> {
  match discriminant {
    "regular" => Ok(NoteType::Regular),
    "discussion" => Ok(NoteType::Discussion),
    "diff" => {
      let raw = position
        .ok_or_else(|| Error::Decode("diff note without position".into()))?;
      let position: DiffPosition = serde_json::from_str(raw)?;
      Ok(NoteType::Diff { position })
    }
    "legacy_diff" => {
      let code = line_code
        .ok_or_else(|| Error::Decode("legacy diff note without line code".into()))?;
      Ok(NoteType::LegacyDiff { line_code: LineCode::from(code) })
    }
    other => Err(Error::Decode(format!("unknown note type: {other:?}"))),
  }
}

// ─── Id lists ────────────────────────────────────────────────────────────────

pub fn encode_ids(ids: &BTreeSet<i64>) -> Result<String> {
  Ok(serde_json::to_string(ids)?)
}

pub fn decode_ids(s: &str) -> Result<BTreeSet<i64>> {
  Ok(serde_json::from_str(s)?)
}

/// `note_key` column: `0` stands for "no note".
pub fn encode_note_key(note_id: Option<i64>) -> i64 { note_id.unwrap_or(0) }

pub fn decode_note_key(key: i64) -> Option<i64> { (key != 0).then_some(key) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawNote::from_row`].
pub const NOTE_COLUMNS: &str = "id, noteable_kind, noteable_key, commit_id, \
  author_id, body, note_type, position, line_code, discussion_id, system, \
  resolved_at, resolved_by, created_at, updated_at";

/// Raw values read directly from a `notes` row.
pub struct RawNote {
  pub id:            i64,
  pub noteable_kind: String,
  pub noteable_key:  String,
  pub commit_id:     Option<String>,
  pub author_id:     i64,
  pub body:          String,
  pub note_type:     String,
  pub position:      Option<String>,
  pub line_code:     Option<String>,
  pub discussion_id: String,
  pub system:        bool,
  pub resolved_at:   Option<String>,
  pub resolved_by:   Option<i64>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawNote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      noteable_kind: row.get(1)?,
      noteable_key:  row.get(2)?,
      commit_id:     row.get(3)?,
      author_id:     row.get(4)?,
      body:          row.get(5)?,
      note_type:     row.get(6)?,
      position:      row.get(7)?,
      line_code:     row.get(8)?,
      discussion_id: row.get(9)?,
      system:        row.get(10)?,
      resolved_at:   row.get(11)?,
      resolved_by:   row.get(12)?,
      created_at:    row.get(13)?,
      updated_at:    row.get(14)?,
    })
  }

  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      id:            self.id,
      noteable:      decode_noteable(&self.noteable_kind, &self.noteable_key)?,
      commit_id:     self.commit_id,
      author_id:     self.author_id,
      body:          self.body,
      note_type:     decode_note_type(
        &self.note_type,
        self.position.as_deref(),
        self.line_code.as_deref(),
      )?,
      discussion_id: DiscussionId::parse(&self.discussion_id)?,
      system:        self.system,
      resolved_at:   self.resolved_at.as_deref().map(decode_dt).transpose()?,
      resolved_by:   self.resolved_by,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `user_mentions` row.
pub struct RawMention {
  pub target_kind:            String,
  pub target_key:             String,
  pub note_key:               i64,
  pub mentioned_users_ids:    String,
  pub mentioned_groups_ids:   String,
  pub mentioned_projects_ids: String,
}

impl RawMention {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      target_kind:            row.get(0)?,
      target_key:             row.get(1)?,
      note_key:               row.get(2)?,
      mentioned_users_ids:    row.get(3)?,
      mentioned_groups_ids:   row.get(4)?,
      mentioned_projects_ids: row.get(5)?,
    })
  }

  pub fn into_mention(self) -> Result<UserMention> {
    Ok(UserMention {
      target:                 decode_noteable(&self.target_kind, &self.target_key)?,
      note_id:                decode_note_key(self.note_key),
      mentioned_users_ids:    decode_ids(&self.mentioned_users_ids)?,
      mentioned_groups_ids:   decode_ids(&self.mentioned_groups_ids)?,
      mentioned_projects_ids: decode_ids(&self.mentioned_projects_ids)?,
    })
  }
}

pub fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  Ok(User { id: row.get(0)?, username: row.get(1)?, name: row.get(2)? })
}

pub fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
  Ok(Group { id: row.get(0)?, full_path: row.get(1)?, name: row.get(2)? })
}

pub fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
  Ok(Project { id: row.get(0)?, full_path: row.get(1)?, name: row.get(2)? })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn note_key_zero_means_body() {
    assert_eq!(encode_note_key(None), 0);
    assert_eq!(decode_note_key(0), None);
    assert_eq!(decode_note_key(encode_note_key(Some(12))), Some(12));
  }

  #[test]
  fn diff_note_type_requires_position() {
    let err = decode_note_type("diff", None, None).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(matches!(
      decode_note_type("poll", None, None),
      Err(Error::Decode(_))
    ));
  }
}
