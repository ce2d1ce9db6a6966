//! Noteables, the parent entities notes attach to.
//!
//! A noteable is referenced polymorphically as a `{kind, id}` pair. Commits are
//! keyed by SHA; everything else by a numeric database id.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// The kind of entity a note (or a mention record) is attached to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoteableKind {
  Issue,
  MergeRequest,
  Commit,
  Design,
}

impl NoteableKind {
  /// The discriminant string stored in `*_kind` columns and used as the first
  /// discussion-id component.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a discriminant string, mapping failures to [`Error`].
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownNoteableKind(s.to_owned()))
  }
}

/// A reference to a single noteable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NoteableRef {
  Issue(i64),
  MergeRequest(i64),
  /// A commit, keyed by its full SHA.
  Commit(String),
  Design(i64),
}

impl NoteableRef {
  pub fn kind(&self) -> NoteableKind {
    match self {
      Self::Issue(_) => NoteableKind::Issue,
      Self::MergeRequest(_) => NoteableKind::MergeRequest,
      Self::Commit(_) => NoteableKind::Commit,
      Self::Design(_) => NoteableKind::Design,
    }
  }

  /// The id in its stored string form.
  pub fn key(&self) -> String {
    match self {
      Self::Issue(id) | Self::MergeRequest(id) | Self::Design(id) => {
        id.to_string()
      }
      Self::Commit(sha) => sha.clone(),
    }
  }

  /// Rebuild a reference from its stored `(kind, key)` pair.
  pub fn from_parts(kind: NoteableKind, key: &str) -> Result<Self> {
    let numeric = || {
      key.parse::<i64>().map_err(|_| Error::InvalidNoteableId {
        kind: kind.to_string(),
        key:  key.to_owned(),
      })
    };
    Ok(match kind {
      NoteableKind::Issue => Self::Issue(numeric()?),
      NoteableKind::MergeRequest => Self::MergeRequest(numeric()?),
      NoteableKind::Design => Self::Design(numeric()?),
      NoteableKind::Commit => {
        if key.is_empty() {
          return Err(Error::InvalidNoteableId {
            kind: kind.to_string(),
            key:  key.to_owned(),
          });
        }
        Self::Commit(key.to_owned())
      }
    })
  }

  pub fn is_commit(&self) -> bool { matches!(self, Self::Commit(_)) }
}

impl fmt::Display for NoteableRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind(), self.key())
  }
}
