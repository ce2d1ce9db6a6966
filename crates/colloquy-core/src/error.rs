//! Error types for `colloquy-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("note {0} has no diff position")]
  MissingDiffPosition(i64),

  #[error("note {0} has no line code")]
  MissingLineCode(i64),

  #[error("unknown noteable kind: {0:?}")]
  UnknownNoteableKind(String),

  #[error("invalid noteable id {key:?} for {kind}")]
  InvalidNoteableId { kind: String, key: String },

  #[error("invalid discussion id: {0:?}")]
  InvalidDiscussionId(String),

  #[error("discussion {0} cannot be converted to a threaded discussion")]
  NotConvertible(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
