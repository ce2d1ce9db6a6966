//! Error type for `colloquy-store-sqlite`.

use colloquy_core::store::{FailureKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] colloquy_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value the decoder does not recognise.
  #[error("corrupt row: {0}")]
  Decode(String),

  /// A reply referenced a thread that has no notes on the same noteable.
  #[error("discussion {0} not found")]
  DiscussionNotFound(String),
}

impl StoreError for Error {
  fn kind(&self) -> FailureKind {
    match self {
      Error::DiscussionNotFound(_) => FailureKind::NotFound,
      Error::Core(_) => FailureKind::Invalid,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        FailureKind::Conflict
      }
      _ => FailureKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
