//! Identities that notes and issuables can mention.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:       i64,
  /// Unique handle, referenced as `@username`.
  pub username: String,
  pub name:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub id:        i64,
  /// Unique `/`-separated path, referenced as `@full/path`.
  pub full_path: String,
  pub name:      String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub id:        i64,
  /// Unique `namespace/project` path.
  pub full_path: String,
  pub name:      String,
}

/// Input to [`crate::store::ColloquyStore::add_user`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub username: String,
  pub name:     String,
}

/// Input to [`crate::store::ColloquyStore::add_group`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
  pub full_path: String,
  pub name:      String,
}

/// Input to [`crate::store::ColloquyStore::add_project`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
  pub full_path: String,
  pub name:      String,
}
