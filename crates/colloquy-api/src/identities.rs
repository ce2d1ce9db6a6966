//! Handlers for identity endpoints.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/users` | `{"username":"alice","name":"Alice"}` |
//! | `POST` | `/groups` | `{"full_path":"org/team","name":"Team"}` |
//! | `POST` | `/projects` | `{"full_path":"org/app","name":"App"}` |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use colloquy_core::{
  identity::{NewGroup, NewProject, NewUser},
  store::ColloquyStore,
};

use crate::{error::ApiError, extract::ApiJson};

/// `POST /users`
pub async fn create_user<S>(
  State(store): State<Arc<S>>,
  ApiJson(body): ApiJson<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ColloquyStore,
{
  if body.username.is_empty() {
    return Err(ApiError::BadRequest("username must not be empty".into()));
  }
  let user = store.add_user(body).await.map_err(ApiError::store)?;
  tracing::info!(user_id = user.id, username = %user.username, "user created");
  Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /groups`
pub async fn create_group<S>(
  State(store): State<Arc<S>>,
  ApiJson(body): ApiJson<NewGroup>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ColloquyStore,
{
  if body.full_path.is_empty() {
    return Err(ApiError::BadRequest("full_path must not be empty".into()));
  }
  let group = store.add_group(body).await.map_err(ApiError::store)?;
  tracing::info!(group_id = group.id, path = %group.full_path, "group created");
  Ok((StatusCode::CREATED, Json(group)))
}

/// `POST /projects`
pub async fn create_project<S>(
  State(store): State<Arc<S>>,
  ApiJson(body): ApiJson<NewProject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ColloquyStore,
{
  if body.full_path.is_empty() {
    return Err(ApiError::BadRequest("full_path must not be empty".into()));
  }
  let project = store.add_project(body).await.map_err(ApiError::store)?;
  tracing::info!(project_id = project.id, path = %project.full_path, "project created");
  Ok((StatusCode::CREATED, Json(project)))
}
