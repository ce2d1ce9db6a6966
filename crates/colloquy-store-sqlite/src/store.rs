//! [`SqliteStore`], the SQLite implementation of [`ColloquyStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use colloquy_core::{
  discussion::DiscussionId,
  identity::{Group, NewGroup, NewProject, NewUser, Project, User},
  mention::{MentionTarget, UserMention},
  note::{LineCode, NewNote, Note},
  noteable::NoteableRef,
  store::ColloquyStore,
  thread::ActiveLines,
};

use crate::{
  Error, Result,
  encode::{
    NOTE_COLUMNS, RawMention, RawNote, encode_dt, encode_ids, encode_note_key,
    encode_note_type, encode_noteable, group_from_row, project_from_row,
    user_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Colloquy store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }

  /// Whether any note on `noteable` carries the stored thread id.
  async fn thread_exists(&self, noteable: &NoteableRef, discussion_id: &str) -> Result<bool> {
    let (kind, key) = encode_noteable(noteable);
    let id = discussion_id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM notes
               WHERE discussion_id = ?1 AND noteable_kind = ?2 AND noteable_key = ?3
               LIMIT 1",
              rusqlite::params![id, kind, key],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  /// Run `SELECT id, <col>, name FROM <table> WHERE id IN (...)`.
  async fn find_by_ids<T, F>(
    &self,
    table: &'static str,
    path_column: &'static str,
    ids: &[i64],
    from_row: F,
  ) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = ids.to_vec();

    let rows = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
          "SELECT id, {path_column}, name FROM {table}
           WHERE id IN ({placeholders})
           ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| from_row(row))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Run `SELECT id, <col>, name FROM <table> WHERE <col> = ?`.
  async fn find_by_path<T, F>(
    &self,
    table: &'static str,
    path_column: &'static str,
    value: &str,
    from_row: F,
  ) -> Result<Option<T>>
  where
    T: Send + 'static,
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let value = value.to_owned();

    let row = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT id, {path_column}, name FROM {table} WHERE {path_column} = ?1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], |row| from_row(row))
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  /// Insert `(path, name)` into an identity table and return the new row id.
  async fn insert_identity(
    &self,
    table: &'static str,
    path_column: &'static str,
    path: String,
    name: String,
  ) -> Result<i64> {
    let id = self
      .conn
      .call(move |conn| {
        let sql = format!("INSERT INTO {table} ({path_column}, name) VALUES (?1, ?2)");
        conn.execute(&sql, rusqlite::params![path, name])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }
}

// ─── ColloquyStore impl ──────────────────────────────────────────────────────

impl ColloquyStore for SqliteStore {
  type Error = Error;

  // ── Notes ─────────────────────────────────────────────────────────────────

  async fn create_note(&self, input: NewNote) -> Result<Note> {
    if let Some(reply_to) = &input.in_reply_to
      && !self.thread_exists(&input.noteable, reply_to.as_str()).await?
    {
      return Err(Error::DiscussionNotFound(reply_to.to_string()));
    }

    // The id is assigned by SQLite; derivation does not depend on it.
    let mut note = input.into_note(0, Utc::now())?;

    let (kind, key) = encode_noteable(&note.noteable);
    let (note_type, position, line_code) = encode_note_type(&note.note_type)?;
    let commit_id     = note.commit_id.clone();
    let author_id     = note.author_id;
    let body          = note.body.clone();
    let discussion_id = note.discussion_id.to_string();
    let system        = note.system;
    let created_at    = encode_dt(note.created_at);
    let updated_at    = encode_dt(note.updated_at);

    note.id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notes (
             noteable_kind, noteable_key, commit_id, author_id, body,
             note_type, position, line_code, discussion_id, system,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            kind,
            key,
            commit_id,
            author_id,
            body,
            note_type,
            position,
            line_code,
            discussion_id,
            system,
            created_at,
            updated_at,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(note_id = note.id, discussion_id = %note.discussion_id, "note created");
    Ok(note)
  }

  async fn get_note(&self, id: i64) -> Result<Option<Note>> {
    let raw: Option<RawNote> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawNote::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNote::into_note).transpose()
  }

  async fn list_notes(&self, noteables: &[NoteableRef]) -> Result<Vec<Note>> {
    let keys: Vec<(String, String)> = noteables.iter().map(encode_noteable).collect();

    let mut raws: Vec<RawNote> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {NOTE_COLUMNS} FROM notes
           WHERE noteable_kind = ?1 AND noteable_key = ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = Vec::new();
        for (kind, key) in &keys {
          rows.extend(
            stmt
              .query_map(rusqlite::params![kind, key], RawNote::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?,
          );
        }
        Ok(rows)
      })
      .await?;

    // Ids are assigned in creation order.
    raws.sort_by_key(|r| r.id);
    raws.dedup_by_key(|r| r.id);
    raws.into_iter().map(RawNote::into_note).collect()
  }

  async fn update_notes(&self, notes: &[Note]) -> Result<()> {
    let rows = notes
      .iter()
      .map(|n| -> Result<_> {
        let (note_type, position, line_code) = encode_note_type(&n.note_type)?;
        Ok((
          n.id,
          note_type,
          position,
          line_code,
          n.discussion_id.to_string(),
          n.resolved_at.map(encode_dt),
          n.resolved_by,
          encode_dt(n.updated_at),
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "UPDATE notes
             SET note_type = ?2, position = ?3, line_code = ?4,
                 discussion_id = ?5, resolved_at = ?6, resolved_by = ?7,
                 updated_at = ?8
             WHERE id = ?1",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn convert_note(&self, note: &Note, previous: &DiscussionId) -> Result<bool> {
    let (note_type, position, line_code) = encode_note_type(&note.note_type)?;
    let id            = note.id;
    let discussion_id = note.discussion_id.to_string();
    let updated_at    = encode_dt(note.updated_at);
    let previous      = previous.to_string();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notes
           SET note_type = ?2, position = ?3, line_code = ?4,
               discussion_id = ?5, updated_at = ?6
           WHERE id = ?1 AND discussion_id = ?7",
          rusqlite::params![
            id,
            note_type,
            position,
            line_code,
            discussion_id,
            updated_at,
            previous,
          ],
        )?)
      })
      .await?;

    let converted = changed == 1;
    tracing::debug!(note_id = id, converted, "note conversion written");
    Ok(converted)
  }

  async fn active_lines(&self, noteable: &NoteableRef) -> Result<ActiveLines> {
    let (kind, key) = encode_noteable(noteable);

    let codes: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT line_code FROM active_lines
           WHERE noteable_kind = ?1 AND noteable_key = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind, key], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ActiveLines::new(codes.into_iter().map(LineCode)))
  }

  async fn set_active_lines(
    &self,
    noteable: &NoteableRef,
    codes: Vec<LineCode>,
  ) -> Result<()> {
    let (kind, key) = encode_noteable(noteable);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM active_lines WHERE noteable_kind = ?1 AND noteable_key = ?2",
          rusqlite::params![kind, key],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO active_lines (noteable_kind, noteable_key, line_code)
             VALUES (?1, ?2, ?3)",
          )?;
          for code in &codes {
            stmt.execute(rusqlite::params![kind, key, code.as_str()])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Identities ────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let id = self
      .insert_identity("users", "username", input.username.clone(), input.name.clone())
      .await?;
    Ok(User { id, username: input.username, name: input.name })
  }

  async fn add_group(&self, input: NewGroup) -> Result<Group> {
    let id = self
      .insert_identity("namespaces", "full_path", input.full_path.clone(), input.name.clone())
      .await?;
    Ok(Group { id, full_path: input.full_path, name: input.name })
  }

  async fn add_project(&self, input: NewProject) -> Result<Project> {
    let id = self
      .insert_identity("projects", "full_path", input.full_path.clone(), input.name.clone())
      .await?;
    Ok(Project { id, full_path: input.full_path, name: input.name })
  }

  async fn find_users(&self, ids: &[i64]) -> Result<Vec<User>> {
    self.find_by_ids("users", "username", ids, user_from_row).await
  }

  async fn find_groups(&self, ids: &[i64]) -> Result<Vec<Group>> {
    self.find_by_ids("namespaces", "full_path", ids, group_from_row).await
  }

  async fn find_projects(&self, ids: &[i64]) -> Result<Vec<Project>> {
    self.find_by_ids("projects", "full_path", ids, project_from_row).await
  }

  async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
    self.find_by_path("users", "username", username, user_from_row).await
  }

  async fn find_group_by_path(&self, full_path: &str) -> Result<Option<Group>> {
    self.find_by_path("namespaces", "full_path", full_path, group_from_row).await
  }

  async fn find_project_by_path(&self, full_path: &str) -> Result<Option<Project>> {
    self.find_by_path("projects", "full_path", full_path, project_from_row).await
  }

  // ── Mentions ──────────────────────────────────────────────────────────────

  /// A record without mentions is deleted rather than stored empty.
  async fn save_mention(&self, mention: UserMention) -> Result<UserMention> {
    let (kind, key) = encode_noteable(&mention.target);
    let note_key    = encode_note_key(mention.note_id);
    let users       = encode_ids(&mention.mentioned_users_ids)?;
    let groups      = encode_ids(&mention.mentioned_groups_ids)?;
    let projects    = encode_ids(&mention.mentioned_projects_ids)?;
    let keep        = mention.has_mentions();

    self
      .conn
      .call(move |conn| {
        if keep {
          conn.execute(
            "INSERT INTO user_mentions (
               target_kind, target_key, note_key,
               mentioned_users_ids, mentioned_groups_ids, mentioned_projects_ids
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (target_kind, target_key, note_key) DO UPDATE SET
               mentioned_users_ids    = excluded.mentioned_users_ids,
               mentioned_groups_ids   = excluded.mentioned_groups_ids,
               mentioned_projects_ids = excluded.mentioned_projects_ids",
            rusqlite::params![kind, key, note_key, users, groups, projects],
          )?;
        } else {
          conn.execute(
            "DELETE FROM user_mentions
             WHERE target_kind = ?1 AND target_key = ?2 AND note_key = ?3",
            rusqlite::params![kind, key, note_key],
          )?;
        }
        Ok(())
      })
      .await?;

    Ok(mention)
  }

  async fn get_mention(
    &self,
    target: &MentionTarget,
    note_id: Option<i64>,
  ) -> Result<Option<UserMention>> {
    let (kind, key) = encode_noteable(target);
    let note_key    = encode_note_key(note_id);

    let raw: Option<RawMention> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT target_kind, target_key, note_key,
                      mentioned_users_ids, mentioned_groups_ids, mentioned_projects_ids
               FROM user_mentions
               WHERE target_kind = ?1 AND target_key = ?2 AND note_key = ?3",
              rusqlite::params![kind, key, note_key],
              RawMention::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMention::into_mention).transpose()
  }

  async fn list_mentions(&self, target: &MentionTarget) -> Result<Vec<UserMention>> {
    let (kind, key) = encode_noteable(target);

    let raws: Vec<RawMention> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT target_kind, target_key, note_key,
                  mentioned_users_ids, mentioned_groups_ids, mentioned_projects_ids
           FROM user_mentions
           WHERE target_kind = ?1 AND target_key = ?2
           ORDER BY note_key",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![kind, key], RawMention::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMention::into_mention).collect()
  }
}
