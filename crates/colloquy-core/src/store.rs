//! The `ColloquyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `colloquy-store-sqlite`).
//! Higher layers (`colloquy-api`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use crate::{
  discussion::DiscussionId,
  identity::{Group, NewGroup, NewProject, NewUser, Project, User},
  mention::{MentionTarget, UserMention},
  note::{LineCode, NewNote, Note},
  noteable::NoteableRef,
  thread::ActiveLines,
};

/// Broad class of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// A referenced record does not exist.
  NotFound,
  /// The write collides with existing data, e.g. a taken username.
  Conflict,
  /// The input was rejected before reaching storage.
  Invalid,
  Internal,
}

/// Error type of a [`ColloquyStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> FailureKind;
}

/// Abstraction over a Colloquy storage backend.
///
/// Notes are the only persisted thread data; discussions are rebuilt from them
/// on every read. Mention records are replaced wholesale whenever their source
/// text is re-parsed.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ColloquyStore: Send + Sync {
  type Error: StoreError;

  // ── Notes ─────────────────────────────────────────────────────────────

  /// Persist a new note. The store assigns the id and timestamps, and mints a
  /// discussion id unless the input replies to an existing thread.
  fn create_note(
    &self,
    input: NewNote,
  ) -> impl Future<Output = Result<Note, Self::Error>> + Send + '_;

  /// Retrieve a note by id. Returns `None` if not found.
  fn get_note(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Note>, Self::Error>> + Send + '_;

  /// All notes attached to any of `noteables`, oldest first.
  fn list_notes<'a>(
    &'a self,
    noteables: &'a [NoteableRef],
  ) -> impl Future<Output = Result<Vec<Note>, Self::Error>> + Send + 'a;

  /// Persist the mutable fields of `notes` (type, discussion id, resolution,
  /// `updated_at`) after an in-memory change such as
  /// [`Discussion::resolve`](crate::thread::Discussion::resolve).
  fn update_notes<'a>(
    &'a self,
    notes: &'a [Note],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Persist the conversion of a standalone note into a thread, provided
  /// its stored discussion id is still `previous`.
  ///
  /// Returns `false` without writing when another writer changed the id
  /// first. The caller should then reload the note and use the stored id.
  fn convert_note<'a>(
    &'a self,
    note: &'a Note,
    previous: &'a DiscussionId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// The line codes currently present in `noteable`'s diff.
  fn active_lines<'a>(
    &'a self,
    noteable: &'a NoteableRef,
  ) -> impl Future<Output = Result<ActiveLines, Self::Error>> + Send + 'a;

  /// Replace the set of line codes present in `noteable`'s diff.
  fn set_active_lines<'a>(
    &'a self,
    noteable: &'a NoteableRef,
    codes: Vec<LineCode>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Identities ────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn add_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn add_project(
    &self,
    input: NewProject,
  ) -> impl Future<Output = Result<Project, Self::Error>> + Send + '_;

  /// Users with the given ids; ids without a user are skipped.
  fn find_users<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Groups with the given ids; ids without a group are skipped.
  fn find_groups<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + 'a;

  /// Projects with the given ids; ids without a project are skipped.
  fn find_projects<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + 'a;

  fn find_user_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn find_group_by_path<'a>(
    &'a self,
    full_path: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  fn find_project_by_path<'a>(
    &'a self,
    full_path: &'a str,
  ) -> impl Future<Output = Result<Option<Project>, Self::Error>> + Send + 'a;

  // ── Mentions ──────────────────────────────────────────────────────────

  /// Insert or replace the record keyed by `(target, note_id)`.
  fn save_mention(
    &self,
    mention: UserMention,
  ) -> impl Future<Output = Result<UserMention, Self::Error>> + Send + '_;

  fn get_mention<'a>(
    &'a self,
    target: &'a MentionTarget,
    note_id: Option<i64>,
  ) -> impl Future<Output = Result<Option<UserMention>, Self::Error>> + Send + 'a;

  /// Every record for `target`: the body record first, then note records in
  /// note order.
  fn list_mentions<'a>(
    &'a self,
    target: &'a MentionTarget,
  ) -> impl Future<Output = Result<Vec<UserMention>, Self::Error>> + Send + 'a;
}
