//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeZone, Utc};
use colloquy_core::{
  Discussion, DiscussionKind,
  discussion::DiscussionId,
  identity::{NewGroup, NewProject, NewUser},
  mention::{UserMention, build_mention, resolve_mentions},
  note::{DiffPosition, LineCode, NewNote, NoteType},
  noteable::NoteableRef,
  store::{ColloquyStore, FailureKind, StoreError as _},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn mr() -> NoteableRef { NoteableRef::MergeRequest(1) }

fn position(line: i64) -> DiffPosition {
  DiffPosition {
    old_path: Some("src/lib.rs".into()),
    new_path: Some("src/lib.rs".into()),
    old_line: None,
    new_line: Some(line),
  }
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_note() {
  let s = store().await;

  let note = s.create_note(NewNote::new(mr(), 7, "looks good")).await.unwrap();
  assert!(note.id > 0);
  assert_eq!(note.discussion_id.as_str().len(), 40);

  let fetched = s.get_note(note.id).await.unwrap().unwrap();
  assert_eq!(fetched.id, note.id);
  assert_eq!(fetched.noteable, mr());
  assert_eq!(fetched.body, "looks good");
  assert_eq!(fetched.discussion_id, note.discussion_id);
  assert_eq!(fetched.note_type, NoteType::Regular);
}

#[tokio::test]
async fn get_note_missing_returns_none() {
  let s = store().await;
  assert!(s.get_note(999).await.unwrap().is_none());
}

#[tokio::test]
async fn diff_note_position_roundtrip() {
  let s = store().await;

  let note = s
    .create_note(
      NewNote::new(mr(), 1, "off by one")
        .with_type(NoteType::Diff { position: position(10) }),
    )
    .await
    .unwrap();

  let fetched = s.get_note(note.id).await.unwrap().unwrap();
  assert_eq!(fetched.position(), Some(&position(10)));
}

#[tokio::test]
async fn list_notes_is_scoped_and_ordered() {
  let s = store().await;

  let a = s.create_note(NewNote::new(mr(), 1, "a")).await.unwrap();
  s.create_note(NewNote::new(NoteableRef::Issue(1), 1, "elsewhere"))
    .await
    .unwrap();
  let b = s.create_note(NewNote::new(mr(), 2, "b")).await.unwrap();

  let notes = s.list_notes(&[mr()]).await.unwrap();
  let ids: Vec<_> = notes.iter().map(|n| n.id).collect();
  assert_eq!(ids, vec![a.id, b.id]);

  let both = s.list_notes(&[mr(), NoteableRef::Issue(1)]).await.unwrap();
  assert_eq!(both.len(), 3);
}

#[tokio::test]
async fn reply_to_unknown_thread_errors() {
  let s = store().await;
  let bogus = DiscussionId::from_components(&["nothing".into()]);

  let err = s
    .create_note(NewNote::new(mr(), 1, "hello?").replying_to(bogus))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::DiscussionNotFound(_)));
  assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn reply_on_other_noteable_errors() {
  let s = store().await;
  let first = s
    .create_note(NewNote::new(mr(), 1, "start").with_type(NoteType::Discussion))
    .await
    .unwrap();

  let err = s
    .create_note(
      NewNote::new(NoteableRef::Issue(1), 1, "wrong place")
        .replying_to(first.discussion_id),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::DiscussionNotFound(_)));
}

// ─── Discussions over stored notes ───────────────────────────────────────────

#[tokio::test]
async fn stored_notes_build_threads() {
  let s = store().await;

  let start = s
    .create_note(
      NewNote::new(mr(), 1, "why?").with_type(NoteType::Diff { position: position(3) }),
    )
    .await
    .unwrap();
  s.create_note(
    NewNote::new(mr(), 2, "because")
      .with_type(NoteType::Diff { position: position(3) })
      .replying_to(start.discussion_id.clone()),
  )
  .await
  .unwrap();
  s.create_note(NewNote::new(mr(), 3, "+1")).await.unwrap();

  let notes = s.list_notes(&[mr()]).await.unwrap();
  let discussions = Discussion::build_collection(notes, Some(&mr()));

  assert_eq!(discussions.len(), 2);
  assert_eq!(discussions[0].kind(), DiscussionKind::Diff);
  assert_eq!(discussions[0].id(), &start.discussion_id);
  assert_eq!(discussions[0].notes().len(), 2);
  assert!(discussions[0].resolvable());
  assert_eq!(discussions[1].kind(), DiscussionKind::IndividualNote);
}

#[tokio::test]
async fn commit_notes_group_in_merge_request_context() {
  let s = store().await;
  let commit = NoteableRef::Commit("c0ffee".into());

  s.create_note(NewNote::new(commit.clone(), 1, "typo")).await.unwrap();
  s.create_note(NewNote::new(commit.clone(), 2, "also here")).await.unwrap();
  s.create_note(NewNote::new(mr(), 3, "on the MR")).await.unwrap();

  let notes = s.list_notes(&[mr(), commit]).await.unwrap();
  let discussions = Discussion::build_collection(notes, Some(&mr()));

  assert_eq!(discussions.len(), 2);
  assert_eq!(discussions[0].kind(), DiscussionKind::OutOfContext);
  assert_eq!(discussions[0].notes().len(), 2);
}

#[tokio::test]
async fn resolution_persists() {
  let s = store().await;

  let start = s
    .create_note(NewNote::new(mr(), 1, "please fix").with_type(NoteType::Discussion))
    .await
    .unwrap();
  s.create_note(
    NewNote::new(mr(), 2, "done")
      .with_type(NoteType::Discussion)
      .replying_to(start.discussion_id.clone()),
  )
  .await
  .unwrap();

  let notes = s.list_notes(&[mr()]).await.unwrap();
  let mut discussion = Discussion::from_notes(notes, Some(&mr())).unwrap();
  let touched = discussion.resolve(1, Utc::now());
  assert_eq!(touched.len(), 2);
  s.update_notes(discussion.notes()).await.unwrap();

  let reloaded = s.list_notes(&[mr()]).await.unwrap();
  let reloaded = Discussion::from_notes(reloaded, Some(&mr())).unwrap();
  assert!(reloaded.resolved());
  assert!(reloaded.notes().iter().all(|n| n.resolved_by == Some(1)));

  let mut reopened = reloaded;
  let reopened_at = Utc.timestamp_opt(1_900_000_000, 0).unwrap();
  reopened.unresolve(reopened_at);
  s.update_notes(reopened.notes()).await.unwrap();
  let again = s.get_note(start.id).await.unwrap().unwrap();
  assert!(again.resolved_at.is_none());
  assert_eq!(again.updated_at, reopened_at);
}

#[tokio::test]
async fn conversion_persists() {
  let s = store().await;
  let note = s.create_note(NewNote::new(mr(), 1, "standalone")).await.unwrap();

  let mut discussion = Discussion::from_notes(vec![note.clone()], None).unwrap();
  let new_id = discussion.convert_to_discussion().unwrap().clone();
  s.update_notes(discussion.notes()).await.unwrap();

  let fetched = s.get_note(note.id).await.unwrap().unwrap();
  assert_eq!(fetched.note_type, NoteType::Discussion);
  assert_eq!(fetched.discussion_id, new_id);

  // The converted thread now accepts replies.
  s.create_note(NewNote::new(mr(), 2, "reply").replying_to(new_id))
    .await
    .unwrap();
}

#[tokio::test]
async fn racing_conversions_keep_one_thread() {
  let s = store().await;
  let note = s.create_note(NewNote::new(mr(), 1, "standalone")).await.unwrap();
  let previous = note.discussion_id.clone();

  // Two writers load the same standalone note and convert it independently.
  let mut first = Discussion::from_notes(vec![note.clone()], None).unwrap();
  let mut second = Discussion::from_notes(vec![note.clone()], None).unwrap();
  let first_id = first.convert_to_discussion().unwrap().clone();
  let second_id = second.convert_to_discussion().unwrap().clone();
  assert_ne!(first_id, second_id);

  assert!(s.convert_note(first.first_note(), &previous).await.unwrap());
  assert!(!s.convert_note(second.first_note(), &previous).await.unwrap());

  // The loser replies to whatever id was stored.
  let stored = s.get_note(note.id).await.unwrap().unwrap();
  assert_eq!(stored.discussion_id, first_id);
  assert_eq!(stored.note_type, NoteType::Discussion);
  for author in [2, 3] {
    s.create_note(
      NewNote::new(mr(), author, "reply")
        .with_type(NoteType::Discussion)
        .replying_to(stored.discussion_id.clone()),
    )
    .await
    .unwrap();
  }

  let notes = s.list_notes(&[mr()]).await.unwrap();
  let threads = Discussion::build_collection(notes, Some(&mr()));
  assert_eq!(threads.len(), 1);
  assert_eq!(threads[0].notes().len(), 3);
  assert_eq!(*threads[0].id(), first_id);
}

// ─── Active lines ────────────────────────────────────────────────────────────

#[tokio::test]
async fn active_lines_replace_and_drive_collapse() {
  let s = store().await;
  let code = LineCode::new("src/main.rs", 1, 1);

  let note = s
    .create_note(
      NewNote::new(mr(), 1, "legacy").with_type(NoteType::LegacyDiff {
        line_code: code.clone(),
      }),
    )
    .await
    .unwrap();
  let discussion = Discussion::from_notes(vec![note], None).unwrap();

  s.set_active_lines(&mr(), vec![code.clone(), LineCode::new("x", 1, 1)])
    .await
    .unwrap();
  let lines = s.active_lines(&mr()).await.unwrap();
  assert_eq!(lines.len(), 2);
  assert!(!discussion.collapsed(&lines));

  s.set_active_lines(&mr(), vec![]).await.unwrap();
  let lines = s.active_lines(&mr()).await.unwrap();
  assert!(lines.is_empty());
  assert!(discussion.collapsed(&lines));
}

// ─── Identities & mentions ───────────────────────────────────────────────────

#[tokio::test]
async fn find_users_skips_stale_ids() {
  let s = store().await;
  let alice = s
    .add_user(NewUser { username: "alice".into(), name: "Alice".into() })
    .await
    .unwrap();

  let found = s.find_users(&[alice.id, 999]).await.unwrap();
  assert_eq!(found, vec![alice]);
  assert!(s.find_users(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_mention_resolves_to_empty_slot() {
  let s = store().await;

  let mut mention = UserMention::new(NoteableRef::Issue(1), None);
  mention.mentioned_users_ids.insert(999);
  assert!(mention.has_mentions());

  let resolved = resolve_mentions(&s, &mention).await.unwrap();
  assert!(resolved.users.is_empty());
  assert!(resolved.groups.is_empty());
  assert!(resolved.projects.is_empty());
}

#[tokio::test]
async fn build_mention_resolves_handles() {
  let s = store().await;
  let alice = s
    .add_user(NewUser { username: "alice".into(), name: "Alice".into() })
    .await
    .unwrap();
  let backend = s
    .add_group(NewGroup { full_path: "platform/backend".into(), name: "Backend".into() })
    .await
    .unwrap();
  let tools = s
    .add_project(NewProject { full_path: "tools/cli".into(), name: "CLI".into() })
    .await
    .unwrap();

  let text = "@alice and @platform/backend, see tools/cli#4 (cc @nobody)";
  let mention = build_mention(&s, mr(), Some(10), text).await.unwrap();

  assert_eq!(mention.mentioned_users_ids.iter().copied().collect::<Vec<_>>(), vec![alice.id]);
  assert_eq!(mention.mentioned_groups_ids.iter().copied().collect::<Vec<_>>(), vec![backend.id]);
  assert_eq!(mention.mentioned_projects_ids.iter().copied().collect::<Vec<_>>(), vec![tools.id]);

  let resolved = resolve_mentions(&s, &mention).await.unwrap();
  assert_eq!(resolved.users, vec![alice]);
  assert_eq!(resolved.groups, vec![backend]);
  assert_eq!(resolved.projects, vec![tools]);
}

#[tokio::test]
async fn save_mention_upserts_and_deletes_when_empty() {
  let s = store().await;
  let target = NoteableRef::Design(4);

  let mut mention = UserMention::new(target.clone(), Some(3));
  mention.mentioned_users_ids.insert(1);
  s.save_mention(mention.clone()).await.unwrap();

  mention.mentioned_users_ids.insert(2);
  s.save_mention(mention.clone()).await.unwrap();
  let stored = s.get_mention(&target, Some(3)).await.unwrap().unwrap();
  assert_eq!(stored, mention);

  let mut body = UserMention::new(target.clone(), None);
  body.mentioned_projects_ids.insert(8);
  s.save_mention(body.clone()).await.unwrap();

  let all = s.list_mentions(&target).await.unwrap();
  assert_eq!(all, vec![body, mention.clone()]);

  s.save_mention(UserMention::new(target.clone(), Some(3))).await.unwrap();
  assert!(s.get_mention(&target, Some(3)).await.unwrap().is_none());
  assert_eq!(s.list_mentions(&target).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_username_errors() {
  let s = store().await;
  let input = NewUser { username: "bob".into(), name: "Bob".into() };
  s.add_user(input.clone()).await.unwrap();
  let err = s.add_user(input).await.unwrap_err();
  assert!(matches!(err, crate::Error::Database(_)));
  assert_eq!(err.kind(), FailureKind::Conflict);
}
