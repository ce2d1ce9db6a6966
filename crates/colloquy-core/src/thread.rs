//! Discussions: read-time groupings of notes.
//!
//! Discussions are never stored. [`Discussion::build_collection`] groups a
//! batch of notes by their effective discussion id in a given context.

use std::{
  collections::{HashMap, HashSet},
  fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  discussion::{DiscussionId, DiscussionKind},
  note::{DiffPosition, LineCode, Note, NoteType},
  noteable::NoteableRef,
};

// ─── Line activity ───────────────────────────────────────────────────────────

/// Answers whether a legacy line code still exists in the current diff.
pub trait LineActivity {
  fn is_active(&self, line_code: &LineCode) -> bool;
}

/// A [`LineActivity`] backed by the set of line codes in the current diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLines(HashSet<LineCode>);

impl ActiveLines {
  pub fn new(codes: impl IntoIterator<Item = LineCode>) -> Self {
    Self(codes.into_iter().collect())
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &LineCode> { self.0.iter() }
}

impl LineActivity for ActiveLines {
  fn is_active(&self, line_code: &LineCode) -> bool { self.0.contains(line_code) }
}

impl<F: Fn(&LineCode) -> bool> LineActivity for F {
  fn is_active(&self, line_code: &LineCode) -> bool { self(line_code) }
}

// ─── Discussion ──────────────────────────────────────────────────────────────

/// A thread of one or more notes sharing an effective discussion id.
#[derive(Debug, Clone, Serialize)]
pub struct Discussion {
  kind:    DiscussionKind,
  id:      DiscussionId,
  notes:   Vec<Note>,
  context: Option<NoteableRef>,
}

impl Discussion {
  /// Group `notes` into discussions as seen from `context`.
  ///
  /// Threads appear in the order their first note appears in `notes`; notes
  /// keep their input order within a thread. The kind is taken from the first
  /// note of each thread.
  pub fn build_collection(
    notes: impl IntoIterator<Item = Note>,
    context: Option<&NoteableRef>,
  ) -> Vec<Self> {
    let mut order: Vec<Self> = Vec::new();
    let mut index: HashMap<DiscussionId, usize> = HashMap::new();

    for note in notes {
      let id = note.discussion_id(context);
      match index.get(&id).copied() {
        Some(i) => order[i].notes.push(note),
        None => {
          index.insert(id.clone(), order.len());
          order.push(Self {
            kind: note.discussion_kind(context),
            id,
            notes: vec![note],
            context: context.cloned(),
          });
        }
      }
    }

    order
  }

  /// Build a single discussion from notes already known to share a thread.
  /// Returns `None` for an empty batch.
  pub fn from_notes(notes: Vec<Note>, context: Option<&NoteableRef>) -> Option<Self> {
    let first = notes.first()?;
    Some(Self {
      kind: first.discussion_kind(context),
      id: first.discussion_id(context),
      notes,
      context: context.cloned(),
    })
  }

  // ── Accessors ────────────────────────────────────────────────────────────

  pub fn kind(&self) -> DiscussionKind { self.kind }

  pub fn id(&self) -> &DiscussionId { &self.id }

  pub fn notes(&self) -> &[Note] { &self.notes }

  pub fn into_notes(self) -> Vec<Note> { self.notes }

  pub fn context(&self) -> Option<&NoteableRef> { self.context.as_ref() }

  /// Discussions always hold at least one note.
  pub fn first_note(&self) -> &Note { &self.notes[0] }

  pub fn last_note(&self) -> &Note {
    &self.notes[self.notes.len() - 1]
  }

  pub fn noteable(&self) -> &NoteableRef { &self.first_note().noteable }

  /// The handle replies should reference: the note itself for standalone
  /// notes, otherwise the discussion id stored on the first note. The stored
  /// id differs from [`Discussion::id`] for kinds that override it at read
  /// time, and only the stored id is accepted when replying.
  pub fn reply_id(&self) -> ReplyId {
    if self.kind.individual_note() {
      ReplyId::Note(self.first_note().id)
    } else {
      ReplyId::Discussion(self.first_note().discussion_id.clone())
    }
  }

  /// Whether `reply` points at a note of this thread.
  pub fn accepts_reply(&self, reply: &ReplyId) -> bool {
    match reply {
      ReplyId::Note(id) => self.notes.iter().any(|n| n.id == *id),
      ReplyId::Discussion(id) => self.notes.iter().any(|n| n.discussion_id == *id),
    }
  }

  pub fn new_discussion(&self) -> bool { self.notes.len() == 1 }

  pub fn individual_note(&self) -> bool { self.kind.individual_note() }

  pub fn diff_discussion(&self) -> bool { self.kind.diff_discussion() }

  pub fn legacy_diff_discussion(&self) -> bool {
    self.kind.legacy_diff_discussion()
  }

  pub fn position(&self) -> Option<&DiffPosition> { self.first_note().position() }

  pub fn line_code(&self) -> Option<&LineCode> { self.first_note().line_code() }

  /// Distinct note authors in order of first appearance.
  pub fn participant_ids(&self) -> Vec<i64> {
    let mut seen = HashSet::new();
    self
      .notes
      .iter()
      .map(|n| n.author_id)
      .filter(|id| seen.insert(*id))
      .collect()
  }

  pub fn last_updated_at(&self) -> DateTime<Utc> {
    self
      .notes
      .iter()
      .map(|n| n.updated_at)
      .max()
      .unwrap_or_else(|| self.first_note().updated_at)
  }

  // ── Resolution ───────────────────────────────────────────────────────────

  pub fn potentially_resolvable(&self) -> bool { self.kind.potentially_resolvable() }

  /// Resolvable when the kind allows it and at least one note takes part.
  pub fn resolvable(&self) -> bool {
    self.potentially_resolvable() && self.notes.iter().any(Note::resolvable)
  }

  /// Resolved when every resolvable note is resolved.
  pub fn resolved(&self) -> bool {
    self.resolvable()
      && self
        .notes
        .iter()
        .filter(|n| n.resolvable())
        .all(Note::resolved)
  }

  /// Legacy diff threads collapse once their line leaves the diff; all others
  /// collapse once resolved.
  pub fn collapsed(&self, lines: &impl LineActivity) -> bool {
    if self.kind.legacy_diff_discussion() {
      return !self.line_code().is_some_and(|code| lines.is_active(code));
    }
    self.resolved()
  }

  pub fn expanded(&self, lines: &impl LineActivity) -> bool { !self.collapsed(lines) }

  /// Mark every unresolved resolvable note as resolved by `user_id`.
  /// Returns the ids of the notes that changed.
  pub fn resolve(&mut self, user_id: i64, at: DateTime<Utc>) -> Vec<i64> {
    if !self.resolvable() {
      return Vec::new();
    }
    let mut touched = Vec::new();
    for note in self.notes.iter_mut().filter(|n| n.resolvable()) {
      if note.resolved_at.is_none() {
        note.resolved_at = Some(at);
        note.resolved_by = Some(user_id);
        note.updated_at = at;
        touched.push(note.id);
      }
    }
    touched
  }

  /// Clear resolution on every resolved note. Returns the ids that changed.
  pub fn unresolve(&mut self, at: DateTime<Utc>) -> Vec<i64> {
    let mut touched = Vec::new();
    for note in self.notes.iter_mut().filter(|n| n.resolved_at.is_some()) {
      note.resolved_at = None;
      note.resolved_by = None;
      note.updated_at = at;
      touched.push(note.id);
    }
    touched
  }

  /// Turn a standalone note into a thread that accepts replies.
  ///
  /// The note becomes a `Discussion` note with a freshly minted id.
  pub fn convert_to_discussion(&mut self) -> Result<&DiscussionId> {
    if !self.kind.can_convert_to_discussion() {
      return Err(Error::NotConvertible(self.id.to_string()));
    }
    let kind = DiscussionKind::Simple;
    let mut id = None;
    for note in &mut self.notes {
      note.note_type = NoteType::Discussion;
      let minted = match &id {
        Some(existing) => DiscussionId::clone(existing),
        None => kind.discussion_id(note)?,
      };
      note.discussion_id = minted.clone();
      id = Some(minted);
    }
    self.kind = kind;
    if let Some(id) = id {
      self.id = id;
    }
    Ok(&self.id)
  }
}

/// What a reply should point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReplyId {
  Note(i64),
  Discussion(DiscussionId),
}

impl fmt::Display for ReplyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Note(id) => write!(f, "note {id}"),
      Self::Discussion(id) => write!(f, "discussion {id}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::note::NewNote;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn make(id: i64, new: NewNote) -> Note { new.into_note(id, at(1_000 + id)).unwrap() }

  fn mr() -> NoteableRef { NoteableRef::MergeRequest(1) }

  #[test]
  fn replies_join_their_thread() {
    let first = make(1, NewNote::new(mr(), 1, "start").with_type(NoteType::Discussion));
    let reply = make(
      2,
      NewNote::new(mr(), 2, "reply")
        .with_type(NoteType::Discussion)
        .replying_to(first.discussion_id.clone()),
    );
    let other = make(3, NewNote::new(mr(), 1, "standalone"));

    let discussions = Discussion::build_collection(vec![first, reply, other], None);
    assert_eq!(discussions.len(), 2);
    assert_eq!(discussions[0].kind(), DiscussionKind::Simple);
    assert_eq!(discussions[0].notes().len(), 2);
    assert_eq!(discussions[0].participant_ids(), vec![1, 2]);
    assert_eq!(discussions[1].kind(), DiscussionKind::IndividualNote);
    assert_eq!(discussions[1].reply_id(), ReplyId::Note(3));
    assert!(discussions[1].accepts_reply(&ReplyId::Note(3)));
    assert!(!discussions[0].accepts_reply(&ReplyId::Note(3)));
  }

  #[test]
  fn individual_notes_never_group() {
    let notes: Vec<_> = (1..=3).map(|i| make(i, NewNote::new(mr(), 1, "same text"))).collect();
    let discussions = Discussion::build_collection(notes, None);
    assert_eq!(discussions.len(), 3);
  }

  #[test]
  fn commit_notes_collapse_in_merge_request_context() {
    let sha = "0123abcd".to_string();
    let notes = vec![
      make(1, NewNote::new(NoteableRef::Commit(sha.clone()), 1, "a")),
      make(2, NewNote::new(NoteableRef::Commit(sha.clone()), 2, "b")),
      make(3, NewNote::new(mr(), 3, "on the MR")),
    ];

    let on_mr = Discussion::build_collection(notes.clone(), Some(&mr()));
    assert_eq!(on_mr.len(), 2);
    assert_eq!(on_mr[0].kind(), DiscussionKind::OutOfContext);
    assert_eq!(on_mr[0].notes().len(), 2);
    assert!(!on_mr[0].potentially_resolvable());

    // The reply handle is the stored id, not the read-time override.
    let stored = on_mr[0].first_note().discussion_id.clone();
    assert_ne!(&stored, on_mr[0].id());
    assert_eq!(on_mr[0].reply_id(), ReplyId::Discussion(stored));

    let on_commit =
      Discussion::build_collection(notes, Some(&NoteableRef::Commit(sha)));
    // Both commit notes are individual there; the MR note is out of context.
    assert_eq!(on_commit.len(), 3);
  }

  #[test]
  fn resolve_and_unresolve() {
    let first = make(1, NewNote::new(mr(), 1, "start").with_type(NoteType::Discussion));
    let mut system = NewNote::new(mr(), 1, "marked as draft")
      .with_type(NoteType::Discussion)
      .replying_to(first.discussion_id.clone());
    system.system = true;
    let system = make(2, system);

    let mut discussion = Discussion::from_notes(vec![first, system], None).unwrap();
    assert!(discussion.resolvable());
    assert!(!discussion.resolved());

    let touched = discussion.resolve(9, at(5_000));
    assert_eq!(touched, vec![1]);
    assert!(discussion.resolved());
    assert!(discussion.collapsed(&ActiveLines::default()));
    assert_eq!(discussion.first_note().resolved_by, Some(9));

    assert_eq!(discussion.unresolve(at(6_000)), vec![1]);
    assert!(!discussion.resolved());
    assert_eq!(discussion.last_updated_at(), at(6_000));
    assert!(discussion.unresolve(at(7_000)).is_empty());
  }

  #[test]
  fn individual_notes_cannot_be_resolved() {
    let mut discussion =
      Discussion::from_notes(vec![make(1, NewNote::new(mr(), 1, "x"))], None).unwrap();
    assert!(!discussion.resolvable());
    assert!(discussion.resolve(1, at(0)).is_empty());
  }

  #[test]
  fn legacy_diff_collapses_when_line_inactive() {
    let code = LineCode::new("src/main.rs", 3, 3);
    let note = make(
      1,
      NewNote::new(mr(), 1, "nit").with_type(NoteType::LegacyDiff {
        line_code: code.clone(),
      }),
    );
    let discussion = Discussion::from_notes(vec![note], None).unwrap();
    assert!(!discussion.potentially_resolvable());

    let active = ActiveLines::new([code]);
    assert!(!discussion.collapsed(&active));
    assert!(discussion.expanded(&active));
    assert!(discussion.collapsed(&ActiveLines::default()));
    assert!(discussion.collapsed(&|_: &LineCode| false));
  }

  #[test]
  fn convert_individual_note_to_thread() {
    let note = make(1, NewNote::new(mr(), 1, "x"));
    let old_id = note.discussion_id.clone();
    let mut discussion = Discussion::from_notes(vec![note], None).unwrap();

    let new_id = discussion.convert_to_discussion().unwrap().clone();
    assert_ne!(new_id, old_id);
    assert_eq!(discussion.kind(), DiscussionKind::Simple);
    assert_eq!(discussion.first_note().discussion_id, new_id);
    assert!(discussion.resolvable());

    assert!(matches!(
      discussion.convert_to_discussion(),
      Err(Error::NotConvertible(_))
    ));
  }
}
