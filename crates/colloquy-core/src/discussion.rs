//! Discussion kinds and discussion-id derivation.
//!
//! Every note carries a discussion id. Notes sharing an id form one thread.
//! The id is the SHA-1 of an ordered list of [`IdComponent`]s joined with
//! `-`. The list always starts with the noteable kind and key, and each
//! [`DiscussionKind`] appends its own components:
//!
//! | Kind | Appended components |
//! |------|---------------------|
//! | `Diff` | old path, new path, old line, new line |
//! | `LegacyDiff` | line code |
//! | `IndividualNote`, `Simple` | 16 random bytes, hex |
//! | `Commit` | commit id |
//! | `OutOfContext` | nothing |
//!
//! `Commit` and `OutOfContext` also override the stored id at read time, so
//! every note sharing their base lands in one thread.

use std::fmt;

use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  Error, Result,
  note::{Note, NoteType},
  noteable::NoteableRef,
};

/// Number of random bytes in a thread-starting token.
pub const RANDOM_TOKEN_BYTES: usize = 16;

// ─── IdComponent ─────────────────────────────────────────────────────────────

/// One primitive value in a discussion-id preimage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdComponent {
  Text(String),
  Int(i64),
  Null,
}

impl From<&str> for IdComponent {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for IdComponent {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for IdComponent {
  fn from(n: i64) -> Self { Self::Int(n) }
}

impl<T: Into<IdComponent>> From<Option<T>> for IdComponent {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

impl fmt::Display for IdComponent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Int(n) => write!(f, "{n}"),
      Self::Null => Ok(()),
    }
  }
}

/// Join components into the canonical hyphen-separated preimage.
pub fn join_components(components: &[IdComponent]) -> String {
  components
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("-")
}

// ─── DiscussionId ────────────────────────────────────────────────────────────

/// A 40-character lowercase hex thread identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscussionId(String);

impl DiscussionId {
  /// Hash a component list into an id.
  pub fn from_components(components: &[IdComponent]) -> Self {
    let preimage = join_components(components);
    Self(hex::encode(Sha1::digest(preimage.as_bytes())))
  }

  /// Validate a caller-supplied id (API paths, stored rows).
  pub fn parse(s: &str) -> Result<Self> {
    let valid = s.len() == 40
      && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidDiscussionId(s.to_owned()))
    }
  }

  pub(crate) fn empty() -> Self { Self(String::new()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DiscussionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── DiscussionKind ──────────────────────────────────────────────────────────

/// The closed set of discussion variants.
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
pub enum DiscussionKind {
  /// Thread on a diff line located by a [`DiffPosition`](crate::note::DiffPosition).
  Diff,
  /// Thread on a diff line located by a legacy line code.
  LegacyDiff,
  /// A single standalone note.
  IndividualNote,
  /// A plain thread accepting replies.
  Simple,
  /// Notes on a merge request made against one commit.
  Commit,
  /// Notes shown on a noteable other than their own.
  OutOfContext,
}

impl DiscussionKind {
  /// The kind a note starts when shown on its own noteable.
  pub fn for_note_type(note: &Note) -> Self {
    match &note.note_type {
      NoteType::Diff { .. } => Self::Diff,
      NoteType::LegacyDiff { .. } => Self::LegacyDiff,
      NoteType::Discussion => Self::Simple,
      NoteType::Regular if note.commit_id.is_some() && !note.for_commit() => {
        Self::Commit
      }
      NoteType::Regular => Self::IndividualNote,
    }
  }

  // ── Id derivation ────────────────────────────────────────────────────────

  /// The ordered components for `note` under this kind.
  ///
  /// `IndividualNote` and `Simple` include a fresh random token, so repeated
  /// calls return different lists. Fails when the kind needs a diff locator
  /// that the note does not carry.
  pub fn build_discussion_id(self, note: &Note) -> Result<Vec<IdComponent>> {
    let mut components = base_discussion_id(note);
    match self {
      Self::Diff => {
        let position = note
          .position()
          .ok_or(Error::MissingDiffPosition(note.id))?;
        let (old_path, new_path, old_line, new_line) = position.key();
        components.extend([
          old_path.into(),
          new_path.into(),
          old_line.into(),
          new_line.into(),
        ]);
      }
      Self::LegacyDiff => {
        let line_code = note.line_code().ok_or(Error::MissingLineCode(note.id))?;
        components.push(line_code.as_str().into());
      }
      Self::IndividualNote | Self::Simple => {
        components.push(random_token().into());
      }
      Self::Commit => components.push(note.commit_id.as_deref().into()),
      Self::OutOfContext => {}
    }
    Ok(components)
  }

  /// Hash [`build_discussion_id`](Self::build_discussion_id) into an id.
  pub fn discussion_id(self, note: &Note) -> Result<DiscussionId> {
    Ok(DiscussionId::from_components(&self.build_discussion_id(note)?))
  }

  /// A read-time replacement for the note's stored id, for kinds that group
  /// notes by a stable hash instead of the id the note was minted with.
  pub fn override_discussion_id(self, note: &Note) -> Option<DiscussionId> {
    match self {
      Self::OutOfContext => {
        Some(DiscussionId::from_components(&base_discussion_id(note)))
      }
      Self::Commit => {
        let mut components = base_discussion_id(note);
        components.push(note.commit_id.as_deref().into());
        Some(DiscussionId::from_components(&components))
      }
      _ => None,
    }
  }

  // ── Static policy ────────────────────────────────────────────────────────

  /// Whether discussions of this kind can ever be marked resolved.
  pub fn potentially_resolvable(self) -> bool {
    matches!(self, Self::Diff | Self::Simple)
  }

  pub fn individual_note(self) -> bool { self == Self::IndividualNote }

  pub fn diff_discussion(self) -> bool {
    matches!(self, Self::Diff | Self::LegacyDiff)
  }

  pub fn legacy_diff_discussion(self) -> bool { self == Self::LegacyDiff }

  /// Only standalone notes can be turned into a thread that accepts replies.
  pub fn can_convert_to_discussion(self) -> bool { self.individual_note() }
}

/// `[noteable kind, noteable key]`: the prefix shared by every kind.
pub fn base_discussion_id(note: &Note) -> Vec<IdComponent> {
  vec![
    note.noteable.kind().as_str().into(),
    note.noteable.key().into(),
  ]
}

/// Derive the ordered id components for `note` under `kind`, as seen from
/// `context`.
///
/// A note shown on a noteable other than its own is out of context there
/// whatever `kind` says, and yields only the base components. `None` means
/// the note's own noteable.
pub fn compute_discussion_id(
  kind: DiscussionKind,
  note: &Note,
  context: Option<&NoteableRef>,
) -> Result<Vec<IdComponent>> {
  match note.discussion_kind(context) {
    DiscussionKind::OutOfContext => DiscussionKind::OutOfContext.build_discussion_id(note),
    _ => kind.build_discussion_id(note),
  }
}

fn random_token() -> String {
  let mut bytes = [0u8; RANDOM_TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::note::{DiffPosition, LineCode, NewNote};

  fn note(noteable: NoteableRef, note_type: NoteType) -> Note {
    NewNote::new(noteable, 1, "body")
      .with_type(note_type)
      .into_note(10, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
      .unwrap()
  }

  fn position() -> DiffPosition {
    DiffPosition {
      old_path: Some("src/lib.rs".into()),
      new_path: Some("src/lib.rs".into()),
      old_line: None,
      new_line: Some(12),
    }
  }

  #[test]
  fn diff_components_are_deterministic() {
    let a = note(
      NoteableRef::MergeRequest(5),
      NoteType::Diff { position: position() },
    );
    let b = note(
      NoteableRef::MergeRequest(5),
      NoteType::Diff { position: position() },
    );

    let ca = compute_discussion_id(DiscussionKind::Diff, &a, None).unwrap();
    let cb = compute_discussion_id(DiscussionKind::Diff, &b, None).unwrap();
    assert_eq!(ca, cb);
    assert_eq!(
      ca,
      vec![
        IdComponent::from("merge_request"),
        IdComponent::from("5"),
        IdComponent::from("src/lib.rs"),
        IdComponent::from("src/lib.rs"),
        IdComponent::Null,
        IdComponent::Int(12),
      ]
    );
    assert_eq!(join_components(&ca), "merge_request-5-src/lib.rs-src/lib.rs--12");
  }

  #[test]
  fn legacy_diff_appends_line_code() {
    let code = LineCode::new("README.md", 1, 2);
    let n = note(
      NoteableRef::MergeRequest(5),
      NoteType::LegacyDiff { line_code: code.clone() },
    );
    let components = compute_discussion_id(DiscussionKind::LegacyDiff, &n, None).unwrap();
    assert_eq!(components.last(), Some(&IdComponent::Text(code.0)));
  }

  #[test]
  fn individual_note_components_differ_per_call() {
    let n = note(NoteableRef::Issue(3), NoteType::Regular);
    let a = compute_discussion_id(DiscussionKind::IndividualNote, &n, None).unwrap();
    let b = compute_discussion_id(DiscussionKind::IndividualNote, &n, None).unwrap();
    assert_ne!(a, b);
    match a.last() {
      Some(IdComponent::Text(token)) => assert_eq!(token.len(), 2 * RANDOM_TOKEN_BYTES),
      other => panic!("expected a hex token, got {other:?}"),
    }
  }

  #[test]
  fn out_of_context_id_is_stable_for_equal_bases() {
    let a = note(NoteableRef::Commit("deadbeef".into()), NoteType::Regular);
    let b = note(NoteableRef::Commit("deadbeef".into()), NoteType::Discussion);

    let id_a = DiscussionKind::OutOfContext.override_discussion_id(&a).unwrap();
    let id_b = DiscussionKind::OutOfContext.override_discussion_id(&b).unwrap();
    assert_eq!(id_a, id_b);

    // Fixed preimage, so the id is stable across processes.
    let expected = hex::encode(Sha1::digest(b"commit-deadbeef"));
    assert_eq!(id_a.as_str(), expected);
  }

  #[test]
  fn commit_override_groups_by_commit() {
    let mut a = note(NoteableRef::MergeRequest(5), NoteType::Regular);
    a.commit_id = Some("abc".into());
    let mut b = a.clone();
    b.id = 11;
    let mut c = a.clone();
    c.commit_id = Some("def".into());

    assert_eq!(DiscussionKind::for_note_type(&a), DiscussionKind::Commit);
    let id_a = DiscussionKind::Commit.override_discussion_id(&a);
    assert_eq!(id_a, DiscussionKind::Commit.override_discussion_id(&b));
    assert_ne!(id_a, DiscussionKind::Commit.override_discussion_id(&c));
  }

  #[test]
  fn foreign_context_yields_base_components() {
    let n = note(NoteableRef::Commit("abc123".into()), NoteType::Regular);
    let mr = NoteableRef::MergeRequest(5);

    let own = compute_discussion_id(DiscussionKind::Simple, &n, Some(&n.noteable)).unwrap();
    assert_eq!(own.len(), 3);

    let foreign = compute_discussion_id(DiscussionKind::Simple, &n, Some(&mr)).unwrap();
    assert_eq!(
      foreign,
      vec![IdComponent::from("commit"), IdComponent::from("abc123")]
    );
    assert_eq!(foreign, base_discussion_id(&n));
  }

  #[test]
  fn missing_locators_are_errors() {
    let n = note(NoteableRef::MergeRequest(5), NoteType::Regular);
    assert!(matches!(
      compute_discussion_id(DiscussionKind::Diff, &n, None),
      Err(Error::MissingDiffPosition(10))
    ));
    assert!(matches!(
      compute_discussion_id(DiscussionKind::LegacyDiff, &n, None),
      Err(Error::MissingLineCode(10))
    ));
  }

  #[test]
  fn resolvability_table() {
    use DiscussionKind::*;
    for kind in [LegacyDiff, IndividualNote, Commit, OutOfContext] {
      assert!(!kind.potentially_resolvable(), "{kind} should not be resolvable");
    }
    for kind in [Diff, Simple] {
      assert!(kind.potentially_resolvable(), "{kind} should be resolvable");
    }
  }

  #[test]
  fn discussion_id_parse_validates_hex() {
    let id = DiscussionId::from_components(&["issue".into(), "1".into()]);
    assert_eq!(DiscussionId::parse(id.as_str()).unwrap(), id);
    assert!(DiscussionId::parse("not-an-id").is_err());
    assert!(DiscussionId::parse(&"A".repeat(40)).is_err());
  }
}
