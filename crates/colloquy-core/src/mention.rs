//! Mention records: which users, groups and projects a note or issuable body
//! references.
//!
//! A [`UserMention`] keeps three id sets. Ids are resolved lazily against a
//! [`ColloquyStore`]; ids whose entity has since been deleted simply drop out.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  identity::{Group, Project, User},
  noteable::NoteableRef,
  references::extract_references,
  store::ColloquyStore,
};

/// The entity a mention record belongs to. Mentions exist for commits,
/// issues, merge requests and designs, the same set as noteables.
pub type MentionTarget = NoteableRef;

/// The mention record for one target, optionally narrowed to one of its
/// notes. `note_id == None` is the record for the target's own body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMention {
  pub target:                 MentionTarget,
  pub note_id:                Option<i64>,
  pub mentioned_users_ids:    BTreeSet<i64>,
  pub mentioned_groups_ids:   BTreeSet<i64>,
  pub mentioned_projects_ids: BTreeSet<i64>,
}

impl UserMention {
  pub fn new(target: MentionTarget, note_id: Option<i64>) -> Self {
    Self {
      target,
      note_id,
      mentioned_users_ids: BTreeSet::new(),
      mentioned_groups_ids: BTreeSet::new(),
      mentioned_projects_ids: BTreeSet::new(),
    }
  }

  /// True iff at least one of the three id sets is non-empty.
  pub fn has_mentions(&self) -> bool {
    !self.mentioned_users_ids.is_empty()
      || !self.mentioned_groups_ids.is_empty()
      || !self.mentioned_projects_ids.is_empty()
  }
}

/// A [`UserMention`] with its ids looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMentions {
  pub users:    Vec<User>,
  pub groups:   Vec<Group>,
  pub projects: Vec<Project>,
}

/// Look up every id in `mention`. Missing entities are omitted.
pub async fn resolve_mentions<S>(
  store: &S,
  mention: &UserMention,
) -> Result<ResolvedMentions, S::Error>
where
  S: ColloquyStore,
{
  let users: Vec<i64> = mention.mentioned_users_ids.iter().copied().collect();
  let groups: Vec<i64> = mention.mentioned_groups_ids.iter().copied().collect();
  let projects: Vec<i64> = mention.mentioned_projects_ids.iter().copied().collect();

  Ok(ResolvedMentions {
    users:    store.find_users(&users).await?,
    groups:   store.find_groups(&groups).await?,
    projects: store.find_projects(&projects).await?,
  })
}

/// Parse `text` and build the mention record for `target` / `note_id`.
///
/// Each `@handle` is matched against usernames first, then group paths.
/// Handles and project paths that match nothing are dropped.
pub async fn build_mention<S>(
  store: &S,
  target: MentionTarget,
  note_id: Option<i64>,
  text: &str,
) -> Result<UserMention, S::Error>
where
  S: ColloquyStore,
{
  let refs = extract_references(text);
  let mut mention = UserMention::new(target, note_id);

  for handle in &refs.handles {
    if let Some(user) = store.find_user_by_username(handle).await? {
      mention.mentioned_users_ids.insert(user.id);
    } else if let Some(group) = store.find_group_by_path(handle).await? {
      mention.mentioned_groups_ids.insert(group.id);
    }
  }

  for path in &refs.project_paths {
    if let Some(project) = store.find_project_by_path(path).await? {
      mention.mentioned_projects_ids.insert(project.id);
    }
  }

  Ok(mention)
}
