//! Reference extraction from free text.
//!
//! Recognises `@handle` mentions (a username or a `/`-separated group path)
//! and cross-project references such as `group/project#12` or
//! `group/project!7`. Anything inside backtick code spans is ignored.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?s)```.*?```|`[^`\n]*`").expect("code span pattern is valid")
});

static HANDLE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?:^|[^\w.\-/@`])@([A-Za-z0-9_][A-Za-z0-9_.\-]*(?:/[A-Za-z0-9_][A-Za-z0-9_.\-]*)*)")
    .expect("handle pattern is valid")
});

static PROJECT_REF: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?:^|[^\w.\-/@])([A-Za-z0-9_][A-Za-z0-9_.\-]*(?:/[A-Za-z0-9_][A-Za-z0-9_.\-]*)+)[#!]\d+")
    .expect("project reference pattern is valid")
});

/// Everything [`extract_references`] found, deduplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedReferences {
  /// `@` handles without the sigil; each may name a user or a group.
  pub handles:       Vec<String>,
  /// Full paths of projects referenced by issue or merge request.
  pub project_paths: Vec<String>,
}

impl ExtractedReferences {
  pub fn is_empty(&self) -> bool {
    self.handles.is_empty() && self.project_paths.is_empty()
  }
}

/// Scan `text` for user, group and project references.
pub fn extract_references(text: &str) -> ExtractedReferences {
  let text = CODE_SPAN.replace_all(text, " ");

  ExtractedReferences {
    handles:       collect_unique(&HANDLE, &text),
    project_paths: collect_unique(&PROJECT_REF, &text),
  }
}

fn collect_unique(re: &Regex, text: &str) -> Vec<String> {
  let mut seen = HashSet::new();
  re.captures_iter(text)
    .filter_map(|caps| caps.get(1))
    // Sentence punctuation is not part of a handle.
    .map(|m| m.as_str().trim_end_matches(['.', '-']).to_owned())
    .filter(|s| !s.is_empty() && seen.insert(s.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_handles_and_group_paths() {
    let refs = extract_references("cc @alice and @platform/backend, thanks @alice.");
    assert_eq!(refs.handles, vec!["alice", "platform/backend"]);
    assert!(refs.project_paths.is_empty());
  }

  #[test]
  fn ignores_email_addresses() {
    let refs = extract_references("mail bob@example.com please");
    assert!(refs.handles.is_empty());
  }

  #[test]
  fn ignores_code_spans() {
    let refs = extract_references("run `@decorator` and\n```\n@inside block\n```\nthen @carol");
    assert_eq!(refs.handles, vec!["carol"]);
  }

  #[test]
  fn finds_cross_project_references() {
    let refs = extract_references(
      "Fixed by gitlab-org/gitlab!42, see gitlab-org/gitlab#7 and tools/cli#1",
    );
    assert_eq!(refs.project_paths, vec!["gitlab-org/gitlab", "tools/cli"]);
  }

  #[test]
  fn local_references_are_not_projects() {
    let refs = extract_references("see #12 and !3");
    assert!(refs.is_empty());
  }
}
