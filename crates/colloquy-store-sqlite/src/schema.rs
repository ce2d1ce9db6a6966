//! SQL schema for the Colloquy SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    username  TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL
);

-- Groups live in `namespaces`; `groups` is a reserved word in newer SQLite.
CREATE TABLE IF NOT EXISTS namespaces (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    full_path TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    full_path TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL
);

-- Discussions are not stored; they are rebuilt from notes on every read.
CREATE TABLE IF NOT EXISTS notes (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    noteable_kind  TEXT NOT NULL,    -- 'issue' | 'merge_request' | 'commit' | 'design'
    noteable_key   TEXT NOT NULL,    -- numeric id or commit sha
    commit_id      TEXT,
    author_id      INTEGER NOT NULL,
    body           TEXT NOT NULL,
    note_type      TEXT NOT NULL,    -- 'regular' | 'discussion' | 'diff' | 'legacy_diff'
    position       TEXT,             -- JSON-encoded DiffPosition for 'diff' notes
    line_code      TEXT,             -- for 'legacy_diff' notes
    discussion_id  TEXT NOT NULL,
    system         INTEGER NOT NULL DEFAULT 0,
    resolved_at    TEXT,
    resolved_by    INTEGER,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Id lists are JSON arrays. `note_key` is 0 for the target's own body.
CREATE TABLE IF NOT EXISTS user_mentions (
    target_kind            TEXT NOT NULL,
    target_key             TEXT NOT NULL,
    note_key               INTEGER NOT NULL DEFAULT 0,
    mentioned_users_ids    TEXT NOT NULL DEFAULT '[]',
    mentioned_groups_ids   TEXT NOT NULL DEFAULT '[]',
    mentioned_projects_ids TEXT NOT NULL DEFAULT '[]',
    UNIQUE (target_kind, target_key, note_key)
);

-- Line codes present in the current diff of a noteable.
CREATE TABLE IF NOT EXISTS active_lines (
    noteable_kind TEXT NOT NULL,
    noteable_key  TEXT NOT NULL,
    line_code     TEXT NOT NULL,
    PRIMARY KEY (noteable_kind, noteable_key, line_code)
);

CREATE INDEX IF NOT EXISTS notes_noteable_idx   ON notes(noteable_kind, noteable_key);
CREATE INDEX IF NOT EXISTS notes_discussion_idx ON notes(discussion_id);

PRAGMA user_version = 1;
";
