//! SQL schema for the b04rd SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 UTC strings, so lexical comparison in
/// SQL matches chronological order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sessions (
    session_id    TEXT PRIMARY KEY,
    avatar_url    TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL,
    CHECK (expires_at > created_at)
);

-- session_id is a weak reference: sessions are purged while their threads
-- and comments live on, so there is deliberately no foreign key.
CREATE TABLE IF NOT EXISTS threads (
    thread_id       TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    attachments     TEXT NOT NULL DEFAULT '[]',   -- JSON array of URLs
    session_id      TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    last_commented  TEXT,
    archived        INTEGER NOT NULL DEFAULT 0,
    revision        INTEGER NOT NULL DEFAULT 0
);

-- Comments are append-only.
CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    thread_id   TEXT NOT NULL REFERENCES threads(thread_id),
    parent_id   TEXT REFERENCES comments(comment_id),
    content     TEXT NOT NULL,
    image_url   TEXT,
    session_id  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_expires_idx ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS threads_archived_idx ON threads(archived);
CREATE INDEX IF NOT EXISTS comments_thread_idx  ON comments(thread_id, created_at);

PRAGMA user_version = 1;
";
