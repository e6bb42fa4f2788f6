//! Schema for the bookmark store
//!
//! Three tables: `bookmarks` keyed by url, `tags` keyed by text, and the
//! `bookmark_tags` link table. Every statement is `IF NOT EXISTS`, so
//! running this on every startup never touches existing rows.

use crate::error::{Result, StoreError};
use rusqlite::Connection;
use tracing::debug;

const TABLES: [(&str, &str); 3] = [
    (
        "bookmarks",
        "CREATE TABLE IF NOT EXISTS bookmarks (
            id INTEGER PRIMARY KEY NOT NULL,
            url TEXT NOT NULL UNIQUE,
            title TEXT,
            note TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ),
    (
        "tags",
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY NOT NULL,
            tag TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "bookmark_tags",
        "CREATE TABLE IF NOT EXISTS bookmark_tags (
            bookmark_id INTEGER,
            tag_id INTEGER,
            PRIMARY KEY (bookmark_id, tag_id),
            FOREIGN KEY (bookmark_id) REFERENCES bookmarks(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )",
    ),
];

const INDEXES: [(&str, &str); 4] = [
    ("idx_url", "CREATE INDEX IF NOT EXISTS idx_url ON bookmarks (url)"),
    ("idx_tag", "CREATE INDEX IF NOT EXISTS idx_tag ON tags (tag)"),
    (
        "idx_bookmark_id",
        "CREATE INDEX IF NOT EXISTS idx_bookmark_id ON bookmark_tags (bookmark_id)",
    ),
    (
        "idx_tag_id",
        "CREATE INDEX IF NOT EXISTS idx_tag_id ON bookmark_tags (tag_id)",
    ),
];

/// Apply connection pragmas the store relies on
///
/// Cascading deletes only work with foreign keys switched on, and SQLite
/// leaves them off per connection.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Create tables and indexes if they are missing
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    for (name, sql) in TABLES {
        conn.execute(sql, [])
            .map_err(|e| StoreError::Schema(format!("failed to create table {}: {}", name, e)))?;
    }

    for (name, sql) in INDEXES {
        conn.execute(sql, [])
            .map_err(|e| StoreError::Schema(format!("failed to create index {}: {}", name, e)))?;
    }

    debug!("Schema ready");
    Ok(())
}
