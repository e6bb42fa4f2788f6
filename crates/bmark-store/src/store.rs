use crate::error::{Result, StoreError};
use crate::filter::EntryFilter;
use crate::models::{Entry, EntryUpdate, ExportRow, NewEntry};
use crate::schema;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bookmark store backed by a single SQLite connection
///
/// The connection sits behind a mutex, so concurrent callers queue up on
/// the lock and each write runs in its own transaction. There is never
/// more than one open connection per store.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

const ENTRY_SELECT: &str = "SELECT b.id, b.url, b.title, b.note, b.created_at, b.updated_at,
            GROUP_CONCAT(t.tag, ',')
     FROM bookmarks b
     LEFT JOIN bookmark_tags bt ON bt.bookmark_id = b.id
     LEFT JOIN tags t ON t.id = bt.tag_id";

const EXPORT_SELECT: &str = "SELECT b.url, b.title, b.created_at, b.updated_at, b.note,
            GROUP_CONCAT(t.tag, ',') AS tags
     FROM bookmarks b
     LEFT JOIN bookmark_tags bt ON b.id = bt.bookmark_id
     LEFT JOIN tags t ON bt.tag_id = t.id
     GROUP BY b.id
     ORDER BY b.id";

impl Store {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)?;

        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!("Opened bookmark store at {}", path.display());
        Ok(store)
    }

    /// Throwaway store, handy for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        schema::configure_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run ad-hoc SQL against the store's only connection
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Re-run schema creation; a no-op when everything is already there
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::ensure_schema(&conn)
    }

    /// Insert a bookmark unless its url is already stored, then attach
    /// its labels
    ///
    /// Runs as one transaction. An existing bookmark keeps its columns;
    /// only new label links are added. Returns the bookmark id either way.
    pub fn upsert_entry(&self, entry: &NewEntry) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO bookmarks (url, title, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.url,
                entry.title,
                entry.note,
                entry.created_at,
                entry.updated_at
            ],
        )?;
        let id = bookmark_id(&tx, &entry.url)?
            .ok_or_else(|| StoreError::NotFound(entry.url.clone()))?;

        link_labels(&tx, id, &entry.labels)?;
        tx.commit()?;

        debug!(id, url = %entry.url, "Upserted bookmark");
        Ok(id)
    }

    /// Insert a brand new bookmark; fails if the url already exists
    pub fn insert_entry(&self, entry: &NewEntry) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO bookmarks (url, title, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.url,
                entry.title,
                entry.note,
                entry.created_at,
                entry.updated_at
            ],
        )?;
        let id = tx.last_insert_rowid();

        link_labels(&tx, id, &entry.labels)?;
        tx.commit()?;
        Ok(id)
    }

    /// Edit url, title or note of a bookmark and bump its modified time
    pub fn update_entry(&self, id: i64, update: &EntryUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(StoreError::InvalidQuery("nothing to update".into()));
        }
        let updated_at = update
            .updated_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE bookmarks
             SET url = COALESCE(?1, url),
                 title = COALESCE(?2, title),
                 note = COALESCE(?3, note),
                 updated_at = ?4
             WHERE id = ?5",
            params![update.url, update.title, update.note, updated_at, id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }
        Ok(())
    }

    /// Attach labels to an existing bookmark, returning how many links
    /// were new
    pub fn add_labels(&self, id: i64, labels: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM bookmarks WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }

        let linked = link_labels(&tx, id, labels)?;
        tx.commit()?;
        Ok(linked)
    }

    pub fn delete_entry(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM bookmarks WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }
        Ok(())
    }

    pub fn delete_entry_by_address(&self, url: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM bookmarks WHERE url = ?1", [url])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(url.to_string()));
        }
        Ok(())
    }

    /// Drop a label everywhere; its links go with it
    pub fn delete_label(&self, label: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM tags WHERE tag = ?1", [label])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("label {}", label)));
        }
        Ok(())
    }

    pub fn entry_by_id(&self, id: i64) -> Result<Option<Entry>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE b.id = ?1 GROUP BY b.id", ENTRY_SELECT);
        Ok(conn.query_row(&sql, [id], entry_from_row).optional()?)
    }

    pub fn entry_by_address(&self, url: &str) -> Result<Option<Entry>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE b.url = ?1 GROUP BY b.id", ENTRY_SELECT);
        Ok(conn.query_row(&sql, [url], entry_from_row).optional()?)
    }

    /// Bookmarks matching a filter, oldest id first
    pub fn search(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let (id_query, bound) = filter.to_sql();
        let sql = format!(
            "{} WHERE b.id IN ({}) GROUP BY b.id ORDER BY b.id",
            ENTRY_SELECT, id_query
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(bound.iter()), entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Search matched {} bookmarks", entries.len());
        Ok(entries)
    }

    /// Every distinct label, sorted
    pub fn labels(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT tag FROM tags ORDER BY tag")?;
        let labels = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(labels)
    }

    pub fn count_entries(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))?)
    }

    pub fn count_links(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM bookmark_tags", [], |row| row.get(0))?)
    }

    /// Stream every bookmark joined with its labels through `visit`
    ///
    /// Holds a single read query open for the whole pass. Rows that fail
    /// to decode are logged and skipped. Returns the number of rows
    /// handed to `visit`.
    pub fn for_each_export_row<F, E>(&self, mut visit: F) -> std::result::Result<u64, E>
    where
        F: FnMut(ExportRow) -> std::result::Result<(), E>,
        E: From<StoreError>,
    {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(EXPORT_SELECT).map_err(StoreError::from)?;
        let mut rows = stmt.query([]).map_err(StoreError::from)?;

        let mut visited = 0;
        while let Some(row) = rows.next().map_err(StoreError::from)? {
            match export_row(row) {
                Ok(export) => {
                    visit(export)?;
                    visited += 1;
                }
                Err(e) => warn!("Row error during export: {}", e),
            }
        }

        Ok(visited)
    }
}

fn bookmark_id(tx: &Transaction<'_>, url: &str) -> Result<Option<i64>> {
    Ok(tx
        .query_row("SELECT id FROM bookmarks WHERE url = ?1", [url], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Insert-or-ignore each label and its link; blank labels are skipped
fn link_labels(tx: &Transaction<'_>, bookmark_id: i64, labels: &[String]) -> Result<usize> {
    let mut linked = 0;

    for label in labels {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }

        tx.execute("INSERT OR IGNORE INTO tags (tag) VALUES (?1)", [label])?;
        let tag_id: i64 =
            tx.query_row("SELECT id FROM tags WHERE tag = ?1", [label], |row| row.get(0))?;

        linked += tx.execute(
            "INSERT OR IGNORE INTO bookmark_tags (bookmark_id, tag_id) VALUES (?1, ?2)",
            params![bookmark_id, tag_id],
        )?;
    }

    Ok(linked)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let labels: Option<String> = row.get(6)?;
    Ok(Entry {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        note: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        labels: split_labels(labels.as_deref()),
    })
}

fn export_row(row: &Row<'_>) -> rusqlite::Result<ExportRow> {
    Ok(ExportRow {
        url: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        note: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        labels: row.get(5)?,
    })
}

fn split_labels(joined: Option<&str>) -> Vec<String> {
    let mut labels: Vec<String> = joined
        .unwrap_or_default()
        .split(',')
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    labels.sort();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_entry(url: &str, labels: &[&str]) -> NewEntry {
        NewEntry {
            url: url.to_string(),
            title: format!("Title of {}", url),
            note: String::new(),
            created_at: 1000,
            updated_at: 2000,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_upsert_resolves_existing_url() {
        let store = Store::open_in_memory().unwrap();
        let first = store.upsert_entry(&new_entry("https://a.com", &["x"])).unwrap();
        let second = store.upsert_entry(&new_entry("https://a.com", &["y"])).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count_entries().unwrap(), 1);

        let entry = store.entry_by_address("https://a.com").unwrap().unwrap();
        assert_eq!(entry.labels, vec!["x", "y"]);
    }

    #[test]
    fn test_upsert_never_duplicates_links() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["x", "x", "y"])).unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["x"])).unwrap();

        assert_eq!(store.count_links().unwrap(), 2);
        assert_eq!(store.labels().unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_blank_labels_are_not_stored() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["", "   ", " z "])).unwrap();

        assert_eq!(store.labels().unwrap(), vec!["z"]);
    }

    #[test]
    fn test_insert_rejects_duplicate_url() {
        let store = Store::open_in_memory().unwrap();
        store.insert_entry(&new_entry("https://a.com", &[])).unwrap();
        let err = store.insert_entry(&new_entry("https://a.com", &[])).unwrap_err();

        assert!(matches!(err, StoreError::Sqlite(_)));
        assert_eq!(store.count_entries().unwrap(), 1);
    }

    #[test]
    fn test_update_entry_changes_only_given_fields() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_entry(&new_entry("https://a.com", &[])).unwrap();

        store
            .update_entry(
                id,
                &EntryUpdate {
                    note: Some("fresh note".into()),
                    updated_at: Some(5000),
                    ..Default::default()
                },
            )
            .unwrap();

        let entry = store.entry_by_id(id).unwrap().unwrap();
        assert_eq!(entry.note.as_deref(), Some("fresh note"));
        assert_eq!(entry.title.as_deref(), Some("Title of https://a.com"));
        assert_eq!(entry.updated_at, 5000);
        assert_eq!(entry.created_at, 1000);
    }

    #[test]
    fn test_update_missing_entry_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let update = EntryUpdate {
            title: Some("t".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_entry(42, &update),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_entry(42, &EntryUpdate::default()),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_delete_entry_cascades_to_links() {
        let store = Store::open_in_memory().unwrap();
        let id = store.upsert_entry(&new_entry("https://a.com", &["x", "y"])).unwrap();
        store.upsert_entry(&new_entry("https://b.com", &["x"])).unwrap();

        store.delete_entry(id).unwrap();

        assert_eq!(store.count_entries().unwrap(), 1);
        assert_eq!(store.count_links().unwrap(), 1);
        assert!(matches!(store.delete_entry(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_label_cascades_to_links() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["x", "y"])).unwrap();

        store.delete_label("x").unwrap();

        let entry = store.entry_by_address("https://a.com").unwrap().unwrap();
        assert_eq!(entry.labels, vec!["y"]);
        assert_eq!(store.count_links().unwrap(), 1);
    }

    #[test]
    fn test_delete_by_address() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &[])).unwrap();

        store.delete_entry_by_address("https://a.com").unwrap();
        assert!(store.entry_by_address("https://a.com").unwrap().is_none());
    }

    #[test]
    fn test_add_labels_reports_new_links() {
        let store = Store::open_in_memory().unwrap();
        let id = store.upsert_entry(&new_entry("https://a.com", &["x"])).unwrap();

        let linked = store
            .add_labels(id, &["x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(linked, 1);
        assert!(matches!(
            store.add_labels(999, &["x".to_string()]),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_and_or() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://rust-lang.org", &["rust"])).unwrap();
        store.upsert_entry(&new_entry("https://go.dev", &["go"])).unwrap();
        store.upsert_entry(&new_entry("https://docs.rs", &["rust", "docs"])).unwrap();

        let both = store
            .search(&EntryFilter::all().label("rust").url_contains("docs"))
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].url, "https://docs.rs");

        let either = store
            .search(&EntryFilter::any().label("go").url_contains("docs"))
            .unwrap();
        let urls: Vec<&str> = either.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://go.dev", "https://docs.rs"]);

        let everything = store.search(&EntryFilter::all()).unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn test_search_any_text_hits_labels() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["needle"])).unwrap();
        store.upsert_entry(&new_entry("https://b.com", &["hay"])).unwrap();

        let hits = store.search(&EntryFilter::all().text("eedl")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].labels, vec!["needle"]);
    }

    #[test]
    fn test_search_treats_quotes_as_text() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com/?q='x'", &[])).unwrap();

        let hits = store
            .search(&EntryFilter::all().url_contains("'x'"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.count_entries().unwrap(), 1);
    }

    #[test]
    fn test_export_rows_join_labels() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["x", "y"])).unwrap();
        store.upsert_entry(&new_entry("https://b.com", &[])).unwrap();

        let mut rows = Vec::new();
        let visited = store
            .for_each_export_row(|row| {
                rows.push(row);
                Ok::<_, StoreError>(())
            })
            .unwrap();

        assert_eq!(visited, 2);
        let mut labels: Vec<&str> = rows[0].labels.as_deref().unwrap().split(',').collect();
        labels.sort();
        assert_eq!(labels, vec!["x", "y"]);
        assert_eq!(rows[1].labels, None);
        assert_eq!(rows[1].created_at, 1000);
        assert_eq!(rows[1].updated_at, 2000);
    }

    #[test]
    fn test_open_on_disk_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookmark.db");

        let store = Store::open(&path, Duration::from_millis(5000)).unwrap();
        store.upsert_entry(&new_entry("https://a.com", &[])).unwrap();
        drop(store);

        let reopened = Store::open(&path, Duration::from_millis(5000)).unwrap();
        assert_eq!(reopened.count_entries().unwrap(), 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn test_ensure_schema_again_keeps_rows() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_entry(&new_entry("https://a.com", &["x"])).unwrap();

        store.ensure_schema().unwrap();

        assert_eq!(store.count_entries().unwrap(), 1);
        assert_eq!(store.count_links().unwrap(), 1);
    }

    #[test]
    fn test_debug_shows_path_only() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(format!("{:?}", store), "Store { path: None, .. }");
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("bookmark.db");

        let err = Store::open(&path, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }
}
