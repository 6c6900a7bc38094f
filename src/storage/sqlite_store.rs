use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::{now_millis, Note};
use crate::error::{DocketError, Result};

/// Bump when the table layout changes; schema setup runs only when the
/// database reports an older version.
pub const STORAGE_VERSION: i32 = 1;

const ORDER_KEY: i64 = 1;
const ACTIVE_NOTE_KEY: &str = "activeNoteUUID";

/// Durable note storage on top of SQLite.
///
/// Every call runs on the blocking pool and is its own transaction. Clones
/// share one connection, so writes issued in sequence are applied in
/// sequence.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            DocketError::PersistenceUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocketError::PersistenceUnavailable(e.to_string()))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        init_schema(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Fail fast when the connection is gone, before any state changes.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DocketError::PersistenceUnavailable(
                "database connection is closed".to_string(),
            ))
        }
    }

    /// Drop the connection. Later calls fail with `PersistenceUnavailable`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            guard.take();
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = shared.lock().map_err(|_| {
                DocketError::PersistenceUnavailable("connection mutex poisoned".to_string())
            })?;
            let conn = guard.as_mut().ok_or_else(|| {
                DocketError::PersistenceUnavailable("database connection is closed".to_string())
            })?;
            f(conn)
        })
        .await?
    }

    /// Insert or overwrite a note record
    pub async fn put_note(&self, note: Note) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO notes (uuid, title, body, last_updated, last_synced)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    note.uuid.to_string(),
                    note.title,
                    note.body,
                    note.last_updated,
                    note.last_synced,
                ],
            )?;
            debug!(uuid = %note.uuid, "stored note");
            Ok(())
        })
        .await
    }

    /// Remove a note record and tombstone its UUID. Absent notes are not
    /// an error.
    pub async fn delete_note(&self, uuid: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM notes WHERE uuid = ?1", [uuid.to_string()])?;
            tx.execute(
                "INSERT OR REPLACE INTO tombstones (uuid, deleted_at) VALUES (?1, ?2)",
                params![uuid.to_string(), now_millis()],
            )?;
            tx.commit()?;
            debug!(%uuid, "deleted note");
            Ok(())
        })
        .await
    }

    /// Every stored note, in no particular order
    pub async fn get_all_notes(&self) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT uuid, title, body, last_updated, last_synced FROM notes")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut notes = Vec::with_capacity(rows.len());
            for (uuid, title, body, last_updated, last_synced) in rows {
                match Uuid::parse_str(&uuid) {
                    Ok(uuid) => notes.push(Note {
                        uuid,
                        title,
                        body,
                        last_updated,
                        last_synced,
                    }),
                    Err(e) => warn!(uuid = %uuid, error = %e, "skipping note with unreadable uuid"),
                }
            }
            Ok(notes)
        })
        .await
    }

    /// Overwrite the single order record
    pub async fn put_order(&self, serialized: String) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO note_order (key, payload) VALUES (?1, ?2)",
                params![ORDER_KEY, serialized],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_order(&self) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let payload = conn
                .query_row(
                    "SELECT payload FROM note_order WHERE key = ?1",
                    [ORDER_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(payload)
        })
        .await
    }

    /// Persist the active-note pointer
    pub async fn put_active(&self, uuid: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![ACTIVE_NOTE_KEY, uuid.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    /// The stored active-note pointer, if any and if it parses
    pub async fn get_active(&self) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    [ACTIVE_NOTE_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
        })
        .await
    }

    pub async fn get_tombstones(&self) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT uuid FROM tombstones ORDER BY deleted_at")?;
            let uuids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(uuids
                .into_iter()
                .filter_map(|u| Uuid::parse_str(&u).ok())
                .collect())
        })
        .await
    }
}

/// Create the tables once per storage version
fn init_schema(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version >= STORAGE_VERSION {
        return Ok(());
    }

    info!(from = version, to = STORAGE_VERSION, "initializing note storage");
    let tx = conn.transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS notes (
            uuid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            last_updated INTEGER NOT NULL,
            last_synced INTEGER
        );

        CREATE TABLE IF NOT EXISTS note_order (
            key INTEGER PRIMARY KEY,
            payload TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tombstones (
            uuid TEXT PRIMARY KEY,
            deleted_at INTEGER NOT NULL
        );
        ",
    )?;
    tx.pragma_update(None, "user_version", STORAGE_VERSION)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn note(title: &str) -> Note {
        Note::new(title.to_string(), format!("body of {}", title))
    }

    #[test]
    fn test_open_creates_db_and_sets_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docket.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.is_open());

        let conn = Connection::open(&path).unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, STORAGE_VERSION);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docket.db");
        let a = note("A");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_note(a.clone()).await.unwrap();
            store.put_order("[]".to_string()).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_all_notes().await.unwrap(), vec![a]);
        assert_eq!(store.get_order().await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_put_note_is_idempotent_and_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut a = note("A");
        store.put_note(a.clone()).await.unwrap();
        store.put_note(a.clone()).await.unwrap();
        a.title = "A2".to_string();
        a.last_synced = Some(42);
        store.put_note(a.clone()).await.unwrap();

        let all = store.get_all_notes().await.unwrap();
        assert_eq!(all, vec![a]);
    }

    #[tokio::test]
    async fn test_delete_missing_note_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = note("A");
        store.put_note(a.clone()).await.unwrap();
        store.delete_note(Uuid::new_v4()).await.unwrap();
        store.delete_note(a.uuid).await.unwrap();
        store.delete_note(a.uuid).await.unwrap();

        assert!(store.get_all_notes().await.unwrap().is_empty());
        assert_eq!(store.get_tombstones().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_order_record_is_single_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_order().await.unwrap().is_none());
        store.put_order("[[0,\"a\"]]".to_string()).await.unwrap();
        store.put_order("[[0,\"b\"]]".to_string()).await.unwrap();
        assert_eq!(
            store.get_order().await.unwrap().as_deref(),
            Some("[[0,\"b\"]]")
        );
    }

    #[tokio::test]
    async fn test_active_pointer() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_active().await.unwrap().is_none());
        let id = Uuid::new_v4();
        store.put_active(id).await.unwrap();
        assert_eq!(store.get_active().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_closed_store_reports_unavailable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clone = store.clone();
        store.close();

        assert!(!clone.is_open());
        assert!(matches!(
            clone.ensure_open(),
            Err(DocketError::PersistenceUnavailable(_))
        ));
        assert!(matches!(
            clone.put_note(note("A")).await,
            Err(DocketError::PersistenceUnavailable(_))
        ));
        assert!(matches!(
            clone.get_order().await,
            Err(DocketError::PersistenceUnavailable(_))
        ));
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope").join("docket.db");
        assert!(matches!(
            SqliteStore::open(&path),
            Err(DocketError::PersistenceUnavailable(_))
        ));
    }
}
