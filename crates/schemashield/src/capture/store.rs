//! SQLite-backed append-only capture store.

use super::iter::CaptureIter;
use super::types::{Capture, HeaderFields, InvalidCapture, NewCapture};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

/// Rows fetched per page by [`CaptureStore::list_all`]
pub const DEFAULT_PAGE_SIZE: usize = 500;

const SELECT_COLUMNS: &str = "id, method, path, status, req_headers, req_body, \
     res_headers, res_body, latency_ms, created_at";

/// Errors raised by the capture store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("capture storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),
    #[error("failed to prepare storage directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt capture row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("unsupported capture schema version {found} (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },
    #[error("capture store task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Invalid(#[from] InvalidCapture),
}

/// Append-only log of captured exchanges.
///
/// One instance is owned by the process and shared behind an `Arc`. The
/// connection mutex serializes writers; every read runs as a single statement
/// so a row is either fully visible or not visible at all.
pub struct CaptureStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
    page_size: usize,
}

impl CaptureStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!("Capture store journal mode: {}", journal);

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!("Opened capture store at {:?} ({} captures)", path, store.count()?);
        Ok(store)
    }

    /// In-memory store, used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(mut conn: Connection, location: Option<PathBuf>) -> Result<Self, StoreError> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size used by [`CaptureStore::list_all`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Backing file, `None` for in-memory stores
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Insert a new capture and return its assigned id.
    pub fn append(&self, capture: &NewCapture) -> Result<i64, StoreError> {
        let req_headers = headers_to_json(&capture.req_headers);
        let res_headers = headers_to_json(&capture.res_headers);
        let created_at = chrono::Utc::now().timestamp_millis();
        let latency_ms = i64::try_from(capture.latency_ms)
            .map_err(|_| InvalidCapture::LatencyOutOfRange(capture.latency_ms))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO captures (method, path, status, req_headers, req_body, \
             res_headers, res_body, latency_ms, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                capture.method,
                capture.path,
                capture.status,
                req_headers,
                capture.req_body,
                res_headers,
                capture.res_body,
                latency_ms,
                created_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(
            "Stored capture {} for {} {} (status: {})",
            id, capture.method, capture.path, capture.status
        );
        Ok(id)
    }

    /// Every capture in insertion order, fetched lazily page by page.
    pub fn list_all(&self) -> CaptureIter<'_> {
        CaptureIter::new(self, self.page_size)
    }

    /// The most recently inserted capture whose path equals `path` exactly.
    pub fn latest_by_path(&self, path: &str) -> Result<Option<Capture>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM captures WHERE path = ?1 ORDER BY id DESC LIMIT 1"
        ))?;
        let raw = stmt.query_row(params![path], RawCapture::from_row).optional()?;
        raw.map(RawCapture::into_capture).transpose()
    }

    /// Number of stored captures
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM captures", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// One page of captures with `id > after_id`, ascending.
    pub(super) fn page_after(&self, after_id: i64, limit: usize) -> Result<Vec<Capture>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM captures WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![after_id, limit], RawCapture::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(RawCapture::into_capture).collect()
    }

    // ===== Async wrappers (SQLite calls run on the blocking pool) =====

    pub async fn append_async(self: &Arc<Self>, capture: NewCapture) -> Result<i64, StoreError> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.append(&capture))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn latest_by_path_async(
        self: &Arc<Self>,
        path: String,
    ) -> Result<Option<Capture>, StoreError> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.latest_by_path(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn count_async(self: &Arc<Self>) -> Result<u64, StoreError> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.count())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let user_version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    match user_version {
        0 => {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS captures (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  method TEXT NOT NULL,
                  path TEXT NOT NULL,
                  status INTEGER NOT NULL,
                  req_headers TEXT NOT NULL,
                  req_body TEXT,
                  res_headers TEXT NOT NULL,
                  res_body TEXT,
                  latency_ms INTEGER NOT NULL,
                  created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS captures_path_id_idx ON captures(path, id DESC);
                "#,
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        found => Err(StoreError::SchemaVersion {
            found,
            expected: SCHEMA_VERSION,
        }),
    }
}

fn headers_to_json(headers: &HeaderFields) -> String {
    serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string())
}

/// Row as read from SQLite, before header JSON is decoded
struct RawCapture {
    id: i64,
    method: String,
    path: String,
    status: i64,
    req_headers: String,
    req_body: Option<String>,
    res_headers: String,
    res_body: Option<String>,
    latency_ms: i64,
    created_at: i64,
}

impl RawCapture {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            path: row.get(2)?,
            status: row.get(3)?,
            req_headers: row.get(4)?,
            req_body: row.get(5)?,
            res_headers: row.get(6)?,
            res_body: row.get(7)?,
            latency_ms: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_capture(self) -> Result<Capture, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };

        let status = u16::try_from(self.status)
            .map_err(|_| corrupt(format!("status {} out of range", self.status)))?;
        let req_headers: HeaderFields = serde_json::from_str(&self.req_headers)
            .map_err(|e| corrupt(format!("req_headers: {e}")))?;
        let res_headers: HeaderFields = serde_json::from_str(&self.res_headers)
            .map_err(|e| corrupt(format!("res_headers: {e}")))?;
        let latency_ms = u64::try_from(self.latency_ms)
            .map_err(|_| corrupt(format!("latency_ms {} is negative", self.latency_ms)))?;

        Ok(Capture {
            id,
            created_at: self.created_at,
            exchange: NewCapture {
                method: self.method,
                path: self.path,
                status,
                req_headers,
                req_body: self.req_body,
                res_headers,
                res_body: self.res_body,
                latency_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(method: &str, path: &str, status: u16, body: Option<&str>) -> NewCapture {
        let mut res_headers = HeaderFields::new();
        res_headers.insert("content-type".to_string(), "application/json".into());
        NewCapture {
            method: method.to_string(),
            path: path.to_string(),
            status,
            req_headers: HeaderFields::new(),
            req_body: None,
            res_headers,
            res_body: body.map(str::to_string),
            latency_ms: 12,
        }
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = CaptureStore::open_in_memory().unwrap();
        let first = store.append(&capture("GET", "/a", 200, None)).unwrap();
        let second = store.append(&capture("GET", "/b", 200, None)).unwrap();
        let third = store.append(&capture("GET", "/a", 500, None)).unwrap();
        assert!(first < second && second < third);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_append_then_list_all_round_trips_fields() {
        let store = CaptureStore::open_in_memory().unwrap();
        store.append(&capture("GET", "/old", 200, None)).unwrap();

        let submitted = capture("POST", "/pets", 201, Some(r#"{"id":3}"#));
        let id = store.append(&submitted).unwrap();

        let all: Vec<Capture> = store.list_all().collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), 2);
        let matching: Vec<&Capture> = all.iter().filter(|c| c.id == id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].exchange, submitted);
        assert!(all.iter().all(|c| c.id <= id));
    }

    #[test]
    fn test_latest_by_path_returns_max_id() {
        let store = CaptureStore::open_in_memory().unwrap();
        store.append(&capture("GET", "/pets", 200, Some("1"))).unwrap();
        store.append(&capture("GET", "/other", 200, Some("x"))).unwrap();
        let latest = store.append(&capture("DELETE", "/pets", 204, None)).unwrap();
        store.append(&capture("GET", "/other", 200, Some("y"))).unwrap();

        let found = store.latest_by_path("/pets").unwrap().unwrap();
        assert_eq!(found.id, latest);
        assert_eq!(found.exchange.method, "DELETE");
        assert!(found.exchange.res_body.is_none());
    }

    #[test]
    fn test_latest_by_path_exact_match_only() {
        let store = CaptureStore::open_in_memory().unwrap();
        store.append(&capture("GET", "/pets/1", 200, None)).unwrap();
        assert!(store.latest_by_path("/pets").unwrap().is_none());
        assert!(store.latest_by_path("/pets/").unwrap().is_none());
        assert!(store.latest_by_path("/pets/1").unwrap().is_some());
    }

    #[test]
    fn test_append_rejects_latency_beyond_i64() {
        let store = CaptureStore::open_in_memory().unwrap();
        let mut oversized = capture("GET", "/slow", 200, None);
        oversized.latency_ms = u64::MAX;
        assert!(matches!(
            store.append(&oversized),
            Err(StoreError::Invalid(InvalidCapture::LatencyOutOfRange(u64::MAX)))
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_directories_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("data").join("captures.sqlite");

        {
            let store = CaptureStore::open(&db_path).unwrap();
            store.append(&capture("GET", "/a", 200, None)).unwrap();
            assert_eq!(store.location(), Some(db_path.as_path()));
        }

        let reopened = CaptureStore::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        let next = reopened.append(&capture("GET", "/a", 200, None)).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn test_header_order_survives_storage() {
        let store = CaptureStore::open_in_memory().unwrap();
        let mut submitted = capture("GET", "/h", 200, None);
        submitted.req_headers.insert("x-zeta".to_string(), "1".into());
        submitted.req_headers.insert("accept".to_string(), "*/*".into());
        store.append(&submitted).unwrap();

        let found = store.latest_by_path("/h").unwrap().unwrap();
        let names: Vec<&str> = found.exchange.req_headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["x-zeta", "accept"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_stored() {
        let store = Arc::new(CaptureStore::open_in_memory().unwrap());
        let mut handles = Vec::new();
        for i in 0..32u16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append_async(capture("GET", "/race", 200 + i, None))
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(store.count_async().await.unwrap(), 32);
    }
}
