//! Persistent store: schema, pooled connections, transactions.
//!
//! The store is multi-reader / single-writer. All writes go through
//! the pooled handle owned by the ingest path; the query worker pool
//! opens independent read-only connections via [`Store::read_only`].
//!
//! Entity query implementations live in `files`, `symbols`, and
//! `assets` as free functions over `&Connection` so the pooled store
//! and the read-only worker handles share one implementation.

mod analytics;
pub(crate) mod assets;
pub(crate) mod files;
mod pragmas;
mod schema;
pub(crate) mod symbols;

pub use analytics::SlowQuery;
pub use files::FileCandidate;
pub use schema::{init_schema, SCHEMA_VERSION};
pub use symbols::{MemberWithContext, NameTrigramHit, TypeWithPath};

// Transaction-scoped building blocks for the ingest path, which
// composes several of them inside one per-file transaction.
pub(crate) use files::{
    upsert_file as upsert_file_tx, upsert_file_content as upsert_file_content_tx,
};
pub(crate) use symbols::{
    clear_types_for_file as clear_types_for_file_tx, insert_members as insert_members_tx,
    insert_types as insert_types_tx,
};

use crate::error::{StoreError, StoreResult};
use crate::types::{AssetRecord, FileRecord, MemberRecord, TypeRecord};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::path::{Path, PathBuf};

/// Metadata keys for index-ready flags and cached counts.
pub mod meta_keys {
    pub const LAST_BUILD: &str = "lastBuildTimestamp";
    pub const TRIGRAM_BUILD_NEEDED: &str = "trigramBuildNeeded";
    pub const NAME_TRIGRAM_BUILD_NEEDED: &str = "nameTrigramBuildNeeded";
    pub const DEPTH_COMPUTE_NEEDED: &str = "depthComputeNeeded";
    pub const COUNT_FILES: &str = "countFiles";
    pub const COUNT_TYPES: &str = "countTypes";
    pub const COUNT_MEMBERS: &str = "countMembers";
    pub const COUNT_ASSETS: &str = "countAssets";
    pub const COUNT_BODIES: &str = "countBodies";
}

/// Live entity counts, served from cached metadata counters.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StoreStats {
    pub files: i64,
    pub types: i64,
    pub members: i64,
    pub assets: i64,
    pub bodies: i64,
}

/// Per-language indexing phase record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStatus {
    pub language: String,
    pub phase: String,
    pub processed: i64,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: i64,
}

/// Pooled store handle.
///
/// Uses r2d2 because `rusqlite::Connection` is not Sync; the pool
/// serializes access for the cooperative write path while the worker
/// pool bypasses it entirely with read-only connections.
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Pool` if connection pool creation fails,
    /// `StoreError::Sqlite` or `StoreError::Migration` if schema
    /// initialization fails.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| pragmas::init_pragmas(conn));
        let pool = Pool::builder().max_size(4).min_idle(Some(1)).build(manager)?;

        {
            let conn = pool.get()?;
            schema::init_schema(&conn)?;
        }

        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Pool` or `StoreError::Sqlite` on failure.
    pub fn in_memory() -> StoreResult<Self> {
        let manager =
            SqliteConnectionManager::memory().with_init(|conn| pragmas::init_pragmas(conn));
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            schema::init_schema(&conn)?;
        }

        Ok(Self { pool, path: None })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Pool` if no connection is available within
    /// the pool timeout.
    pub fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(StoreError::from)
    }

    /// Opens an independent read-only handle for a worker.
    ///
    /// In-memory stores have no file to share, so workers fall back to
    /// the pool in tests; callers should treat `None` accordingly.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the connection cannot be opened.
    pub fn read_only(&self) -> StoreResult<Option<ReadHandle>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        pragmas::apply_reader_pragmas(&conn)?;
        Ok(Some(ReadHandle { conn }))
    }

    /// Wraps a closure in a single immediate write transaction.
    ///
    /// On failure no partial state becomes visible.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error after rollback, or the commit
    /// error.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ── metadata ────────────────────────────────────────────────────

    /// Reads a metadata slot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn metadata_get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        metadata_get(&conn, key)
    }

    /// Writes a metadata slot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on failure.
    pub fn metadata_set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        metadata_set(&conn, key, value)
    }

    /// Reads a boolean flag slot; absent means false.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn flag(&self, key: &str) -> StoreResult<bool> {
        Ok(self.metadata_get(key)?.as_deref() == Some("1"))
    }

    /// Sets a boolean flag slot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on failure.
    pub fn set_flag(&self, key: &str, value: bool) -> StoreResult<()> {
        self.metadata_set(key, if value { "1" } else { "0" })
    }

    /// Returns cached entity counts without scanning tables.
    ///
    /// Counters are maintained by the ingest path and only adjusted
    /// after a successful commit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn()?;
        Ok(StoreStats {
            files: cached_count(&conn, meta_keys::COUNT_FILES)?,
            types: cached_count(&conn, meta_keys::COUNT_TYPES)?,
            members: cached_count(&conn, meta_keys::COUNT_MEMBERS)?,
            assets: cached_count(&conn, meta_keys::COUNT_ASSETS)?,
            bodies: cached_count(&conn, meta_keys::COUNT_BODIES)?,
        })
    }

    // ── index status ────────────────────────────────────────────────

    /// Updates the per-language indexing phase record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on failure.
    pub fn set_index_status(
        &self,
        language: &str,
        phase: &str,
        processed: i64,
        total: i64,
        error: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO index_status (language, phase, processed, total, error, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(language) DO UPDATE SET
                phase = excluded.phase,
                processed = excluded.processed,
                total = excluded.total,
                error = excluded.error,
                updated_at = excluded.updated_at
            ",
            rusqlite::params![language, phase, processed, total, error, now_ms()],
        )?;
        Ok(())
    }

    /// Lists all per-language indexing phase records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn index_statuses(&self) -> StoreResult<Vec<IndexStatus>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT language, phase, processed, total, error, updated_at
             FROM index_status ORDER BY language",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(IndexStatus {
                    language: row.get(0)?,
                    phase: row.get(1)?,
                    processed: row.get(2)?,
                    total: row.get(3)?,
                    error: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── bulk loads for the memory index ─────────────────────────────

    /// Loads every file row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn all_files(&self) -> StoreResult<Vec<FileRecord>> {
        let conn = self.conn()?;
        files::all_files(&conn)
    }

    /// Loads every type row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn all_types(&self) -> StoreResult<Vec<TypeRecord>> {
        let conn = self.conn()?;
        symbols::all_types(&conn)
    }

    /// Loads every member row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn all_members(&self) -> StoreResult<Vec<MemberRecord>> {
        let conn = self.conn()?;
        symbols::all_members(&conn)
    }

    /// Loads every asset row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` on query failure.
    pub fn all_assets(&self) -> StoreResult<Vec<AssetRecord>> {
        let conn = self.conn()?;
        assets::all_assets(&conn)
    }
}

/// Independent read-only connection for a query worker.
pub struct ReadHandle {
    conn: Connection,
}

impl ReadHandle {
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── shared helpers over &Connection ─────────────────────────────────

pub(crate) fn metadata_get(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

pub(crate) fn metadata_set(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub(crate) fn cached_count(conn: &Connection, key: &str) -> StoreResult<i64> {
    Ok(metadata_get(conn, key)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

pub(crate) fn bump_count(conn: &Connection, key: &str, delta: i64) -> StoreResult<()> {
    let current = cached_count(conn, key)?;
    metadata_set(conn, key, &(current + delta).max(0).to_string())
}

/// Milliseconds since the epoch, the timestamp unit used throughout.
#[must_use]
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = Store::in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.files, 0);
        assert_eq!(stats.types, 0);
    }

    #[test]
    fn test_metadata_round_trip() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.metadata_get("missing").unwrap(), None);

        store.metadata_set("lastBuildTimestamp", "123").unwrap();
        assert_eq!(
            store.metadata_get("lastBuildTimestamp").unwrap().as_deref(),
            Some("123")
        );
    }

    #[test]
    fn test_flags_default_false() {
        let store = Store::in_memory().unwrap();
        assert!(!store.flag(meta_keys::DEPTH_COMPUTE_NEEDED).unwrap());
        store.set_flag(meta_keys::DEPTH_COMPUTE_NEEDED, true).unwrap();
        assert!(store.flag(meta_keys::DEPTH_COMPUTE_NEEDED).unwrap());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = Store::in_memory().unwrap();

        let result: StoreResult<()> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO files (path, project) VALUES ('/x.h', 'p')",
                [],
            )?;
            Err(StoreError::Migration("forced".into()))
        });
        assert!(result.is_err());

        let conn = store.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_index_status_upsert() {
        let store = Store::in_memory().unwrap();
        store
            .set_index_status("cpp", "indexing", 10, 100, None)
            .unwrap();
        store
            .set_index_status("cpp", "ready", 100, 100, None)
            .unwrap();

        let statuses = store.index_statuses().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].phase, "ready");
        assert_eq!(statuses[0].processed, 100);
    }

    #[test]
    fn test_read_only_unavailable_in_memory() {
        let store = Store::in_memory().unwrap();
        assert!(store.read_only().unwrap().is_none());
    }

    #[test]
    fn test_read_only_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        let store = Store::open(&path).unwrap();

        let handle = store.read_only().unwrap().unwrap();
        let count: i64 = handle
            .conn()
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
