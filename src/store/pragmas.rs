//! SQLite PRAGMA configuration.

use crate::error::StoreResult;
use rusqlite::Connection;

/// PRAGMAs applied to every writable connection.
///
/// WAL keeps readers live during the single writer's transactions;
/// NORMAL sync is safe under WAL. The busy timeout covers contention
/// between the ingest writer and pool readers.
const WRITER_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA cache_size = -16000",
    "PRAGMA mmap_size = 134217728",
    "PRAGMA busy_timeout = 5000",
    "PRAGMA foreign_keys = ON",
    "PRAGMA temp_store = MEMORY",
];

/// Extra PRAGMAs for worker-pool handles.
const READER_PRAGMAS: &[&str] = &["PRAGMA query_only = ON"];

/// Pool-init variant: every pooled connection must get the PRAGMAs,
/// `foreign_keys` in particular is per-connection state.
pub(crate) fn init_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    for stmt in WRITER_PRAGMAS {
        // prepare + step handles both void and result-returning pragmas
        conn.prepare(stmt)?.query([])?.next()?;
    }
    Ok(())
}

/// Applies performance-tuned PRAGMA settings to a connection.
///
/// # Errors
///
/// Returns `StoreError::Sqlite` if any PRAGMA statement fails.
pub fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
    init_pragmas(conn)?;
    Ok(())
}

/// Applies reader PRAGMAs on top of the standard set.
///
/// Read-only handles refuse writes at the SQLite level, which keeps
/// the single-writer discipline honest even if a worker is handed the
/// wrong request.
///
/// # Errors
///
/// Returns `StoreError::Sqlite` if any PRAGMA statement fails.
pub fn apply_reader_pragmas(conn: &Connection) -> StoreResult<()> {
    apply_pragmas(conn)?;
    for stmt in READER_PRAGMAS {
        conn.prepare(stmt)?.query([])?.next()?;
    }
    Ok(())
}
