//! Schema definitions and idempotent migration probes.

use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;

/// Current schema version, tracked in the metadata table.
pub const SCHEMA_VERSION: u32 = 5;

/// Tables only. Indices are created after migration so an index never
/// references a column a probe is about to add.
const TABLE_DDL: &str = r"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        project TEXT NOT NULL,
        module TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT 'cpp',
        mtime INTEGER NOT NULL DEFAULT 0,
        relative_path TEXT
    );

    CREATE TABLE IF NOT EXISTS types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        parent TEXT,
        line INTEGER NOT NULL DEFAULT 0,
        depth INTEGER
    );

    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        type_id INTEGER REFERENCES types(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        member_kind TEXT NOT NULL,
        line INTEGER NOT NULL DEFAULT 0,
        is_static INTEGER NOT NULL DEFAULT 0,
        specifiers TEXT
    );

    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        content_path TEXT NOT NULL DEFAULT '',
        folder TEXT NOT NULL DEFAULT '',
        project TEXT NOT NULL DEFAULT '',
        extension TEXT NOT NULL DEFAULT '',
        mtime INTEGER NOT NULL DEFAULT 0,
        asset_class TEXT,
        parent_class TEXT
    );

    CREATE TABLE IF NOT EXISTS file_content (
        file_id INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
        compressed BLOB NOT NULL,
        content_hash INTEGER NOT NULL
    ) WITHOUT ROWID;

    -- Content trigrams over decompressed file bodies, for the grep
    -- pre-filter. Candidate queries intersect on (trigram IN set).
    CREATE TABLE IF NOT EXISTS trigrams (
        trigram INTEGER NOT NULL,
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        PRIMARY KEY (trigram, file_id)
    ) WITHOUT ROWID;

    -- Identifier trigrams for fuzzy name search. No FK cascade is
    -- possible across two entity tables, so deletion is explicit in
    -- clear_types_for_file.
    CREATE TABLE IF NOT EXISTS name_trigrams (
        trigram INTEGER NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        PRIMARY KEY (trigram, entity_type, entity_id)
    ) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    ) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS index_status (
        language TEXT PRIMARY KEY,
        phase TEXT NOT NULL DEFAULT 'pending',
        processed INTEGER NOT NULL DEFAULT 0,
        total INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        updated_at INTEGER NOT NULL DEFAULT 0
    ) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS query_analytics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        method TEXT NOT NULL,
        args TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        result_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    );
";

const INDEX_DDL: &str = r"
    CREATE INDEX IF NOT EXISTS idx_files_project ON files(project);
    CREATE INDEX IF NOT EXISTS idx_files_module ON files(module);
    CREATE INDEX IF NOT EXISTS idx_files_language ON files(language);

    CREATE INDEX IF NOT EXISTS idx_types_name ON types(name);
    CREATE INDEX IF NOT EXISTS idx_types_name_lower ON types(lower(name));
    CREATE INDEX IF NOT EXISTS idx_types_parent ON types(parent);
    CREATE INDEX IF NOT EXISTS idx_types_kind ON types(kind);
    CREATE INDEX IF NOT EXISTS idx_types_parent_kind ON types(parent, kind);
    CREATE INDEX IF NOT EXISTS idx_types_file ON types(file_id);

    CREATE INDEX IF NOT EXISTS idx_members_name ON members(name);
    CREATE INDEX IF NOT EXISTS idx_members_name_lower ON members(lower(name));
    CREATE INDEX IF NOT EXISTS idx_members_type ON members(type_id);
    CREATE INDEX IF NOT EXISTS idx_members_file ON members(file_id);
    CREATE INDEX IF NOT EXISTS idx_members_kind ON members(member_kind);

    CREATE INDEX IF NOT EXISTS idx_assets_name ON assets(name);
    CREATE INDEX IF NOT EXISTS idx_assets_name_lower ON assets(lower(name));
    CREATE INDEX IF NOT EXISTS idx_assets_folder ON assets(folder);
    CREATE INDEX IF NOT EXISTS idx_assets_project ON assets(project);
    CREATE INDEX IF NOT EXISTS idx_assets_parent_class ON assets(parent_class);

    CREATE INDEX IF NOT EXISTS idx_trigrams_file ON trigrams(file_id);
    CREATE INDEX IF NOT EXISTS idx_name_trigrams_entity
        ON name_trigrams(entity_type, entity_id);

    CREATE INDEX IF NOT EXISTS idx_analytics_method ON query_analytics(method);
";

/// Initializes the schema and runs migration probes.
///
/// Tables are created with `IF NOT EXISTS` so a fresh database and an
/// up-to-date one take the same path. Databases created by older
/// versions get missing columns added in place; see [`migrate`] for
/// the cases where existing rows must be cleared.
///
/// # Errors
///
/// Returns `StoreError::Sqlite` if schema creation fails, or
/// `StoreError::Migration` if a probe cannot be applied.
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(TABLE_DDL)?;
    migrate(conn)?;
    conn.execute_batch(INDEX_DDL)?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schemaVersion', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Probes for columns introduced after the tables they live in.
///
/// Each probe is idempotent. Adding the asset class columns to a
/// populated assets table invalidates its rows (the parser never
/// emitted classes for them), so that migration clears asset data to
/// force re-ingest.
fn migrate(conn: &Connection) -> StoreResult<()> {
    if !has_column(conn, "files", "language")? {
        add_column(conn, "files", "language TEXT NOT NULL DEFAULT 'cpp'")?;
    }
    if !has_column(conn, "files", "relative_path")? {
        add_column(conn, "files", "relative_path TEXT")?;
    }
    if !has_column(conn, "types", "depth")? {
        add_column(conn, "types", "depth INTEGER")?;
    }

    let missing_asset_class = !has_column(conn, "assets", "asset_class")?;
    let missing_parent_class = !has_column(conn, "assets", "parent_class")?;
    if missing_asset_class {
        add_column(conn, "assets", "asset_class TEXT")?;
    }
    if missing_parent_class {
        add_column(conn, "assets", "parent_class TEXT")?;
    }
    if missing_asset_class || missing_parent_class {
        // Existing asset rows predate class tracking: clear them and
        // their synthetic search files so the watcher re-ingests.
        conn.execute_batch(
            r"
            DELETE FROM assets;
            DELETE FROM files WHERE language = 'asset';
            ",
        )?;
        tracing::info!("asset class columns added; cleared asset rows for re-ingest");
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column(conn: &Connection, table: &str, decl: &str) -> StoreResult<()> {
    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {decl}"), [])
        .map_err(|e| StoreError::Migration(format!("adding {table}.{decl}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::pragmas::apply_pragmas;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        for expected in [
            "files",
            "types",
            "members",
            "assets",
            "file_content",
            "trigrams",
            "name_trigrams",
            "metadata",
            "index_status",
            "query_analytics",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_asset_class_migration_clears_rows() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();

        // Simulate a pre-class-tracking database
        conn.execute_batch(
            r"
            CREATE TABLE files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                project TEXT NOT NULL,
                module TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT 'cpp',
                mtime INTEGER NOT NULL DEFAULT 0,
                relative_path TEXT
            );
            CREATE TABLE assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                content_path TEXT NOT NULL DEFAULT '',
                folder TEXT NOT NULL DEFAULT '',
                project TEXT NOT NULL DEFAULT '',
                extension TEXT NOT NULL DEFAULT '',
                mtime INTEGER NOT NULL DEFAULT 0
            );
            INSERT INTO assets (path, name) VALUES ('/a/BP_X.uasset', 'BP_X');
            INSERT INTO files (path, project, language) VALUES ('/a/BP_X.uasset', 'p', 'asset');
            ",
        )
        .unwrap();

        init_schema(&conn).unwrap();

        let assets: i64 = conn
            .query_row("SELECT COUNT(*) FROM assets", [], |r| r.get(0))
            .unwrap();
        let asset_files: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM files WHERE language = 'asset'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(assets, 0);
        assert_eq!(asset_files, 0);
    }

    #[test]
    fn test_legacy_types_table_gains_depth_column() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();

        conn.execute_batch(
            r"
            CREATE TABLE types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                parent TEXT,
                line INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .unwrap();

        init_schema(&conn).unwrap();
        assert!(has_column(&conn, "types", "depth").unwrap());
    }
}
