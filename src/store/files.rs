//! File rows, compressed bodies, and content-trigram candidates.

use super::{bump_count, meta_keys, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::{FileId, FileRecord, Language, Trigram};
use rusqlite::{params, Connection, OptionalExtension};

/// A file row matching a content-trigram candidate query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileCandidate {
    pub file_id: FileId,
    pub path: String,
    pub project: String,
    pub language: Language,
    pub mtime: i64,
}

fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let language: String = row.get(4)?;
    Ok(FileRecord {
        id: FileId::new(row.get(0)?),
        path: row.get(1)?,
        project: row.get(2)?,
        module: row.get(3)?,
        language: language.parse().unwrap_or(Language::Other),
        mtime: row.get(5)?,
        relative_path: row.get(6)?,
    })
}

const FILE_COLUMNS: &str = "id, path, project, module, language, mtime, relative_path";

/// Inserts or replaces a file row by unique path, returning the stable id.
///
/// A replaced row keeps its id so dependent types and members survive
/// path-level re-ingest until explicitly cleared.
pub(crate) fn upsert_file(
    conn: &Connection,
    path: &str,
    project: &str,
    module: &str,
    mtime: i64,
    language: Language,
    relative_path: Option<&str>,
) -> StoreResult<FileId> {
    let existed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM files WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;

    conn.execute(
        r"
        INSERT INTO files (path, project, module, language, mtime, relative_path)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(path) DO UPDATE SET
            project = excluded.project,
            module = excluded.module,
            language = excluded.language,
            mtime = excluded.mtime,
            relative_path = excluded.relative_path
        ",
        params![path, project, module, language.as_str(), mtime, relative_path],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM files WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;

    if existed == 0 {
        bump_count(conn, meta_keys::COUNT_FILES, 1)?;
    }

    Ok(FileId::new(id))
}

pub(crate) fn file_by_path(conn: &Connection, path: &str) -> StoreResult<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"),
        params![path],
        map_file_row,
    )
    .optional()
    .map_err(StoreError::from)
}

pub(crate) fn file_by_id(conn: &Connection, id: FileId) -> StoreResult<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
        params![id.as_i64()],
        map_file_row,
    )
    .optional()
    .map_err(StoreError::from)
}

/// Deletes a file and everything hanging off it.
///
/// Types, members, body, and content trigrams cascade through foreign
/// keys; name-trigram postings have no cross-table cascade and are
/// deleted explicitly by entity id first.
pub(crate) fn delete_file_by_id(conn: &Connection, id: FileId) -> StoreResult<bool> {
    let type_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM types WHERE file_id = ?1",
        params![id.as_i64()],
        |r| r.get(0),
    )?;
    let member_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE file_id = ?1",
        params![id.as_i64()],
        |r| r.get(0),
    )?;
    let body_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM file_content WHERE file_id = ?1",
        params![id.as_i64()],
        |r| r.get(0),
    )?;

    super::symbols::delete_name_trigrams_for_file(conn, id)?;

    let deleted = conn.execute("DELETE FROM files WHERE id = ?1", params![id.as_i64()])?;
    if deleted == 0 {
        return Ok(false);
    }

    bump_count(conn, meta_keys::COUNT_FILES, -1)?;
    bump_count(conn, meta_keys::COUNT_TYPES, -type_count)?;
    bump_count(conn, meta_keys::COUNT_MEMBERS, -member_count)?;
    bump_count(conn, meta_keys::COUNT_BODIES, -body_count)?;
    Ok(true)
}

pub(crate) fn delete_file(conn: &Connection, path: &str) -> StoreResult<bool> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => delete_file_by_id(conn, FileId::new(id)),
        None => Ok(false),
    }
}

/// Replaces a file body and its content-trigram postings.
pub(crate) fn upsert_file_content(
    conn: &Connection,
    file_id: FileId,
    compressed: &[u8],
    content_hash: i64,
    trigrams: &[Trigram],
) -> StoreResult<()> {
    let existed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM file_content WHERE file_id = ?1",
        params![file_id.as_i64()],
        |r| r.get(0),
    )?;

    conn.execute(
        r"
        INSERT INTO file_content (file_id, compressed, content_hash)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(file_id) DO UPDATE SET
            compressed = excluded.compressed,
            content_hash = excluded.content_hash
        ",
        params![file_id.as_i64(), compressed, content_hash],
    )?;

    conn.execute(
        "DELETE FROM trigrams WHERE file_id = ?1",
        params![file_id.as_i64()],
    )?;
    {
        let mut stmt = conn
            .prepare_cached("INSERT OR IGNORE INTO trigrams (trigram, file_id) VALUES (?1, ?2)")?;
        for t in trigrams {
            stmt.execute(params![t.as_u32(), file_id.as_i64()])?;
        }
    }

    if existed == 0 {
        bump_count(conn, meta_keys::COUNT_BODIES, 1)?;
    }
    Ok(())
}

pub(crate) fn file_content(
    conn: &Connection,
    file_id: FileId,
) -> StoreResult<Option<(Vec<u8>, i64)>> {
    conn.query_row(
        "SELECT compressed, content_hash FROM file_content WHERE file_id = ?1",
        params![file_id.as_i64()],
        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
    )
    .optional()
    .map_err(StoreError::from)
}

/// Returns file rows whose body contains ALL supplied trigrams.
///
/// Intersection semantics: group by file and require a distinct-trigram
/// match count equal to the query size. An empty trigram set means the
/// pattern was unindexable, which the caller must distinguish from "no
/// matches" — hence `None` rather than an empty vec.
pub(crate) fn query_trigram_candidates(
    conn: &Connection,
    trigrams: &[Trigram],
    project: Option<&str>,
    language: Option<Language>,
) -> StoreResult<Option<Vec<FileCandidate>>> {
    if trigrams.is_empty() {
        return Ok(None);
    }

    let placeholders = vec!["?"; trigrams.len()].join(", ");
    let mut sql = format!(
        r"
        SELECT f.id, f.path, f.project, f.language, f.mtime
        FROM trigrams t
        JOIN files f ON f.id = t.file_id
        WHERE t.trigram IN ({placeholders})
        "
    );

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = trigrams
        .iter()
        .map(|t| Box::new(t.as_u32()) as Box<dyn rusqlite::types::ToSql>)
        .collect();

    if let Some(project) = project {
        sql.push_str(" AND f.project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    if let Some(language) = language {
        sql.push_str(" AND f.language = ?");
        params_vec.push(Box::new(language.as_str()));
    }

    sql.push_str(&format!(
        " GROUP BY t.file_id HAVING COUNT(DISTINCT t.trigram) = {}",
        trigrams.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
            let language: String = row.get(3)?;
            Ok(FileCandidate {
                file_id: FileId::new(row.get(0)?),
                path: row.get(1)?,
                project: row.get(2)?,
                language: language.parse().unwrap_or(Language::Other),
                mtime: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(rows))
}

/// Finds files by basename, exact first then prefix.
pub(crate) fn find_file_by_name(
    conn: &Connection,
    filename: &str,
    project: Option<&str>,
    language: Option<Language>,
    limit: usize,
) -> StoreResult<Vec<FileRecord>> {
    let lowered = filename.to_lowercase();
    let mut sql = format!(
        r"
        SELECT {FILE_COLUMNS} FROM files
        WHERE (lower(path) LIKE '%/' || ?1 OR lower(path) LIKE '%/' || ?1 || '.%'
               OR lower(path) LIKE '%/' || ?1 || '%')
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(lowered.clone())];
    if let Some(project) = project {
        sql.push_str(" AND project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    if let Some(language) = language {
        sql.push_str(" AND language = ?");
        params_vec.push(Box::new(language.as_str()));
    }
    sql.push_str(" ORDER BY length(path) ASC LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Path → mtime map for watcher diffing.
pub(crate) fn file_mtimes(
    conn: &Connection,
    project: Option<&str>,
) -> StoreResult<Vec<(String, i64)>> {
    let (sql, has_param) = match project {
        Some(_) => (
            "SELECT path, mtime FROM files WHERE project = ?1 AND language != 'asset'",
            true,
        ),
        None => ("SELECT path, mtime FROM files WHERE language != 'asset'", false),
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let map_row = |row: &rusqlite::Row<'_>| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
    let rows = if has_param {
        stmt.query_map(params![project.unwrap()], map_row)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
    };
    Ok(rows)
}

pub(crate) fn all_files(conn: &Connection) -> StoreResult<Vec<FileRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files"))?;
    let rows = stmt
        .query_map([], map_file_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Store {
    /// Inserts or replaces a file row by unique path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn upsert_file(
        &self,
        path: &str,
        project: &str,
        module: &str,
        mtime: i64,
        language: Language,
        relative_path: Option<&str>,
    ) -> StoreResult<FileId> {
        let conn = self.conn()?;
        upsert_file(&conn, path, project, module, mtime, language, relative_path)
    }

    /// Looks up a file by path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn file_by_path(&self, path: &str) -> StoreResult<Option<FileRecord>> {
        let conn = self.conn()?;
        file_by_path(&conn, path)
    }

    /// Cascade-deletes a file by path. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn delete_file(&self, path: &str) -> StoreResult<bool> {
        self.transaction(|tx| delete_file(tx, path))
    }

    /// Cascade-deletes a file by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn delete_file_by_id(&self, id: FileId) -> StoreResult<bool> {
        self.transaction(|tx| delete_file_by_id(tx, id))
    }

    /// Replaces a file body and its content trigrams.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn upsert_file_content(
        &self,
        file_id: FileId,
        compressed: &[u8],
        content_hash: i64,
        trigrams: &[Trigram],
    ) -> StoreResult<()> {
        self.transaction(|tx| upsert_file_content(tx, file_id, compressed, content_hash, trigrams))
    }

    /// Reads a compressed body and its hash.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn file_content(&self, file_id: FileId) -> StoreResult<Option<(Vec<u8>, i64)>> {
        let conn = self.conn()?;
        file_content(&conn, file_id)
    }

    /// Returns candidates whose body contains all supplied trigrams, or
    /// `None` for an unindexable (empty) trigram set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn query_trigram_candidates(
        &self,
        trigrams: &[Trigram],
        project: Option<&str>,
        language: Option<Language>,
    ) -> StoreResult<Option<Vec<FileCandidate>>> {
        let conn = self.conn()?;
        query_trigram_candidates(&conn, trigrams, project, language)
    }

    /// Finds files by basename.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn find_file_by_name(
        &self,
        filename: &str,
        project: Option<&str>,
        language: Option<Language>,
        limit: usize,
    ) -> StoreResult<Vec<FileRecord>> {
        let conn = self.conn()?;
        find_file_by_name(&conn, filename, project, language, limit)
    }

    /// Path → mtime pairs for watcher diffing (source files only).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn file_mtimes(&self, project: Option<&str>) -> StoreResult<Vec<(String, i64)>> {
        let conn = self.conn()?;
        file_mtimes(&conn, project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigram::extract_trigrams;

    #[test]
    fn test_upsert_and_lookup() {
        let store = Store::in_memory().unwrap();
        let id = store
            .upsert_file("/g/Src/Hero.h", "Game", "Game.Source", 100, Language::Cpp, Some("Src/Hero.h"))
            .unwrap();

        let rec = store.file_by_path("/g/Src/Hero.h").unwrap().unwrap();
        assert_eq!(rec.id, id);
        assert_eq!(rec.project, "Game");
        assert_eq!(rec.language, Language::Cpp);
        assert_eq!(rec.relative_path.as_deref(), Some("Src/Hero.h"));
    }

    #[test]
    fn test_upsert_same_path_keeps_id() {
        let store = Store::in_memory().unwrap();
        let id1 = store
            .upsert_file("/g/a.h", "Game", "m", 100, Language::Cpp, None)
            .unwrap();
        let id2 = store
            .upsert_file("/g/a.h", "Game", "m", 200, Language::Cpp, None)
            .unwrap();
        assert_eq!(id1, id2);

        let rec = store.file_by_path("/g/a.h").unwrap().unwrap();
        assert_eq!(rec.mtime, 200);
        assert_eq!(store.stats().unwrap().files, 1);
    }

    #[test]
    fn test_delete_missing_file() {
        let store = Store::in_memory().unwrap();
        assert!(!store.delete_file("/nope.h").unwrap());
    }

    #[test]
    fn test_body_round_trip_and_count() {
        let store = Store::in_memory().unwrap();
        let id = store
            .upsert_file("/g/a.h", "Game", "m", 1, Language::Cpp, None)
            .unwrap();

        let body = b"void DestroyActor();";
        store
            .upsert_file_content(id, body, 42, &extract_trigrams(body))
            .unwrap();
        assert_eq!(store.stats().unwrap().bodies, 1);

        let (compressed, hash) = store.file_content(id).unwrap().unwrap();
        assert_eq!(compressed, body);
        assert_eq!(hash, 42);

        // Replacing the body does not double-count
        store
            .upsert_file_content(id, b"x", 43, &extract_trigrams(b"x"))
            .unwrap();
        assert_eq!(store.stats().unwrap().bodies, 1);
    }

    #[test]
    fn test_trigram_candidates_intersection() {
        let store = Store::in_memory().unwrap();
        let a = store
            .upsert_file("/g/a.cpp", "Game", "m", 1, Language::Cpp, None)
            .unwrap();
        let b = store
            .upsert_file("/g/b.cpp", "Game", "m", 1, Language::Cpp, None)
            .unwrap();

        store
            .upsert_file_content(a, b"DestroyActor", 1, &extract_trigrams(b"DestroyActor"))
            .unwrap();
        store
            .upsert_file_content(b, b"DestroyPawn", 2, &extract_trigrams(b"DestroyPawn"))
            .unwrap();

        // "destroy" trigrams match both files
        let common = extract_trigrams(b"Destroy");
        let hits = store
            .query_trigram_candidates(&common, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 2);

        // "actor" trigrams match only file a
        let actor = extract_trigrams(b"Actor");
        let hits = store
            .query_trigram_candidates(&actor, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_id, a);

        // Empty set is unindexable, not "no matches"
        assert!(store.query_trigram_candidates(&[], None, None).unwrap().is_none());
    }

    #[test]
    fn test_trigram_candidates_project_filter() {
        let store = Store::in_memory().unwrap();
        let a = store
            .upsert_file("/g/a.cpp", "Game", "m", 1, Language::Cpp, None)
            .unwrap();
        let e = store
            .upsert_file("/e/b.cpp", "Engine", "m", 1, Language::Cpp, None)
            .unwrap();
        store
            .upsert_file_content(a, b"SpawnActor", 1, &extract_trigrams(b"SpawnActor"))
            .unwrap();
        store
            .upsert_file_content(e, b"SpawnActor", 1, &extract_trigrams(b"SpawnActor"))
            .unwrap();

        let hits = store
            .query_trigram_candidates(&extract_trigrams(b"Spawn"), Some("Engine"), None)
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].project, "Engine");
    }

    #[test]
    fn test_find_file_by_name() {
        let store = Store::in_memory().unwrap();
        store
            .upsert_file("/g/Src/HeroCharacter.h", "Game", "m", 1, Language::Cpp, None)
            .unwrap();
        store
            .upsert_file("/g/Src/HeroCharacter.cpp", "Game", "m", 1, Language::Cpp, None)
            .unwrap();

        let hits = store
            .find_file_by_name("herocharacter", None, None, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_file_mtimes_excludes_assets() {
        let store = Store::in_memory().unwrap();
        store
            .upsert_file("/g/a.h", "Game", "m", 11, Language::Cpp, None)
            .unwrap();
        store
            .upsert_file("/g/BP_X.uasset", "Game", "m", 22, Language::Asset, None)
            .unwrap();

        let mtimes = store.file_mtimes(None).unwrap();
        assert_eq!(mtimes.len(), 1);
        assert_eq!(mtimes[0], ("/g/a.h".to_string(), 11));
    }
}
