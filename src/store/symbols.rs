//! Type and member rows plus their name-trigram postings.

use super::{bump_count, meta_keys, Store};
use crate::error::StoreResult;
use crate::trigram::name_trigrams;
use crate::types::{
    EntityKind, FileId, Language, MemberId, MemberKind, MemberRecord, NewMember, NewType, TypeId,
    TypeKind, TypeRecord,
};
use ahash::AHashMap;
use rusqlite::{params, Connection};

/// A type row joined with its file for presentation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TypeWithPath {
    #[serde(flatten)]
    pub record: TypeRecord,
    pub path: String,
    pub project: String,
    pub module: String,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// A member row joined with its type and file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemberWithContext {
    #[serde(flatten)]
    pub record: MemberRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub path: String,
    pub project: String,
    pub module: String,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// A fuzzy-candidate hit from the name-trigram postings.
#[derive(Debug, Clone, Copy)]
pub struct NameTrigramHit {
    pub entity_id: i64,
    pub matches: usize,
}

fn map_type_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TypeRecord> {
    let kind: String = row.get(3)?;
    Ok(TypeRecord {
        id: TypeId::new(row.get(0)?),
        file_id: FileId::new(row.get(1)?),
        name: row.get(2)?,
        kind: kind.parse().unwrap_or(TypeKind::Class),
        parent: row.get(4)?,
        line: row.get(5)?,
        depth: row.get(6)?,
    })
}

fn map_member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRecord> {
    let kind: String = row.get(4)?;
    Ok(MemberRecord {
        id: MemberId::new(row.get(0)?),
        file_id: FileId::new(row.get(1)?),
        type_id: row.get::<_, Option<i64>>(2)?.map(TypeId::new),
        name: row.get(3)?,
        member_kind: kind.parse().unwrap_or(MemberKind::Other),
        line: row.get(5)?,
        is_static: row.get::<_, i64>(6)? != 0,
        specifiers: row.get(7)?,
    })
}

const TYPE_COLUMNS: &str = "t.id, t.file_id, t.name, t.kind, t.parent, t.line, t.depth";
const MEMBER_COLUMNS: &str =
    "m.id, m.file_id, m.type_id, m.name, m.member_kind, m.line, m.is_static, m.specifiers";

fn map_type_with_path(row: &rusqlite::Row<'_>) -> rusqlite::Result<TypeWithPath> {
    let record = map_type_row(row)?;
    let language: String = row.get(10)?;
    Ok(TypeWithPath {
        record,
        path: row.get(7)?,
        project: row.get(8)?,
        module: row.get(9)?,
        language: language.parse().unwrap_or(Language::Other),
        relative_path: row.get(11)?,
    })
}

fn write_name_postings(
    conn: &Connection,
    entity: EntityKind,
    entity_id: i64,
    name: &str,
) -> StoreResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO name_trigrams (trigram, entity_type, entity_id) VALUES (?1, ?2, ?3)",
    )?;
    for t in name_trigrams(name) {
        stmt.execute(params![t.as_u32(), entity.as_str(), entity_id])?;
    }
    Ok(())
}

/// Deletes name-trigram postings for every type and member of a file.
///
/// Entity ids are looked up before the rows are deleted since postings
/// have no cross-table cascade.
pub(crate) fn delete_name_trigrams_for_file(conn: &Connection, file_id: FileId) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM name_trigrams WHERE entity_type = 'type'
         AND entity_id IN (SELECT id FROM types WHERE file_id = ?1)",
        params![file_id.as_i64()],
    )?;
    conn.execute(
        "DELETE FROM name_trigrams WHERE entity_type = 'member'
         AND entity_id IN (SELECT id FROM members WHERE file_id = ?1)",
        params![file_id.as_i64()],
    )?;
    Ok(())
}

/// Batch-inserts type rows, writing name-trigram postings per row.
pub(crate) fn insert_types(
    conn: &Connection,
    file_id: FileId,
    types: &[NewType],
) -> StoreResult<Vec<TypeRecord>> {
    let mut inserted = Vec::with_capacity(types.len());
    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO types (file_id, name, kind, parent, line) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for t in types {
            stmt.execute(params![
                file_id.as_i64(),
                t.name,
                t.kind.as_str(),
                t.parent,
                t.line
            ])?;
            let id = conn.last_insert_rowid();
            write_name_postings(conn, EntityKind::Type, id, &t.name)?;
            inserted.push(TypeRecord {
                id: TypeId::new(id),
                file_id,
                name: t.name.clone(),
                kind: t.kind,
                parent: t.parent.clone(),
                line: t.line,
                depth: None,
            });
        }
    }
    bump_count(conn, meta_keys::COUNT_TYPES, inserted.len() as i64)?;
    Ok(inserted)
}

/// Batch-inserts member rows, resolving `containing_type` names against
/// the given per-file type map.
pub(crate) fn insert_members(
    conn: &Connection,
    file_id: FileId,
    members: &[NewMember],
    types_by_name: &AHashMap<String, TypeId>,
) -> StoreResult<Vec<MemberRecord>> {
    let mut inserted = Vec::with_capacity(members.len());
    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO members (file_id, type_id, name, member_kind, line, is_static, specifiers)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for m in members {
            let type_id = m
                .containing_type
                .as_deref()
                .and_then(|n| types_by_name.get(n).copied());
            stmt.execute(params![
                file_id.as_i64(),
                type_id.map(TypeId::as_i64),
                m.name,
                m.member_kind.as_str(),
                m.line,
                i64::from(m.is_static),
                m.specifiers
            ])?;
            let id = conn.last_insert_rowid();
            write_name_postings(conn, EntityKind::Member, id, &m.name)?;
            inserted.push(MemberRecord {
                id: MemberId::new(id),
                file_id,
                type_id,
                name: m.name.clone(),
                member_kind: m.member_kind,
                line: m.line,
                is_static: m.is_static,
                specifiers: m.specifiers.clone(),
            });
        }
    }
    bump_count(conn, meta_keys::COUNT_MEMBERS, inserted.len() as i64)?;
    Ok(inserted)
}

/// Deletes a file's members then types, postings first.
pub(crate) fn clear_types_for_file(conn: &Connection, file_id: FileId) -> StoreResult<()> {
    delete_name_trigrams_for_file(conn, file_id)?;

    let members = conn.execute(
        "DELETE FROM members WHERE file_id = ?1",
        params![file_id.as_i64()],
    )?;
    let types = conn.execute(
        "DELETE FROM types WHERE file_id = ?1",
        params![file_id.as_i64()],
    )?;

    bump_count(conn, meta_keys::COUNT_MEMBERS, -(members as i64))?;
    bump_count(conn, meta_keys::COUNT_TYPES, -(types as i64))?;
    Ok(())
}

fn push_file_filters(
    sql: &mut String,
    params_vec: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
    project: Option<&str>,
    language: Option<Language>,
) {
    if let Some(project) = project {
        sql.push_str(" AND f.project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    if let Some(language) = language {
        sql.push_str(" AND f.language = ?");
        params_vec.push(Box::new(language.as_str()));
    }
}

/// Case-insensitive exact type lookup.
pub(crate) fn find_type_by_name(
    conn: &Connection,
    name: &str,
    project: Option<&str>,
    language: Option<Language>,
    kind: Option<TypeKind>,
    limit: usize,
) -> StoreResult<Vec<TypeWithPath>> {
    let mut sql = format!(
        r"
        SELECT {TYPE_COLUMNS}, f.path, f.project, f.module, f.language, f.relative_path
        FROM types t JOIN files f ON f.id = t.file_id
        WHERE lower(t.name) = lower(?)
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(name.to_string())];
    if let Some(kind) = kind {
        sql.push_str(" AND t.kind = ?");
        params_vec.push(Box::new(kind.as_str()));
    }
    push_file_filters(&mut sql, &mut params_vec, project, language);
    sql.push_str(" LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_type_with_path)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Prefix scan over lowercased type names.
pub(crate) fn types_with_prefix(
    conn: &Connection,
    prefix: &str,
    project: Option<&str>,
    language: Option<Language>,
    limit: usize,
) -> StoreResult<Vec<TypeWithPath>> {
    let mut sql = format!(
        r"
        SELECT {TYPE_COLUMNS}, f.path, f.project, f.module, f.language, f.relative_path
        FROM types t JOIN files f ON f.id = t.file_id
        WHERE lower(t.name) LIKE lower(?) || '%'
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(prefix.to_string())];
    push_file_filters(&mut sql, &mut params_vec, project, language);
    sql.push_str(" ORDER BY lower(t.name) LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_type_with_path)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Member lookup by name with optional containing-type filter.
///
/// `containing_types` widens the filter to a set so hierarchy-aware
/// callers can pass a type plus its ancestors.
pub(crate) fn find_member(
    conn: &Connection,
    name: &str,
    containing_types: Option<&[String]>,
    member_kind: Option<MemberKind>,
    project: Option<&str>,
    language: Option<Language>,
    limit: usize,
) -> StoreResult<Vec<MemberWithContext>> {
    let mut sql = format!(
        r"
        SELECT {MEMBER_COLUMNS}, t.name, f.path, f.project, f.module, f.language, f.relative_path
        FROM members m
        LEFT JOIN types t ON t.id = m.type_id
        JOIN files f ON f.id = m.file_id
        WHERE lower(m.name) = lower(?)
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(name.to_string())];

    if let Some(types) = containing_types {
        let placeholders = vec!["lower(?)"; types.len()].join(", ");
        sql.push_str(&format!(" AND lower(t.name) IN ({placeholders})"));
        for t in types {
            params_vec.push(Box::new(t.clone()));
        }
    }
    if let Some(kind) = member_kind {
        sql.push_str(" AND m.member_kind = ?");
        params_vec.push(Box::new(kind.as_str()));
    }
    push_file_filters(&mut sql, &mut params_vec, project, language);
    sql.push_str(" LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
            let record = map_member_row(row)?;
            let language: String = row.get(12)?;
            Ok(MemberWithContext {
                record,
                type_name: row.get(8)?,
                path: row.get(9)?,
                project: row.get(10)?,
                module: row.get(11)?,
                language: language.parse().unwrap_or(Language::Other),
                relative_path: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lists the members of a named type in declaration order.
pub(crate) fn list_members_for_type(
    conn: &Connection,
    type_name: &str,
    project: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<MemberWithContext>> {
    let mut sql = format!(
        r"
        SELECT {MEMBER_COLUMNS}, t.name, f.path, f.project, f.module, f.language, f.relative_path
        FROM members m
        JOIN types t ON t.id = m.type_id
        JOIN files f ON f.id = m.file_id
        WHERE lower(t.name) = lower(?)
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(type_name.to_string())];
    push_file_filters(&mut sql, &mut params_vec, project, None);
    sql.push_str(" ORDER BY m.line LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
            let record = map_member_row(row)?;
            let language: String = row.get(12)?;
            Ok(MemberWithContext {
                record,
                type_name: row.get(8)?,
                path: row.get(9)?,
                project: row.get(10)?,
                module: row.get(11)?,
                language: language.parse().unwrap_or(Language::Other),
                relative_path: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Direct children of a parent name (inheritable kinds only).
pub(crate) fn find_children_of(
    conn: &Connection,
    parent: &str,
    limit: usize,
) -> StoreResult<Vec<TypeWithPath>> {
    let sql = format!(
        r"
        SELECT {TYPE_COLUMNS}, f.path, f.project, f.module, f.language, f.relative_path
        FROM types t JOIN files f ON f.id = t.file_id
        WHERE t.parent = ?1 AND t.kind IN ('class', 'struct', 'interface')
        ORDER BY t.name LIMIT ?2
        "
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![parent, limit as i64], map_type_with_path)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Module summaries, optionally scoped to a project.
pub(crate) fn list_modules(
    conn: &Connection,
    project: Option<&str>,
) -> StoreResult<Vec<(String, String, i64)>> {
    let (sql, has_param) = match project {
        Some(_) => (
            "SELECT module, project, COUNT(*) FROM files
             WHERE module != '' AND project = ?1 GROUP BY module, project ORDER BY module",
            true,
        ),
        None => (
            "SELECT module, project, COUNT(*) FROM files
             WHERE module != '' GROUP BY module, project ORDER BY module",
            false,
        ),
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    };
    let rows = if has_param {
        stmt.query_map(params![project.unwrap()], map_row)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
    };
    Ok(rows)
}

/// Types declared in a module.
pub(crate) fn browse_module(
    conn: &Connection,
    module: &str,
    project: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<TypeWithPath>> {
    let mut sql = format!(
        r"
        SELECT {TYPE_COLUMNS}, f.path, f.project, f.module, f.language, f.relative_path
        FROM types t JOIN files f ON f.id = t.file_id
        WHERE f.module = ?
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(module.to_string())];
    push_file_filters(&mut sql, &mut params_vec, project, None);
    sql.push_str(" ORDER BY t.name LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_type_with_path)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fuzzy candidates from the name-trigram postings.
///
/// Returns entity ids with their distinct-trigram match counts, for
/// candidates matching at least `min_matches` of the query trigrams.
pub(crate) fn name_trigram_candidates(
    conn: &Connection,
    trigrams: &[crate::types::Trigram],
    entity: EntityKind,
    min_matches: usize,
    limit: usize,
) -> StoreResult<Vec<NameTrigramHit>> {
    if trigrams.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; trigrams.len()].join(", ");
    let sql = format!(
        r"
        SELECT entity_id, COUNT(DISTINCT trigram) AS matches
        FROM name_trigrams
        WHERE entity_type = ? AND trigram IN ({placeholders})
        GROUP BY entity_id
        HAVING matches >= {min_matches}
        ORDER BY matches DESC
        LIMIT {limit}
        "
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(entity.as_str())];
    for t in trigrams {
        params_vec.push(Box::new(t.as_u32()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
            Ok(NameTrigramHit {
                entity_id: row.get(0)?,
                matches: row.get::<_, i64>(1)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Loads type rows by id, preserving input order where possible.
pub(crate) fn types_by_ids(conn: &Connection, ids: &[i64]) -> StoreResult<Vec<TypeWithPath>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        r"
        SELECT {TYPE_COLUMNS}, f.path, f.project, f.module, f.language, f.relative_path
        FROM types t JOIN files f ON f.id = t.file_id
        WHERE t.id IN ({placeholders})
        "
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(ids.iter()),
            map_type_with_path,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Loads member rows by id with their type and file context.
pub(crate) fn members_by_ids(conn: &Connection, ids: &[i64]) -> StoreResult<Vec<MemberWithContext>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        r"
        SELECT {MEMBER_COLUMNS}, t.name, f.path, f.project, f.module, f.language, f.relative_path
        FROM members m
        LEFT JOIN types t ON t.id = m.type_id
        JOIN files f ON f.id = m.file_id
        WHERE m.id IN ({placeholders})
        "
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            let record = map_member_row(row)?;
            let language: String = row.get(12)?;
            Ok(MemberWithContext {
                record,
                type_name: row.get(8)?,
                path: row.get(9)?,
                project: row.get(10)?,
                module: row.get(11)?,
                language: language.parse().unwrap_or(Language::Other),
                relative_path: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Walks the textual parent chain of a type name. Cycle-guarded.
pub(crate) fn ancestor_chain(conn: &Connection, name: &str) -> StoreResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    let mut current = name.to_string();
    loop {
        let parent: Option<String> = conn
            .query_row(
                "SELECT parent FROM types WHERE lower(name) = lower(?1)
                 AND parent IS NOT NULL LIMIT 1",
                params![current],
                |row| row.get(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match parent {
            Some(p) if !out.contains(&p) && p != name => {
                out.push(p.clone());
                current = p;
            }
            _ => break,
        }
    }
    Ok(out)
}

/// Writes computed inheritance depths.
pub(crate) fn set_depths(conn: &Connection, depths: &[(TypeId, u32)]) -> StoreResult<()> {
    let mut stmt = conn.prepare_cached("UPDATE types SET depth = ?1 WHERE id = ?2")?;
    for (id, depth) in depths {
        stmt.execute(params![depth, id.as_i64()])?;
    }
    Ok(())
}

pub(crate) fn all_types(conn: &Connection) -> StoreResult<Vec<TypeRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {TYPE_COLUMNS} FROM types t"))?;
    let rows = stmt
        .query_map([], map_type_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn all_members(conn: &Connection) -> StoreResult<Vec<MemberRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {MEMBER_COLUMNS} FROM members m"))?;
    let rows = stmt
        .query_map([], map_member_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Store {
    /// Batch-inserts types under a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure; the batch is
    /// all-or-nothing.
    pub fn insert_types(&self, file_id: FileId, types: &[NewType]) -> StoreResult<Vec<TypeRecord>> {
        self.transaction(|tx| insert_types(tx, file_id, types))
    }

    /// Batch-inserts members under a single transaction, resolving
    /// `containing_type` against the file's stored types.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn insert_members(
        &self,
        file_id: FileId,
        members: &[NewMember],
    ) -> StoreResult<Vec<MemberRecord>> {
        self.transaction(|tx| {
            let mut by_name = AHashMap::new();
            let mut stmt = tx.prepare("SELECT name, id FROM types WHERE file_id = ?1")?;
            let mut rows = stmt.query(params![file_id.as_i64()])?;
            while let Some(row) = rows.next()? {
                by_name.insert(row.get::<_, String>(0)?, TypeId::new(row.get(1)?));
            }
            drop(rows);
            drop(stmt);
            insert_members(tx, file_id, members, &by_name)
        })
    }

    /// Deletes a file's members then types, including their postings.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn clear_types_for_file(&self, file_id: FileId) -> StoreResult<()> {
        self.transaction(|tx| clear_types_for_file(tx, file_id))
    }

    /// Case-insensitive exact type lookup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn find_type_by_name(
        &self,
        name: &str,
        project: Option<&str>,
        language: Option<Language>,
        kind: Option<TypeKind>,
        limit: usize,
    ) -> StoreResult<Vec<TypeWithPath>> {
        let conn = self.conn()?;
        find_type_by_name(&conn, name, project, language, kind, limit)
    }

    /// Member lookup by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn find_member(
        &self,
        name: &str,
        containing_types: Option<&[String]>,
        member_kind: Option<MemberKind>,
        project: Option<&str>,
        language: Option<Language>,
        limit: usize,
    ) -> StoreResult<Vec<MemberWithContext>> {
        let conn = self.conn()?;
        find_member(&conn, name, containing_types, member_kind, project, language, limit)
    }

    /// Lists members of a named type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn list_members_for_type(
        &self,
        type_name: &str,
        project: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<MemberWithContext>> {
        let conn = self.conn()?;
        list_members_for_type(&conn, type_name, project, limit)
    }

    /// Direct children of a parent type name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn find_children_of(&self, parent: &str, limit: usize) -> StoreResult<Vec<TypeWithPath>> {
        let conn = self.conn()?;
        find_children_of(&conn, parent, limit)
    }

    /// Module summaries `(module, project, file_count)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn list_modules(&self, project: Option<&str>) -> StoreResult<Vec<(String, String, i64)>> {
        let conn = self.conn()?;
        list_modules(&conn, project)
    }

    /// Types declared in a module.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn browse_module(
        &self,
        module: &str,
        project: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<TypeWithPath>> {
        let conn = self.conn()?;
        browse_module(&conn, module, project, limit)
    }

    /// Writes computed inheritance depths.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn set_depths(&self, depths: &[(TypeId, u32)]) -> StoreResult<()> {
        self.transaction(|tx| set_depths(tx, depths))
    }
}
