//! Asset rows: Blueprints, materials, data assets.

use super::{bump_count, meta_keys, Store};
use crate::error::{StoreError, StoreResult};
use crate::types::{AssetId, AssetRecord, NewAsset};
use rusqlite::{params, Connection, OptionalExtension};

const ASSET_COLUMNS: &str =
    "id, path, name, content_path, folder, project, extension, mtime, asset_class, parent_class";

fn map_asset_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssetRecord> {
    Ok(AssetRecord {
        id: AssetId::new(row.get(0)?),
        path: row.get(1)?,
        name: row.get(2)?,
        content_path: row.get(3)?,
        folder: row.get(4)?,
        project: row.get(5)?,
        extension: row.get(6)?,
        mtime: row.get(7)?,
        asset_class: row.get(8)?,
        parent_class: row.get(9)?,
    })
}

/// Inserts or replaces an asset row by unique path.
pub(crate) fn upsert_asset(conn: &Connection, asset: &NewAsset) -> StoreResult<AssetRecord> {
    let existed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assets WHERE path = ?1",
        params![asset.path],
        |row| row.get(0),
    )?;

    conn.execute(
        r"
        INSERT INTO assets
            (path, name, content_path, folder, project, extension, mtime, asset_class, parent_class)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(path) DO UPDATE SET
            name = excluded.name,
            content_path = excluded.content_path,
            folder = excluded.folder,
            project = excluded.project,
            extension = excluded.extension,
            mtime = excluded.mtime,
            asset_class = excluded.asset_class,
            parent_class = excluded.parent_class
        ",
        params![
            asset.path,
            asset.name,
            asset.content_path,
            asset.folder,
            asset.project,
            asset.extension,
            asset.mtime,
            asset.asset_class,
            asset.parent_class
        ],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM assets WHERE path = ?1",
        params![asset.path],
        |row| row.get(0),
    )?;
    if existed == 0 {
        bump_count(conn, meta_keys::COUNT_ASSETS, 1)?;
    }

    Ok(AssetRecord {
        id: AssetId::new(id),
        path: asset.path.clone(),
        name: asset.name.clone(),
        content_path: asset.content_path.clone(),
        folder: asset.folder.clone(),
        project: asset.project.clone(),
        extension: asset.extension.clone(),
        mtime: asset.mtime,
        asset_class: asset.asset_class.clone(),
        parent_class: asset.parent_class.clone(),
    })
}

pub(crate) fn delete_asset_by_path(conn: &Connection, path: &str) -> StoreResult<bool> {
    let deleted = conn.execute("DELETE FROM assets WHERE path = ?1", params![path])?;
    if deleted > 0 {
        bump_count(conn, meta_keys::COUNT_ASSETS, -1)?;
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn asset_by_path(conn: &Connection, path: &str) -> StoreResult<Option<AssetRecord>> {
    conn.query_row(
        &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE path = ?1"),
        params![path],
        map_asset_row,
    )
    .optional()
    .map_err(StoreError::from)
}

/// Case-insensitive exact asset lookup.
pub(crate) fn find_asset_by_name(
    conn: &Connection,
    name: &str,
    project: Option<&str>,
    folder: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<AssetRecord>> {
    let mut sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE lower(name) = lower(?)");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(name.to_string())];
    if let Some(project) = project {
        sql.push_str(" AND project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    if let Some(folder) = folder {
        sql.push_str(" AND folder LIKE ? || '%'");
        params_vec.push(Box::new(folder.to_string()));
    }
    sql.push_str(" ORDER BY content_path LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_asset_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Assets directly inside a content folder.
pub(crate) fn browse_asset_folder(
    conn: &Connection,
    folder: &str,
    project: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<AssetRecord>> {
    let mut sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE folder = ?");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(folder.to_string())];
    if let Some(project) = project {
        sql.push_str(" AND project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    sql.push_str(" ORDER BY name LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_asset_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Folder summaries `(folder, asset_count)`.
pub(crate) fn list_asset_folders(
    conn: &Connection,
    project: Option<&str>,
) -> StoreResult<Vec<(String, i64)>> {
    let (sql, has_param) = match project {
        Some(_) => (
            "SELECT folder, COUNT(*) FROM assets WHERE project = ?1 GROUP BY folder ORDER BY folder",
            true,
        ),
        None => ("SELECT folder, COUNT(*) FROM assets GROUP BY folder ORDER BY folder", false),
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let map_row =
        |row: &rusqlite::Row<'_>| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
    let rows = if has_param {
        stmt.query_map(params![project.unwrap()], map_row)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
    };
    Ok(rows)
}

/// Path → mtime pairs for watcher diffing.
pub(crate) fn asset_mtimes(
    conn: &Connection,
    project: Option<&str>,
) -> StoreResult<Vec<(String, i64)>> {
    let (sql, has_param) = match project {
        Some(_) => ("SELECT path, mtime FROM assets WHERE project = ?1", true),
        None => ("SELECT path, mtime FROM assets", false),
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let map_row =
        |row: &rusqlite::Row<'_>| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
    let rows = if has_param {
        stmt.query_map(params![project.unwrap()], map_row)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
    };
    Ok(rows)
}

/// Blueprint assets whose parent matches either name form.
pub(crate) fn assets_with_parent(
    conn: &Connection,
    parent: &str,
    stripped: &str,
    limit: usize,
) -> StoreResult<Vec<AssetRecord>> {
    let sql = format!(
        r"
        SELECT {ASSET_COLUMNS} FROM assets
        WHERE parent_class IN (?1, ?2) AND asset_class IS NOT NULL
        ORDER BY name LIMIT ?3
        "
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params![parent, stripped, limit as i64], map_asset_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Substring match over asset names, for the worker-path fuzzy mode.
pub(crate) fn assets_with_name_like(
    conn: &Connection,
    needle: &str,
    project: Option<&str>,
    folder: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<AssetRecord>> {
    let mut sql =
        format!("SELECT {ASSET_COLUMNS} FROM assets WHERE lower(name) LIKE '%' || lower(?) || '%'");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(needle.to_string())];
    if let Some(project) = project {
        sql.push_str(" AND project = ?");
        params_vec.push(Box::new(project.to_string()));
    }
    if let Some(folder) = folder {
        sql.push_str(" AND folder LIKE ? || '%'");
        params_vec.push(Box::new(folder.to_string()));
    }
    sql.push_str(" ORDER BY name LIMIT ?");
    params_vec.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params_vec.iter()), map_asset_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn all_assets(conn: &Connection) -> StoreResult<Vec<AssetRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {ASSET_COLUMNS} FROM assets"))?;
    let rows = stmt
        .query_map([], map_asset_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Store {
    /// Inserts or replaces an asset row by unique path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn upsert_asset(&self, asset: &NewAsset) -> StoreResult<AssetRecord> {
        self.transaction(|tx| upsert_asset(tx, asset))
    }

    /// Deletes an asset by path. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn delete_asset_by_path(&self, path: &str) -> StoreResult<bool> {
        self.transaction(|tx| delete_asset_by_path(tx, path))
    }

    /// Looks up an asset by path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn asset_by_path(&self, path: &str) -> StoreResult<Option<AssetRecord>> {
        let conn = self.conn()?;
        asset_by_path(&conn, path)
    }

    /// Case-insensitive exact asset lookup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn find_asset_by_name(
        &self,
        name: &str,
        project: Option<&str>,
        folder: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AssetRecord>> {
        let conn = self.conn()?;
        find_asset_by_name(&conn, name, project, folder, limit)
    }

    /// Assets directly inside a content folder.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn browse_asset_folder(
        &self,
        folder: &str,
        project: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AssetRecord>> {
        let conn = self.conn()?;
        browse_asset_folder(&conn, folder, project, limit)
    }

    /// Folder summaries `(folder, asset_count)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn list_asset_folders(&self, project: Option<&str>) -> StoreResult<Vec<(String, i64)>> {
        let conn = self.conn()?;
        list_asset_folders(&conn, project)
    }

    /// Path → mtime pairs for watcher diffing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on pool or SQL failure.
    pub fn asset_mtimes(&self, project: Option<&str>) -> StoreResult<Vec<(String, i64)>> {
        let conn = self.conn()?;
        asset_mtimes(&conn, project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(name: &str, parent: &str) -> NewAsset {
        NewAsset {
            path: format!("/g/Content/{name}.uasset"),
            name: name.into(),
            content_path: format!("/Game/Blueprints/{name}"),
            folder: "/Game/Blueprints".into(),
            project: "Game".into(),
            extension: "uasset".into(),
            mtime: 50,
            asset_class: Some("Blueprint".into()),
            parent_class: Some(parent.into()),
        }
    }

    #[test]
    fn test_upsert_asset_keeps_id_and_count() {
        let store = Store::in_memory().unwrap();
        let a1 = store.upsert_asset(&blueprint("BP_Hero", "Character")).unwrap();
        let a2 = store.upsert_asset(&blueprint("BP_Hero", "Pawn")).unwrap();

        assert_eq!(a1.id, a2.id);
        assert_eq!(a2.parent_class.as_deref(), Some("Pawn"));
        assert_eq!(store.stats().unwrap().assets, 1);
    }

    #[test]
    fn test_find_asset_by_name() {
        let store = Store::in_memory().unwrap();
        store.upsert_asset(&blueprint("BP_Hero", "Character")).unwrap();

        let hits = store.find_asset_by_name("bp_hero", None, None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].is_blueprint());

        let none = store
            .find_asset_by_name("bp_hero", Some("Other"), None, 10)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_folder_browse_and_list() {
        let store = Store::in_memory().unwrap();
        store.upsert_asset(&blueprint("BP_Hero", "Character")).unwrap();
        store.upsert_asset(&blueprint("BP_Enemy", "Character")).unwrap();
        let mut material = blueprint("M_Steel", "");
        material.folder = "/Game/Materials".into();
        material.asset_class = None;
        material.parent_class = None;
        store.upsert_asset(&material).unwrap();

        let folders = store.list_asset_folders(Some("Game")).unwrap();
        assert_eq!(
            folders,
            vec![("/Game/Blueprints".to_string(), 2), ("/Game/Materials".to_string(), 1)]
        );

        let hits = store
            .browse_asset_folder("/Game/Blueprints", None, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "BP_Enemy");
    }

    #[test]
    fn test_delete_asset() {
        let store = Store::in_memory().unwrap();
        store.upsert_asset(&blueprint("BP_Hero", "Character")).unwrap();
        assert!(store.delete_asset_by_path("/g/Content/BP_Hero.uasset").unwrap());
        assert!(!store.delete_asset_by_path("/g/Content/BP_Hero.uasset").unwrap());
        assert_eq!(store.stats().unwrap().assets, 0);
    }
}
