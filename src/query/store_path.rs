//! Store-backed query execution for the worker pool.
//!
//! Mirrors the memory-path semantics over plain SQL, for the window
//! before the memory index finishes loading (and for worker tasks,
//! which never touch the memory index). Scoring reuses the same
//! relation table as the in-memory matcher so both paths rank alike.

use super::{
    AssetHit, BrowseAssetsArgs, BrowseAssetsResponse, BrowseModuleArgs, BrowseModuleResponse,
    ChildHit, ExplainTypeArgs, ExplainTypeResponse, FileHit, FindAssetArgs, FindAssetResponse,
    FindChildrenArgs, FindChildrenResponse, FindFileArgs, FindFileResponse, FindMemberArgs,
    FindMemberResponse, FindTypeArgs, FindTypeResponse, FolderSummary, ListAssetFoldersArgs,
    ListAssetFoldersResponse, ListModulesArgs, ListModulesResponse, MemberHit, ModuleSummary,
    QueryRequest, QueryResponse, TypeHit,
};
use crate::error::Result;
use crate::fuzzy::prefix::{exact_variants, strip_class_suffix, stripped_or_self};
use crate::fuzzy::score::{relate, MEMBER_SCORE_FLOOR, TYPE_SCORE_FLOOR};
use crate::fuzzy::MAX_CANDIDATES;
use crate::ingest::inflate;
use crate::store::{assets, files, symbols, MemberWithContext, TypeWithPath};
use crate::trigram::name_trigrams;
use crate::types::{AssetRecord, EntityKind, FileRecord, Language};
use ahash::AHashSet;
use rusqlite::Connection;
use std::collections::VecDeque;

/// Executes a typed query against a read-only connection.
///
/// # Errors
///
/// Propagates store errors as `ServiceError::Store`.
pub(crate) fn execute(conn: &Connection, request: &QueryRequest) -> Result<QueryResponse> {
    match request {
        QueryRequest::FindType(args) => Ok(QueryResponse::Types(find_type(conn, args)?)),
        QueryRequest::FindMember(args) => Ok(QueryResponse::Members(find_member(conn, args)?)),
        QueryRequest::FindFile(args) => Ok(QueryResponse::Files(find_file(conn, args)?)),
        QueryRequest::FindAsset(args) => Ok(QueryResponse::Assets(find_asset(conn, args)?)),
        QueryRequest::FindChildren(args) => {
            Ok(QueryResponse::Children(find_children(conn, args)?))
        }
        QueryRequest::ListModules(args) => Ok(QueryResponse::Modules(list_modules(conn, args)?)),
        QueryRequest::BrowseModule(args) => {
            Ok(QueryResponse::ModuleTypes(browse_module(conn, args)?))
        }
        QueryRequest::BrowseAssets(args) => {
            Ok(QueryResponse::AssetFolder(browse_assets(conn, args)?))
        }
        QueryRequest::ListAssetFolders(args) => {
            Ok(QueryResponse::Folders(list_asset_folders(conn, args)?))
        }
        QueryRequest::ExplainType(args) => {
            Ok(QueryResponse::Explain(Box::new(explain_type(conn, args)?)))
        }
    }
}

fn display_path_for(path: &str, project: &str, relative: Option<&str>) -> String {
    let file = FileRecord {
        id: crate::types::FileId::new(0),
        path: path.to_string(),
        project: project.to_string(),
        module: String::new(),
        language: Language::Other,
        mtime: 0,
        relative_path: relative.map(ToString::to_string),
    };
    super::context::display_path(&file)
}

fn type_hit_from(row: &TypeWithPath, score: f64, reason: &str) -> TypeHit {
    TypeHit {
        name: row.record.name.clone(),
        kind: row.record.kind,
        parent: row.record.parent.clone(),
        line: row.record.line,
        depth: row.record.depth,
        path: display_path_for(&row.path, &row.project, row.relative_path.as_deref()),
        project: row.project.clone(),
        module: row.module.clone(),
        language: row.language,
        score,
        match_reason: reason.to_string(),
        context: None,
        signature: None,
    }
}

fn member_hit_from(
    row: &MemberWithContext,
    score: f64,
    reason: &str,
    signature: Option<String>,
) -> MemberHit {
    MemberHit {
        name: row.record.name.clone(),
        member_kind: row.record.member_kind,
        line: row.record.line,
        is_static: row.record.is_static,
        specifiers: row.record.specifiers.clone(),
        containing_type: row.type_name.clone(),
        path: Some(display_path_for(
            &row.path,
            &row.project,
            row.relative_path.as_deref(),
        )),
        project: Some(row.project.clone()),
        language: Some(row.language),
        score,
        match_reason: reason.to_string(),
        synthetic: false,
        context: None,
        signature,
    }
}

fn asset_hit_from(record: &AssetRecord, score: f64, reason: &str) -> AssetHit {
    AssetHit {
        name: record.name.clone(),
        content_path: record.content_path.clone(),
        folder: record.folder.clone(),
        project: record.project.clone(),
        extension: record.extension.clone(),
        mtime: record.mtime,
        asset_class: record.asset_class.clone(),
        parent_class: record.parent_class.clone(),
        score,
        match_reason: reason.to_string(),
    }
}

fn find_type(conn: &Connection, args: &FindTypeArgs) -> crate::error::StoreResult<FindTypeResponse> {
    let project = args.project.as_deref();
    let mut results: Vec<TypeHit> = Vec::new();

    let mut exact = symbols::find_type_by_name(
        conn,
        &args.name,
        project,
        args.language,
        args.kind,
        args.max_results,
    )?;
    let mut reason = "exact";

    if exact.is_empty() {
        for variant in exact_variants(&args.name) {
            exact = symbols::find_type_by_name(
                conn,
                &variant,
                project,
                args.language,
                args.kind,
                args.max_results,
            )?;
            if !exact.is_empty() {
                reason = "prefix-variant";
                break;
            }
        }
    }
    if exact.is_empty() {
        if let Some(trimmed) = strip_class_suffix(&args.name) {
            exact = symbols::find_type_by_name(
                conn,
                trimmed,
                project,
                args.language,
                args.kind,
                args.max_results,
            )?;
            if !exact.is_empty() {
                reason = "prefix-variant";
            }
        }
    }

    for row in &exact {
        let score = relate(&args.name, &row.record.name).map_or(0.95, |r| r.score);
        results.push(type_hit_from(row, score, reason));
    }

    if args.fuzzy && results.len() < args.max_results {
        let mut seen: AHashSet<i64> = exact.iter().map(|r| r.record.id.as_i64()).collect();

        let prefixed = symbols::types_with_prefix(
            conn,
            &args.name.to_lowercase(),
            project,
            args.language,
            MAX_CANDIDATES,
        )?;
        let trigrams = name_trigrams(&args.name.to_lowercase());
        let posting_hits = symbols::name_trigram_candidates(
            conn,
            &trigrams,
            EntityKind::Type,
            trigrams.len().div_ceil(2).max(2).min(trigrams.len().max(1)),
            MAX_CANDIDATES,
        )?;
        let posting_rows = symbols::types_by_ids(
            conn,
            &posting_hits.iter().map(|h| h.entity_id).collect::<Vec<_>>(),
        )?;

        let mut scored: Vec<TypeHit> = prefixed
            .iter()
            .chain(posting_rows.iter())
            .filter(|row| seen.insert(row.record.id.as_i64()))
            .filter(|row| args.kind.is_none_or(|k| row.record.kind == k))
            .filter_map(|row| {
                let rel = relate(&args.name, &row.record.name)?;
                if rel.score < TYPE_SCORE_FLOOR {
                    return None;
                }
                Some(type_hit_from(row, rel.score, rel.reason))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.extend(scored);
        results.truncate(args.max_results);
    }

    let asset_results = (!args.fuzzy || args.include_assets)
        .then(|| -> crate::error::StoreResult<Vec<AssetHit>> {
            let rows = assets::find_asset_by_name(conn, &args.name, project, None, args.max_results)?;
            Ok(rows
                .iter()
                .map(|r| asset_hit_from(r, 1.0, "exact"))
                .collect())
        })
        .transpose()?;

    let empty = results.is_empty() && asset_results.as_ref().is_none_or(Vec::is_empty);
    let hints = if empty {
        let mut hints = Vec::new();
        if !args.fuzzy {
            hints.push("try fuzzy=true".to_string());
        }
        if project.is_some() {
            hints.push("try removing the project filter".to_string());
        }
        hints
    } else {
        Vec::new()
    };

    Ok(FindTypeResponse {
        results,
        asset_results,
        hints,
    })
}

fn find_member(
    conn: &Connection,
    args: &FindMemberArgs,
) -> crate::error::StoreResult<FindMemberResponse> {
    let containing: Option<Vec<String>> = match (&args.containing_type, args.containing_type_hierarchy) {
        (Some(ct), true) => {
            let mut set = vec![ct.clone()];
            set.extend(symbols::ancestor_chain(conn, ct)?);
            Some(set)
        }
        (Some(ct), false) => Some(vec![ct.clone()]),
        (None, _) => None,
    };

    let rows = symbols::find_member(
        conn,
        &args.name,
        containing.as_deref(),
        args.member_kind,
        args.project.as_deref(),
        args.language,
        args.max_results,
    )?;

    let mut results: Vec<MemberHit> = rows
        .iter()
        .map(|row| {
            let signature = args
                .include_signatures
                .then(|| body_line(conn, row.record.file_id, row.record.line))
                .flatten();
            member_hit_from(row, 1.0, "exact", signature)
        })
        .collect();

    if args.fuzzy && results.len() < args.max_results {
        let trigrams = name_trigrams(&args.name.to_lowercase());
        let hits = symbols::name_trigram_candidates(
            conn,
            &trigrams,
            EntityKind::Member,
            trigrams.len().div_ceil(2).max(2).min(trigrams.len().max(1)),
            MAX_CANDIDATES,
        )?;
        let seen: AHashSet<i64> = rows.iter().map(|r| r.record.id.as_i64()).collect();
        let candidates = symbols::members_by_ids(
            conn,
            &hits
                .iter()
                .map(|h| h.entity_id)
                .filter(|id| !seen.contains(id))
                .collect::<Vec<_>>(),
        )?;
        for row in &candidates {
            let Some(rel) = relate(&args.name, &row.record.name) else {
                continue;
            };
            if rel.score < MEMBER_SCORE_FLOOR {
                continue;
            }
            results.push(member_hit_from(row, rel.score, rel.reason, None));
        }
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(args.max_results);
    }

    let hints = if results.is_empty() {
        let mut hints = Vec::new();
        if !args.fuzzy {
            hints.push("try fuzzy=true".to_string());
        }
        if args.containing_type.is_some() && !args.containing_type_hierarchy {
            hints.push("try containingTypeHierarchy=true for inherited members".to_string());
        }
        hints
    } else {
        Vec::new()
    };

    Ok(FindMemberResponse { results, hints })
}

fn body_line(conn: &Connection, file_id: crate::types::FileId, line: u32) -> Option<String> {
    let (compressed, _) = files::file_content(conn, file_id).ok()??;
    let bytes = inflate(&compressed)?;
    let text = String::from_utf8_lossy(&bytes);
    text.lines()
        .nth((line as usize).checked_sub(1)?)
        .map(|l| l.trim().to_string())
}

fn find_file(conn: &Connection, args: &FindFileArgs) -> crate::error::StoreResult<FindFileResponse> {
    let rows = files::find_file_by_name(
        conn,
        &args.filename,
        args.project.as_deref(),
        args.language,
        args.max_results,
    )?;
    let results: Vec<FileHit> = rows
        .iter()
        .filter(|r| r.language != Language::Asset)
        .map(|r| FileHit {
            path: super::context::display_path(r),
            project: r.project.clone(),
            module: r.module.clone(),
            language: r.language,
            mtime: r.mtime,
            score: 1.0,
            match_reason: "name".to_string(),
        })
        .collect();

    let hints = if results.is_empty() && args.project.is_some() {
        vec!["try removing the project filter".to_string()]
    } else {
        Vec::new()
    };
    Ok(FindFileResponse { results, hints })
}

fn find_asset(
    conn: &Connection,
    args: &FindAssetArgs,
) -> crate::error::StoreResult<FindAssetResponse> {
    let project = args.project.as_deref();
    let folder = args.folder.as_deref();

    let mut rows = assets::find_asset_by_name(conn, &args.name, project, folder, args.max_results)?;
    if rows.is_empty() {
        if let Some(trimmed) = strip_class_suffix(&args.name) {
            rows = assets::find_asset_by_name(conn, trimmed, project, folder, args.max_results)?;
        }
    }
    let mut results: Vec<AssetHit> = rows
        .iter()
        .map(|r| asset_hit_from(r, 1.0, "exact"))
        .collect();

    if args.fuzzy && results.len() < args.max_results {
        let seen: AHashSet<String> = rows.iter().map(|r| r.path.clone()).collect();
        let like = assets::assets_with_name_like(conn, &args.name, project, folder, args.max_results)?;
        for r in like.iter().filter(|r| !seen.contains(&r.path)) {
            results.push(asset_hit_from(r, 0.85, "substring"));
        }
        results.truncate(args.max_results);
    }

    let hints = if results.is_empty() {
        let mut hints = Vec::new();
        if !args.fuzzy {
            hints.push("try fuzzy=true".to_string());
        }
        if folder.is_some() {
            hints.push("try removing the folder filter".to_string());
        }
        hints
    } else {
        Vec::new()
    };
    Ok(FindAssetResponse { results, hints })
}

fn find_children(
    conn: &Connection,
    args: &FindChildrenArgs,
) -> crate::error::StoreResult<FindChildrenResponse> {
    let mut results: Vec<ChildHit> = Vec::new();
    let mut visited: AHashSet<String> = AHashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(args.parent.clone());
    visited.insert(args.parent.clone());

    let mut parent_found =
        !symbols::find_type_by_name(conn, &args.parent, None, None, None, 1)?.is_empty();

    while let Some(current) = queue.pop_front() {
        let stripped = stripped_or_self(&current).to_string();

        let type_children = symbols::find_children_of(conn, &current, MAX_CANDIDATES)?;
        let stripped_children = if stripped != current {
            symbols::find_children_of(conn, &stripped, MAX_CANDIDATES)?
        } else {
            Vec::new()
        };
        let asset_children =
            assets::assets_with_parent(conn, &current, &stripped, MAX_CANDIDATES)?;

        if !type_children.is_empty() || !asset_children.is_empty() {
            parent_found = true;
        }

        for row in type_children.iter().chain(stripped_children.iter()) {
            if !visited.insert(row.record.name.clone()) {
                continue;
            }
            if args.recursive {
                queue.push_back(row.record.name.clone());
            }
            // Output-only filters; the traversal stays unfiltered.
            if args.project.as_deref().is_some_and(|p| p != row.project) {
                continue;
            }
            if args.language.is_some_and(|l| l != row.language) {
                continue;
            }
            results.push(ChildHit {
                name: row.record.name.clone(),
                source: "type",
                kind: Some(row.record.kind),
                parent: row.record.parent.clone(),
                path: Some(display_path_for(
                    &row.path,
                    &row.project,
                    row.relative_path.as_deref(),
                )),
                content_path: None,
                project: row.project.clone(),
                language: Some(row.language),
            });
        }

        for asset in &asset_children {
            if !visited.insert(asset.name.clone()) {
                continue;
            }
            if args.recursive {
                queue.push_back(asset.name.clone());
            }
            if args.project.as_deref().is_some_and(|p| p != asset.project) {
                continue;
            }
            if args.language.is_some_and(|l| l != Language::Asset) {
                continue;
            }
            results.push(ChildHit {
                name: asset.name.clone(),
                source: "asset",
                kind: None,
                parent: asset.parent_class.clone(),
                path: None,
                content_path: Some(asset.content_path.clone()),
                project: asset.project.clone(),
                language: None,
            });
        }

        if !args.recursive {
            break;
        }
    }

    let total_children = results.len();
    let truncated = total_children > args.max_results;
    results.truncate(args.max_results);

    Ok(FindChildrenResponse {
        results,
        truncated,
        total_children,
        parent_found,
    })
}

fn list_modules(
    conn: &Connection,
    args: &ListModulesArgs,
) -> crate::error::StoreResult<ListModulesResponse> {
    let rows = symbols::list_modules(conn, args.project.as_deref())?;
    Ok(ListModulesResponse {
        results: rows
            .into_iter()
            .map(|(module, project, count)| ModuleSummary {
                module,
                project,
                file_count: count as usize,
            })
            .collect(),
    })
}

fn browse_module(
    conn: &Connection,
    args: &BrowseModuleArgs,
) -> crate::error::StoreResult<BrowseModuleResponse> {
    let rows = symbols::browse_module(conn, &args.module, args.project.as_deref(), args.max_results)?;
    Ok(BrowseModuleResponse {
        module: args.module.clone(),
        results: rows
            .iter()
            .map(|row| type_hit_from(row, 1.0, "module"))
            .collect(),
    })
}

fn browse_assets(
    conn: &Connection,
    args: &BrowseAssetsArgs,
) -> crate::error::StoreResult<BrowseAssetsResponse> {
    let rows = assets::browse_asset_folder(conn, &args.folder, args.project.as_deref(), args.max_results)?;
    Ok(BrowseAssetsResponse {
        folder: args.folder.clone(),
        results: rows
            .iter()
            .map(|r| asset_hit_from(r, 1.0, "folder"))
            .collect(),
    })
}

fn list_asset_folders(
    conn: &Connection,
    args: &ListAssetFoldersArgs,
) -> crate::error::StoreResult<ListAssetFoldersResponse> {
    let rows = assets::list_asset_folders(conn, args.project.as_deref())?;
    Ok(ListAssetFoldersResponse {
        results: rows
            .into_iter()
            .map(|(folder, count)| FolderSummary {
                folder,
                asset_count: count as usize,
            })
            .collect(),
    })
}

fn explain_type(
    conn: &Connection,
    args: &ExplainTypeArgs,
) -> crate::error::StoreResult<ExplainTypeResponse> {
    let found = find_type(
        conn,
        &FindTypeArgs {
            name: args.name.clone(),
            fuzzy: true,
            project: args.project.clone(),
            language: args.language,
            kind: None,
            max_results: 1,
            include_assets: false,
            context_lines: 0,
        },
    )?;

    let Some(type_info) = found.results.into_iter().next() else {
        return Ok(ExplainTypeResponse {
            type_info: None,
            members: Vec::new(),
            children: None,
            hints: vec!["type not found; try fuzzy search via find-type".to_string()],
        });
    };

    let members = symbols::list_members_for_type(conn, &type_info.name, None, args.max_members)?
        .iter()
        .map(|row| member_hit_from(row, 1.0, "member", None))
        .collect();

    let children = find_children(
        conn,
        &FindChildrenArgs {
            parent: type_info.name.clone(),
            recursive: false,
            project: None,
            language: None,
            max_results: super::default_children_max(),
        },
    )?;

    Ok(ExplainTypeResponse {
        type_info: Some(type_info),
        members,
        children: Some(children),
        hints: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::types::{MemberKind, NewAsset, NewMember, NewType, TypeKind};

    fn seeded_store() -> Store {
        let store = Store::in_memory().unwrap();
        let file_id = store
            .upsert_file("/g/Actor.h", "Game", "Game.Source", 1, Language::Cpp, None)
            .unwrap();
        store
            .insert_types(
                file_id,
                &[
                    NewType {
                        name: "AActor".into(),
                        kind: TypeKind::Class,
                        parent: None,
                        line: 5,
                    },
                    NewType {
                        name: "APawn".into(),
                        kind: TypeKind::Class,
                        parent: Some("AActor".into()),
                        line: 50,
                    },
                ],
            )
            .unwrap();
        store
            .insert_members(
                file_id,
                &[NewMember {
                    name: "Destroy".into(),
                    member_kind: MemberKind::Function,
                    line: 12,
                    is_static: false,
                    specifiers: None,
                    containing_type: Some("AActor".into()),
                }],
            )
            .unwrap();
        store
            .upsert_asset(&NewAsset {
                path: "/g/BP_Hero.uasset".into(),
                name: "BP_Hero".into(),
                content_path: "/Game/BP_Hero".into(),
                folder: "/Game".into(),
                project: "Game".into(),
                extension: "uasset".into(),
                mtime: 0,
                asset_class: Some("Blueprint".into()),
                parent_class: Some("Pawn".into()),
            })
            .unwrap();
        store
    }

    #[test]
    fn test_store_path_find_type_variant() {
        let store = seeded_store();
        let conn = store.conn().unwrap();
        let response = find_type(
            &conn,
            &FindTypeArgs {
                name: "Pawn".into(),
                fuzzy: false,
                project: None,
                language: None,
                kind: None,
                max_results: 10,
                include_assets: false,
                context_lines: 0,
            },
        )
        .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].name, "APawn");
        assert_eq!(response.results[0].match_reason, "prefix-variant");
    }

    #[test]
    fn test_store_path_recursive_children_cross_language() {
        let store = seeded_store();
        let conn = store.conn().unwrap();
        let response = find_children(
            &conn,
            &FindChildrenArgs {
                parent: "AActor".into(),
                recursive: true,
                project: None,
                language: None,
                max_results: 100,
            },
        )
        .unwrap();

        assert!(response.parent_found);
        let names: Vec<&str> = response.results.iter().map(|c| c.name.as_str()).collect();
        // BP_Hero hangs off APawn via the stripped parent name "Pawn"
        assert!(names.contains(&"APawn"));
        assert!(names.contains(&"BP_Hero"));
    }

    #[test]
    fn test_store_path_member_hierarchy() {
        let store = seeded_store();
        let conn = store.conn().unwrap();
        let response = find_member(
            &conn,
            &FindMemberArgs {
                name: "Destroy".into(),
                fuzzy: false,
                containing_type: Some("APawn".into()),
                containing_type_hierarchy: true,
                member_kind: None,
                project: None,
                language: None,
                max_results: 10,
                context_lines: 0,
                include_signatures: false,
            },
        )
        .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(
            response.results[0].containing_type.as_deref(),
            Some("AActor")
        );
    }

    #[test]
    fn test_store_path_explain() {
        let store = seeded_store();
        let conn = store.conn().unwrap();
        let response = explain_type(
            &conn,
            &ExplainTypeArgs {
                name: "AActor".into(),
                project: None,
                language: None,
                max_members: 10,
            },
        )
        .unwrap();
        assert_eq!(response.type_info.unwrap().name, "AActor");
        assert_eq!(response.members.len(), 1);
        assert_eq!(response.children.unwrap().results.len(), 1);
    }
}
