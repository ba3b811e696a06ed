//! Query façade: typed requests, dispatch, slow-query timing.
//!
//! Every read query is a variant of [`QueryRequest`] with typed args,
//! dispatched through one match. When the memory index is loaded the
//! query runs against it on the calling task (sub-millisecond path);
//! otherwise it is sent to the read-only worker pool as a typed
//! message and runs against the store (multi-millisecond path).
//!
//! `timed` wraps every dispatch: queries over the threshold log a
//! warning and land in the query_analytics table, where write failures
//! are swallowed so analytics can never break a query.

pub mod context;
mod store_path;
pub mod workers;

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::fuzzy::{self, MemberFilter, MemberMatch, TypeFilter};
use crate::memory::MemoryIndex;
use crate::store::Store;
use crate::types::{Language, MemberKind, TypeKind};
use context::{display_path, ContextAttacher, ContextWindow};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Queries slower than this are logged and recorded.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

const fn default_max_results() -> usize {
    20
}

const fn default_children_max() -> usize {
    100
}

const fn default_browse_max() -> usize {
    200
}

// ── typed request args ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindTypeArgs {
    pub name: String,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub kind: Option<TypeKind>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub include_assets: bool,
    #[serde(default)]
    pub context_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMemberArgs {
    pub name: String,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub containing_type: Option<String>,
    #[serde(default)]
    pub containing_type_hierarchy: bool,
    #[serde(default)]
    pub member_kind: Option<MemberKind>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub context_lines: usize,
    #[serde(default)]
    pub include_signatures: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindFileArgs {
    pub filename: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindAssetArgs {
    pub name: String,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindChildrenArgs {
    pub parent: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default = "default_children_max")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModulesArgs {
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseModuleArgs {
    pub module: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_browse_max")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseAssetsArgs {
    pub folder: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_browse_max")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAssetFoldersArgs {
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainTypeArgs {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default = "default_browse_max")]
    pub max_members: usize,
}

/// Every read query the façade serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "kebab-case")]
pub enum QueryRequest {
    FindType(FindTypeArgs),
    FindMember(FindMemberArgs),
    FindFile(FindFileArgs),
    FindAsset(FindAssetArgs),
    FindChildren(FindChildrenArgs),
    ListModules(ListModulesArgs),
    BrowseModule(BrowseModuleArgs),
    BrowseAssets(BrowseAssetsArgs),
    ListAssetFolders(ListAssetFoldersArgs),
    ExplainType(ExplainTypeArgs),
}

impl QueryRequest {
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::FindType(_) => "find-type",
            Self::FindMember(_) => "find-member",
            Self::FindFile(_) => "find-file",
            Self::FindAsset(_) => "find-asset",
            Self::FindChildren(_) => "find-children",
            Self::ListModules(_) => "list-modules",
            Self::BrowseModule(_) => "browse-module",
            Self::BrowseAssets(_) => "browse-assets",
            Self::ListAssetFolders(_) => "list-asset-folders",
            Self::ExplainType(_) => "explain-type",
        }
    }
}

// ── response shapes ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeHit {
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    pub path: String,
    pub project: String,
    pub module: String,
    pub language: Language,
    pub score: f64,
    pub match_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberHit {
    pub name: String,
    pub member_kind: MemberKind,
    pub line: u32,
    pub is_static: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifiers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub score: f64,
    pub match_reason: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHit {
    pub path: String,
    pub project: String,
    pub module: String,
    pub language: Language,
    pub mtime: i64,
    pub score: f64,
    pub match_reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHit {
    pub name: String,
    pub content_path: String,
    pub folder: String,
    pub project: String,
    pub extension: String,
    pub mtime: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    pub score: f64,
    pub match_reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindTypeResponse {
    pub results: Vec<TypeHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_results: Option<Vec<AssetHit>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMemberResponse {
    pub results: Vec<MemberHit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindFileResponse {
    pub results: Vec<FileHit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindAssetResponse {
    pub results: Vec<AssetHit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// One child in an inheritance query: a source type or a Blueprint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildHit {
    pub name: String,
    /// "type" or "asset".
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindChildrenResponse {
    pub results: Vec<ChildHit>,
    pub truncated: bool,
    pub total_children: usize,
    pub parent_found: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub module: String,
    pub project: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModulesResponse {
    pub results: Vec<ModuleSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseModuleResponse {
    pub module: String,
    pub results: Vec<TypeHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseAssetsResponse {
    pub folder: String,
    pub results: Vec<AssetHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub folder: String,
    pub asset_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAssetFoldersResponse {
    pub results: Vec<FolderSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainTypeResponse {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_info: Option<TypeHit>,
    pub members: Vec<MemberHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<FindChildrenResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// Typed result matching [`QueryRequest`] variant for variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Types(FindTypeResponse),
    Members(FindMemberResponse),
    Files(FindFileResponse),
    Assets(FindAssetResponse),
    Children(FindChildrenResponse),
    Modules(ListModulesResponse),
    ModuleTypes(BrowseModuleResponse),
    AssetFolder(BrowseAssetsResponse),
    Folders(ListAssetFoldersResponse),
    Explain(Box<ExplainTypeResponse>),
}

impl QueryResponse {
    /// Result count for analytics.
    #[must_use]
    pub fn result_count(&self) -> usize {
        match self {
            Self::Types(r) => r.results.len(),
            Self::Members(r) => r.results.len(),
            Self::Files(r) => r.results.len(),
            Self::Assets(r) => r.results.len(),
            Self::Children(r) => r.results.len(),
            Self::Modules(r) => r.results.len(),
            Self::ModuleTypes(r) => r.results.len(),
            Self::AssetFolder(r) => r.results.len(),
            Self::Folders(r) => r.results.len(),
            Self::Explain(r) => r.members.len(),
        }
    }
}

// ── the façade ──────────────────────────────────────────────────────

pub struct QueryService {
    store: Arc<Store>,
    memory: Arc<RwLock<MemoryIndex>>,
    workers: Option<workers::WorkerPool>,
    config: Arc<Config>,
    slow_threshold: Duration,
}

impl QueryService {
    pub fn new(
        store: Arc<Store>,
        memory: Arc<RwLock<MemoryIndex>>,
        workers: Option<workers::WorkerPool>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            memory,
            workers,
            config,
            slow_threshold: SLOW_QUERY_THRESHOLD,
        }
    }

    /// Dispatches a typed query, timing it and recording slow ones.
    ///
    /// # Errors
    ///
    /// Propagates validation and store errors with their error kinds.
    pub async fn dispatch(&self, request: QueryRequest) -> Result<QueryResponse> {
        let method = request.method_name();
        let args = serde_json::to_string(&request).unwrap_or_default();
        let start = Instant::now();

        let result = self.route(request).await;

        let elapsed = start.elapsed();
        if elapsed >= self.slow_threshold {
            let count = result.as_ref().map(QueryResponse::result_count).unwrap_or(0);
            tracing::warn!(
                "slow query {method} took {}ms ({count} results)",
                elapsed.as_millis()
            );
            self.store
                .record_query(method, &args, elapsed.as_millis() as u64, count);
        }

        result
    }

    async fn route(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.validate(&request)?;

        // The startup loader holds the write lock while it populates
        // the index; try_read keeps queries on the store path instead
        // of parking behind it.
        let memory_loaded = self
            .memory
            .try_read()
            .map(|m| m.is_loaded())
            .unwrap_or(false);

        if memory_loaded {
            return self.execute_memory(&request);
        }
        if let Some(pool) = &self.workers {
            return pool.execute(request).await.map(|reply| reply.result)?;
        }
        let conn = self.store.conn().map_err(ServiceError::Store)?;
        store_path::execute(&conn, &request)
    }

    fn validate(&self, request: &QueryRequest) -> Result<()> {
        let project = match request {
            QueryRequest::FindType(a) => a.project.as_deref(),
            QueryRequest::FindMember(a) => a.project.as_deref(),
            QueryRequest::FindFile(a) => a.project.as_deref(),
            QueryRequest::FindAsset(a) => a.project.as_deref(),
            QueryRequest::FindChildren(a) => a.project.as_deref(),
            QueryRequest::ListModules(a) => a.project.as_deref(),
            QueryRequest::BrowseModule(a) => a.project.as_deref(),
            QueryRequest::BrowseAssets(a) => a.project.as_deref(),
            QueryRequest::ListAssetFolders(a) => a.project.as_deref(),
            QueryRequest::ExplainType(a) => a.project.as_deref(),
        };

        let name_empty = match request {
            QueryRequest::FindType(a) => a.name.is_empty(),
            QueryRequest::FindMember(a) => a.name.is_empty(),
            QueryRequest::FindFile(a) => a.filename.is_empty(),
            QueryRequest::FindAsset(a) => a.name.is_empty(),
            QueryRequest::FindChildren(a) => a.parent.is_empty(),
            QueryRequest::BrowseModule(a) => a.module.is_empty(),
            QueryRequest::BrowseAssets(a) => a.folder.is_empty(),
            QueryRequest::ExplainType(a) => a.name.is_empty(),
            QueryRequest::ListModules(_) | QueryRequest::ListAssetFolders(_) => false,
        };
        if name_empty {
            return Err(ServiceError::InvalidParameter(
                "name must not be empty".to_string(),
            ));
        }

        if let Some(project) = project {
            let mut known = self.config.project_names();
            if known.is_empty() {
                if let Ok(mem) = self.memory.try_read() {
                    known = mem.project_names();
                }
            }
            if !known.is_empty() && !known.iter().any(|p| p == project) {
                return Err(ServiceError::UnknownProject {
                    requested: project.to_string(),
                    known,
                });
            }
        }
        Ok(())
    }

    fn execute_memory(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let mem = self
            .memory
            .read()
            .map_err(|_| ServiceError::Internal("memory index lock poisoned".to_string()))?;

        match request {
            QueryRequest::FindType(args) => Ok(QueryResponse::Types(self.find_type(&mem, args))),
            QueryRequest::FindMember(args) => {
                Ok(QueryResponse::Members(self.find_member(&mem, args)))
            }
            QueryRequest::FindFile(args) => Ok(QueryResponse::Files(find_file(&mem, args))),
            QueryRequest::FindAsset(args) => Ok(QueryResponse::Assets(find_asset(&mem, args))),
            QueryRequest::FindChildren(args) => {
                Ok(QueryResponse::Children(find_children(&mem, args)))
            }
            QueryRequest::ListModules(args) => Ok(QueryResponse::Modules(list_modules(&mem, args))),
            QueryRequest::BrowseModule(args) => {
                Ok(QueryResponse::ModuleTypes(browse_module(&mem, args)))
            }
            QueryRequest::BrowseAssets(args) => {
                Ok(QueryResponse::AssetFolder(browse_assets(&mem, args)))
            }
            QueryRequest::ListAssetFolders(args) => {
                Ok(QueryResponse::Folders(list_asset_folders(&mem, args)))
            }
            QueryRequest::ExplainType(args) => Ok(QueryResponse::Explain(Box::new(
                self.explain_type(&mem, args),
            ))),
        }
    }

    fn find_type(&self, mem: &MemoryIndex, args: &FindTypeArgs) -> FindTypeResponse {
        let filter = TypeFilter {
            project: args.project.as_deref(),
            language: args.language,
            kind: args.kind,
        };
        let matches = if args.fuzzy {
            fuzzy::find_types_fuzzy(mem, &args.name, &filter, args.max_results)
        } else {
            fuzzy::find_types_exact(mem, &args.name, &filter, args.max_results)
        };

        let mut attacher = ContextAttacher::new(&self.store);
        let results: Vec<TypeHit> = matches
            .iter()
            .filter_map(|m| {
                type_hit(mem, m, args.context_lines, &mut attacher)
            })
            .collect();

        // Assets default-include in exact mode, opt-in for fuzzy.
        let want_assets = if args.fuzzy { args.include_assets } else { true };
        let asset_results = want_assets.then(|| {
            let matches = if args.fuzzy {
                fuzzy::find_assets_fuzzy(mem, &args.name, args.project.as_deref(), None, args.max_results)
            } else {
                fuzzy::find_assets_exact(mem, &args.name, args.project.as_deref(), None, args.max_results)
            };
            matches
                .iter()
                .filter_map(|m| asset_hit(mem, m.id, m.score, m.reason))
                .collect::<Vec<_>>()
        });

        let empty = results.is_empty() && asset_results.as_ref().is_none_or(Vec::is_empty);
        let hints = if empty {
            let mut hints = Vec::new();
            if !args.fuzzy {
                hints.push("try fuzzy=true".to_string());
            }
            if args.project.is_some() {
                hints.push("try removing the project filter".to_string());
            }
            hints
        } else {
            Vec::new()
        };

        FindTypeResponse {
            results,
            asset_results,
            hints,
        }
    }

    fn find_member(&self, mem: &MemoryIndex, args: &FindMemberArgs) -> FindMemberResponse {
        let filter = MemberFilter {
            project: args.project.as_deref(),
            language: args.language,
            member_kind: args.member_kind,
            containing_type: args.containing_type.as_deref(),
            include_hierarchy: args.containing_type_hierarchy,
        };
        let matches = if args.fuzzy {
            fuzzy::find_members_fuzzy(mem, &args.name, &filter, args.max_results)
        } else {
            fuzzy::find_members_exact(mem, &args.name, &filter, args.max_results)
        };

        let mut attacher = ContextAttacher::new(&self.store);
        let results: Vec<MemberHit> = matches
            .iter()
            .filter_map(|m| {
                member_hit(
                    mem,
                    m,
                    args.context_lines,
                    args.include_signatures,
                    &mut attacher,
                )
            })
            .collect();

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

        FindMemberResponse { results, hints }
    }

    fn explain_type(&self, mem: &MemoryIndex, args: &ExplainTypeArgs) -> ExplainTypeResponse {
        let filter = TypeFilter {
            project: args.project.as_deref(),
            language: args.language,
            kind: None,
        };
        let mut matches = fuzzy::find_types_exact(mem, &args.name, &filter, 1);
        if matches.is_empty() {
            matches = fuzzy::find_types_fuzzy(mem, &args.name, &filter, 1);
        }

        let mut attacher = ContextAttacher::new(&self.store);
        let Some(best) = matches.first() else {
            return ExplainTypeResponse {
                type_info: None,
                members: Vec::new(),
                children: None,
                hints: vec!["type not found; try fuzzy search via find-type".to_string()],
            };
        };

        let type_info = type_hit(mem, best, 0, &mut attacher);
        let type_name = type_info.as_ref().map(|t| t.name.clone()).unwrap_or_default();

        let members: Vec<MemberHit> = mem
            .members_of_type(best.id)
            .iter()
            .take(args.max_members)
            .filter_map(|&id| {
                let m = MemberMatch::Stored {
                    id,
                    score: 1.0,
                    reason: "member",
                };
                member_hit(mem, &m, 0, true, &mut attacher)
            })
            .collect();

        let children = find_children(
            mem,
            &FindChildrenArgs {
                parent: type_name,
                recursive: false,
                project: None,
                language: None,
                max_results: default_children_max(),
            },
        );

        ExplainTypeResponse {
            type_info,
            members,
            children: Some(children),
            hints: Vec::new(),
        }
    }
}

// ── memory-path builders (free functions, shared with tests) ────────

fn type_hit(
    mem: &MemoryIndex,
    m: &fuzzy::TypeMatch,
    context_lines: usize,
    attacher: &mut ContextAttacher<'_>,
) -> Option<TypeHit> {
    let record = mem.type_record(m.id)?;
    let file = mem.file(record.file_id)?;
    let context = attacher.window(record.file_id, record.line, context_lines);
    Some(TypeHit {
        name: record.name.clone(),
        kind: record.kind,
        parent: record.parent.clone(),
        line: record.line,
        depth: record.depth,
        path: display_path(file),
        project: file.project.clone(),
        module: file.module.clone(),
        language: file.language,
        score: m.score,
        match_reason: m.reason.to_string(),
        context,
        signature: None,
    })
}

fn member_hit(
    mem: &MemoryIndex,
    m: &MemberMatch,
    context_lines: usize,
    include_signatures: bool,
    attacher: &mut ContextAttacher<'_>,
) -> Option<MemberHit> {
    match m {
        MemberMatch::Stored { id, score, reason } => {
            let record = mem.member_record(*id)?;
            let file = mem.file(record.file_id)?;
            let containing_type = record
                .type_id
                .and_then(|tid| mem.type_record(tid))
                .map(|t| t.name.clone());
            let context = attacher.window(record.file_id, record.line, context_lines);
            let signature = include_signatures
                .then(|| attacher.signature(record.file_id, record.line))
                .flatten();
            Some(MemberHit {
                name: record.name.clone(),
                member_kind: record.member_kind,
                line: record.line,
                is_static: record.is_static,
                specifiers: record.specifiers.clone(),
                containing_type,
                path: Some(display_path(file)),
                project: Some(file.project.clone()),
                language: Some(file.language),
                score: *score,
                match_reason: reason.to_string(),
                synthetic: false,
                context,
                signature,
            })
        }
        MemberMatch::Synthetic {
            name,
            containing_type,
            score,
            reason,
        } => Some(MemberHit {
            name: (*name).to_string(),
            member_kind: MemberKind::Function,
            line: 0,
            is_static: true,
            specifiers: None,
            containing_type: Some(containing_type.clone()),
            path: None,
            project: None,
            language: None,
            score: *score,
            match_reason: reason.to_string(),
            synthetic: true,
            context: None,
            signature: None,
        }),
    }
}

fn asset_hit(mem: &MemoryIndex, id: crate::types::AssetId, score: f64, reason: &str) -> Option<AssetHit> {
    let record = mem.asset_record(id)?;
    Some(AssetHit {
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
    })
}

fn find_file(mem: &MemoryIndex, args: &FindFileArgs) -> FindFileResponse {
    let matches = fuzzy::find_files(
        mem,
        &args.filename,
        args.project.as_deref(),
        args.language,
        true,
        args.max_results,
    );
    let results: Vec<FileHit> = matches
        .iter()
        .filter_map(|m| {
            let file = mem.file(m.id)?;
            Some(FileHit {
                path: display_path(file),
                project: file.project.clone(),
                module: file.module.clone(),
                language: file.language,
                mtime: file.mtime,
                score: m.score,
                match_reason: m.reason.to_string(),
            })
        })
        .collect();

    let hints = if results.is_empty() && args.project.is_some() {
        vec!["try removing the project filter".to_string()]
    } else {
        Vec::new()
    };
    FindFileResponse { results, hints }
}

fn find_asset(mem: &MemoryIndex, args: &FindAssetArgs) -> FindAssetResponse {
    let matches = if args.fuzzy {
        fuzzy::find_assets_fuzzy(
            mem,
            &args.name,
            args.project.as_deref(),
            args.folder.as_deref(),
            args.max_results,
        )
    } else {
        fuzzy::find_assets_exact(
            mem,
            &args.name,
            args.project.as_deref(),
            args.folder.as_deref(),
            args.max_results,
        )
    };
    let results: Vec<AssetHit> = matches
        .iter()
        .filter_map(|m| asset_hit(mem, m.id, m.score, m.reason))
        .collect();

    let hints = if results.is_empty() {
        let mut hints = Vec::new();
        if !args.fuzzy {
            hints.push("try fuzzy=true".to_string());
        }
        if args.folder.is_some() {
            hints.push("try removing the folder filter".to_string());
        }
        hints
    } else {
        Vec::new()
    };
    FindAssetResponse { results, hints }
}

fn find_children(mem: &MemoryIndex, args: &FindChildrenArgs) -> FindChildrenResponse {
    let graph = mem.graph();
    let names: Vec<String> = if args.recursive {
        graph.descendants(&args.parent).as_slice().to_vec()
    } else {
        graph
            .direct_children(&args.parent)
            .into_iter()
            .map(ToString::to_string)
            .collect()
    };

    // Filters apply to the OUTPUT only; the traversal above crossed
    // projects and languages freely.
    let mut results: Vec<ChildHit> = Vec::new();
    for name in &names {
        for &type_id in mem.types_named(name) {
            let Some(record) = mem.type_record(type_id) else {
                continue;
            };
            let Some(file) = mem.file(record.file_id) else {
                continue;
            };
            if let Some(project) = args.project.as_deref() {
                if file.project != project {
                    continue;
                }
            }
            if let Some(language) = args.language {
                if file.language != language {
                    continue;
                }
            }
            results.push(ChildHit {
                name: record.name.clone(),
                source: "type",
                kind: Some(record.kind),
                parent: record.parent.clone(),
                path: Some(display_path(file)),
                content_path: None,
                project: file.project.clone(),
                language: Some(file.language),
            });
        }
        for &asset_id in mem.assets_named_lower(&name.to_lowercase()) {
            let Some(asset) = mem.asset_record(asset_id) else {
                continue;
            };
            if !asset.is_blueprint() {
                continue;
            }
            if let Some(project) = args.project.as_deref() {
                if asset.project != project {
                    continue;
                }
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
    }

    let total_children = results.len();
    let truncated = total_children > args.max_results;
    results.truncate(args.max_results);

    let parent_found = graph.knows(&args.parent) || !mem.types_named(&args.parent).is_empty();

    FindChildrenResponse {
        results,
        truncated,
        total_children,
        parent_found,
    }
}

fn list_modules(mem: &MemoryIndex, args: &ListModulesArgs) -> ListModulesResponse {
    let mut results: Vec<ModuleSummary> = Vec::new();
    for module in mem.module_names() {
        let mut per_project: ahash::AHashMap<String, usize> = ahash::AHashMap::new();
        for &file_id in mem.files_in_module(module) {
            if let Some(file) = mem.file(file_id) {
                *per_project.entry(file.project.clone()).or_insert(0) += 1;
            }
        }
        for (project, file_count) in per_project {
            if args.project.as_deref().is_some_and(|p| p != project) {
                continue;
            }
            results.push(ModuleSummary {
                module: module.clone(),
                project,
                file_count,
            });
        }
    }
    results.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.project.cmp(&b.project)));
    ListModulesResponse { results }
}

fn browse_module(mem: &MemoryIndex, args: &BrowseModuleArgs) -> BrowseModuleResponse {
    let mut results: Vec<TypeHit> = Vec::new();
    for &file_id in mem.files_in_module(&args.module) {
        let Some(file) = mem.file(file_id) else {
            continue;
        };
        if args.project.as_deref().is_some_and(|p| p != file.project) {
            continue;
        }
        for &type_id in mem.types_in_file(file_id) {
            let Some(record) = mem.type_record(type_id) else {
                continue;
            };
            results.push(TypeHit {
                name: record.name.clone(),
                kind: record.kind,
                parent: record.parent.clone(),
                line: record.line,
                depth: record.depth,
                path: display_path(file),
                project: file.project.clone(),
                module: file.module.clone(),
                language: file.language,
                score: 1.0,
                match_reason: "module".to_string(),
                context: None,
                signature: None,
            });
        }
    }
    results.sort_by(|a, b| a.name.cmp(&b.name));
    results.truncate(args.max_results);
    BrowseModuleResponse {
        module: args.module.clone(),
        results,
    }
}

fn browse_assets(mem: &MemoryIndex, args: &BrowseAssetsArgs) -> BrowseAssetsResponse {
    let mut results: Vec<AssetHit> = mem
        .assets_in_folder(&args.folder)
        .iter()
        .filter_map(|&id| asset_hit(mem, id, 1.0, "folder"))
        .filter(|a| args.project.as_deref().is_none_or(|p| p == a.project))
        .collect();
    results.sort_by(|a, b| a.name.cmp(&b.name));
    results.truncate(args.max_results);
    BrowseAssetsResponse {
        folder: args.folder.clone(),
        results,
    }
}

fn list_asset_folders(mem: &MemoryIndex, args: &ListAssetFoldersArgs) -> ListAssetFoldersResponse {
    let results = mem
        .asset_folders()
        .into_iter()
        .filter(|(folder, _)| {
            args.project.as_deref().is_none_or(|p| {
                mem.assets_in_folder(folder)
                    .iter()
                    .filter_map(|&id| mem.asset_record(id))
                    .any(|a| a.project == p)
            })
        })
        .map(|(folder, asset_count)| FolderSummary {
            folder: folder.to_string(),
            asset_count,
        })
        .collect();
    ListAssetFoldersResponse { results }
}
