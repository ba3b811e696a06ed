//! Common test utilities for uindex integration tests.
//!
//! Provides `TestEnv` for setting up isolated test environments with
//! store, memory index, ingestor, and query façade all wired together,
//! plus a canned search-engine stub for grep pipeline tests.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use std::sync::{Arc, RwLock};
use tempfile::TempDir;
use uindex::config::{BuildInfo, Config};
use uindex::error::GrepError;
use uindex::grep::{EngineHit, EngineQuery, GrepCache, GrepPipeline, SearchEngine};
use uindex::ingest::{IngestFile, IngestRequest, Ingestor, Mirror};
use uindex::memory::MemoryIndex;
use uindex::query::QueryService;
use uindex::store::Store;
use uindex::types::{Language, NewAsset, NewMember, NewType};

/// A complete test environment with all components wired together.
pub struct TestEnv {
    pub dir: TempDir,
    pub store: Arc<Store>,
    pub memory: Arc<RwLock<MemoryIndex>>,
    pub ingestor: Ingestor,
    pub query: QueryService,
    pub cache: Arc<GrepCache<uindex::grep::GrepResponse>>,
}

impl TestEnv {
    /// Creates a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(Store::in_memory().expect("Failed to create in-memory store"));
        let memory = Arc::new(RwLock::new(
            MemoryIndex::load(&store).expect("Failed to load memory index"),
        ));
        let cache = Arc::new(GrepCache::with_defaults());

        let cache_hook = Arc::clone(&cache);
        let ingestor = Ingestor::new(
            Arc::clone(&store),
            Arc::clone(&memory),
            Mirror::new(dir.path().join("mirror")),
            BuildInfo::default(),
            Arc::new(move || cache_hook.invalidate()),
        );

        let query = QueryService::new(
            Arc::clone(&store),
            Arc::clone(&memory),
            None,
            Arc::new(Config::default()),
        );

        Self {
            dir,
            store,
            memory,
            ingestor,
            query,
            cache,
        }
    }

    /// Builds a grep pipeline over this environment's memory index,
    /// backed by a canned engine.
    pub fn grep_with(&self, engine: StubEngine) -> GrepPipeline {
        GrepPipeline::new(
            Arc::new(engine),
            Arc::clone(&self.cache),
            Arc::clone(&self.memory),
        )
    }

    /// A façade over the same store but an unloaded memory index, as
    /// during the startup window: every query takes the store path.
    pub fn store_only_query(&self) -> QueryService {
        QueryService::new(
            Arc::clone(&self.store),
            Arc::new(RwLock::new(MemoryIndex::new())),
            None,
            Arc::new(Config::default()),
        )
    }

    /// Ingests a single source file with parsed records.
    pub fn ingest_file(&self, file: IngestFile) -> uindex::ingest::IngestResponse {
        self.ingestor.apply(IngestRequest {
            files: vec![file],
            ..Default::default()
        })
    }
}

/// Builder for a source file carrying one class and its members.
pub fn source_file(path: &str, project: &str, mtime: i64) -> IngestFile {
    IngestFile {
        path: path.to_string(),
        project: project.to_string(),
        module: format!("{project}.Source"),
        mtime,
        language: Language::Cpp,
        relative_path: path
            .strip_prefix(&format!("/{}/", project.to_lowercase()))
            .map(ToString::to_string),
        content: None,
        types: Vec::new(),
        members: Vec::new(),
    }
}

pub fn class(name: &str, parent: Option<&str>, line: u32) -> NewType {
    NewType {
        name: name.to_string(),
        kind: uindex::types::TypeKind::Class,
        parent: parent.map(ToString::to_string),
        line,
    }
}

pub fn function(name: &str, containing: Option<&str>, line: u32) -> NewMember {
    NewMember {
        name: name.to_string(),
        member_kind: uindex::types::MemberKind::Function,
        line,
        is_static: false,
        specifiers: None,
        containing_type: containing.map(ToString::to_string),
    }
}

pub fn blueprint(name: &str, parent: &str, project: &str) -> NewAsset {
    NewAsset {
        path: format!("/{}/Content/{name}.uasset", project.to_lowercase()),
        name: name.to_string(),
        content_path: format!("/Game/Blueprints/{name}"),
        folder: "/Game/Blueprints".to_string(),
        project: project.to_string(),
        extension: "uasset".to_string(),
        mtime: 1,
        asset_class: Some("Blueprint".to_string()),
        parent_class: Some(parent.to_string()),
    }
}

/// Canned engine: returns fixed hits for source queries and asset
/// queries respectively, or a fixed error.
pub struct StubEngine {
    pub hits: Vec<EngineHit>,
    pub asset_hits: Vec<EngineHit>,
    pub fail_unavailable: bool,
}

impl StubEngine {
    pub fn with_hits(hits: Vec<EngineHit>) -> Self {
        Self {
            hits,
            asset_hits: Vec::new(),
            fail_unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            hits: Vec::new(),
            asset_hits: Vec::new(),
            fail_unavailable: true,
        }
    }
}

impl SearchEngine for StubEngine {
    fn search<'a>(
        &'a self,
        query: &'a EngineQuery,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<EngineHit>, GrepError>> + Send + 'a,
        >,
    > {
        Box::pin(async move {
            if self.fail_unavailable {
                return Err(GrepError::EngineUnavailable("stub engine down".to_string()));
            }
            let is_asset_query = query
                .query
                .split_whitespace()
                .any(|atom| atom == "file:^_assets/");
            if is_asset_query {
                Ok(self.asset_hits.clone())
            } else {
                Ok(self.hits.clone())
            }
        })
    }
}

pub fn hit(path: &str, line: u32, text: &str) -> EngineHit {
    EngineHit {
        path: path.to_string(),
        line,
        text: text.to_string(),
        before: Vec::new(),
        after: Vec::new(),
    }
}
