//! uindex: code-index HTTP service for Unreal Engine repositories.
//!
//! Fast structural lookups (types, members, files, inheritance) and
//! content search over large C++ / AngelScript / Blueprint codebases,
//! served to AI assistants over JSON/HTTP:
//! - SQLite store with trigram postings for fuzzy name search
//! - Fully loaded in-memory mirror for sub-millisecond lookups
//! - Cross-language inheritance graph (source types + Blueprints)
//! - Grep delegated to an external full-text engine, re-ranked with
//!   index signals
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              HTTP API (axum)                │
//! │    find-type, find-children, grep, ...      │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │              Query Facade                   │
//! │   typed QueryRequest dispatch + timing      │
//! └───────┬─────────────────┬───────────────────┘
//!         │ loaded          │ not loaded
//! ┌───────▼────────┐ ┌──────▼──────────┐
//! │  Memory Index  │ │  Worker Pool    │
//! │ maps, postings │ │ read-only conns │
//! │ inherit. graph │ └──────┬──────────┘
//! └───────┬────────┘        │
//!         │    ┌────────────▼────┐   ┌───────────────┐
//!         └────►  SQLite Store   │   │ zoekt (extern) │
//!   ingest     │  WAL, trigrams  │   │ mirror tree    │
//!   sync       └─────────────────┘   └───────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fuzzy;
pub mod graph;
pub mod grep;
pub mod http;
pub mod ingest;
pub mod memory;
pub mod query;
pub mod store;
pub mod trigram;
pub mod types;

pub use error::{Result, ServiceError};
pub use types::{AssetId, FileId, MemberId, Score, Trigram, TypeId};

use config::{BuildInfo, Config};
use grep::{GrepCache, GrepPipeline, ZoektClient};
use ingest::{Ingestor, Mirror};
use memory::MemoryIndex;
use query::{workers::WorkerPool, QueryService};
use std::sync::{Arc, RwLock};

/// Wires up every component and returns the ready-to-serve state.
///
/// Opens (or creates) the store, spawns the read-only worker pool,
/// and connects ingest invalidation to the grep cache. The memory
/// index starts EMPTY and unloaded: call [`load_memory`] (blocking)
/// or [`spawn_memory_load`] (background) to populate it. Until the
/// load finishes, the query façade routes through the worker pool
/// against the store.
///
/// # Errors
///
/// Returns `ServiceError` when the store cannot be opened or the
/// engine client cannot be built.
pub fn bootstrap(config: Config, build: BuildInfo) -> Result<http::AppState> {
    let config = Arc::new(config);
    let db_path = config.data.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Arc::new(store::Store::open(&db_path).map_err(ServiceError::Store)?);
    let workers = WorkerPool::spawn(&store).map_err(ServiceError::Store)?;

    let memory = Arc::new(RwLock::new(MemoryIndex::new()));

    let cache = Arc::new(GrepCache::with_defaults());
    let engine = Arc::new(ZoektClient::new(&config.zoekt).map_err(error::ServiceError::Grep)?);
    let grep = Arc::new(GrepPipeline::new(
        engine,
        Arc::clone(&cache),
        Arc::clone(&memory),
    ));

    let mirror = Mirror::new(config.data.mirror_dir());
    let cache_for_ingest = Arc::clone(&cache);
    let ingestor = Arc::new(Ingestor::new(
        Arc::clone(&store),
        Arc::clone(&memory),
        mirror,
        build.clone(),
        Arc::new(move || cache_for_ingest.invalidate()),
    ));

    let query = Arc::new(QueryService::new(
        Arc::clone(&store),
        Arc::clone(&memory),
        workers,
        Arc::clone(&config),
    ));

    Ok(http::AppState::new(
        query,
        grep,
        ingestor,
        store,
        memory,
        config,
        build,
    ))
}

/// Bulk-loads the memory index from the store, replacing the shared
/// instance. Blocking; in async contexts run it on the blocking pool.
///
/// The write lock is held across the bulk read. Queries probe the
/// lock with `try_read` and stay on the store path meanwhile; an
/// ingest batch that commits mid-load blocks at its memory-sync step
/// and re-applies its rows once the swap is done, so the index
/// converges on the store either way.
///
/// # Errors
///
/// Returns `ServiceError::Store` if a bulk read fails.
pub fn load_memory(store: &store::Store, memory: &RwLock<MemoryIndex>) -> Result<()> {
    let mut guard = memory
        .write()
        .map_err(|_| ServiceError::Internal("memory index lock poisoned".to_string()))?;
    let loaded = MemoryIndex::load(store).map_err(ServiceError::Store)?;
    tracing::info!(
        "memory index loaded: {} files, {} types, {} members, {} assets",
        loaded.stats().total_files,
        loaded.stats().total_types,
        loaded.stats().total_members,
        loaded.stats().total_assets,
    );
    *guard = loaded;
    Ok(())
}

/// Spawns [`load_memory`] on the blocking pool so the service answers
/// queries through the worker pool while the load runs. Must be
/// called from within a tokio runtime.
pub fn spawn_memory_load(state: &http::AppState) {
    let store = Arc::clone(&state.store);
    let memory = Arc::clone(&state.memory);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = load_memory(&store, &memory) {
            tracing::error!("memory index load failed: {e}");
        }
    });
}
