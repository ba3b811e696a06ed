//! Batch ingest protocol.
//!
//! A single request carries upserted files (with optional body, types,
//! members), upserted assets, and deleted paths. Deletes apply first;
//! each file is applied in its own store transaction; after every
//! commit the in-memory index is synchronized before the response is
//! returned; mirror writes happen under the same request but their
//! failures only log.

mod mirror;

pub use mirror::{Mirror, ASSETS_PREFIX};

use crate::config::BuildInfo;
use crate::error::StoreResult;
use crate::memory::MemoryIndex;
use crate::store::{meta_keys, Store};
use crate::trigram::{content_hash, extract_trigrams};
use crate::types::{FileRecord, Language, MemberRecord, NewAsset, NewMember, NewType, TypeRecord};
use ahash::AHashMap;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::sync::{Arc, RwLock};

/// Body size cap for watcher-driven ingest.
pub const WATCHER_BODY_CAP: usize = 2 * 1024 * 1024;
/// Body size cap for local (CLI-driven) ingest.
pub const LOCAL_BODY_CAP: usize = 500 * 1024;

/// Where an ingest batch came from; determines the body cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    #[default]
    Watcher,
    Local,
}

impl IngestSource {
    #[must_use]
    pub const fn body_cap(self) -> usize {
        match self {
            Self::Watcher => WATCHER_BODY_CAP,
            Self::Local => LOCAL_BODY_CAP,
        }
    }
}

/// One upserted file with its parsed records.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFile {
    pub path: String,
    pub project: String,
    #[serde(default)]
    pub module: String,
    pub mtime: i64,
    pub language: Language,
    #[serde(default)]
    pub relative_path: Option<String>,
    /// Raw body text; present only for text-searchable files.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub types: Vec<NewType>,
    #[serde(default)]
    pub members: Vec<NewMember>,
}

/// A full ingest batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub files: Vec<IngestFile>,
    #[serde(default)]
    pub assets: Vec<NewAsset>,
    #[serde(default)]
    pub deletes: Vec<String>,
    #[serde(default)]
    pub source: IngestSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestError {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub processed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IngestError>,
}

/// Hook invoked after a committed batch, used by the query façade to
/// drop its grep cache.
pub type InvalidateHook = Arc<dyn Fn() + Send + Sync>;

pub struct Ingestor {
    store: Arc<Store>,
    memory: Arc<RwLock<MemoryIndex>>,
    mirror: Mirror,
    build: BuildInfo,
    on_commit: InvalidateHook,
}

/// Result of one file's transaction, used to synchronize the memory
/// index with the exact rows (and ids) the store produced.
struct CommittedFile {
    record: FileRecord,
    types: Vec<TypeRecord>,
    members: Vec<MemberRecord>,
    body: Option<Vec<u8>>,
    skipped: bool,
}

impl Ingestor {
    pub fn new(
        store: Arc<Store>,
        memory: Arc<RwLock<MemoryIndex>>,
        mirror: Mirror,
        build: BuildInfo,
        on_commit: InvalidateHook,
    ) -> Self {
        Self {
            store,
            memory,
            mirror,
            build,
            on_commit,
        }
    }

    /// Applies a full batch: deletes, then file upserts, then assets.
    ///
    /// Per-file errors are collected and do not abort the batch.
    pub fn apply(&self, request: IngestRequest) -> IngestResponse {
        let mut processed = 0usize;
        let mut errors = Vec::new();

        for path in &request.deletes {
            match self.delete_path(path) {
                Ok(()) => processed += 1,
                Err(e) => errors.push(IngestError {
                    path: path.clone(),
                    error: e,
                }),
            }
        }

        let cap = request.source.body_cap();
        for file in &request.files {
            match self.apply_file(file, cap) {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!("ingest failed for {}: {e}", file.path);
                    errors.push(IngestError {
                        path: file.path.clone(),
                        error: e,
                    });
                }
            }
        }

        for asset in &request.assets {
            match self.apply_asset(asset) {
                Ok(()) => processed += 1,
                Err(e) => errors.push(IngestError {
                    path: asset.path.clone(),
                    error: e,
                }),
            }
        }

        self.finish_batch();
        IngestResponse { processed, errors }
    }

    /// Source-file delete, then asset delete, then mirror delete.
    fn delete_path(&self, path: &str) -> Result<(), String> {
        let existing = self.store.file_by_path(path).map_err(|e| e.to_string())?;

        let deleted_file = self.store.delete_file(path).map_err(|e| e.to_string())?;
        let deleted_asset = self
            .store
            .delete_asset_by_path(path)
            .map_err(|e| e.to_string())?;

        if let Ok(mut mem) = self.memory.write() {
            mem.remove_file_by_path(path);
            mem.remove_asset_by_path(path);
        }

        if let Some(record) = existing {
            let rel = Mirror::relative_path_for(&record);
            if let Err(e) = self.mirror.delete_file(&rel) {
                tracing::warn!("mirror delete failed for {rel}: {e}");
            }
        }

        if !deleted_file && !deleted_asset {
            tracing::debug!("delete for unknown path {path}");
        }
        Ok(())
    }

    fn apply_file(&self, file: &IngestFile, body_cap: usize) -> Result<(), String> {
        let committed = self
            .commit_file(file, body_cap)
            .map_err(|e| e.to_string())?;

        if committed.skipped {
            return Ok(());
        }

        // Mirror write under the same request; failure only logs.
        if let Some(body) = &committed.body {
            let rel = Mirror::relative_path_for(&committed.record);
            if let Err(e) = self.mirror.update_file(&rel, body) {
                tracing::warn!("mirror write failed for {rel}: {e}");
            }
        }

        // Synchronize the memory index with the committed rows so ids
        // match the store exactly.
        if let Ok(mut mem) = self.memory.write() {
            mem.remove_file_by_path(&committed.record.path);
            mem.add_file(committed.record);
            mem.add_types(committed.types);
            mem.add_members(committed.members);
        }

        Ok(())
    }

    /// The per-file transaction: upsert row, clear prior symbols,
    /// insert new ones, replace body.
    fn commit_file(&self, file: &IngestFile, body_cap: usize) -> StoreResult<CommittedFile> {
        // Idempotency guard: same path, same mtime, and body presence
        // matching what is stored means nothing to do.
        if let Some(existing) = self.store.file_by_path(&file.path)? {
            if existing.mtime == file.mtime {
                let has_body = self.store.file_content(existing.id)?.is_some();
                if has_body == file.content.is_some() {
                    tracing::debug!("mtime guard hit for {}", file.path);
                    return Ok(CommittedFile {
                        record: existing,
                        types: Vec::new(),
                        members: Vec::new(),
                        body: None,
                        skipped: true,
                    });
                }
            }
        }

        let body = file.content.as_ref().and_then(|text| {
            if text.len() > body_cap {
                tracing::debug!(
                    "body for {} exceeds cap ({} > {body_cap}), skipping content",
                    file.path,
                    text.len()
                );
                None
            } else if file.language.is_text_searchable() || file.language == Language::Asset {
                Some(text.as_bytes().to_vec())
            } else {
                None
            }
        });

        let committed = self.store.transaction(|tx| {
            let file_id = crate::store::upsert_file_tx(
                tx,
                &file.path,
                &file.project,
                &file.module,
                file.mtime,
                file.language,
                file.relative_path.as_deref(),
            )?;
            crate::store::clear_types_for_file_tx(tx, file_id)?;

            let types = crate::store::insert_types_tx(tx, file_id, &file.types)?;
            let by_name: AHashMap<String, crate::types::TypeId> = types
                .iter()
                .map(|t| (t.name.clone(), t.id))
                .collect();
            let members = crate::store::insert_members_tx(tx, file_id, &file.members, &by_name)?;

            if let Some(bytes) = &body {
                let compressed = deflate(bytes);
                let hash = content_hash(bytes);
                let trigrams = extract_trigrams(bytes);
                crate::store::upsert_file_content_tx(tx, file_id, &compressed, hash, &trigrams)?;
            }

            Ok(CommittedFile {
                record: FileRecord {
                    id: file_id,
                    path: file.path.clone(),
                    project: file.project.clone(),
                    module: file.module.clone(),
                    language: file.language,
                    mtime: file.mtime,
                    relative_path: file.relative_path.clone(),
                },
                types,
                members,
                body,
                skipped: false,
            })
        })?;

        Ok(committed)
    }

    fn apply_asset(&self, asset: &NewAsset) -> Result<(), String> {
        let record = self.store.upsert_asset(asset).map_err(|e| e.to_string())?;
        if let Ok(mut mem) = self.memory.write() {
            mem.upsert_asset(record);
        }
        Ok(())
    }

    /// Post-batch bookkeeping: flags, derived-structure rebuild, depth
    /// recompute, cache invalidation, bootstrap marker.
    fn finish_batch(&self) {
        let now = crate::store::now_ms();

        if let Err(e) = self
            .store
            .set_flag(meta_keys::DEPTH_COMPUTE_NEEDED, true)
            .and_then(|()| self.store.metadata_set(meta_keys::LAST_BUILD, &now.to_string()))
        {
            tracing::warn!("post-batch metadata update failed: {e}");
        }

        if let Ok(mut mem) = self.memory.write() {
            mem.rebuild_derived();
            mem.note_batch();

            // Depths are flagged by the batch and recomputed here, off
            // the query path, so readers never need a write lock.
            let depths = mem.graph().compute_depths();
            mem.apply_depths(&depths);
            let pairs: Vec<(crate::types::TypeId, u32)> = mem
                .all_type_records()
                .filter_map(|t| t.depth.map(|d| (t.id, d)))
                .collect();
            if let Err(e) = self.store.set_depths(&pairs) {
                tracing::warn!("depth write-back failed: {e}");
            } else if let Err(e) = self.store.set_flag(meta_keys::DEPTH_COMPUTE_NEEDED, false) {
                tracing::warn!("depth flag clear failed: {e}");
            }
        }

        (self.on_commit)();

        if let Err(e) = self.mirror.write_bootstrap_marker(&self.build, now) {
            tracing::debug!("bootstrap marker write failed: {e}");
        }
    }
}

/// DEFLATE-compresses a body for inline storage.
#[must_use]
pub fn deflate(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // Writing to a Vec cannot fail
    let _ = encoder.write_all(bytes);
    encoder.finish().unwrap_or_default()
}

/// Decompresses a stored body.
#[must_use]
pub fn inflate(bytes: &[u8]) -> Option<Vec<u8>> {
    use std::io::Read as _;
    let mut decoder = flate2::read::DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}
