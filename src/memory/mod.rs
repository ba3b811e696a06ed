//! In-memory acceleration layer.
//!
//! A parallel mirror of the persistent store, loaded at service start
//! and kept in lock-step by the ingest path. Lookups served from here
//! are the sub-millisecond path; everything is precomputed: multimaps
//! per key, sorted lowercase name arrays for binary-search prefix
//! scans, trigram postings for fuzzy candidates, and live counters so
//! stats never scan.
//!
//! Mutation happens only on the ingest path. Readers on the
//! cooperative coordinator observe either the pre- or post-commit
//! snapshot per the staleness rule; worker-pool tasks never touch this
//! structure.

mod intern;

pub use intern::Interner;

use crate::error::StoreResult;
use crate::graph::InheritanceGraph;
use crate::store::Store;
use crate::trigram::name_trigrams;
use crate::types::{
    AssetId, AssetRecord, EntityKind, FileId, FileRecord, MemberId, MemberRecord, TypeId,
    TypeRecord,
};
use ahash::AHashMap;
use roaring::RoaringTreemap;
use serde::Serialize;
use std::sync::Arc;

/// Live entity counters, maintained on every add/remove.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemStats {
    pub total_files: u64,
    pub total_types: u64,
    pub total_members: u64,
    pub total_assets: u64,
    pub ingested_batches: u64,
}

#[derive(Default)]
pub struct MemoryIndex {
    files: AHashMap<FileId, FileRecord>,
    types: AHashMap<TypeId, TypeRecord>,
    members: AHashMap<MemberId, MemberRecord>,
    assets: AHashMap<AssetId, AssetRecord>,

    files_by_path: AHashMap<String, FileId>,
    /// Keyed by the mirror-relative form `<project>/<relative_path>`,
    /// which is what the external engine reports hits against.
    files_by_mirror_path: AHashMap<String, FileId>,
    files_by_basename_lower: AHashMap<String, Vec<FileId>>,
    files_by_module: AHashMap<Arc<str>, Vec<FileId>>,
    files_by_project: AHashMap<Arc<str>, Vec<FileId>>,

    types_by_name: AHashMap<String, Vec<TypeId>>,
    types_by_name_lower: AHashMap<String, Vec<TypeId>>,
    types_by_file: AHashMap<FileId, Vec<TypeId>>,
    types_by_parent: AHashMap<String, Vec<TypeId>>,

    members_by_name_lower: AHashMap<String, Vec<MemberId>>,
    members_by_file: AHashMap<FileId, Vec<MemberId>>,
    members_by_type: AHashMap<TypeId, Vec<MemberId>>,

    assets_by_path: AHashMap<String, AssetId>,
    assets_by_name_lower: AHashMap<String, Vec<AssetId>>,
    assets_by_folder: AHashMap<Arc<str>, Vec<AssetId>>,

    type_postings: AHashMap<crate::types::Trigram, RoaringTreemap>,
    member_postings: AHashMap<crate::types::Trigram, RoaringTreemap>,

    sorted_type_names_lower: Vec<String>,
    sorted_member_names_lower: Vec<String>,
    sorted_basenames: Vec<String>,
    sorted_module_names: Vec<String>,
    sorted_asset_names_lower: Vec<String>,

    graph: InheritanceGraph,
    stats: MemStats,
    interner: Interner,
    loaded: bool,
}

fn remove_from_multimap<K: std::hash::Hash + Eq, V: PartialEq>(
    map: &mut AHashMap<K, Vec<V>>,
    key: &K,
    value: &V,
) where
    K: Clone,
{
    if let Some(list) = map.get_mut(key) {
        list.retain(|v| v != value);
        if list.is_empty() {
            map.remove(key);
        }
    }
}

fn basename_lower(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_lowercase()
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-populates from the store, then builds the derived
    /// structures (sorted arrays, inheritance graph).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any bulk load fails.
    pub fn load(store: &Store) -> StoreResult<Self> {
        let mut index = Self::new();
        for file in store.all_files()? {
            index.add_file(file);
        }
        index.add_types(store.all_types()?);
        index.add_members(store.all_members()?);
        for asset in store.all_assets()? {
            index.upsert_asset(asset);
        }
        index.rebuild_derived();
        index.loaded = true;
        Ok(index)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn stats(&self) -> MemStats {
        self.stats
    }

    pub fn note_batch(&mut self) {
        self.stats.ingested_batches += 1;
    }

    #[must_use]
    pub fn graph(&self) -> &InheritanceGraph {
        &self.graph
    }

    // ── write hooks (ingest path only) ──────────────────────────────

    /// Adds or replaces a file row. A pre-existing row at the same
    /// path (stale id from a prior ingest) is removed first, including
    /// its types and members.
    pub fn add_file(&mut self, file: FileRecord) {
        if let Some(&existing) = self.files_by_path.get(&file.path) {
            if existing != file.id {
                self.remove_file(existing);
            } else {
                self.detach_file_maps(existing);
                self.stats.total_files = self.stats.total_files.saturating_sub(1);
            }
        }

        let module_key = self.interner.intern(&file.module);
        let project_key = self.interner.intern(&file.project);

        self.files_by_path.insert(file.path.clone(), file.id);
        self.files_by_mirror_path
            .insert(crate::ingest::Mirror::relative_path_for(&file), file.id);
        self.files_by_basename_lower
            .entry(basename_lower(&file.path))
            .or_default()
            .push(file.id);
        self.files_by_module.entry(module_key).or_default().push(file.id);
        self.files_by_project.entry(project_key).or_default().push(file.id);

        self.files.insert(file.id, file);
        self.stats.total_files += 1;
    }

    fn detach_file_maps(&mut self, id: FileId) {
        if let Some(file) = self.files.remove(&id) {
            self.files_by_path.remove(&file.path);
            self.files_by_mirror_path
                .remove(&crate::ingest::Mirror::relative_path_for(&file));
            remove_from_multimap(
                &mut self.files_by_basename_lower,
                &basename_lower(&file.path),
                &id,
            );
            let module_key = self.interner.intern(&file.module);
            let project_key = self.interner.intern(&file.project);
            remove_from_multimap(&mut self.files_by_module, &module_key, &id);
            remove_from_multimap(&mut self.files_by_project, &project_key, &id);
        }
    }

    /// Removes a file and its dependent types and members.
    pub fn remove_file(&mut self, id: FileId) -> bool {
        if !self.files.contains_key(&id) {
            return false;
        }

        for type_id in self.types_by_file.remove(&id).unwrap_or_default() {
            self.detach_type(type_id);
        }
        for member_id in self.members_by_file.remove(&id).unwrap_or_default() {
            self.detach_member(member_id);
        }
        self.detach_file_maps(id);
        self.stats.total_files = self.stats.total_files.saturating_sub(1);
        true
    }

    /// Removes a file by path, returning its id when present.
    pub fn remove_file_by_path(&mut self, path: &str) -> Option<FileId> {
        let id = self.files_by_path.get(path).copied()?;
        self.remove_file(id);
        Some(id)
    }

    pub fn add_types(&mut self, records: Vec<TypeRecord>) {
        for t in records {
            for trigram in name_trigrams(&t.name) {
                self.type_postings
                    .entry(trigram)
                    .or_default()
                    .insert(t.id.as_i64() as u64);
            }
            self.types_by_name.entry(t.name.clone()).or_default().push(t.id);
            self.types_by_name_lower
                .entry(t.name.to_lowercase())
                .or_default()
                .push(t.id);
            self.types_by_file.entry(t.file_id).or_default().push(t.id);
            if let Some(parent) = &t.parent {
                self.types_by_parent.entry(parent.clone()).or_default().push(t.id);
            }
            self.types.insert(t.id, t);
            self.stats.total_types += 1;
        }
    }

    fn detach_type(&mut self, id: TypeId) {
        let Some(t) = self.types.remove(&id) else {
            return;
        };
        for trigram in name_trigrams(&t.name) {
            if let Some(postings) = self.type_postings.get_mut(&trigram) {
                postings.remove(id.as_i64() as u64);
                if postings.is_empty() {
                    self.type_postings.remove(&trigram);
                }
            }
        }
        remove_from_multimap(&mut self.types_by_name, &t.name, &id);
        remove_from_multimap(&mut self.types_by_name_lower, &t.name.to_lowercase(), &id);
        if let Some(parent) = &t.parent {
            remove_from_multimap(&mut self.types_by_parent, parent, &id);
        }
        self.members_by_type.remove(&id);
        self.stats.total_types = self.stats.total_types.saturating_sub(1);
    }

    pub fn add_members(&mut self, records: Vec<MemberRecord>) {
        for m in records {
            for trigram in name_trigrams(&m.name) {
                self.member_postings
                    .entry(trigram)
                    .or_default()
                    .insert(m.id.as_i64() as u64);
            }
            self.members_by_name_lower
                .entry(m.name.to_lowercase())
                .or_default()
                .push(m.id);
            self.members_by_file.entry(m.file_id).or_default().push(m.id);
            if let Some(type_id) = m.type_id {
                self.members_by_type.entry(type_id).or_default().push(m.id);
            }
            self.members.insert(m.id, m);
            self.stats.total_members += 1;
        }
    }

    fn detach_member(&mut self, id: MemberId) {
        let Some(m) = self.members.remove(&id) else {
            return;
        };
        for trigram in name_trigrams(&m.name) {
            if let Some(postings) = self.member_postings.get_mut(&trigram) {
                postings.remove(id.as_i64() as u64);
                if postings.is_empty() {
                    self.member_postings.remove(&trigram);
                }
            }
        }
        remove_from_multimap(&mut self.members_by_name_lower, &m.name.to_lowercase(), &id);
        if let Some(type_id) = m.type_id {
            remove_from_multimap(&mut self.members_by_type, &type_id, &id);
        }
        self.stats.total_members = self.stats.total_members.saturating_sub(1);
    }

    pub fn upsert_asset(&mut self, asset: AssetRecord) {
        if let Some(&existing) = self.assets_by_path.get(&asset.path) {
            if existing != asset.id {
                self.remove_asset_id(existing);
            } else {
                self.detach_asset_maps(existing);
                self.stats.total_assets = self.stats.total_assets.saturating_sub(1);
            }
        }

        let folder_key = self.interner.intern(&asset.folder);
        self.assets_by_path.insert(asset.path.clone(), asset.id);
        self.assets_by_name_lower
            .entry(asset.name.to_lowercase())
            .or_default()
            .push(asset.id);
        self.assets_by_folder.entry(folder_key).or_default().push(asset.id);
        self.assets.insert(asset.id, asset);
        self.stats.total_assets += 1;
    }

    fn detach_asset_maps(&mut self, id: AssetId) {
        if let Some(asset) = self.assets.remove(&id) {
            self.assets_by_path.remove(&asset.path);
            remove_from_multimap(
                &mut self.assets_by_name_lower,
                &asset.name.to_lowercase(),
                &id,
            );
            let folder_key = self.interner.intern(&asset.folder);
            remove_from_multimap(&mut self.assets_by_folder, &folder_key, &id);
        }
    }

    fn remove_asset_id(&mut self, id: AssetId) {
        self.detach_asset_maps(id);
        self.stats.total_assets = self.stats.total_assets.saturating_sub(1);
    }

    pub fn remove_asset_by_path(&mut self, path: &str) -> bool {
        let Some(&id) = self.assets_by_path.get(path) else {
            return false;
        };
        self.remove_asset_id(id);
        true
    }

    /// Rebuilds the inheritance graph and re-sorts the prefix arrays
    /// from current contents. Called once per ingest batch.
    pub fn rebuild_derived(&mut self) {
        self.graph = InheritanceGraph::build(self.types.values(), self.assets.values());

        self.sorted_type_names_lower = Self::sorted_keys(&self.types_by_name_lower);
        self.sorted_member_names_lower = Self::sorted_keys(&self.members_by_name_lower);
        self.sorted_basenames = Self::sorted_keys(&self.files_by_basename_lower);
        self.sorted_asset_names_lower = Self::sorted_keys(&self.assets_by_name_lower);
        self.sorted_module_names = {
            let mut v: Vec<String> = self
                .files_by_module
                .keys()
                .filter(|k| !k.is_empty())
                .map(|k| k.to_string())
                .collect();
            v.sort_unstable();
            v
        };
    }

    /// Applies computed inheritance depths to type records by name.
    pub fn apply_depths(&mut self, depths: &AHashMap<String, u32>) {
        for t in self.types.values_mut() {
            t.depth = depths
                .get(&t.name)
                .or_else(|| depths.get(crate::fuzzy::prefix::stripped_or_self(&t.name)))
                .copied();
        }
    }

    fn sorted_keys<K: Ord + Clone + std::hash::Hash, V>(map: &AHashMap<K, V>) -> Vec<K> {
        let mut keys: Vec<K> = map.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    // ── reads ───────────────────────────────────────────────────────

    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    #[must_use]
    pub fn file_by_path(&self, path: &str) -> Option<&FileRecord> {
        self.files_by_path.get(path).and_then(|id| self.files.get(id))
    }

    /// Looks up a file by its mirror-relative path, the form engine
    /// hits are reported against.
    #[must_use]
    pub fn file_by_mirror_path(&self, mirror_path: &str) -> Option<&FileRecord> {
        self.files_by_mirror_path
            .get(mirror_path)
            .and_then(|id| self.files.get(id))
    }

    #[must_use]
    pub fn type_record(&self, id: TypeId) -> Option<&TypeRecord> {
        self.types.get(&id)
    }

    #[must_use]
    pub fn member_record(&self, id: MemberId) -> Option<&MemberRecord> {
        self.members.get(&id)
    }

    #[must_use]
    pub fn asset_record(&self, id: AssetId) -> Option<&AssetRecord> {
        self.assets.get(&id)
    }

    #[must_use]
    pub fn types_named(&self, name: &str) -> &[TypeId] {
        self.types_by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn types_named_lower(&self, name_lower: &str) -> &[TypeId] {
        self.types_by_name_lower
            .get(name_lower)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn members_named_lower(&self, name_lower: &str) -> &[MemberId] {
        self.members_by_name_lower
            .get(name_lower)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn assets_named_lower(&self, name_lower: &str) -> &[AssetId] {
        self.assets_by_name_lower
            .get(name_lower)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn files_with_basename_lower(&self, basename: &str) -> &[FileId] {
        self.files_by_basename_lower
            .get(basename)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn types_in_file(&self, id: FileId) -> &[TypeId] {
        self.types_by_file.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn members_in_file(&self, id: FileId) -> &[MemberId] {
        self.members_by_file.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn members_of_type(&self, id: TypeId) -> &[MemberId] {
        self.members_by_type.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn types_with_parent(&self, parent: &str) -> &[TypeId] {
        self.types_by_parent
            .get(parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn assets_in_folder(&self, folder: &str) -> &[AssetId] {
        self.assets_by_folder
            .get(folder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn files_in_module(&self, module: &str) -> &[FileId] {
        self.files_by_module
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn module_names(&self) -> &[String] {
        &self.sorted_module_names
    }

    #[must_use]
    pub fn asset_folders(&self) -> Vec<(&str, usize)> {
        let mut folders: Vec<(&str, usize)> = self
            .assets_by_folder
            .iter()
            .map(|(k, v)| (&**k, v.len()))
            .collect();
        folders.sort_unstable_by(|a, b| a.0.cmp(b.0));
        folders
    }

    #[must_use]
    pub fn postings(
        &self,
        entity: EntityKind,
        trigram: crate::types::Trigram,
    ) -> Option<&RoaringTreemap> {
        match entity {
            EntityKind::Type => self.type_postings.get(&trigram),
            EntityKind::Member => self.member_postings.get(&trigram),
        }
    }

    #[must_use]
    pub fn sorted_names(&self, entity: SortedNames) -> &[String] {
        match entity {
            SortedNames::TypesLower => &self.sorted_type_names_lower,
            SortedNames::MembersLower => &self.sorted_member_names_lower,
            SortedNames::Basenames => &self.sorted_basenames,
            SortedNames::Modules => &self.sorted_module_names,
            SortedNames::AssetsLower => &self.sorted_asset_names_lower,
        }
    }

    /// Binary-search prefix scan over one of the sorted name arrays.
    ///
    /// Lower-bounds via `partition_point`, then extends linearly while
    /// entries keep the prefix. Results are lexicographically ordered.
    #[must_use]
    pub fn prefix_scan(&self, entity: SortedNames, prefix: &str, limit: usize) -> Vec<&str> {
        let sorted = self.sorted_names(entity);
        let start = sorted.partition_point(|name| name.as_str() < prefix);
        sorted[start..]
            .iter()
            .take_while(|name| name.starts_with(prefix))
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    /// Linear substring scan, the fallback for sub-trigram queries.
    #[must_use]
    pub fn substring_scan(&self, entity: SortedNames, needle: &str, limit: usize) -> Vec<&str> {
        self.sorted_names(entity)
            .iter()
            .filter(|name| name.contains(needle))
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    #[must_use]
    pub fn all_type_records(&self) -> impl Iterator<Item = &TypeRecord> {
        self.types.values()
    }

    #[must_use]
    pub fn all_asset_records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.values()
    }

    #[must_use]
    pub fn project_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files_by_project.keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn project_file_count(&self, project: &str) -> usize {
        self.files_by_project
            .get(project)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Selector for the sorted prefix arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortedNames {
    TypesLower,
    MembersLower,
    Basenames,
    Modules,
    AssetsLower,
}
