//! Fuzzy matcher and ranker over the in-memory index.
//!
//! Three lookup modes for types, members, files, and assets:
//!
//! - **exact**: equal-name lookup with UE prefix-variant fallback;
//! - **fuzzy**: bounded candidate gathering (prefix scan, prefix-variant
//!   scan, trigram intersection, substring fallback) followed by
//!   relation scoring;
//! - **browse**: handled by the query façade directly against the
//!   index's multimaps.
//!
//! Candidate gathering is bounded so a two-letter query against a
//! million-type index stays cheap.

pub mod prefix;
pub mod score;

use crate::memory::{MemoryIndex, SortedNames};
use crate::trigram::name_trigrams;
use crate::types::{
    AssetId, EntityKind, FileId, Language, MemberId, MemberKind, TypeId, TypeKind,
};
use ahash::{AHashMap, AHashSet};
use prefix::{exact_variants, strip_class_suffix, stripped_or_self, UE_PREFIXES};
use score::{
    depth_bonus, kind_weight, relate, specifier_boost, Relation, MEMBER_SCORE_FLOOR,
    TYPE_SCORE_FLOOR,
};

/// Upper bound on gathered candidates per query.
pub const MAX_CANDIDATES: usize = 200;

/// Root of the component hierarchy for synthetic accessor methods.
const COMPONENT_ROOT: &str = "UActorComponent";

/// Synthetic methods available on every component subclass.
const SYNTHETIC_COMPONENT_METHODS: [&str; 2] = ["Get", "GetOrCreate"];

const TRIGRAM_ONLY: Relation = Relation {
    score: 0.30,
    reason: "trigram",
};

/// Filters applied to type lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFilter<'a> {
    pub project: Option<&'a str>,
    pub language: Option<Language>,
    pub kind: Option<TypeKind>,
}

/// Filters applied to member lookups.
#[derive(Debug, Clone, Default)]
pub struct MemberFilter<'a> {
    pub project: Option<&'a str>,
    pub language: Option<Language>,
    pub member_kind: Option<MemberKind>,
    pub containing_type: Option<&'a str>,
    /// Widen `containing_type` to the type plus its ancestors, so
    /// inherited members are found.
    pub include_hierarchy: bool,
}

/// A scored type hit.
#[derive(Debug, Clone)]
pub struct TypeMatch {
    pub id: TypeId,
    pub score: f64,
    pub reason: &'static str,
}

/// A scored member hit; synthetic hits have no stored row.
#[derive(Debug, Clone)]
pub enum MemberMatch {
    Stored {
        id: MemberId,
        score: f64,
        reason: &'static str,
    },
    Synthetic {
        name: &'static str,
        containing_type: String,
        score: f64,
        reason: &'static str,
    },
}

impl MemberMatch {
    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Stored { score, .. } | Self::Synthetic { score, .. } => *score,
        }
    }
}

/// A scored file hit.
#[derive(Debug, Clone)]
pub struct FileMatch {
    pub id: FileId,
    pub score: f64,
    pub reason: &'static str,
}

/// A scored asset hit.
#[derive(Debug, Clone)]
pub struct AssetMatch {
    pub id: AssetId,
    pub score: f64,
    pub reason: &'static str,
}

fn is_header_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".h") || lower.ends_with(".hpp") || lower.ends_with(".hxx")
}

fn type_passes(index: &MemoryIndex, id: TypeId, filter: &TypeFilter<'_>) -> bool {
    let Some(record) = index.type_record(id) else {
        return false;
    };
    if let Some(kind) = filter.kind {
        if record.kind != kind {
            return false;
        }
    }
    if filter.project.is_none() && filter.language.is_none() {
        return true;
    }
    let Some(file) = index.file(record.file_id) else {
        return false;
    };
    if let Some(project) = filter.project {
        if file.project != project {
            return false;
        }
    }
    if let Some(language) = filter.language {
        if file.language != language {
            return false;
        }
    }
    true
}

// ── types ───────────────────────────────────────────────────────────

/// Equal-name type lookup with prefix-variant and `_C` fallback.
///
/// Header files sort ahead of implementation files among equal names.
#[must_use]
pub fn find_types_exact(
    index: &MemoryIndex,
    query: &str,
    filter: &TypeFilter<'_>,
    max_results: usize,
) -> Vec<TypeMatch> {
    let collect = |name_lower: &str, reason: &'static str| -> Vec<TypeMatch> {
        index
            .types_named_lower(name_lower)
            .iter()
            .filter(|&&id| type_passes(index, id, filter))
            .map(|&id| {
                let score = index
                    .type_record(id)
                    .and_then(|r| relate(query, &r.name))
                    .map_or(0.95, |r| r.score);
                TypeMatch { id, score, reason }
            })
            .collect()
    };

    let mut hits = collect(&query.to_lowercase(), "exact");

    if hits.is_empty() {
        for variant in exact_variants(query) {
            hits = collect(&variant.to_lowercase(), "prefix-variant");
            if !hits.is_empty() {
                break;
            }
        }
    }

    if hits.is_empty() {
        if let Some(trimmed) = strip_class_suffix(query) {
            hits = find_types_exact(index, trimmed, filter, max_results);
        }
    }

    sort_type_matches(index, &mut hits);
    hits.truncate(max_results);
    hits
}

/// Three-phase fuzzy type search.
#[must_use]
pub fn find_types_fuzzy(
    index: &MemoryIndex,
    query: &str,
    filter: &TypeFilter<'_>,
    max_results: usize,
) -> Vec<TypeMatch> {
    let query_lower = query.to_lowercase();
    let mut ordered: Vec<TypeId> = Vec::new();
    let mut seen: AHashSet<TypeId> = AHashSet::new();

    let push_named = |ordered: &mut Vec<TypeId>, seen: &mut AHashSet<TypeId>, name: &str| {
        for &id in index.types_named_lower(name) {
            if seen.insert(id) && ordered.len() < MAX_CANDIDATES {
                ordered.push(id);
            }
        }
    };

    // Phase 1: prefix scan.
    for name in index.prefix_scan(SortedNames::TypesLower, &query_lower, MAX_CANDIDATES) {
        push_named(&mut ordered, &mut seen, name);
    }

    // Phase 2: prefix-variant scan, skipped once prefix phases saturate.
    if ordered.len() < max_results {
        let base = stripped_or_self(query).to_lowercase();
        for p in UE_PREFIXES {
            let variant = format!("{}{base}", p.to_ascii_lowercase());
            if variant == query_lower {
                continue;
            }
            for name in index.prefix_scan(SortedNames::TypesLower, &variant, MAX_CANDIDATES) {
                push_named(&mut ordered, &mut seen, name);
            }
        }
    }

    // Phase 3: trigram intersection; phase 4: substring fallback for
    // queries too short to carry trigrams.
    if query_lower.len() >= 3 {
        if ordered.len() < MAX_CANDIDATES {
            for (id, _) in trigram_candidates(index, EntityKind::Type, &query_lower) {
                let id = TypeId::new(id);
                if seen.insert(id) && ordered.len() < MAX_CANDIDATES {
                    ordered.push(id);
                }
            }
        }
    } else {
        for name in index.substring_scan(SortedNames::TypesLower, &query_lower, MAX_CANDIDATES) {
            push_named(&mut ordered, &mut seen, name);
        }
    }

    let mut hits: Vec<TypeMatch> = ordered
        .into_iter()
        .filter(|&id| type_passes(index, id, filter))
        .filter_map(|id| {
            let record = index.type_record(id)?;
            let rel = relate(query, &record.name).unwrap_or(TRIGRAM_ONLY);
            if rel.score < TYPE_SCORE_FLOOR {
                return None;
            }
            let score = rel.score + kind_weight(record.kind) + depth_bonus(record.depth);
            Some(TypeMatch {
                id,
                score,
                reason: rel.reason,
            })
        })
        .collect();

    hits = dedup_types(index, hits);
    sort_type_matches(index, &mut hits);
    hits.truncate(max_results);
    hits
}

/// Aggregates posting matches per candidate and applies the
/// length-dependent minimum-match threshold.
fn trigram_candidates(
    index: &MemoryIndex,
    entity: EntityKind,
    query_lower: &str,
) -> Vec<(i64, usize)> {
    let trigrams = name_trigrams(query_lower);
    if trigrams.is_empty() {
        return Vec::new();
    }
    let min = min_trigram_matches(trigrams.len());

    let mut counts: AHashMap<u64, usize> = AHashMap::new();
    for t in &trigrams {
        if let Some(postings) = index.postings(entity, *t) {
            for id in postings.iter() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }

    let mut candidates: Vec<(i64, usize)> = counts
        .into_iter()
        .filter(|&(_, count)| count >= min)
        .map(|(id, count)| (id as i64, count))
        .collect();
    candidates.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Short queries need an absolute minimum of shared trigrams; longer
/// ones need three quarters of the query's set.
fn min_trigram_matches(n: usize) -> usize {
    match n {
        0 => 0,
        1..=3 => n.min(2),
        4..=6 => 3,
        _ => n * 3 / 4 + usize::from(n * 3 % 4 != 0),
    }
}

/// Collapses entries sharing `(name, kind)`, preferring the one with a
/// non-null parent and a header-file path.
fn dedup_types(index: &MemoryIndex, hits: Vec<TypeMatch>) -> Vec<TypeMatch> {
    let mut best: AHashMap<(String, TypeKind), TypeMatch> = AHashMap::new();

    let preference = |m: &TypeMatch| -> (bool, bool, f64) {
        let record = index.type_record(m.id);
        let has_parent = record.is_some_and(|r| r.parent.is_some());
        let header = record
            .and_then(|r| index.file(r.file_id))
            .is_some_and(|f| is_header_path(&f.path));
        (has_parent, header, m.score)
    };

    for hit in hits {
        let Some(record) = index.type_record(hit.id) else {
            continue;
        };
        let key = (record.name.clone(), record.kind);
        match best.get(&key) {
            Some(existing) if preference(existing) >= preference(&hit) => {}
            _ => {
                best.insert(key, hit);
            }
        }
    }

    best.into_values().collect()
}

fn sort_type_matches(index: &MemoryIndex, hits: &mut [TypeMatch]) {
    hits.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let header = |m: &TypeMatch| {
                    index
                        .type_record(m.id)
                        .and_then(|r| index.file(r.file_id))
                        .is_some_and(|f| is_header_path(&f.path))
                };
                header(b).cmp(&header(a))
            })
            .then_with(|| {
                let name = |m: &TypeMatch| {
                    index.type_record(m.id).map(|r| r.name.clone()).unwrap_or_default()
                };
                name(a).cmp(&name(b))
            })
    });
}

// ── members ─────────────────────────────────────────────────────────

/// Resolves the containing-type filter to a set of allowed type ids,
/// or `None` when no filter applies.
fn allowed_type_ids(index: &MemoryIndex, filter: &MemberFilter<'_>) -> Option<AHashSet<TypeId>> {
    let containing = filter.containing_type?;
    let mut names: Vec<String> = vec![containing.to_string()];
    if filter.include_hierarchy {
        names.extend(index.graph().ancestors(containing));
    }

    let mut allowed = AHashSet::new();
    for name in &names {
        for &id in index.types_named_lower(&name.to_lowercase()) {
            allowed.insert(id);
        }
        // Asset parents are stored un-prefixed; admit both forms.
        let stripped = stripped_or_self(name);
        if stripped != name {
            for &id in index.types_named_lower(&stripped.to_lowercase()) {
                allowed.insert(id);
            }
        }
    }
    Some(allowed)
}

fn member_passes(
    index: &MemoryIndex,
    id: MemberId,
    filter: &MemberFilter<'_>,
    allowed: Option<&AHashSet<TypeId>>,
) -> bool {
    let Some(record) = index.member_record(id) else {
        return false;
    };
    if let Some(kind) = filter.member_kind {
        if record.member_kind != kind {
            return false;
        }
    }
    if let Some(allowed) = allowed {
        match record.type_id {
            Some(type_id) if allowed.contains(&type_id) => {}
            _ => return false,
        }
    }
    if filter.project.is_none() && filter.language.is_none() {
        return true;
    }
    let Some(file) = index.file(record.file_id) else {
        return false;
    };
    if let Some(project) = filter.project {
        if file.project != project {
            return false;
        }
    }
    if let Some(language) = filter.language {
        if file.language != language {
            return false;
        }
    }
    true
}

/// Appends synthetic `Get` / `GetOrCreate` hits when the containing
/// type is a component subclass and the query matches.
fn synthetic_component_hits(
    index: &MemoryIndex,
    query: &str,
    filter: &MemberFilter<'_>,
    hits: &mut Vec<MemberMatch>,
) {
    let Some(containing) = filter.containing_type else {
        return;
    };
    if !index.graph().inherits_from(containing, COMPONENT_ROOT)
        && containing != COMPONENT_ROOT
        && stripped_or_self(containing) != stripped_or_self(COMPONENT_ROOT)
    {
        return;
    }

    let query_lower = query.to_lowercase();
    for name in SYNTHETIC_COMPONENT_METHODS {
        let name_lower = name.to_lowercase();
        let score = if name_lower == query_lower {
            1.0
        } else if name_lower.starts_with(&query_lower) {
            0.95
        } else {
            continue;
        };
        hits.push(MemberMatch::Synthetic {
            name,
            containing_type: containing.to_string(),
            score,
            reason: "synthetic-component",
        });
    }
}

/// Equal-name member lookup.
#[must_use]
pub fn find_members_exact(
    index: &MemoryIndex,
    query: &str,
    filter: &MemberFilter<'_>,
    max_results: usize,
) -> Vec<MemberMatch> {
    let allowed = allowed_type_ids(index, filter);
    let mut hits: Vec<MemberMatch> = index
        .members_named_lower(&query.to_lowercase())
        .iter()
        .filter(|&&id| member_passes(index, id, filter, allowed.as_ref()))
        .map(|&id| {
            let record = index.member_record(id);
            let boost = record
                .map(|r| specifier_boost(r.specifiers.as_deref(), r.is_static))
                .unwrap_or(0.0);
            MemberMatch::Stored {
                id,
                score: 1.0 + boost,
                reason: "exact",
            }
        })
        .collect();

    synthetic_component_hits(index, query, filter, &mut hits);
    sort_member_matches(index, &mut hits);
    hits.truncate(max_results);
    hits
}

/// Three-phase fuzzy member search. Members admit noisier matches than
/// types (lower score floor).
#[must_use]
pub fn find_members_fuzzy(
    index: &MemoryIndex,
    query: &str,
    filter: &MemberFilter<'_>,
    max_results: usize,
) -> Vec<MemberMatch> {
    let query_lower = query.to_lowercase();
    let allowed = allowed_type_ids(index, filter);
    let mut ordered: Vec<MemberId> = Vec::new();
    let mut seen: AHashSet<MemberId> = AHashSet::new();

    let push_named = |ordered: &mut Vec<MemberId>, seen: &mut AHashSet<MemberId>, name: &str| {
        for &id in index.members_named_lower(name) {
            if seen.insert(id) && ordered.len() < MAX_CANDIDATES {
                ordered.push(id);
            }
        }
    };

    for name in index.prefix_scan(SortedNames::MembersLower, &query_lower, MAX_CANDIDATES) {
        push_named(&mut ordered, &mut seen, name);
    }

    if query_lower.len() >= 3 {
        if ordered.len() < MAX_CANDIDATES {
            for (id, _) in trigram_candidates(index, EntityKind::Member, &query_lower) {
                let id = MemberId::new(id);
                if seen.insert(id) && ordered.len() < MAX_CANDIDATES {
                    ordered.push(id);
                }
            }
        }
    } else {
        for name in index.substring_scan(SortedNames::MembersLower, &query_lower, MAX_CANDIDATES) {
            push_named(&mut ordered, &mut seen, name);
        }
    }

    let mut hits: Vec<MemberMatch> = ordered
        .into_iter()
        .filter(|&id| member_passes(index, id, filter, allowed.as_ref()))
        .filter_map(|id| {
            let record = index.member_record(id)?;
            let rel = relate(query, &record.name).unwrap_or(TRIGRAM_ONLY);
            if rel.score < MEMBER_SCORE_FLOOR {
                return None;
            }
            let score = rel.score + specifier_boost(record.specifiers.as_deref(), record.is_static);
            Some(MemberMatch::Stored {
                id,
                score,
                reason: rel.reason,
            })
        })
        .collect();

    synthetic_component_hits(index, query, filter, &mut hits);
    sort_member_matches(index, &mut hits);
    hits.truncate(max_results);
    hits
}

fn sort_member_matches(index: &MemoryIndex, hits: &mut [MemberMatch]) {
    hits.sort_unstable_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let name = |m: &MemberMatch| match m {
                    MemberMatch::Stored { id, .. } => index
                        .member_record(*id)
                        .map(|r| r.name.clone())
                        .unwrap_or_default(),
                    MemberMatch::Synthetic { name, .. } => (*name).to_string(),
                };
                name(a).cmp(&name(b))
            })
    });
}

// ── files ───────────────────────────────────────────────────────────

/// File search by basename. `fuzzy` adds prefix and substring phases.
#[must_use]
pub fn find_files(
    index: &MemoryIndex,
    query: &str,
    project: Option<&str>,
    language: Option<Language>,
    fuzzy: bool,
    max_results: usize,
) -> Vec<FileMatch> {
    let query_lower = query.to_lowercase();
    let mut ordered: Vec<(FileId, &'static str)> = Vec::new();
    let mut seen: AHashSet<FileId> = AHashSet::new();

    for &id in index.files_with_basename_lower(&query_lower) {
        if seen.insert(id) {
            ordered.push((id, "exact"));
        }
    }

    if fuzzy || ordered.is_empty() {
        for name in index.prefix_scan(SortedNames::Basenames, &query_lower, MAX_CANDIDATES) {
            for &id in index.files_with_basename_lower(name) {
                if seen.insert(id) {
                    ordered.push((id, "prefix"));
                }
            }
        }
    }
    if fuzzy && ordered.len() < max_results {
        for name in index.substring_scan(SortedNames::Basenames, &query_lower, MAX_CANDIDATES) {
            for &id in index.files_with_basename_lower(name) {
                if seen.insert(id) {
                    ordered.push((id, "substring"));
                }
            }
        }
    }

    let mut hits: Vec<FileMatch> = ordered
        .into_iter()
        .filter(|(id, _)| {
            let Some(file) = index.file(*id) else {
                return false;
            };
            if file.language == Language::Asset {
                return false;
            }
            if let Some(p) = project {
                if file.project != p {
                    return false;
                }
            }
            if let Some(l) = language {
                if file.language != l {
                    return false;
                }
            }
            true
        })
        .map(|(id, reason)| {
            let score = match reason {
                "exact" => 1.0,
                "prefix" => 0.95,
                _ => 0.85,
            };
            FileMatch { id, score, reason }
        })
        .collect();

    hits.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let path = |m: &FileMatch| {
                    index.file(m.id).map(|f| f.path.clone()).unwrap_or_default()
                };
                path(a).cmp(&path(b))
            })
    });
    hits.truncate(max_results);
    hits
}

// ── assets ──────────────────────────────────────────────────────────

fn asset_passes(
    index: &MemoryIndex,
    id: AssetId,
    project: Option<&str>,
    folder: Option<&str>,
) -> bool {
    let Some(asset) = index.asset_record(id) else {
        return false;
    };
    if let Some(p) = project {
        if asset.project != p {
            return false;
        }
    }
    if let Some(f) = folder {
        if !asset.folder.starts_with(f) {
            return false;
        }
    }
    true
}

/// Equal-name asset lookup with `_C` suffix fallback.
#[must_use]
pub fn find_assets_exact(
    index: &MemoryIndex,
    query: &str,
    project: Option<&str>,
    folder: Option<&str>,
    max_results: usize,
) -> Vec<AssetMatch> {
    let mut hits: Vec<AssetMatch> = index
        .assets_named_lower(&query.to_lowercase())
        .iter()
        .filter(|&&id| asset_passes(index, id, project, folder))
        .map(|&id| AssetMatch {
            id,
            score: 1.0,
            reason: "exact",
        })
        .collect();

    if hits.is_empty() {
        if let Some(trimmed) = strip_class_suffix(query) {
            return find_assets_exact(index, trimmed, project, folder, max_results);
        }
    }

    hits.truncate(max_results);
    hits
}

/// Fuzzy asset search: prefix scan plus substring, no trigram phase
/// (assets carry no name postings).
#[must_use]
pub fn find_assets_fuzzy(
    index: &MemoryIndex,
    query: &str,
    project: Option<&str>,
    folder: Option<&str>,
    max_results: usize,
) -> Vec<AssetMatch> {
    let query_lower = query.to_lowercase();
    let mut ordered: Vec<(AssetId, &'static str)> = Vec::new();
    let mut seen: AHashSet<AssetId> = AHashSet::new();

    for &id in index.assets_named_lower(&query_lower) {
        if seen.insert(id) {
            ordered.push((id, "exact"));
        }
    }
    for name in index.prefix_scan(SortedNames::AssetsLower, &query_lower, MAX_CANDIDATES) {
        for &id in index.assets_named_lower(name) {
            if seen.insert(id) {
                ordered.push((id, "prefix"));
            }
        }
    }
    for name in index.substring_scan(SortedNames::AssetsLower, &query_lower, MAX_CANDIDATES) {
        for &id in index.assets_named_lower(name) {
            if seen.insert(id) {
                ordered.push((id, "substring"));
            }
        }
    }

    let mut hits: Vec<AssetMatch> = ordered
        .into_iter()
        .filter(|(id, _)| asset_passes(index, *id, project, folder))
        .map(|(id, reason)| {
            let score = match reason {
                "exact" => 1.0,
                "prefix" => 0.95,
                _ => 0.85,
            };
            AssetMatch { id, score, reason }
        })
        .collect();

    hits.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let name = |m: &AssetMatch| {
                    index
                        .asset_record(m.id)
                        .map(|r| r.name.clone())
                        .unwrap_or_default()
                };
                name(a).cmp(&name(b))
            })
    });
    hits.truncate(max_results);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIndex;
    use crate::types::{
        AssetRecord, FileRecord, MemberRecord, NewAsset, TypeRecord,
    };

    fn file(id: i64, path: &str, language: Language) -> FileRecord {
        FileRecord {
            id: FileId::new(id),
            path: path.into(),
            project: "Game".into(),
            module: "Game.Source".into(),
            language,
            mtime: 1,
            relative_path: None,
        }
    }

    fn type_rec(id: i64, file_id: i64, name: &str, parent: Option<&str>) -> TypeRecord {
        TypeRecord {
            id: TypeId::new(id),
            file_id: FileId::new(file_id),
            name: name.into(),
            kind: TypeKind::Class,
            parent: parent.map(Into::into),
            line: 1,
            depth: None,
        }
    }

    fn member_rec(id: i64, file_id: i64, type_id: Option<i64>, name: &str) -> MemberRecord {
        MemberRecord {
            id: MemberId::new(id),
            file_id: FileId::new(file_id),
            type_id: type_id.map(TypeId::new),
            name: name.into(),
            member_kind: MemberKind::Function,
            line: 1,
            is_static: false,
            specifiers: None,
        }
    }

    fn actor_corpus() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Actor.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "Actor", None),
            type_rec(2, 1, "AActor", None),
            type_rec(3, 1, "UActor", None),
        ]);
        index.rebuild_derived();
        index
    }

    #[test]
    fn test_fuzzy_actor_ordering() {
        let index = actor_corpus();
        let hits = find_types_fuzzy(&index, "AActor", &TypeFilter::default(), 10);
        let names: Vec<&str> = hits
            .iter()
            .map(|h| index.type_record(h.id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["AActor", "Actor", "UActor"]);
        assert_eq!(hits[0].reason, "exact");
        assert_eq!(hits[1].reason, "exact-stripped");
        assert_eq!(hits[2].reason, "prefix-stripped");
    }

    #[test]
    fn test_exact_prefix_variant() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/GameMode.h", Language::Cpp));
        index.add_types(vec![type_rec(1, 1, "AEmbarkGameMode", Some("AGameModeBase"))]);
        index.rebuild_derived();

        let hits = find_types_exact(&index, "EmbarkGameMode", &TypeFilter::default(), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].reason, "prefix-variant");
        assert_eq!(
            index.type_record(hits[0].id).unwrap().name,
            "AEmbarkGameMode"
        );
    }

    #[test]
    fn test_exact_class_suffix_fallback() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Hero.h", Language::Cpp));
        index.add_types(vec![type_rec(1, 1, "BP_Hero", None)]);
        index.rebuild_derived();

        let hits = find_types_exact(&index, "BP_Hero_C", &TypeFilter::default(), 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_exact_header_sorts_first() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Hero.cpp", Language::Cpp));
        index.add_file(file(2, "/g/Hero.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "AHero", None),
            type_rec(2, 2, "AHero", Some("AActor")),
        ]);
        index.rebuild_derived();

        let hits = find_types_exact(&index, "AHero", &TypeFilter::default(), 10);
        let first_path = index
            .file(index.type_record(hits[0].id).unwrap().file_id)
            .unwrap()
            .path
            .clone();
        assert!(first_path.ends_with(".h"));
    }

    #[test]
    fn test_short_query_uses_substring_not_trigrams() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/IO.h", Language::Cpp));
        index.add_types(vec![type_rec(1, 1, "FArchiveIO", None)]);
        index.rebuild_derived();

        // Two characters: trigram phase cannot run; substring finds it
        let hits = find_types_fuzzy(&index, "io", &TypeFilter::default(), 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_fuzzy_score_floor_filters_noise() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/X.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "UHealthComponent", None),
            // Shares trigrams ("eal", "alt", "lth") but relation score
            // is trigram-only 0.30, below the 0.40 type floor.
            type_rec(2, 1, "FStealthData", None),
        ]);
        index.rebuild_derived();

        let hits = find_types_fuzzy(&index, "Health", &TypeFilter::default(), 10);
        let names: Vec<&str> = hits
            .iter()
            .map(|h| index.type_record(h.id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["UHealthComponent"]);
    }

    #[test]
    fn test_dedup_prefers_parented_header_entry() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Hero.cpp", Language::Cpp));
        index.add_file(file(2, "/g/Hero.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "AHero", None),
            type_rec(2, 2, "AHero", Some("AActor")),
        ]);
        index.rebuild_derived();

        let hits = find_types_fuzzy(&index, "AHero", &TypeFilter::default(), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, TypeId::new(2));
    }

    #[test]
    fn test_member_hierarchy_filter() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Char.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "ACharacter", Some("APawn")),
            type_rec(2, 1, "APawn", None),
        ]);
        index.add_members(vec![
            member_rec(1, 1, Some(2), "AddMovementInput"),
            member_rec(2, 1, Some(1), "Jump"),
        ]);
        index.rebuild_derived();

        // Without hierarchy: inherited member not found
        let filter = MemberFilter {
            containing_type: Some("ACharacter"),
            include_hierarchy: false,
            ..Default::default()
        };
        let hits = find_members_exact(&index, "AddMovementInput", &filter, 10);
        assert!(hits.is_empty());

        // With hierarchy: found on the ancestor
        let filter = MemberFilter {
            containing_type: Some("ACharacter"),
            include_hierarchy: true,
            ..Default::default()
        };
        let hits = find_members_exact(&index, "AddMovementInput", &filter, 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_synthetic_component_methods() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Comp.h", Language::Cpp));
        index.add_types(vec![
            type_rec(1, 1, "UActorComponent", None),
            type_rec(2, 1, "UHealthComponent", Some("UActorComponent")),
        ]);
        index.rebuild_derived();

        let filter = MemberFilter {
            containing_type: Some("UHealthComponent"),
            ..Default::default()
        };
        let hits = find_members_exact(&index, "Get", &filter, 10);
        assert!(matches!(
            hits.first(),
            Some(MemberMatch::Synthetic {
                name: "Get",
                reason: "synthetic-component",
                ..
            })
        ));

        // Prefix match brings in both synthetics
        let hits = find_members_fuzzy(&index, "Get", &filter, 10);
        let synthetic_count = hits
            .iter()
            .filter(|h| matches!(h, MemberMatch::Synthetic { .. }))
            .count();
        assert_eq!(synthetic_count, 2);

        // The component root itself also carries the synthetics
        let filter = MemberFilter {
            containing_type: Some("UActorComponent"),
            ..Default::default()
        };
        let hits = find_members_exact(&index, "Get", &filter, 10);
        assert_eq!(hits.len(), 1);

        // A type outside the component hierarchy gets none
        let filter = MemberFilter {
            containing_type: Some("AActor"),
            ..Default::default()
        };
        let hits = find_members_exact(&index, "Get", &filter, 10);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_find_files_excludes_synthetic_asset_files() {
        let mut index = MemoryIndex::new();
        index.add_file(file(1, "/g/Hero.h", Language::Cpp));
        index.add_file(file(2, "/g/_assets/Hero.uasset.txt", Language::Asset));
        index.rebuild_derived();

        let hits = find_files(&index, "hero.h", None, None, true, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, FileId::new(1));
    }

    #[test]
    fn test_find_assets() {
        let mut index = MemoryIndex::new();
        let base = NewAsset {
            path: String::new(),
            name: String::new(),
            content_path: String::new(),
            folder: "/Game/Blueprints".into(),
            project: "Game".into(),
            extension: "uasset".into(),
            mtime: 0,
            asset_class: Some("Blueprint".into()),
            parent_class: Some("Actor".into()),
        };
        for (id, name) in [(1, "BP_Hero"), (2, "BP_HeroGun"), (3, "BP_Enemy")] {
            index.upsert_asset(AssetRecord {
                id: crate::types::AssetId::new(id),
                path: format!("/g/{name}.uasset"),
                name: name.into(),
                content_path: format!("/Game/Blueprints/{name}"),
                folder: base.folder.clone(),
                project: base.project.clone(),
                extension: base.extension.clone(),
                mtime: 0,
                asset_class: base.asset_class.clone(),
                parent_class: base.parent_class.clone(),
            });
        }
        index.rebuild_derived();

        let exact = find_assets_exact(&index, "BP_Hero", None, None, 10);
        assert_eq!(exact.len(), 1);

        let suffixed = find_assets_exact(&index, "BP_Hero_C", None, None, 10);
        assert_eq!(suffixed.len(), 1);

        let fuzzy = find_assets_fuzzy(&index, "BP_Hero", None, None, 10);
        assert_eq!(fuzzy.len(), 2);

        let filtered = find_assets_fuzzy(&index, "BP_", Some("Other"), None, 10);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_min_trigram_matches_thresholds() {
        assert_eq!(min_trigram_matches(1), 1);
        assert_eq!(min_trigram_matches(3), 2);
        assert_eq!(min_trigram_matches(5), 3);
        assert_eq!(min_trigram_matches(8), 6);
        assert_eq!(min_trigram_matches(12), 9);
    }
}
