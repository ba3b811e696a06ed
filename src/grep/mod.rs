//! Grep pipeline: delegation to the external engine, post-filtering,
//! and rank merging with index-derived signals.
//!
//! The core never greps the filesystem itself. It builds an engine
//! query, issues the source and (optionally) asset calls in parallel,
//! filters multi-word literals for proximity, merges index signals
//! into the ranking, and shapes the response flat or grouped per file.

pub mod cache;
pub mod rank;
pub mod zoekt;

pub use cache::{GrepCache, GrepCacheKey};
pub use zoekt::{EngineHit, EngineQuery, SearchEngine, ZoektClient};

use crate::error::{GrepError, Result, ServiceError};
use crate::memory::MemoryIndex;
use crate::types::Language;
use rank::{passes_proximity, proximity_words, rank_hits, FileSignals};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Wall-clock budget for the whole pipeline.
pub const DEFAULT_GREP_BUDGET: Duration = Duration::from_secs(30);

/// Patterns longer than this are rejected outright.
const MAX_PATTERN_LEN: usize = 1_000;

const fn default_max_results() -> usize {
    50
}

/// A user grep request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepRequest {
    pub pattern: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub context_lines: usize,
    #[serde(default)]
    pub grouped: bool,
    #[serde(default)]
    pub include_assets: bool,
    #[serde(default)]
    pub symbols: bool,
}

/// One ranked match in the response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepMatch {
    pub path: String,
    pub line: u32,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
    pub score: f64,
}

/// Matches grouped per file, best file first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepFileGroup {
    pub path: String,
    pub matches: Vec<GrepMatch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GrepResults {
    Flat(Vec<GrepMatch>),
    Grouped(Vec<GrepFileGroup>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrepResponse {
    pub results: GrepResults,
    pub total_matches: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<GrepMatch>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// The pipeline, owned by the query façade.
pub struct GrepPipeline {
    engine: Arc<dyn SearchEngine>,
    cache: Arc<GrepCache<GrepResponse>>,
    memory: Arc<RwLock<MemoryIndex>>,
    budget: Duration,
}

impl GrepPipeline {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        cache: Arc<GrepCache<GrepResponse>>,
        memory: Arc<RwLock<MemoryIndex>>,
    ) -> Self {
        Self {
            engine,
            cache,
            memory,
            budget: DEFAULT_GREP_BUDGET,
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Runs a grep request through cache, engine, filter, and ranking.
    ///
    /// # Errors
    ///
    /// `InvalidPattern`/`DangerousPattern` for rejected patterns,
    /// `UnsupportedLanguage` for binary asset languages,
    /// `NotAvailable`/`Timeout` when the engine fails. Engine failures
    /// are cached neither as success nor failure.
    pub async fn run(&self, request: &GrepRequest) -> Result<GrepResponse> {
        if let Some(language) = request.language {
            if !language.is_text_searchable() {
                return Err(ServiceError::UnsupportedLanguage(language.to_string()));
            }
        }
        validate_pattern(&request.pattern)?;

        if request.pattern.contains('\n') {
            // Not an error: an empty result with guidance, since the
            // engine is line-based and can never match.
            return Ok(empty_response(
                request,
                vec![
                    "pattern contains a literal newline; line-based search cannot match across lines"
                        .to_string(),
                ],
            ));
        }

        let key = cache_key(request);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let response = tokio::time::timeout(self.budget, self.execute(request))
            .await
            .map_err(|_| {
                ServiceError::Grep(GrepError::BudgetExceeded {
                    ms: self.budget.as_millis() as u64,
                })
            })??;

        self.cache.put(key, response.clone());
        Ok(response)
    }

    async fn execute(&self, request: &GrepRequest) -> Result<GrepResponse> {
        let source_query = EngineQuery {
            query: zoekt::build_query(
                &request.pattern,
                request.case_sensitive,
                request.language,
                request.project.as_deref(),
                request.symbols,
                false,
            ),
            max_docs: (request.max_results * 3).clamp(100, 1_000),
            num_context_lines: request.context_lines,
        };

        let asset_query = request.include_assets.then(|| EngineQuery {
            query: zoekt::build_query(
                &request.pattern,
                request.case_sensitive,
                None,
                request.project.as_deref(),
                false,
                true,
            ),
            max_docs: (request.max_results * 3).clamp(100, 1_000),
            num_context_lines: request.context_lines,
        });

        // Source and asset calls run in parallel.
        let (source_hits, asset_hits) = match &asset_query {
            Some(aq) => {
                let (s, a) = tokio::join!(self.engine.search(&source_query), self.engine.search(aq));
                (s?, Some(a?))
            }
            None => (self.engine.search(&source_query).await?, None),
        };

        let words = proximity_words(&request.pattern);
        let filter = |hits: Vec<EngineHit>| -> Vec<EngineHit> {
            let mut hits = hits;
            if let Some(words) = &words {
                hits.retain(|h| passes_proximity(h, words, request.case_sensitive));
            }
            for h in &mut hits {
                h.path = normalize_hit_path(&h.path);
            }
            hits
        };

        let source_hits = filter(source_hits);
        let asset_hits = asset_hits.map(filter);

        let now = crate::store::now_ms();
        // Index signals are a ranking refinement, not a correctness
        // requirement: while the startup loader holds the write lock,
        // rank on the engine-side signals alone.
        let ranked = match self.memory.try_read() {
            Ok(mem) => rank_hits(source_hits, |hit| file_signals(&mem, hit), now),
            Err(_) => rank_hits(source_hits, |_| FileSignals::default(), now),
        };

        let total_matches = ranked.len();
        let truncated = total_matches > request.max_results;

        let matches: Vec<GrepMatch> = ranked
            .into_iter()
            .take(request.max_results)
            .map(|r| GrepMatch {
                path: r.hit.path,
                line: r.hit.line,
                text: r.hit.text,
                before: r.hit.before,
                after: r.hit.after,
                score: r.score,
            })
            .collect();

        let assets = asset_hits.map(|hits| {
            hits.into_iter()
                .take(request.max_results)
                .map(|h| GrepMatch {
                    path: h.path,
                    line: h.line,
                    text: h.text,
                    before: h.before,
                    after: h.after,
                    score: 0.0,
                })
                .collect::<Vec<_>>()
        });

        let hints = if matches.is_empty() {
            zero_result_hints(request)
        } else {
            Vec::new()
        };

        let results = if request.grouped {
            GrepResults::Grouped(group_by_file(matches))
        } else {
            GrepResults::Flat(matches)
        };

        Ok(GrepResponse {
            results,
            total_matches,
            truncated,
            assets,
            hints,
        })
    }
}

fn file_signals(mem: &MemoryIndex, hit: &EngineHit) -> FileSignals {
    let Some(file) = mem.file_by_mirror_path(&hit.path) else {
        return FileSignals::default();
    };
    let has_symbol = mem
        .types_in_file(file.id)
        .iter()
        .filter_map(|&id| mem.type_record(id))
        .any(|t| t.line == hit.line)
        || mem
            .members_in_file(file.id)
            .iter()
            .filter_map(|&id| mem.member_record(id))
            .any(|m| m.line == hit.line);
    FileSignals {
        mtime_ms: Some(file.mtime),
        has_symbol_at_line: has_symbol,
    }
}

/// Forward slashes, no leading `./` or `/`. Mirror paths already carry
/// the project prefix for cross-project uniqueness.
#[must_use]
pub fn normalize_hit_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized
        .strip_prefix("./")
        .unwrap_or(&normalized)
        .trim_start_matches('/');
    trimmed.to_string()
}

fn group_by_file(matches: Vec<GrepMatch>) -> Vec<GrepFileGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: ahash::AHashMap<String, Vec<GrepMatch>> = ahash::AHashMap::new();
    for m in matches {
        if !groups.contains_key(&m.path) {
            order.push(m.path.clone());
        }
        groups.entry(m.path.clone()).or_default().push(m);
    }
    order
        .into_iter()
        .map(|path| {
            let matches = groups.remove(&path).unwrap_or_default();
            GrepFileGroup { path, matches }
        })
        .collect()
}

fn cache_key(request: &GrepRequest) -> GrepCacheKey {
    GrepCacheKey {
        pattern: request.pattern.clone(),
        project: request.project.clone(),
        language: request.language.map(|l| l.as_str().to_string()),
        case_sensitive: request.case_sensitive,
        max_results: request.max_results,
        context_lines: request.context_lines,
        grouped: request.grouped,
        include_assets: request.include_assets,
        symbols: request.symbols,
    }
}

fn empty_response(request: &GrepRequest, hints: Vec<String>) -> GrepResponse {
    GrepResponse {
        results: if request.grouped {
            GrepResults::Grouped(Vec::new())
        } else {
            GrepResults::Flat(Vec::new())
        },
        total_matches: 0,
        truncated: false,
        assets: request.include_assets.then(Vec::new),
        hints,
    }
}

fn zero_result_hints(request: &GrepRequest) -> Vec<String> {
    let mut hints = Vec::new();
    if request.case_sensitive {
        hints.push("try caseSensitive=false".to_string());
    }
    if request.project.is_some() {
        hints.push("try removing the project filter".to_string());
    }
    if !request.include_assets {
        hints.push("try includeAssets=true to search asset text".to_string());
    }
    hints
}

/// Rejects empty, oversized, uncompilable, and ReDoS-prone patterns.
///
/// # Errors
///
/// Returns `GrepError::InvalidPattern` or `GrepError::DangerousPattern`.
pub fn validate_pattern(pattern: &str) -> std::result::Result<(), GrepError> {
    if pattern.is_empty() {
        return Err(GrepError::InvalidPattern("empty pattern".to_string()));
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(GrepError::DangerousPattern {
            reason: format!("pattern exceeds {MAX_PATTERN_LEN} bytes"),
        });
    }

    // Nested quantifiers like (a+)+ blow up backtracking engines
    // downstream of ours; reject them before they reach the daemon.
    let nested = regex::Regex::new(r"\([^()]*[+*][^()]*\)\s*[+*{]").expect("static pattern");
    if nested.is_match(pattern) {
        return Err(GrepError::DangerousPattern {
            reason: "nested quantifiers".to_string(),
        });
    }

    if pattern.bytes().any(|b| {
        matches!(b, b'\\' | b'.' | b'+' | b'*' | b'?' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'|' | b'^' | b'$')
    }) {
        regex::Regex::new(pattern)
            .map_err(|e| GrepError::InvalidPattern(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileId, FileRecord};
    use std::future::Future;
    use std::pin::Pin;

    /// Engine stub returning canned hits per query substring.
    struct StubEngine {
        hits: Vec<EngineHit>,
        asset_hits: Vec<EngineHit>,
        fail: Option<GrepError>,
    }

    impl StubEngine {
        fn with_hits(hits: Vec<EngineHit>) -> Self {
            Self {
                hits,
                asset_hits: Vec::new(),
                fail: None,
            }
        }
    }

    impl SearchEngine for StubEngine {
        fn search<'a>(
            &'a self,
            query: &'a EngineQuery,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<Vec<EngineHit>, GrepError>> + Send + 'a>>
        {
            Box::pin(async move {
                if let Some(fail) = &self.fail {
                    return Err(match fail {
                        GrepError::EngineUnavailable(m) => {
                            GrepError::EngineUnavailable(m.clone())
                        }
                        GrepError::EngineTimeout { ms } => GrepError::EngineTimeout { ms: *ms },
                        _ => GrepError::EngineUnavailable("stub".to_string()),
                    });
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

    fn hit(path: &str, line: u32, text: &str) -> EngineHit {
        EngineHit {
            path: path.into(),
            line,
            text: text.into(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    fn pipeline(engine: StubEngine) -> GrepPipeline {
        GrepPipeline::new(
            Arc::new(engine),
            Arc::new(GrepCache::with_defaults()),
            Arc::new(RwLock::new(MemoryIndex::new())),
        )
    }

    fn request(pattern: &str) -> GrepRequest {
        GrepRequest {
            pattern: pattern.into(),
            project: None,
            language: None,
            case_sensitive: false,
            max_results: 10,
            context_lines: 0,
            grouped: false,
            include_assets: false,
            symbols: false,
        }
    }

    #[tokio::test]
    async fn test_basic_flow_ranks_definitions_first() {
        let engine = StubEngine::with_hits(vec![
            hit("Game/Impl.cpp", 300, "    DestroyActor();"),
            hit("Game/Actor.h", 50, "class AActor : public UObject"),
        ]);
        let response = pipeline(engine).run(&request("Actor")).await.unwrap();

        assert_eq!(response.total_matches, 2);
        assert!(!response.truncated);
        let GrepResults::Flat(matches) = &response.results else {
            panic!("expected flat results");
        };
        assert_eq!(matches[0].path, "Game/Actor.h");
    }

    #[tokio::test]
    async fn test_multi_word_proximity() {
        let engine = StubEngine::with_hits(vec![
            hit("Game/Actor.h", 10, "class AActor : public UObject"),
            hit("Game/Other.h", 10, "class"),
        ]);
        let response = pipeline(engine).run(&request("class AActor")).await.unwrap();
        assert_eq!(response.total_matches, 1);
        let GrepResults::Flat(matches) = &response.results else {
            panic!();
        };
        assert_eq!(matches[0].path, "Game/Actor.h");
    }

    #[tokio::test]
    async fn test_grouped_shape() {
        let engine = StubEngine::with_hits(vec![
            hit("Game/A.h", 1, "class AFoo"),
            hit("Game/A.h", 9, "class ABar"),
            hit("Game/B.h", 2, "class ABaz"),
        ]);
        let mut req = request("class");
        req.grouped = true;
        let response = pipeline(engine).run(&req).await.unwrap();
        let GrepResults::Grouped(groups) = &response.results else {
            panic!("expected grouped results");
        };
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].matches.len() + groups[1].matches.len(), 3);
    }

    #[tokio::test]
    async fn test_truncation_flag() {
        let hits: Vec<EngineHit> = (0..30)
            .map(|i| hit("Game/A.cpp", i + 1, "Spawn();"))
            .collect();
        let engine = StubEngine::with_hits(hits);
        let mut req = request("Spawn");
        req.max_results = 5;
        let response = pipeline(engine).run(&req).await.unwrap();
        assert!(response.truncated);
        assert_eq!(response.total_matches, 30);
        let GrepResults::Flat(matches) = &response.results else {
            panic!();
        };
        assert_eq!(matches.len(), 5);
    }

    #[tokio::test]
    async fn test_engine_unavailable_maps_to_503() {
        let mut engine = StubEngine::with_hits(Vec::new());
        engine.fail = Some(GrepError::EngineUnavailable("connection refused".into()));
        let err = pipeline(engine).run(&request("x")).await.unwrap_err();
        assert_eq!(err.status(), 503);
    }

    #[tokio::test]
    async fn test_engine_failure_not_cached() {
        let cache = Arc::new(GrepCache::with_defaults());
        let mut engine = StubEngine::with_hits(Vec::new());
        engine.fail = Some(GrepError::EngineUnavailable("down".into()));
        let pipeline = GrepPipeline::new(
            Arc::new(engine),
            Arc::clone(&cache),
            Arc::new(RwLock::new(MemoryIndex::new())),
        );
        let _ = pipeline.run(&request("x")).await.unwrap_err();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let engine = StubEngine::with_hits(vec![hit("Game/A.h", 1, "class AFoo")]);
        let p = pipeline(engine);
        let first = p.run(&request("AFoo")).await.unwrap();
        // Second call is served from cache (stub would return the same
        // thing, but the cache length proves the slot exists).
        let second = p.run(&request("AFoo")).await.unwrap();
        assert_eq!(first.total_matches, second.total_matches);
        assert_eq!(p.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_newline_pattern_returns_hint_not_error() {
        let engine = StubEngine::with_hits(Vec::new());
        let response = pipeline(engine).run(&request("foo\nbar")).await.unwrap();
        assert_eq!(response.total_matches, 0);
        assert!(response.hints[0].contains("newline"));
    }

    #[tokio::test]
    async fn test_asset_language_rejected() {
        let engine = StubEngine::with_hits(Vec::new());
        let mut req = request("x");
        req.language = Some(Language::Asset);
        let err = pipeline(engine).run(&req).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "UNSUPPORTED_LANGUAGE");
    }

    #[tokio::test]
    async fn test_zero_results_carry_hints() {
        let engine = StubEngine::with_hits(Vec::new());
        let mut req = request("Nonexistent");
        req.project = Some("Game".into());
        req.case_sensitive = true;
        let response = pipeline(engine).run(&req).await.unwrap();
        assert!(response
            .hints
            .iter()
            .any(|h| h.contains("project filter")));
        assert!(response.hints.iter().any(|h| h.contains("caseSensitive")));
    }

    #[tokio::test]
    async fn test_symbol_signal_from_memory() {
        let mut mem = MemoryIndex::new();
        mem.add_file(FileRecord {
            id: FileId::new(1),
            path: "/g/Source/Actor.h".into(),
            project: "Game".into(),
            module: String::new(),
            language: Language::Cpp,
            mtime: 0,
            relative_path: Some("Source/Actor.h".into()),
        });
        mem.add_types(vec![crate::types::TypeRecord {
            id: crate::types::TypeId::new(1),
            file_id: FileId::new(1),
            name: "AActor".into(),
            kind: crate::types::TypeKind::Class,
            parent: None,
            line: 50,
            depth: None,
        }]);
        mem.rebuild_derived();

        let engine = StubEngine::with_hits(vec![
            hit("Game/Source/Actor.h", 60, "    AActor other"),
            hit("Game/Source/Actor.h", 50, "    AActor declaration"),
        ]);
        let p = GrepPipeline::new(
            Arc::new(engine),
            Arc::new(GrepCache::with_defaults()),
            Arc::new(RwLock::new(mem)),
        );
        let response = p.run(&request("AActor")).await.unwrap();
        let GrepResults::Flat(matches) = &response.results else {
            panic!();
        };
        // Line 50 holds a known type declaration and wins the xref boost
        assert_eq!(matches[0].line, 50);
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("DestroyActor").is_ok());
        assert!(validate_pattern(r"Destroy\w+").is_ok());
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("(a+)+").is_err());
        assert!(validate_pattern(r"[unclosed").is_err());
        assert!(validate_pattern(&"x".repeat(2000)).is_err());
    }

    #[test]
    fn test_normalize_hit_path() {
        assert_eq!(normalize_hit_path("Game\\Source\\A.h"), "Game/Source/A.h");
        assert_eq!(normalize_hit_path("./Game/A.h"), "Game/A.h");
        assert_eq!(normalize_hit_path("/Game/A.h"), "Game/A.h");
    }
}
