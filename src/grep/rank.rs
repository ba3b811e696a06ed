//! Post-filtering and rank merging for engine hits.
//!
//! The engine only knows bytes; this layer folds index-derived signals
//! back in: definition detection, mtime recency, per-file match
//! density, header/public-path boosts, and optional symbol
//! cross-reference.

use super::zoekt::EngineHit;
use ahash::AHashMap;
use std::sync::OnceLock;

/// Definition-line patterns, checked in order.
fn definition_patterns() -> &'static [regex::Regex] {
    static PATTERNS: OnceLock<Vec<regex::Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\s*(template\s*<[^>]*>\s*)?(class|struct|enum(\s+class)?|namespace|interface)\s+\w+",
            r"^\s*(UCLASS|USTRUCT|UENUM|UINTERFACE|UFUNCTION|UPROPERTY|GENERATED_BODY)\b",
            r"^\s*(virtual\s+|static\s+|inline\s+)*[\w:<>&*~]+\s+\w+::\w+\s*\(",
            r"^\s*(UFUNCTION|event|delegate)\b.*\(",
        ]
        .iter()
        .map(|p| regex::Regex::new(p).expect("definition patterns are valid"))
        .collect()
    })
}

/// Whether a matched line looks like a definition site.
#[must_use]
pub fn is_definition_line(line: &str) -> bool {
    definition_patterns().iter().any(|p| p.is_match(line))
}

/// Recency score in [0, 10], fresher is higher.
///
/// Buckets by age: under a day scores 10, fading to 0 past a year.
#[must_use]
pub fn recency_score(mtime_ms: i64, now_ms: i64) -> f64 {
    const DAY: i64 = 24 * 60 * 60 * 1000;
    let age = (now_ms - mtime_ms).max(0);
    match age / DAY {
        0 => 10.0,
        1..=7 => 8.0,
        8..=30 => 6.0,
        31..=90 => 4.0,
        91..=365 => 2.0,
        _ => 0.0,
    }
}

/// Multi-word proximity filter.
///
/// For a non-regex literal containing spaces, a hit survives only if
/// every word appears on the matched line, or every word appears
/// within the line-plus-context window.
#[must_use]
pub fn passes_proximity(hit: &EngineHit, words: &[String], case_sensitive: bool) -> bool {
    if words.len() < 2 {
        return true;
    }

    let contains = |haystack: &str, needle: &str| {
        if case_sensitive {
            haystack.contains(needle)
        } else {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
    };

    if words.iter().all(|w| contains(&hit.text, w)) {
        return true;
    }

    let window: String = hit
        .before
        .iter()
        .chain(std::iter::once(&hit.text))
        .chain(hit.after.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    words.iter().all(|w| contains(&window, w))
}

/// Splits a literal pattern into proximity words, or `None` when the
/// pattern is a regex (proximity filtering does not apply).
#[must_use]
pub fn proximity_words(pattern: &str) -> Option<Vec<String>> {
    let is_regex = pattern
        .bytes()
        .any(|b| matches!(b, b'\\' | b'.' | b'+' | b'*' | b'?' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'|' | b'^' | b'$'));
    if is_regex || !pattern.contains(' ') {
        return None;
    }
    Some(
        pattern
            .split_whitespace()
            .map(ToString::to_string)
            .collect(),
    )
}

/// Index-derived signals for one file, supplied by the query façade.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSignals {
    pub mtime_ms: Option<i64>,
    /// Lines holding known type or member declarations.
    pub has_symbol_at_line: bool,
}

/// A hit with its merged rank.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub hit: EngineHit,
    pub score: f64,
}

/// Merges engine hits with index signals and sorts them.
///
/// Signals: per-file match count, header/public path boosts, recency,
/// definition-line bonus, and the symbol cross-reference boost.
/// Descending score, tie-break on ascending line number.
#[must_use]
pub fn rank_hits(
    hits: Vec<EngineHit>,
    signals: impl Fn(&EngineHit) -> FileSignals,
    now_ms: i64,
) -> Vec<RankedHit> {
    let mut per_file: AHashMap<String, usize> = AHashMap::new();
    for hit in &hits {
        *per_file.entry(hit.path.clone()).or_insert(0) += 1;
    }

    let mut ranked: Vec<RankedHit> = hits
        .into_iter()
        .map(|hit| {
            let mut score = 0.0f64;

            let match_count = per_file.get(&hit.path).copied().unwrap_or(1);
            score += (match_count.min(10) as f64) * 0.5;

            let lower = hit.path.to_lowercase();
            if lower.ends_with(".h") || lower.ends_with(".hpp") || lower.ends_with(".hxx") {
                score += 2.0;
            }
            if lower.contains("/public/") {
                score += 1.5;
            }

            if is_definition_line(&hit.text) {
                score += 5.0;
            }

            let sig = signals(&hit);
            if let Some(mtime) = sig.mtime_ms {
                score += recency_score(mtime, now_ms);
            }
            if sig.has_symbol_at_line {
                score += 3.0;
            }

            RankedHit { hit, score }
        })
        .collect();

    ranked.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hit.line.cmp(&b.hit.line))
    });
    ranked
}
