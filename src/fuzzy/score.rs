//! Relation scoring between a query and a candidate identifier.
//!
//! The primary score expresses how the candidate name relates to the
//! query (exact, prefix, substring, camelCase word overlap, accessor
//! variant), evaluated in descending score order so the strongest
//! relation wins. Small additive boosts for kind, inheritance depth,
//! and member specifiers are layered on top by the matcher.

use super::prefix::stripped_or_self;
use crate::types::TypeKind;

/// A scored name relation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relation {
    pub score: f64,
    pub reason: &'static str,
}

const fn relation(score: f64, reason: &'static str) -> Relation {
    Relation { score, reason }
}

/// Accessor prefixes stripped for getter/setter matching.
const ACCESSOR_PREFIXES: [&str; 6] = ["get", "set", "is", "has", "can", "should"];

/// Scores the relation between query and candidate, or `None` when the
/// only connection is shared trigrams.
#[must_use]
pub fn relate(query: &str, candidate: &str) -> Option<Relation> {
    let q = query.to_lowercase();
    let c = candidate.to_lowercase();
    let q_stripped = stripped_or_self(query).to_lowercase();
    let c_stripped = stripped_or_self(candidate).to_lowercase();

    if c == q {
        return Some(relation(1.0, "exact"));
    }
    // One-sided stripping only: both-sides-stripped equality (UActor
    // vs AActor) is the weaker prefix-stripped relation below.
    if c_stripped == q || c == q_stripped {
        return Some(relation(0.98, "exact-stripped"));
    }
    if c.starts_with(&q) {
        return Some(relation(0.95, "prefix"));
    }
    if c_stripped.starts_with(&q_stripped) || c.starts_with(&q_stripped) {
        return Some(relation(0.93, "prefix-stripped"));
    }

    let accessor = accessor_relation(&q, &c);
    if let Some(rel) = accessor.filter(|r| r.score > 0.85) {
        return Some(rel);
    }

    if c.contains(&q) {
        return Some(relation(0.85, "substring"));
    }
    if c_stripped.contains(&q_stripped) {
        return Some(relation(0.80, "substring-stripped"));
    }
    if let Some(rel) = accessor {
        return Some(rel);
    }

    // Word splitting needs the original casing to find boundaries.
    word_relation(query, candidate)
}

/// Getter/setter variants: strip accessor prefixes on both sides.
fn accessor_relation(q: &str, c: &str) -> Option<Relation> {
    let q_base = strip_accessor(q);
    let c_base = strip_accessor(c);
    let stripped_any = q_base.len() != q.len() || c_base.len() != c.len();
    if !stripped_any || q_base.is_empty() || c_base.is_empty() {
        return None;
    }
    if q_base == c_base {
        return Some(relation(0.88, "getter-setter"));
    }
    if c_base.starts_with(q_base) {
        return Some(relation(0.75, "getter-setter-prefix"));
    }
    None
}

fn strip_accessor(name: &str) -> &str {
    for prefix in ACCESSOR_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() {
                return rest.trim_start_matches('_');
            }
        }
    }
    name
}

/// camelCase / snake_case word overlap scoring.
fn word_relation(q: &str, c: &str) -> Option<Relation> {
    let query_words = split_words(q);
    if query_words.is_empty() {
        return None;
    }
    let candidate_words = split_words(c);

    let present = query_words
        .iter()
        .filter(|w| candidate_words.iter().any(|cw| cw == *w))
        .count();

    let fraction = present as f64 / query_words.len() as f64;
    if present == query_words.len() && present > 0 {
        Some(relation(0.70, "word-match-all"))
    } else if fraction >= 2.0 / 3.0 {
        Some(relation(0.50, "word-match-most"))
    } else if fraction >= 0.5 {
        Some(relation(0.40, "word-match-some"))
    } else {
        None
    }
}

/// Splits an identifier into lowercased words at case and underscore
/// boundaries: `GetPlayerController` -> `[get, player, controller]`.
#[must_use]
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let prev_lower = i > 0 && chars[i - 1].is_lowercase();
        let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
        if ch.is_uppercase() && (prev_lower || (i > 0 && next_lower)) && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Additive kind weight for type ranking.
#[must_use]
pub const fn kind_weight(kind: TypeKind) -> f64 {
    match kind {
        TypeKind::Class => 0.030,
        TypeKind::Struct => 0.025,
        TypeKind::Interface => 0.022,
        TypeKind::Enum => 0.020,
        TypeKind::Namespace => 0.015,
        TypeKind::Event | TypeKind::Delegate => 0.010,
    }
}

/// Shallow types rank ahead of deep ones, fading out at depth 6.
#[must_use]
pub fn depth_bonus(depth: Option<u32>) -> f64 {
    match depth {
        Some(d) => (0.03 - 0.005 * f64::from(d)).max(0.0),
        None => 0.0,
    }
}

/// Member specifier boosts: reflected, public, and non-static members
/// surface first among equal name relations.
#[must_use]
pub fn specifier_boost(specifiers: Option<&str>, is_static: bool) -> f64 {
    let mut boost = 0.0;
    if let Some(spec) = specifiers {
        let lower = spec.to_lowercase();
        if lower.contains("ufunction") || lower.contains("uproperty") {
            boost += 0.03;
        }
        if lower.contains("public") {
            boost += 0.02;
        }
    }
    if !is_static {
        boost += 0.01;
    }
    boost
}

/// Minimum primary score admitted for type results.
pub const TYPE_SCORE_FLOOR: f64 = 0.40;
/// Members admit noisier matches.
pub const MEMBER_SCORE_FLOOR: f64 = 0.15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_family() {
        assert_eq!(relate("AActor", "AActor").unwrap(), relation(1.0, "exact"));
        assert_eq!(
            relate("AActor", "Actor").unwrap(),
            relation(0.98, "exact-stripped")
        );
        assert_eq!(
            relate("AActor", "UActor").unwrap(),
            relation(0.93, "prefix-stripped")
        );
    }

    #[test]
    fn test_spec_ordering_for_actor_corpus() {
        // Query "AActor" against {Actor, AActor, UActor}
        let exact = relate("AActor", "AActor").unwrap().score;
        let stripped = relate("AActor", "Actor").unwrap().score;
        let cross = relate("AActor", "UActor").unwrap().score;
        assert!(exact > stripped && stripped > cross);
        assert_eq!(exact, 1.0);
        assert_eq!(stripped, 0.98);
        assert_eq!(cross, 0.93);
    }

    #[test]
    fn test_prefix_and_substring() {
        assert_eq!(
            relate("GameMode", "GameModeBase").unwrap(),
            relation(0.95, "prefix")
        );
        assert_eq!(
            relate("Mode", "AGameModeBase").unwrap(),
            relation(0.85, "substring")
        );
    }

    #[test]
    fn test_getter_setter() {
        assert_eq!(
            relate("Health", "GetHealth").unwrap(),
            relation(0.88, "getter-setter")
        );
        assert_eq!(
            relate("GetHealth", "SetHealth").unwrap(),
            relation(0.88, "getter-setter")
        );
        assert_eq!(
            relate("GetHealth", "SetHealthRegen").unwrap(),
            relation(0.75, "getter-setter-prefix")
        );
    }

    #[test]
    fn test_word_overlap() {
        assert_eq!(
            relate("player controller", "GetPlayerControllerState").unwrap(),
            relation(0.70, "word-match-all")
        );
        assert_eq!(
            relate("spawn player controller", "SpawnControllerHelper").unwrap(),
            relation(0.50, "word-match-most")
        );
        assert_eq!(
            relate("spawn actor pawn hero", "SpawnPawnFactory").unwrap(),
            relation(0.40, "word-match-some")
        );
        assert!(relate("completely unrelated", "AActor").is_none());
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("GetPlayerController"), ["get", "player", "controller"]);
        assert_eq!(split_words("bIsDead"), ["b", "is", "dead"]);
        assert_eq!(split_words("max_health"), ["max", "health"]);
        assert_eq!(split_words("HTTPServer"), ["http", "server"]);
    }

    #[test]
    fn test_boosts() {
        assert!(kind_weight(TypeKind::Class) > kind_weight(TypeKind::Struct));
        assert!(kind_weight(TypeKind::Struct) > kind_weight(TypeKind::Enum));
        assert_eq!(depth_bonus(Some(0)), 0.03);
        assert_eq!(depth_bonus(Some(2)), 0.02);
        assert_eq!(depth_bonus(Some(10)), 0.0);
        assert!(specifier_boost(Some("UFUNCTION,public"), false) > specifier_boost(None, true));
    }
}
