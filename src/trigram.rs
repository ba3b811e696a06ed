//! Trigram extraction, content hashing, and pattern reduction.
//!
//! Trigrams enable finding entities containing any substring, not
//! just word boundaries. A name or file body decomposes into the set
//! of distinct 24-bit lowercased byte triples; finding candidates for
//! a query means intersecting the posting lists of ALL its trigrams.

use crate::types::Trigram;
use ahash::AHashSet;
use regex_syntax::hir::HirKind;

/// Extracts the distinct trigram set from a byte sequence.
///
/// Bytes are ASCII-lowercased before packing. Any trigram containing a
/// newline, carriage return, or NUL is skipped so matches never cross
/// line boundaries. Inputs shorter than 3 bytes yield an empty set.
#[must_use]
pub fn extract_trigrams(input: &[u8]) -> Vec<Trigram> {
    if input.len() < 3 {
        return Vec::new();
    }

    let mut seen = AHashSet::with_capacity(input.len().min(4096));
    let mut out = Vec::new();
    for w in input.windows(3) {
        if w.iter().any(|&b| b == b'\n' || b == b'\r' || b == 0) {
            continue;
        }
        let t = Trigram::pack(
            w[0].to_ascii_lowercase(),
            w[1].to_ascii_lowercase(),
            w[2].to_ascii_lowercase(),
        );
        if seen.insert(t) {
            out.push(t);
        }
    }
    out
}

/// Extracts the distinct trigram set from an identifier.
///
/// Identical to [`extract_trigrams`] over the name's bytes; exists so
/// call sites distinguish name postings from content postings.
#[must_use]
pub fn name_trigrams(name: &str) -> Vec<Trigram> {
    extract_trigrams(name.as_bytes())
}

/// Computes the 64-bit content hash of a file body.
///
/// The hash is the first 8 little-endian bytes of the MD5 digest,
/// stored as a signed integer so it round-trips through SQLite.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> i64 {
    let digest = md5::compute(bytes);
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest.0[..8]);
    i64::from_le_bytes(first)
}

/// Reduces a user regex to the trigrams any match must contain.
///
/// Returns `None` when the pattern is unindexable and the caller must
/// fall back to the external engine or an exhaustive scan:
///
/// - a plain literal yields its own trigram set;
/// - an alternation of pure-literal branches yields the INTERSECTION
///   of the branches' trigram sets (empty intersection is unindexable
///   since no trigram is required by every branch);
/// - anything else (other metacharacters, too-short literals) is
///   unindexable.
#[must_use]
pub fn pattern_trigrams(pattern: &str) -> Option<Vec<Trigram>> {
    // Fast path: no metacharacters at all means the pattern is its own
    // literal.
    if !pattern.bytes().any(is_regex_meta) {
        return non_empty(extract_trigrams(pattern.as_bytes()));
    }

    let hir = regex_syntax::parse(pattern).ok()?;
    match hir.kind() {
        HirKind::Literal(lit) => non_empty(extract_trigrams(&lit.0)),
        HirKind::Alternation(branches) => {
            let mut required: Option<AHashSet<Trigram>> = None;
            for branch in branches {
                let HirKind::Literal(lit) = branch.kind() else {
                    return None;
                };
                let branch_set: AHashSet<Trigram> =
                    extract_trigrams(&lit.0).into_iter().collect();
                if branch_set.is_empty() {
                    return None;
                }
                required = Some(match required {
                    None => branch_set,
                    Some(acc) => acc.intersection(&branch_set).copied().collect(),
                });
            }
            let mut out: Vec<Trigram> = required?.into_iter().collect();
            out.sort_unstable();
            non_empty(out)
        }
        _ => None,
    }
}

fn non_empty(trigrams: Vec<Trigram>) -> Option<Vec<Trigram>> {
    if trigrams.is_empty() {
        None
    } else {
        Some(trigrams)
    }
}

const fn is_regex_meta(b: u8) -> bool {
    matches!(
        b,
        b'\\' | b'.' | b'+' | b'*' | b'?' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'|'
            | b'^' | b'$'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(trigrams: &[Trigram]) -> Vec<String> {
        trigrams.iter().map(Trigram::to_string).collect()
    }

    #[test]
    fn test_extract_lowercases() {
        let set = extract_trigrams(b"ABC");
        assert_eq!(as_strings(&set), vec!["abc"]);
    }

    #[test]
    fn test_extract_deduplicates() {
        // "aaaa" -> single "aaa"
        let set = extract_trigrams(b"aaaa");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_extract_skips_line_breaks() {
        let set = extract_trigrams(b"ab\ncd");
        // Every window overlaps the newline
        assert!(set.is_empty());

        let set = extract_trigrams(b"abc\ndef");
        assert_eq!(as_strings(&set), vec!["abc", "def"]);
    }

    #[test]
    fn test_extract_short_input() {
        assert!(extract_trigrams(b"ab").is_empty());
        assert!(extract_trigrams(b"").is_empty());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let h1 = content_hash(b"DestroyActor");
        let h2 = content_hash(b"DestroyActor");
        let h3 = content_hash(b"DestroyPawn");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_content_hash_is_md5_le() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e
        let expected = i64::from_le_bytes([0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04]);
        assert_eq!(content_hash(b""), expected);
    }

    #[test]
    fn test_pattern_literal() {
        let set = pattern_trigrams("DestroyActor").unwrap();
        let strings = as_strings(&set);
        assert!(strings.contains(&"des".to_string()));
        assert!(strings.contains(&"tor".to_string()));
    }

    #[test]
    fn test_pattern_alternation_intersects() {
        // Common stem "destroy" survives the intersection
        let set = pattern_trigrams("DestroyActor|DestroyPawn").unwrap();
        let strings = as_strings(&set);
        assert!(strings.contains(&"des".to_string()));
        assert!(strings.contains(&"roy".to_string()));
        // "act" appears only in the first branch
        assert!(!strings.contains(&"act".to_string()));
        assert!(!strings.contains(&"awn".to_string()));
    }

    #[test]
    fn test_pattern_disjoint_alternation_unindexable() {
        assert!(pattern_trigrams("foo|bar").is_none());
    }

    #[test]
    fn test_pattern_regex_unindexable() {
        assert!(pattern_trigrams(r"Destroy\w+").is_none());
        assert!(pattern_trigrams("^Destroy.*Actor$").is_none());
        assert!(pattern_trigrams(".*").is_none());
    }

    #[test]
    fn test_pattern_short_literal_unindexable() {
        assert!(pattern_trigrams("ab").is_none());
    }
}
