//! Unreal type-name prefix conventions.
//!
//! Source type names carry a single-letter prefix (`AActor`,
//! `UObject`, `FVector`, `EState`, `SWidget`, `IInterface`); asset
//! parsers record parent names without it. Exact match falls back
//! through these variants, and the inheritance traversal consults both
//! forms of every frontier name.

/// The UE type-name prefix set.
pub const UE_PREFIXES: [char; 6] = ['A', 'U', 'F', 'E', 'S', 'I'];

/// Strips a UE prefix if the name follows the convention.
///
/// Only strips when the remainder starts uppercase, so `Update` is not
/// mistaken for a prefixed `pdate`.
#[must_use]
pub fn strip_ue_prefix(name: &str) -> Option<&str> {
    let mut chars = name.chars();
    let first = chars.next()?;
    let second = chars.next()?;
    if UE_PREFIXES.contains(&first) && second.is_ascii_uppercase() {
        Some(&name[first.len_utf8()..])
    } else {
        None
    }
}

/// Returns the prefix-stripped form, or the name itself.
#[must_use]
pub fn stripped_or_self(name: &str) -> &str {
    strip_ue_prefix(name).unwrap_or(name)
}

/// Strips the BlueprintGeneratedClass `_C` suffix.
#[must_use]
pub fn strip_class_suffix(name: &str) -> Option<&str> {
    name.strip_suffix("_C").filter(|s| !s.is_empty())
}

/// Exact-match fallback variants in probe order.
///
/// First each prefix prepended to the query as given, then the query
/// stripped and re-prepended with each prefix including the empty one.
/// Callers probe in order and stop at the first non-empty hit.
#[must_use]
pub fn exact_variants(query: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(UE_PREFIXES.len() * 2 + 1);
    for p in UE_PREFIXES {
        variants.push(format!("{p}{query}"));
    }
    if let Some(stripped) = strip_ue_prefix(query) {
        variants.push(stripped.to_string());
        for p in UE_PREFIXES {
            let candidate = format!("{p}{stripped}");
            if candidate != query && !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_known_prefixes() {
        assert_eq!(strip_ue_prefix("AActor"), Some("Actor"));
        assert_eq!(strip_ue_prefix("UObject"), Some("Object"));
        assert_eq!(strip_ue_prefix("FVector"), Some("Vector"));
        assert_eq!(strip_ue_prefix("EMovementMode"), Some("MovementMode"));
        assert_eq!(strip_ue_prefix("SButton"), Some("Button"));
        assert_eq!(strip_ue_prefix("IInterface"), Some("Interface"));
    }

    #[test]
    fn test_strip_rejects_plain_names() {
        // Lowercase second char means no prefix convention in play
        assert_eq!(strip_ue_prefix("Update"), None);
        assert_eq!(strip_ue_prefix("Actor"), None);
        assert_eq!(strip_ue_prefix("B"), None);
        assert_eq!(strip_ue_prefix(""), None);
    }

    #[test]
    fn test_class_suffix() {
        assert_eq!(strip_class_suffix("BP_Hero_C"), Some("BP_Hero"));
        assert_eq!(strip_class_suffix("BP_Hero"), None);
        assert_eq!(strip_class_suffix("_C"), None);
    }

    #[test]
    fn test_exact_variants_for_unprefixed_query() {
        let variants = exact_variants("GameMode");
        assert_eq!(variants[0], "AGameMode");
        assert_eq!(variants[1], "UGameMode");
        assert!(variants.contains(&"EGameMode".to_string()));
        // No stripped round since the query carries no prefix
        assert_eq!(variants.len(), UE_PREFIXES.len());
    }

    #[test]
    fn test_exact_variants_for_prefixed_query() {
        let variants = exact_variants("AActor");
        // Prefixed probes first
        assert_eq!(variants[0], "AAActor");
        // Then the bare stripped form
        assert!(variants.contains(&"Actor".to_string()));
        // Then re-prefixed forms, skipping the original query
        assert!(variants.contains(&"UActor".to_string()));
        assert!(!variants.contains(&"AActor".to_string()));
    }
}
