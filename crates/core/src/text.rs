//! Key simplification and identifier sanitisation.
//!
//! Every headword is indexed under its *simplified key*: diacritics stripped,
//! punctuation and whitespace removed, ligatures expanded, lowercased. The
//! simplified key is what users actually type, so all lookup paths funnel
//! through [`simplify`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Search wildcard matching an arbitrary run of characters (SQL `%`).
pub const WILDCARD_ANY: char = '^';
/// Search wildcard matching a single character (SQL `_`).
pub const WILDCARD_ONE: char = '+';

/// Translate the user-facing wildcards into their SQL `LIKE` equivalents.
pub fn transform_wildcards(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            WILDCARD_ANY => '%',
            WILDCARD_ONE => '_',
            c => c,
        })
        .collect()
}

/// Canonicalise a headword for indexing: NFKD fold, drop combining marks,
/// drop punctuation and whitespace, expand the `œ`/`æ` ligatures, lowercase.
///
/// Idempotent: `simplify(simplify(x)) == simplify(x)`. The search wildcards
/// `^` and `+` pass through untouched since wildcard queries are simplified
/// before they are matched against the index.
pub fn simplify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if !c.is_alphanumeric() && c != WILDCARD_ANY && c != WILDCARD_ONE {
            continue;
        }
        match c {
            'œ' | 'Œ' => out.push_str("oe"),
            'æ' | 'Æ' => out.push_str("ae"),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Whether the key contains either search wildcard.
pub fn has_wildcards(key: &str) -> bool {
    key.contains(WILDCARD_ANY) || key.contains(WILDCARD_ONE)
}

/// Derive a dictionary id that is safe to use as a CSS identifier and as a
/// path segment: ASCII alphanumerics, `-` and `_` are kept, everything else
/// becomes `-`, and a fixed `d-` prefix guarantees the id never starts with
/// a digit. Uniqueness within a catalog is the caller's concern.
pub fn css_safe_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len() + 2);
    id.push_str("d-");
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            id.push(c);
        } else {
            id.push('-');
        }
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_is_idempotent() {
        for s in ["Apple", "déjà vu", "ΨΥΧΗ", "œuvre", "hello, world!", ""] {
            let once = simplify(s);
            assert_eq!(simplify(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn simplify_strips_accents_punctuation_whitespace() {
        assert_eq!(simplify("déjà vu"), "dejavu");
        assert_eq!(simplify("  Hello, World!  "), "helloworld");
        assert_eq!(simplify("avó"), "avo");
    }

    #[test]
    fn simplify_expands_ligatures() {
        assert_eq!(simplify("œuvre"), "oeuvre");
        assert_eq!(simplify("Æsop"), "aesop");
    }

    #[test]
    fn simplify_keeps_wildcards() {
        assert_eq!(simplify("ap^le+"), "ap^le+");
    }

    #[test]
    fn simplify_handles_greek_and_cjk() {
        // ἀγαθός → αγαθος (breathing and accent stripped, final sigma kept).
        assert_eq!(
            simplify("\u{1f00}\u{3b3}\u{3b1}\u{3b8}\u{3cc}\u{3c2}"),
            "\u{3b1}\u{3b3}\u{3b1}\u{3b8}\u{3bf}\u{3c2}"
        );
        // CJK is untouched by folding.
        assert_eq!(simplify("词典"), "词典");
    }

    #[test]
    fn simplify_empty_is_empty() {
        assert_eq!(simplify(""), "");
    }

    #[test]
    fn wildcards_translate_to_sql() {
        assert_eq!(transform_wildcards("^ple+"), "%ple_");
    }

    #[test]
    fn css_ids_are_sanitised_and_prefixed() {
        assert_eq!(css_safe_id("Oxford Dict (3rd ed.)"), "d-Oxford-Dict--3rd-ed--");
        assert_eq!(css_safe_id("21st_century"), "d-21st_century");
    }
}
