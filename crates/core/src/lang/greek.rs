//! Greek transliteration via Beta Code, a bijective mapping between the
//! Greek and Latin alphabets (`ς` only ever ends a word):
//!
//! α β γ δ ε ζ η θ ι κ λ μ ν ξ ο π ρ σ ς τ υ φ χ ψ ω
//! a b g d e z h q i k l m n c o p r s s t u f x y w

const GREEK: &str = "αβγδεζηθικλμνξοπρσςτυφχψω";
const LATIN: &str = "abgdezhqiklmncoprsstufxyw";

fn greek_to_latin(c: char) -> Option<char> {
    GREEK.chars().position(|g| g == c).map(|i| LATIN.chars().nth(i).unwrap())
}

fn latin_to_greek(c: char) -> Option<char> {
    // The shared 's' maps to non-final sigma; the final-sigma pass fixes
    // word endings afterwards.
    LATIN.chars().position(|l| l == c).map(|i| GREEK.chars().nth(i).unwrap())
}

fn transliterate_into_greek(text: &str) -> String {
    let mapped: Vec<char> =
        text.chars().map(|c| latin_to_greek(c).unwrap_or(c)).collect();
    let mut out = String::with_capacity(text.len() * 2);
    for (i, &c) in mapped.iter().enumerate() {
        let at_word_end =
            c == 'σ' && mapped.get(i + 1).map_or(true, |next| !next.is_alphabetic());
        out.push(if at_word_end { 'ς' } else { c });
    }
    out
}

fn transliterate_into_latin(text: &str) -> String {
    text.chars().map(|c| greek_to_latin(c).unwrap_or(c)).collect()
}

/// True when the text contains Greek or Latin letters.
pub fn is_greek(text: &str) -> bool {
    text.chars().any(|c| {
        c.is_ascii_alphabetic()
            || matches!(u32::from(c), 0x0370..=0x03ff | 0x1f00..=0x1fff)
    })
}

/// Bidirectional transliteration: both the Greek reading of a Latin query
/// and the Latin reading of a Greek query.
pub fn transliterate(text: &str) -> Vec<String> {
    vec![transliterate_into_greek(text), transliterate_into_latin(text)]
}
