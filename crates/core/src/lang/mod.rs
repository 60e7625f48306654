//! Language-tagged transforms: script detection, transliteration, and
//! speller-backed stemming/suggestion/orthographic restoration.
//!
//! Each group carries a set of ISO-639-1 language tags; a transform only
//! fires for a query when its language predicate accepts the input, so an
//! English query in a Greek group is not force-transliterated.

pub mod arabic;
pub mod chinese;
pub mod greek;
pub mod speller;

use std::collections::BTreeSet;
use std::path::Path;

pub use chinese::{ChineseConversion, ChinesePreference};
pub use speller::{Speller, SpellerSet, WordlistSpeller};

use crate::text::simplify;

/// The stateful half of the language registry: conversion tables and word
/// lists, loaded once from the app resources root.
pub struct LangOps {
    pub chinese: ChineseConversion,
    spellers: SpellerSet,
}

impl LangOps {
    pub fn load(resources_root: &Path, langs: &[&str]) -> LangOps {
        LangOps {
            chinese: ChineseConversion::load(resources_root),
            spellers: SpellerSet::load(resources_root, langs),
        }
    }

    pub fn empty() -> LangOps {
        LangOps { chinese: ChineseConversion::default(), spellers: SpellerSet::empty() }
    }

    fn is_lang(&self, lang: &str, text: &str) -> bool {
        match lang {
            "el" => greek::is_greek(text),
            "zh" => chinese::is_chinese(text),
            "ar" => arabic::is_arabic_transliterated(text),
            _ => false,
        }
    }

    fn transliterate(&self, lang: &str, text: &str) -> Vec<String> {
        match lang {
            "el" => greek::transliterate(text),
            "zh" => self.chinese.transliterate(text),
            "ar" => arabic::transliterate(text),
            _ => Vec::new(),
        }
    }

    /// Every transliteration variant of `key` for the languages of a group
    /// whose predicate accepts the input.
    pub fn transliterate_key(&self, key: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let mut keys = Vec::new();
        for lang in langs {
            if self.is_lang(lang, key) {
                keys.extend(self.transliterate(lang, key));
            }
        }
        keys
    }

    /// Dictionary forms the query may stand for, across the group languages.
    /// Empty without installed word lists.
    pub fn stem(&self, word: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let mut stems = Vec::new();
        for lang in langs {
            if let Some(speller) = self.spellers.get(lang) {
                stems.extend(speller.stem(word));
            }
        }
        stems
    }

    /// Correction candidates resolved to dictionary forms, deduplicated.
    pub fn spelling_suggestions(&self, word: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let mut suggestions = Vec::new();
        for lang in langs {
            if let Some(speller) = self.spellers.get(lang) {
                for raw in speller.suggest(word) {
                    // A raw suggestion may just restore diacritics; resolving
                    // through the word list lands on the lemma (deplacons →
                    // déplacer rather than déplaçons).
                    for stem in speller.stem(&raw) {
                        if !suggestions.contains(&stem) {
                            suggestions.push(stem);
                        }
                    }
                }
            }
        }
        suggestions
    }

    /// Accent-restored single-word forms of a simplified key
    /// (`avo` → `{avó, avô}`).
    pub fn orthographic_forms(&self, key: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let mut forms = Vec::new();
        for lang in langs {
            if let Some(speller) = self.spellers.get(lang) {
                for form in speller.forms_of_key(key) {
                    let valid = simplify(&form) == key
                        && !form.contains(char::is_whitespace)
                        && !forms.contains(&form);
                    if valid {
                        forms.push(form);
                    }
                }
            }
        }
        forms
    }

    pub fn has_speller(&self) -> bool {
        !self.spellers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn greek_queries_transliterate_both_ways() {
        let ops = LangOps::empty();
        let keys = ops.transliterate_key("agaqos", &langs(&["el"]));
        // αγαθος with the final sigma the Beta Code pass produces.
        assert!(keys.contains(&"\u{3b1}\u{3b3}\u{3b1}\u{3b8}\u{3bf}\u{3c2}".to_string()));
    }

    #[test]
    fn unrelated_languages_do_not_fire() {
        let ops = LangOps::empty();
        assert!(ops.transliterate_key("词典", &langs(&["el"])).is_empty());
        // zh without tables: identity variant only.
        assert_eq!(ops.transliterate_key("词典", &langs(&["zh"])), vec!["词典"]);
    }

    #[test]
    fn everything_is_empty_without_spellers() {
        let ops = LangOps::empty();
        let group = langs(&["en", "fr"]);
        assert!(ops.stem("running", &group).is_empty());
        assert!(ops.spelling_suggestions("runnign", &group).is_empty());
        assert!(ops.orthographic_forms("avo", &group).is_empty());
    }
}
