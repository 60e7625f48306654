//! Spelling support backed by plain word lists.
//!
//! The engine only needs three things from a speller: stems for a query,
//! correction candidates for a misspelling, and accent-restored forms for a
//! simplified key. Hunspell-format `.dic` files are, at their core, word
//! lists (`word/FLAGS` per line), which is enough to provide all three
//! without a C binding: corrections come from Levenshtein distance, stems
//! and orthographic forms from an index keyed by simplified form. When no
//! word lists are installed every operation returns nothing and the engine
//! degrades gracefully.

use std::collections::HashMap;
use std::path::Path;

use levenshtein::levenshtein;
use tracing::{info, warn};

use crate::text::simplify;

const MAX_EDIT_DISTANCE: usize = 2;

pub trait Speller: Send + Sync {
    /// Dictionary forms the query may be an inflection or folding of.
    fn stem(&self, word: &str) -> Vec<String>;
    /// Correction candidates for a presumably misspelled word.
    fn suggest(&self, word: &str) -> Vec<String>;
}

/// A speller built from one `.dic` word list.
pub struct WordlistSpeller {
    words: Vec<String>,
    by_key: HashMap<String, Vec<usize>>,
}

impl WordlistSpeller {
    pub fn from_words<I: IntoIterator<Item = String>>(iter: I) -> WordlistSpeller {
        let mut words = Vec::new();
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for word in iter {
            by_key.entry(simplify(&word)).or_default().push(words.len());
            words.push(word);
        }
        WordlistSpeller { words, by_key }
    }

    /// Parse a hunspell `.dic` file: an optional leading word count, then one
    /// `word` or `word/FLAGS` per line.
    pub fn from_dic_file(path: &Path) -> std::io::Result<WordlistSpeller> {
        let content = std::fs::read_to_string(path)?;
        let mut lines = content.lines().peekable();
        if lines.peek().is_some_and(|l| l.trim().parse::<u64>().is_ok()) {
            lines.next();
        }
        let words = lines.filter_map(|line| {
            let word = line.split('/').next().unwrap_or(line).trim();
            (!word.is_empty()).then(|| word.to_string())
        });
        Ok(WordlistSpeller::from_words(words))
    }

    /// All dictionary forms whose simplification equals `key`.
    pub fn forms_of_key(&self, key: &str) -> Vec<String> {
        self.by_key
            .get(key)
            .map(|ids| ids.iter().map(|&i| self.words[i].clone()).collect())
            .unwrap_or_default()
    }
}

impl Speller for WordlistSpeller {
    fn stem(&self, word: &str) -> Vec<String> {
        self.forms_of_key(&simplify(word))
    }

    fn suggest(&self, word: &str) -> Vec<String> {
        let key = simplify(word);
        let mut ranked: Vec<(usize, &String)> = self
            .words
            .iter()
            .filter(|w| w.chars().count().abs_diff(key.chars().count()) <= MAX_EDIT_DISTANCE)
            .filter_map(|w| {
                let distance = levenshtein(&simplify(w), &key);
                (distance <= MAX_EDIT_DISTANCE).then_some((distance, w))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        ranked.into_iter().map(|(_, w)| w.clone()).collect()
    }
}

/// Per-language spellers loaded from `<resources_root>/hunspell/<lang>.dic`.
pub struct SpellerSet {
    spellers: HashMap<String, WordlistSpeller>,
}

impl SpellerSet {
    pub fn load(resources_root: &Path, langs: &[&str]) -> SpellerSet {
        let dir = resources_root.join("hunspell");
        let mut spellers = HashMap::new();
        for lang in langs {
            let dic = dir.join(format!("{lang}.dic"));
            if !dic.is_file() {
                continue;
            }
            match WordlistSpeller::from_dic_file(&dic) {
                Ok(speller) => {
                    info!(lang, path = %dic.display(), "loaded word list");
                    spellers.insert(lang.to_string(), speller);
                }
                Err(e) => warn!(lang, error = %e, "failed to load word list"),
            }
        }
        SpellerSet { spellers }
    }

    pub fn empty() -> SpellerSet {
        SpellerSet { spellers: HashMap::new() }
    }

    pub fn get(&self, lang: &str) -> Option<&WordlistSpeller> {
        self.spellers.get(lang)
    }

    pub fn is_empty(&self) -> bool {
        self.spellers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portuguese() -> WordlistSpeller {
        WordlistSpeller::from_words(
            ["avó", "avô", "avenida", "casa"].iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn forms_restore_accents() {
        let speller = portuguese();
        let mut forms = speller.forms_of_key("avo");
        forms.sort();
        assert_eq!(forms, vec!["avó", "avô"]);
    }

    #[test]
    fn suggest_ranks_by_distance() {
        let speller = portuguese();
        let suggestions = speller.suggest("caza");
        assert_eq!(suggestions.first().map(String::as_str), Some("casa"));
    }

    #[test]
    fn dic_flags_and_count_line_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pt.dic");
        std::fs::write(&path, "3\navó/S\navô\ncasa/SP\n").unwrap();
        let speller = WordlistSpeller::from_dic_file(&path).unwrap();
        assert_eq!(speller.forms_of_key("casa"), vec!["casa"]);
        assert_eq!(speller.forms_of_key("avo").len(), 2);
    }
}
