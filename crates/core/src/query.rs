//! The query pipeline: suggestions, group-wide article queries, legacy
//! per-dictionary lookup, flashcard export, and full-text search.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::{Captures, Regex};
use tracing::warn;

use crate::catalog::SuggestionsMode;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::lang::ChinesePreference;
use crate::markup::{strip_media, ARTICLE_SEPARATOR};
use crate::text::{has_wildcards, simplify, transform_wildcards};

/// One dictionary's rendered contribution to a group query.
#[derive(Debug, Clone)]
pub struct ArticleResult {
    pub dictionary: String,
    pub display_name: String,
    pub html: String,
}

fn legacy_lookup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/api/lookup/([^/]+)/([^/]+)").unwrap())
}

fn cache_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"/api/cache/[^"'\s>]+"#).unwrap())
}

impl Engine {
    // -----------------------------------------------------------------------
    // Suggestions
    // -----------------------------------------------------------------------

    /// Headword suggestions for a query, always padded to the configured
    /// count with empty strings.
    pub fn suggestions(&self, group: &str, key: &str) -> Result<Vec<String>> {
        let (dicts, langs, limit, mode, expand_headwords) = {
            let settings = self.settings.lock().unwrap();
            (
                settings.dictionaries_of_group(group)?,
                settings.group_lang(group)?,
                settings.misc.num_suggestions,
                settings.preferences.suggestions_mode,
                settings.preferences.ngram_stores_keys,
            )
        };

        let key_simplified = simplify(key);
        let mut candidates = if has_wildcards(&key_simplified) {
            self.store.like(&transform_wildcards(&key_simplified), &dicts, limit)?
        } else {
            let keys = self.suggestion_keys(&key_simplified, &langs);

            // Accent-restored forms come first: they are what the user most
            // likely meant to type.
            let mut found = Vec::new();
            'forms: for k in &keys {
                for form in self.lang.orthographic_forms(k, &langs) {
                    if self.stems_exist(&form, &langs, &dicts)? && !found.contains(&form) {
                        found.push(form);
                        if found.len() >= limit {
                            break 'forms;
                        }
                    }
                }
            }

            let prefixed = self.store.prefix(&keys, &dicts, &found, limit)?;
            found.extend(prefixed);
            found.truncate(limit);

            if mode == SuggestionsMode::BothSides && found.len() < limit {
                let mut expanded = Vec::new();
                for k in &keys {
                    expanded.extend(self.store.expand_key(k, expand_headwords)?);
                }
                let containing = self.store.keys_lookup(&expanded, &dicts, &found, limit)?;
                found.extend(containing);
            }

            if found.is_empty() {
                found = self.spelling_candidates(key, &langs, &dicts, limit)?;
            }
            found
        };

        candidates.truncate(limit);
        while candidates.len() < limit {
            candidates.push(String::new());
        }
        Ok(candidates)
    }

    /// `simplify(key)` plus its transliterations, deduplicated in order.
    fn suggestion_keys(&self, key_simplified: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let mut keys = vec![key_simplified.to_string()];
        for variant in self.lang.transliterate_key(key_simplified, langs) {
            if !keys.contains(&variant) {
                keys.push(variant);
            }
        }
        keys
    }

    fn stems_exist(
        &self,
        form: &str,
        langs: &BTreeSet<String>,
        dicts: &[String],
    ) -> Result<bool> {
        let mut stem_keys: Vec<String> = vec![simplify(form)];
        for stem in self.lang.stem(form, langs) {
            let k = simplify(&stem);
            if !stem_keys.contains(&k) {
                stem_keys.push(k);
            }
        }
        for k in stem_keys {
            if self.store.exists_in_any(&k, dicts)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Speller fallback: corrections that actually exist in the group's
    /// dictionaries, resolved to stored headwords.
    pub fn spelling_candidates(
        &self,
        key: &str,
        langs: &BTreeSet<String>,
        dicts: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for suggestion in self.lang.spelling_suggestions(key, langs) {
            let k = simplify(&suggestion);
            if !keys.contains(&k) && self.store.exists_in_any(&k, dicts)? {
                keys.push(k);
            }
        }
        self.store.keys_lookup(&keys, dicts, &[], limit)
    }

    /// Spelling fallback for a whole group, used when a query found nothing.
    pub fn group_spelling_suggestions(&self, group: &str, key: &str) -> Result<Vec<String>> {
        let (dicts, langs, limit) = {
            let settings = self.settings.lock().unwrap();
            (
                settings.dictionaries_of_group(group)?,
                settings.group_lang(group)?,
                settings.misc.num_suggestions,
            )
        };
        self.spelling_candidates(key, &langs, &dicts, limit)
    }

    // -----------------------------------------------------------------------
    // Group query
    // -----------------------------------------------------------------------

    /// Fetch every matching article across a group, in catalog order.
    pub fn query(&self, group: &str, key: &str) -> Result<Vec<ArticleResult>> {
        let (dicts, langs, chinese_preference) = {
            let settings = self.settings.lock().unwrap();
            (
                settings.dictionaries_of_group(group)?,
                settings.group_lang(group)?,
                settings.preferences.chinese_preference,
            )
        };
        let keys = self.query_keys(key, &langs);

        // Parallel fan-out; the ordered collect discards completion order
        // and restores the catalog order of the group.
        let fetched: Vec<Option<(String, String)>> = dicts
            .par_iter()
            .map(|dictionary| {
                let keys_found: Vec<String> = keys
                    .iter()
                    .filter(|k| self.store.exists(k, dictionary).unwrap_or(false))
                    .cloned()
                    .collect();
                if keys_found.is_empty() {
                    return None;
                }
                let reader = self.readers.get(dictionary)?;
                let mut reader = reader.lock().unwrap();
                match reader.articles_by_keys(&self.store, &keys_found) {
                    Ok(html) if !html.is_empty() => Some((dictionary.clone(), html)),
                    Ok(_) => None,
                    Err(e) => {
                        let unavailable = EngineError::ArticleUnavailable {
                            dictionary: dictionary.clone(),
                            key: keys_found.join(", "),
                        };
                        warn!(error = %e, "{unavailable}");
                        None
                    }
                }
            })
            .collect();

        let mut autoplay_found = false;
        let mut articles = Vec::new();
        for (dictionary, html) in fetched.into_iter().flatten() {
            let html = self.post_process(
                &dictionary,
                html,
                Some(group),
                &langs,
                chinese_preference,
                &mut autoplay_found,
            );
            let display_name =
                self.settings.lock().unwrap().display_name_of_dictionary(&dictionary);
            articles.push(ArticleResult { dictionary, display_name, html });
        }

        if !articles.is_empty() {
            self.settings.lock().unwrap().add_word_to_history(key)?;
        }
        Ok(articles)
    }

    /// Simplified key, stems, and transliterations, deduplicated in order.
    fn query_keys(&self, key: &str, langs: &BTreeSet<String>) -> Vec<String> {
        let key_simplified = simplify(key);
        let mut keys = vec![key_simplified.clone()];
        for stem in self.lang.stem(key, langs) {
            let k = simplify(&stem);
            if !keys.contains(&k) {
                keys.push(k);
            }
        }
        for variant in self.lang.transliterate_key(&key_simplified, langs) {
            if !keys.contains(&variant) {
                keys.push(variant);
            }
        }
        keys
    }

    /// Shared article post-processing. Performed after reordering so the
    /// autoplay winner is deterministic.
    fn post_process(
        &self,
        dictionary: &str,
        html: String,
        group: Option<&str>,
        langs: &BTreeSet<String>,
        chinese_preference: ChinesePreference,
        autoplay_found: &mut bool,
    ) -> String {
        // Cross-references navigate by group, not by dictionary.
        let html = match group {
            Some(group) => legacy_lookup_re()
                .replace_all(&html, |caps: &Captures<'_>| {
                    format!("/api/query/{group}/{}", &caps[2])
                })
                .into_owned(),
            None => html,
        };

        let html = if langs.contains("zh") && chinese_preference != ChinesePreference::None {
            self.convert_chinese_shielded(&html, chinese_preference)
        } else {
            html
        };

        let html = match self.transforms.get(dictionary) {
            Some(transform) => transform(&html),
            None => html,
        };

        if *autoplay_found {
            html.replace("autoplay", "")
        } else {
            if html.contains("autoplay") {
                *autoplay_found = true;
            }
            html
        }
    }

    /// Chinese conversion must not touch cache URLs (the file names are
    /// byte-exact); shield them behind private-use placeholders.
    fn convert_chinese_shielded(&self, html: &str, preference: ChinesePreference) -> String {
        let mut urls: Vec<String> = Vec::new();
        let shielded = cache_url_re()
            .replace_all(html, |caps: &Captures<'_>| {
                urls.push(caps[0].to_string());
                format!("\u{f8f0}{}\u{f8f1}", urls.len() - 1)
            })
            .into_owned();
        let mut converted = self.lang.chinese.convert_preferred(&shielded, preference);
        for (i, url) in urls.iter().enumerate() {
            converted = converted.replace(&format!("\u{f8f0}{i}\u{f8f1}"), url);
        }
        converted
    }

    // -----------------------------------------------------------------------
    // Legacy lookup, anki export, full-text search
    // -----------------------------------------------------------------------

    /// Single-dictionary lookup by key (the legacy cross-reference target).
    pub fn lookup(&self, dictionary: &str, key: &str) -> Result<String> {
        let key_simplified = simplify(key);
        if !self.store.dictionary_exists(dictionary)? {
            return Err(EngineError::DictionaryNotFound(dictionary.to_string()));
        }
        if !self.store.exists(&key_simplified, dictionary)? {
            return Err(EngineError::EntryNotFound {
                dictionary: dictionary.to_string(),
                key: key_simplified,
            });
        }
        let reader = self
            .readers
            .get(dictionary)
            .ok_or_else(|| EngineError::DictionaryNotFound(dictionary.to_string()))?;
        self.settings.lock().unwrap().add_word_to_history(key)?;
        let mut reader = reader.lock().unwrap();
        reader.article_by_key(&self.store, &key_simplified)
    }

    /// Merged, media- and link-stripped HTML suitable for flashcards.
    pub fn anki(&self, group: &str, word: &str) -> Result<String> {
        let articles = self.query(group, word)?;
        let merged: Vec<String> = articles.into_iter().map(|a| a.html).collect();
        Ok(strip_media(&merged.join(ARTICLE_SEPARATOR)))
    }

    /// Full-text search through the external index; hits are fetched by
    /// headword and post-processed like a group query.
    pub fn fts(&self, query: &str, limit: usize) -> Result<Vec<ArticleResult>> {
        let Some(index) = &self.fts else {
            return Err(EngineError::ExternalUnavailable("full-text search"));
        };
        let mut hits = index.search(query, limit)?;
        hits.sort_by_key(|hit| hit.rank);

        let empty_langs = BTreeSet::new();
        let mut autoplay_found = false;
        let mut articles = Vec::new();
        for hit in hits {
            let Some(reader) = self.readers.get(&hit.dictionary) else {
                continue;
            };
            let html = {
                let mut reader = reader.lock().unwrap();
                match reader.article_by_word(&self.store, &hit.headword) {
                    Ok(html) if !html.is_empty() => html,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(
                            dictionary = hit.dictionary.as_str(),
                            headword = hit.headword.as_str(),
                            error = %e,
                            "skipping unavailable full-text hit"
                        );
                        continue;
                    }
                }
            };
            let html = self.post_process(
                &hit.dictionary,
                html,
                None,
                &empty_langs,
                ChinesePreference::None,
                &mut autoplay_found,
            );
            let display_name =
                self.settings.lock().unwrap().display_name_of_dictionary(&hit.dictionary);
            articles.push(ArticleResult { dictionary: hit.dictionary, display_name, html });
        }
        Ok(articles)
    }
}
