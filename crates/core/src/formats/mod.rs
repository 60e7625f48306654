//! Format-specific dictionary readers.
//!
//! A reader owns the open handles and parsed headers of one source file. On
//! construction it ingests the dictionary's key set into the index store
//! (once per source file); afterwards it serves article bodies for
//! `(offset, size)` locations the store hands back, pushing each through the
//! format's markup cleaner.

pub mod dsl;
pub mod mdict;
pub mod stardict;

use std::path::Path;

use crate::error::Result;
use crate::markup::ARTICLE_SEPARATOR;
use crate::store::IndexStore;

pub use dsl::DslReader;
pub use mdict::MdictReader;
pub use stardict::StarDictReader;

/// The closed set of supported dictionary formats.
pub enum Reader {
    Mdx(MdictReader),
    StarDict(StarDictReader),
    Dsl(DslReader),
}

impl Reader {
    /// One rendered article per entry stored under the simplified `key`,
    /// joined with a rule separator.
    pub fn article_by_key(&mut self, store: &IndexStore, key: &str) -> Result<String> {
        match self {
            Reader::Mdx(r) => r.article_by_key(store, key),
            Reader::StarDict(r) => r.article_by_key(store, key),
            Reader::Dsl(r) => r.article_by_key(store, key),
        }
    }

    /// Same as [`Reader::article_by_key`], but keyed on the original
    /// headword (the form FTS and export consumers hold).
    pub fn article_by_word(&mut self, store: &IndexStore, word: &str) -> Result<String> {
        match self {
            Reader::Mdx(r) => r.article_by_word(store, word),
            Reader::StarDict(r) => r.article_by_word(store, word),
            Reader::Dsl(r) => r.article_by_word(store, word),
        }
    }

    /// Concatenate the articles of several keys in the given order.
    pub fn articles_by_keys(&mut self, store: &IndexStore, keys: &[String]) -> Result<String> {
        let mut articles = Vec::with_capacity(keys.len());
        for key in keys {
            let article = self.article_by_key(store, key)?;
            if !article.is_empty() {
                articles.push(article);
            }
        }
        Ok(articles.join(ARTICLE_SEPARATOR))
    }

    /// The main source file backing this reader.
    pub fn source_path(&self) -> &Path {
        match self {
            Reader::Mdx(r) => r.source_path(),
            Reader::StarDict(r) => r.source_path(),
            Reader::Dsl(r) => r.source_path(),
        }
    }
}
