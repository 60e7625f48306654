//! dictserve-core — the dictionary engine behind the dictserve server.
//!
//! The engine ingests MDX, StarDict, and DSL dictionaries into a unified
//! SQLite headword index and serves suggestions, rendered articles, and
//! full-text hits. The HTTP surface lives in the `dictserve-server` crate;
//! everything here is plain synchronous Rust so it can be embedded anywhere.

pub mod catalog;
pub mod dictzip;
pub mod engine;
pub mod error;
pub mod formats;
pub mod fts;
pub mod lang;
pub mod markup;
pub mod query;
pub mod resource;
pub mod store;
pub mod text;
pub mod transform;

pub use catalog::{
    DictionaryFormat, DictionaryInfo, GroupInfo, Paths, Settings, DEFAULT_GROUP,
};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use fts::{FtsHit, FullTextIndex};
pub use query::ArticleResult;
pub use text::simplify;
