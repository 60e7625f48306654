//! Interface to an external full-text search engine.
//!
//! The engine itself is an optional collaborator (a xapian-style index built
//! elsewhere); the core only consumes ranked hits and fetches the articles.
//! Without an installed index the FTS surface degrades to "not available".

use crate::error::Result;

/// One ranked hit from the external index.
#[derive(Debug, Clone)]
pub struct FtsHit {
    /// Lower ranks sort first.
    pub rank: u32,
    pub dictionary: String,
    pub headword: String,
}

pub trait FullTextIndex: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>>;
}
