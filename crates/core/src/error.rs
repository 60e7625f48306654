//! Error types shared across the engine.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything that can go wrong inside the engine. The server maps these to
/// HTTP statuses: the `*NotFound` variants become 404, the rest 500.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("group {0} not found")]
    GroupNotFound(String),

    #[error("dictionary {0} not found")]
    DictionaryNotFound(String),

    #[error("entry {key} not found in dictionary {dictionary}")]
    EntryNotFound { dictionary: String, key: String },

    #[error("article for {key} in {dictionary} is unavailable")]
    ArticleUnavailable { dictionary: String, key: String },

    #[error("corrupt compressed stream in {}", .0.display())]
    CorruptStream(PathBuf),

    #[error("extra compressed data after the final chunk in {}", .0.display())]
    TrailingData(PathBuf),

    #[error("unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: String },

    #[error("failed to decode article body: {0}")]
    Decode(String),

    #[error("index store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("{0} is not available")]
    ExternalUnavailable(&'static str),

    #[error("an index rebuild is already in progress")]
    Busy,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Short machine-readable name of the error kind, used in HTTP 500 bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "ConfigError",
            EngineError::GroupNotFound(_)
            | EngineError::DictionaryNotFound(_)
            | EngineError::EntryNotFound { .. } => "NotFound",
            EngineError::ArticleUnavailable { .. } => "ArticleUnavailable",
            EngineError::CorruptStream(_) => "CorruptStream",
            EngineError::TrailingData(_) => "TrailingData",
            EngineError::UnsupportedVersion { .. } => "UnsupportedVersion",
            EngineError::Decode(_) => "DecodeError",
            EngineError::Store(_) => "IndexStoreError",
            EngineError::ExternalUnavailable(_) => "ExternalUnavailable",
            EngineError::Busy => "Busy",
            EngineError::Io(_) => "IoError",
        }
    }

    /// True for the variants that should surface as HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::GroupNotFound(_)
                | EngineError::DictionaryNotFound(_)
                | EngineError::EntryNotFound { .. }
        )
    }
}
