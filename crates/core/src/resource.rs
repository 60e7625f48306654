//! The on-disk resource cache: one namespaced directory per dictionary,
//! holding extracted images, audio, isolated stylesheets, and header
//! snapshots. Any worker may write; writes are idempotent by path.

use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct ResourceCache {
    root: PathBuf,
}

impl ResourceCache {
    pub fn new(root: PathBuf) -> ResourceCache {
        ResourceCache { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The cache directory of one dictionary (not created here; readers
    /// create it when they first need it).
    pub fn dictionary_dir(&self, dictionary: &str) -> PathBuf {
        self.root.join(dictionary)
    }

    /// Resolve a request path against the cache, rejecting traversal.
    /// Returns `None` for invalid paths and missing files alike.
    pub fn resolve(&self, rel_path: &str) -> Option<PathBuf> {
        if rel_path.is_empty()
            || rel_path.starts_with('/')
            || rel_path.split('/').any(|part| part == "..")
        {
            return None;
        }
        let full = self.root.join(rel_path);
        full.is_file().then_some(full)
    }

    /// Write one resource, creating parents. Existing content is replaced,
    /// so duplicate extraction is harmless.
    pub fn write(&self, dictionary: &str, rel_path: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.dictionary_dir(dictionary);
        let target = dir.join(rel_path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, bytes)?;
        Ok(())
    }
}
