//! The engine: catalog state, the index store, and one reader per loaded
//! dictionary, glued together behind a single handle the server embeds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::catalog::{DictionaryFormat, DictionaryInfo, Paths, Settings, LANGS};
use crate::error::{EngineError, Result};
use crate::formats::{DslReader, MdictReader, Reader, StarDictReader};
use crate::fts::FullTextIndex;
use crate::lang::LangOps;
use crate::resource::ResourceCache;
use crate::store::IndexStore;
use crate::transform::{builtin_transforms, ArticleTransform};

pub struct Engine {
    pub settings: Mutex<Settings>,
    pub(crate) store: Arc<IndexStore>,
    pub(crate) cache: ResourceCache,
    pub(crate) readers: DashMap<String, Arc<Mutex<Reader>>>,
    pub(crate) lang: LangOps,
    pub(crate) transforms: HashMap<String, ArticleTransform>,
    pub(crate) fts: Option<Box<dyn FullTextIndex>>,
}

impl Engine {
    /// Load settings and open every catalogued dictionary. A dictionary that
    /// fails to load is disabled (dropped from the catalog with a warning)
    /// rather than aborting startup.
    pub fn open(paths: Paths) -> Result<Engine> {
        let settings = Settings::load(paths)?;
        let store = Arc::new(IndexStore::open(&settings.paths.index_db())?);
        let lang = LangOps::load(&settings.paths.resources_root, LANGS);
        let cache = ResourceCache::new(settings.paths.cache_root.clone());

        let engine = Engine {
            settings: Mutex::new(settings),
            store,
            cache,
            readers: DashMap::new(),
            lang,
            transforms: builtin_transforms(),
            fts: None,
        };

        let infos = engine.settings.lock().unwrap().dictionaries.clone();
        for info in infos {
            if let Err(e) = engine.load_dictionary(&info) {
                warn!(
                    dictionary = info.name.as_str(),
                    error = %e,
                    "failed to load dictionary, disabling it"
                );
                let _ = engine.settings.lock().unwrap().remove_dictionary(&info.name);
                let _ = engine.store.delete_dictionary(&info.name);
            }
        }
        info!(dictionaries = engine.readers.len(), "dictionaries loaded");
        Ok(engine)
    }

    /// Install an external full-text index.
    pub fn with_fts(mut self, index: Box<dyn FullTextIndex>) -> Engine {
        self.fts = Some(index);
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Resolve a `/api/cache/` request path.
    pub fn resource_path(&self, rel_path: &str) -> Option<PathBuf> {
        self.cache.resolve(rel_path)
    }

    // -----------------------------------------------------------------------
    // Dictionary lifecycle
    // -----------------------------------------------------------------------

    fn load_dictionary(&self, info: &DictionaryInfo) -> Result<()> {
        let source = self.effective_source(info);
        if !source.is_file() {
            return Err(EngineError::DictionaryNotFound(format!(
                "{} ({})",
                info.name,
                info.filename.display()
            )));
        }

        // A changed source file invalidates the stored rows entirely.
        let mtime = file_mtime(&source);
        let stored = self.settings.lock().unwrap().stored_mtime(&info.name);
        if let (Some(stored), Some(current)) = (stored, mtime) {
            if stored != current {
                warn!(dictionary = info.name.as_str(), "source changed, re-ingesting");
                self.store.delete_dictionary(&info.name)?;
                let _ = std::fs::remove_file(
                    self.cache.dictionary_dir(&info.name).join("mdx.cache"),
                );
            }
        }

        let cache_dir = self.cache.dictionary_dir(&info.name);
        let reader = match info.format {
            DictionaryFormat::Mdx => {
                Reader::Mdx(MdictReader::open(&info.name, &source, &self.store, &cache_dir)?)
            }
            DictionaryFormat::StarDict => Reader::StarDict(StarDictReader::open(
                &info.name,
                &source,
                &self.store,
                &cache_dir,
            )?),
            DictionaryFormat::Dsl => {
                Reader::Dsl(DslReader::open(&info.name, &source, &self.store, &cache_dir)?)
            }
        };

        // Ingestion may rewrite the source (DSL recompression); track the
        // file the reader actually serves from.
        let final_source = reader.source_path().to_path_buf();
        {
            let mut settings = self.settings.lock().unwrap();
            if let Some(entry) =
                settings.dictionaries.iter_mut().find(|d| d.name == info.name)
            {
                if entry.filename != final_source {
                    entry.filename = final_source.clone();
                }
                // A filename-derived display name yields to the dictionary's
                // own #NAME directive.
                if let Reader::Dsl(ref dsl) = reader {
                    if let Some(header_name) = &dsl.header_name {
                        if info
                            .filename
                            .to_string_lossy()
                            .contains(entry.display_name.as_str())
                        {
                            entry.display_name = header_name.clone();
                        }
                    }
                }
            }
            if let Some(mtime) = file_mtime(&final_source) {
                settings.record_mtime(&info.name, mtime)?;
            }
        }

        self.readers.insert(info.name.clone(), Arc::new(Mutex::new(reader)));
        Ok(())
    }

    /// DSL sources are normalised to `.dsl.dz`; prefer the compressed twin
    /// when the catalog still references the plain file.
    fn effective_source(&self, info: &DictionaryInfo) -> PathBuf {
        if info.format == DictionaryFormat::Dsl && !info.filename.is_file() {
            let dz = PathBuf::from(format!("{}.dz", info.filename.display()));
            if dz.is_file() {
                return dz;
            }
        }
        info.filename.clone()
    }

    /// Validate and register a dictionary, then load it. Registration comes
    /// first so ingestion-time catalog updates (DSL recompression renames,
    /// `#NAME` display names) land on the stored entry; a failed load rolls
    /// the registration back.
    pub fn add_dictionary(
        &self,
        info: DictionaryInfo,
        groups: Option<std::collections::BTreeSet<String>>,
    ) -> Result<()> {
        {
            let mut settings = self.settings.lock().unwrap();
            if !settings.dictionary_info_valid(&info) {
                return Err(EngineError::Config(format!(
                    "invalid dictionary info for {}",
                    info.name
                )));
            }
            settings.add_dictionary(info.clone(), groups)?;
        }
        if let Err(e) = self.load_dictionary(&info) {
            let _ = self.settings.lock().unwrap().remove_dictionary(&info.name);
            let _ = self.store.delete_dictionary(&info.name);
            return Err(e);
        }
        Ok(())
    }

    pub fn remove_dictionary(&self, name: &str) -> Result<()> {
        self.readers.remove(name);
        self.settings.lock().unwrap().remove_dictionary(name)?;
        self.store.delete_dictionary(name)?;
        Ok(())
    }

    /// Scan the sources and register everything new. Failures are skipped so
    /// one broken file cannot poison the scan. Returns the registered count.
    pub fn scan_sources(&self) -> usize {
        let found = self.settings.lock().unwrap().scan_sources();
        let mut added = 0;
        for info in found {
            match self.add_dictionary(info.clone(), None) {
                Ok(()) => added += 1,
                Err(e) => {
                    warn!(dictionary = info.name.as_str(), error = %e, "skipping scanned dictionary");
                }
            }
        }
        added
    }

    pub fn headword_count(&self, name: &str) -> Result<u64> {
        self.store.headword_count(name)
    }

    /// Rebuild the n-gram table and flip the suggestions mode so the
    /// substring stage becomes active.
    pub fn rebuild_ngram_table(&self) -> Result<()> {
        let include_headwords = self.settings.lock().unwrap().preferences.ngram_stores_keys;
        self.store.rebuild_ngram_table(include_headwords)?;
        self.settings.lock().unwrap().enable_both_sides_suggestions()
    }
}

pub(crate) fn file_mtime(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}
