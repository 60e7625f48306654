//! The dictionary catalog and its persisted configuration.
//!
//! Everything the user can change lives in YAML files under the app
//! resources root: preferences, the dictionary list, groups, the
//! dictionary↔group junction table, lookup history, and miscellaneous knobs.
//! Missing files are created with defaults; every mutation saves its file
//! immediately, so the process can be killed at any point without losing
//! catalog state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::lang::ChinesePreference;
use crate::text::css_safe_id;

pub const DEFAULT_GROUP: &str = "Default Group";
pub const DEFAULT_PORT: u16 = 2628;

/// ISO-639-1 codes accepted as group language tags.
pub const LANGS: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

const DEFAULT_PREFERENCES: &str = "listening_address: 127.0.0.1
port: 2628
suggestions_mode: right-side # instantaneous
# suggestions_mode: both-sides # needs the n-gram table, slower
running_mode: normal # suitable for running locally
# running_mode: preparation # use before deploying to a server
# running_mode: server # for a resource-constrained environment
chinese_preference: none
# chinese_preference: cn
# chinese_preference: tw
ngram_stores_keys: false
";

// ---------------------------------------------------------------------------
// Persisted types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DictionaryFormat {
    #[serde(rename = "MDict (.mdx)")]
    Mdx,
    #[serde(rename = "StarDict (.ifo)")]
    StarDict,
    #[serde(rename = "DSL (.dsl/.dsl.dz)")]
    Dsl,
}

impl DictionaryFormat {
    pub fn all() -> &'static [&'static str] {
        &["MDict (.mdx)", "StarDict (.ifo)", "DSL (.dsl/.dsl.dz)"]
    }

    /// Detect the format from a file name, or `None` for non-dictionaries.
    pub fn detect(path: &Path) -> Option<DictionaryFormat> {
        let name = path.file_name()?.to_str()?;
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".mdx") {
            Some(DictionaryFormat::Mdx)
        } else if lower.ends_with(".ifo") {
            Some(DictionaryFormat::StarDict)
        } else if lower.ends_with(".dsl") || lower.ends_with(".dsl.dz") {
            Some(DictionaryFormat::Dsl)
        } else {
            None
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DictionaryInfo {
    #[serde(rename = "dictionary_display_name")]
    pub display_name: String,
    /// Stable catalog id; also a valid CSS identifier and path segment.
    #[serde(rename = "dictionary_name")]
    pub name: String,
    #[serde(rename = "dictionary_format")]
    pub format: DictionaryFormat,
    #[serde(rename = "dictionary_filename")]
    pub filename: PathBuf,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    #[serde(default)]
    pub lang: BTreeSet<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SuggestionsMode {
    #[serde(rename = "right-side")]
    RightSide,
    #[serde(rename = "both-sides")]
    BothSides,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    Normal,
    Preparation,
    Server,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preferences {
    pub listening_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub suggestions_mode: SuggestionsMode,
    pub running_mode: RunningMode,
    #[serde(default)]
    pub chinese_preference: ChinesePreference,
    /// Whether the n-gram rebuild also indexes headword substrings.
    #[serde(default)]
    pub ngram_stores_keys: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiscConfigs {
    pub history_size: usize,
    pub sources: Vec<PathBuf>,
    pub num_suggestions: usize,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Paths {
    pub resources_root: PathBuf,
    pub cache_root: PathBuf,
}

impl Paths {
    /// Default locations seeded from `HOME` (falling back to `/tmp`).
    pub fn from_home() -> Paths {
        match std::env::var_os("HOME") {
            Some(home) => {
                let home = PathBuf::from(home);
                Paths {
                    resources_root: home.join(".dictserve"),
                    cache_root: home.join(".cache").join("dictserve"),
                }
            }
            None => Paths {
                resources_root: PathBuf::from("/tmp/dictserve"),
                cache_root: PathBuf::from("/tmp/dictserve/cache"),
            },
        }
    }

    pub fn new(resources_root: PathBuf, cache_root: PathBuf) -> Paths {
        Paths { resources_root, cache_root }
    }

    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.resources_root)?;
        std::fs::create_dir_all(&self.cache_root)?;
        std::fs::create_dir_all(self.default_source_dir())?;
        Ok(())
    }

    pub fn default_source_dir(&self) -> PathBuf {
        self.resources_root.join("source")
    }

    pub fn index_db(&self) -> PathBuf {
        self.resources_root.join("dictionaries.db")
    }

    /// Per-dictionary resource cache directory.
    pub fn dictionary_cache(&self, name: &str) -> PathBuf {
        self.cache_root.join(name)
    }

    fn file(&self, name: &str) -> PathBuf {
        self.resources_root.join(name)
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub struct Settings {
    pub paths: Paths,
    pub preferences: Preferences,
    pub dictionaries: Vec<DictionaryInfo>,
    pub groups: Vec<GroupInfo>,
    /// `dictionary name → groups it belongs to`.
    pub junction: BTreeMap<String, BTreeSet<String>>,
    /// Most-recent-first lookup history.
    pub history: Vec<String>,
    pub misc: MiscConfigs,
    /// `dictionary name → source file mtime at ingestion`.
    pub metadata: BTreeMap<String, u64>,
}

impl Settings {
    pub fn load(paths: Paths) -> Result<Settings> {
        paths.ensure()?;

        let preferences_file = paths.file("preferences.yaml");
        if !preferences_file.is_file() {
            std::fs::write(&preferences_file, DEFAULT_PREFERENCES)?;
        }
        let preferences: Preferences =
            serde_yaml::from_str(&std::fs::read_to_string(&preferences_file)?)
                .map_err(|e| EngineError::Config(format!("preferences.yaml: {e}")))?;

        let dictionaries: Vec<DictionaryInfo> =
            load_or_default(&paths.file("dictionaries.yaml"), Vec::new)?;
        let groups: Vec<GroupInfo> = load_or_default(&paths.file("groups.yaml"), || {
            vec![GroupInfo { name: DEFAULT_GROUP.to_string(), lang: BTreeSet::new() }]
        })?;
        let mut junction: BTreeMap<String, BTreeSet<String>> =
            load_or_default(&paths.file("junction_table.yaml"), BTreeMap::new)?;
        let history: Vec<String> = load_or_default(&paths.file("history.yaml"), Vec::new)?;
        let misc: MiscConfigs = load_or_default(&paths.file("misc.yaml"), || MiscConfigs {
            history_size: 100,
            sources: vec![paths.default_source_dir()],
            num_suggestions: 10,
        })?;
        let metadata: BTreeMap<String, u64> =
            load_or_default(&paths.file("dictionary_metadata.yaml"), BTreeMap::new)?;

        // Every dictionary must belong to at least one group.
        let mut junction_dirty = false;
        for info in &dictionaries {
            junction.entry(info.name.clone()).or_insert_with(|| {
                junction_dirty = true;
                BTreeSet::from([DEFAULT_GROUP.to_string()])
            });
        }

        let mut settings = Settings {
            paths,
            preferences,
            dictionaries,
            groups,
            junction,
            history,
            misc,
            metadata,
        };
        if junction_dirty {
            settings.save_junction()?;
        }
        Ok(settings)
    }

    // -- persistence --------------------------------------------------------

    fn save_yaml<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let text = serde_yaml::to_string(value)
            .map_err(|e| EngineError::Config(format!("{name}: {e}")))?;
        std::fs::write(self.paths.file(name), text)?;
        Ok(())
    }

    fn save_dictionaries(&mut self) -> Result<()> {
        // DSL sources are recompressed during ingestion; keep filenames in
        // sync with the `.dz` on disk.
        for info in &mut self.dictionaries {
            if info.format == DictionaryFormat::Dsl {
                let name = info.filename.to_string_lossy().into_owned();
                if !name.ends_with(".dz") {
                    info.filename = PathBuf::from(format!("{name}.dz"));
                }
            }
        }
        let dictionaries = self.dictionaries.clone();
        self.save_yaml("dictionaries.yaml", &dictionaries)
    }

    fn save_groups(&self) -> Result<()> {
        self.save_yaml("groups.yaml", &self.groups)
    }

    fn save_junction(&self) -> Result<()> {
        self.save_yaml("junction_table.yaml", &self.junction)
    }

    fn save_history(&self) -> Result<()> {
        self.save_yaml("history.yaml", &self.history)
    }

    fn save_misc(&self) -> Result<()> {
        self.save_yaml("misc.yaml", &self.misc)
    }

    fn save_metadata(&self) -> Result<()> {
        self.save_yaml("dictionary_metadata.yaml", &self.metadata)
    }

    // -- dictionaries -------------------------------------------------------

    pub fn dictionary_info_valid(&self, info: &DictionaryInfo) -> bool {
        info.filename.is_file()
            && DictionaryFormat::detect(&info.filename) == Some(info.format)
            && !self.dictionaries.iter().any(|d| d.name == info.name)
    }

    pub fn add_dictionary(&mut self, info: DictionaryInfo, groups: Option<BTreeSet<String>>) -> Result<()> {
        let name = info.name.clone();
        self.dictionaries.push(info);
        self.save_dictionaries()?;
        self.junction
            .insert(name.clone(), groups.unwrap_or_else(|| BTreeSet::from([DEFAULT_GROUP.to_string()])));
        self.save_junction()?;
        info!(dictionary = name.as_str(), "dictionary added");
        Ok(())
    }

    pub fn info_of_dictionary(&self, name: &str) -> Result<&DictionaryInfo> {
        self.dictionaries
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| EngineError::DictionaryNotFound(name.to_string()))
    }

    pub fn display_name_of_dictionary(&self, name: &str) -> String {
        self.dictionaries
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.display_name.clone())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn change_dictionary_display_name(&mut self, name: &str, new_display_name: &str) -> Result<()> {
        if let Some(info) = self.dictionaries.iter_mut().find(|d| d.name == name) {
            info.display_name = new_display_name.to_string();
            info!(dictionary = name, display = new_display_name, "display name changed");
            self.save_dictionaries()?;
        }
        Ok(())
    }

    /// Remove a dictionary from the catalog, its junction edges, recorded
    /// mtime, and its resource cache directory.
    pub fn remove_dictionary(&mut self, name: &str) -> Result<DictionaryInfo> {
        let position = self
            .dictionaries
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| EngineError::DictionaryNotFound(name.to_string()))?;
        let info = self.dictionaries.remove(position);
        self.save_dictionaries()?;
        self.junction.remove(name);
        self.save_junction()?;
        self.metadata.remove(name);
        self.save_metadata()?;

        let cache_dir = self.paths.dictionary_cache(name);
        if cache_dir.is_symlink() {
            let _ = std::fs::remove_file(&cache_dir);
        } else if cache_dir.is_dir() {
            let _ = std::fs::remove_dir_all(&cache_dir);
        }
        info!(dictionary = name, "dictionary removed");
        Ok(info)
    }

    /// Reorder only: the new list must contain exactly the current entries.
    pub fn reorder_dictionaries(&mut self, dictionaries: Vec<DictionaryInfo>) -> Result<()> {
        let same = self.dictionaries.len() == dictionaries.len()
            && self.dictionaries.iter().all(|d| dictionaries.contains(d));
        if !same {
            return Err(EngineError::Config(
                "modification of the dictionary list is not allowed".into(),
            ));
        }
        if self.dictionaries != dictionaries {
            self.dictionaries = dictionaries;
            self.save_dictionaries()?;
            info!("dictionaries reordered");
        }
        Ok(())
    }

    pub fn record_mtime(&mut self, name: &str, mtime: u64) -> Result<()> {
        self.metadata.insert(name.to_string(), mtime);
        self.save_metadata()
    }

    pub fn stored_mtime(&self, name: &str) -> Option<u64> {
        self.metadata.get(name).copied()
    }

    // -- groups and the junction table --------------------------------------

    pub fn group_valid(&self, group: &GroupInfo) -> bool {
        !group.name.is_empty() && group.lang.iter().all(|l| LANGS.contains(&l.as_str()))
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    pub fn group_lang(&self, name: &str) -> Result<BTreeSet<String>> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.lang.clone())
            .ok_or_else(|| EngineError::GroupNotFound(name.to_string()))
    }

    pub fn add_group(&mut self, group: GroupInfo) -> Result<()> {
        info!(group = group.name.as_str(), "group added");
        self.groups.push(group);
        self.save_groups()
    }

    pub fn remove_group_by_name(&mut self, name: &str) -> Result<()> {
        self.groups.retain(|g| g.name != name);
        for groups in self.junction.values_mut() {
            groups.remove(name);
        }
        self.save_junction()?;
        self.save_groups()?;
        info!(group = name, "group removed");
        Ok(())
    }

    pub fn change_group_name(&mut self, old: &str, new: &str) -> Result<()> {
        if let Some(group) = self.groups.iter_mut().find(|g| g.name == old) {
            group.name = new.to_string();
            self.save_groups()?;
        }
        for groups in self.junction.values_mut() {
            if groups.remove(old) {
                groups.insert(new.to_string());
            }
        }
        self.save_junction()?;
        info!(old, new, "group renamed");
        Ok(())
    }

    pub fn change_group_lang(&mut self, name: &str, lang: BTreeSet<String>) -> Result<()> {
        if let Some(group) = self.groups.iter_mut().find(|g| g.name == name) {
            group.lang = lang;
            self.save_groups()?;
        }
        Ok(())
    }

    pub fn reorder_groups(&mut self, groups: Vec<GroupInfo>) -> Result<()> {
        let same = self.groups.len() == groups.len()
            && self.groups.iter().all(|g| groups.contains(g));
        if !same {
            return Err(EngineError::Config("modification of the group list is not allowed".into()));
        }
        if self.groups != groups {
            self.groups = groups;
            self.save_groups()?;
            info!("groups reordered");
        }
        Ok(())
    }

    pub fn add_dictionary_to_group(&mut self, dictionary: &str, group: &str) -> Result<()> {
        let entry = self.junction.entry(dictionary.to_string()).or_default();
        if entry.insert(group.to_string()) {
            self.save_junction()?;
        }
        Ok(())
    }

    pub fn remove_dictionary_from_group(&mut self, dictionary: &str, group: &str) -> Result<()> {
        if let Some(groups) = self.junction.get_mut(dictionary) {
            groups.remove(group);
            self.save_junction()?;
        }
        Ok(())
    }

    pub fn dictionary_is_in_group(&self, dictionary: &str, group: &str) -> bool {
        self.junction.get(dictionary).is_some_and(|groups| groups.contains(group))
    }

    /// Dictionaries of a group, in catalog order (the junction table's keys
    /// are unordered).
    pub fn dictionaries_of_group(&self, group: &str) -> Result<Vec<String>> {
        if !self.group_exists(group) {
            return Err(EngineError::GroupNotFound(group.to_string()));
        }
        Ok(self
            .dictionaries
            .iter()
            .filter(|d| self.dictionary_is_in_group(&d.name, group))
            .map(|d| d.name.clone())
            .collect())
    }

    /// `group name → dictionaries`, for the management surface.
    pub fn dictionary_groupings(&self) -> BTreeMap<String, Vec<String>> {
        let mut groupings: BTreeMap<String, Vec<String>> =
            self.groups.iter().map(|g| (g.name.clone(), Vec::new())).collect();
        for info in &self.dictionaries {
            if let Some(groups) = self.junction.get(&info.name) {
                for group in groups {
                    if let Some(members) = groupings.get_mut(group) {
                        members.push(info.name.clone());
                    }
                }
            }
        }
        groupings
    }

    // -- sources ------------------------------------------------------------

    /// A source must be a writable directory (never a file).
    pub fn source_valid(&self, source: &Path) -> bool {
        if source.is_file() {
            return false;
        }
        if !source.is_dir() {
            return false;
        }
        let probe = source.join(".dictserve-probe");
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }

    pub fn add_source(&mut self, source: PathBuf) -> Result<()> {
        if !self.misc.sources.contains(&source) {
            info!(source = %source.display(), "source added");
            self.misc.sources.push(source);
            self.save_misc()?;
        }
        Ok(())
    }

    /// The directory itself is left untouched.
    pub fn remove_source(&mut self, source: &Path) -> Result<()> {
        if self.misc.sources.iter().any(|s| s == source) {
            self.misc.sources.retain(|s| s != source);
            self.save_misc()?;
            info!(source = %source.display(), "source removed");
        }
        Ok(())
    }

    /// Scan every source directory for dictionary files not yet in the
    /// catalog. Additive only; nothing is ever removed by a scan.
    pub fn scan_sources(&self) -> Vec<DictionaryInfo> {
        let mut found = Vec::new();
        let mut taken: BTreeSet<String> =
            self.dictionaries.iter().map(|d| d.name.clone()).collect();
        for source in self.misc.sources.clone() {
            if !source.is_dir() {
                warn!(dir = %source.display(), "skipping unreadable source directory");
                continue;
            }
            self.scan_source_dir(&source, &mut found, &mut taken);
        }
        found
    }

    fn scan_source_dir(
        &self,
        source: &Path,
        found: &mut Vec<DictionaryInfo>,
        taken: &mut BTreeSet<String>,
    ) {
        let walk = WalkBuilder::new(source)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            // Directory order is platform noise; keep the catalog
            // deterministic.
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.contains(".files") || name.as_ref() == "res" {
                    return false;
                }
                // A directory with hundreds of entries is a resource dump,
                // not a dictionary collection.
                std::fs::read_dir(entry.path()).map(|dir| dir.count()).unwrap_or(0) < 300
            })
            .build();

        for entry in walk.flatten() {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // `_abrv.dsl` companions are abbreviation sidecars, not
            // dictionaries.
            if file_name.contains("_abrv.dsl") {
                continue;
            }
            let Some(format) = DictionaryFormat::detect(&path) else {
                continue;
            };
            if self.dictionaries.iter().any(|d| d.filename == path) {
                continue;
            }
            // A DSL registered as `.dsl` reappears as `.dsl.dz` after
            // ingestion; don't offer the compressed twin again.
            if format == DictionaryFormat::Dsl {
                let twin = self.dsl_twin(&path);
                if self.dictionaries.iter().any(|d| d.filename == twin) {
                    continue;
                }
            }
            let stem = dictionary_stem(file_name);
            let name = unique_id(&stem, taken);
            taken.insert(name.clone());
            info!(dictionary = stem.as_str(), file = %path.display(), "found during scan");
            found.push(DictionaryInfo { display_name: stem, name, format, filename: path });
        }
    }

    fn dsl_twin(&self, path: &Path) -> PathBuf {
        let name = path.to_string_lossy();
        match name.strip_suffix(".dz") {
            Some(stripped) => PathBuf::from(stripped),
            None => PathBuf::from(format!("{name}.dz")),
        }
    }

    // -- history and knobs --------------------------------------------------

    pub fn add_word_to_history(&mut self, word: &str) -> Result<()> {
        self.history.retain(|w| w != word);
        self.history.insert(0, word.to_string());
        if self.history.len() > self.misc.history_size {
            self.history.truncate(self.misc.history_size);
            warn!("history size exceeded, the oldest entry is removed");
        }
        self.save_history()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear();
        self.save_history()
    }

    pub fn set_history_size(&mut self, size: usize) -> Result<()> {
        self.misc.history_size = size;
        if self.history.len() > size {
            self.history.truncate(size);
            self.save_history()?;
        }
        info!(size, "history size changed");
        self.save_misc()
    }

    pub fn set_num_suggestions(&mut self, size: usize) -> Result<()> {
        self.misc.num_suggestions = size;
        info!(size, "suggestion count changed");
        self.save_misc()
    }

    /// Flip the persisted suggestions mode after an n-gram build, so the
    /// substring stage actually runs.
    pub fn enable_both_sides_suggestions(&mut self) -> Result<()> {
        self.preferences.suggestions_mode = SuggestionsMode::BothSides;
        let file = self.paths.file("preferences.yaml");
        let text = std::fs::read_to_string(&file)?
            .replace("suggestions_mode: right-side", "# suggestions_mode: right-side")
            .replace("# suggestions_mode: both-sides", "suggestions_mode: both-sides");
        std::fs::write(&file, text)?;
        Ok(())
    }
}

fn load_or_default<T>(path: &Path, default: impl FnOnce() -> T) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    if path.is_file() {
        serde_yaml::from_str(&std::fs::read_to_string(path)?).map_err(|e| {
            EngineError::Config(format!("{}: {e}", path.display()))
        })
    } else {
        let value = default();
        let text = serde_yaml::to_string(&value)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        std::fs::write(path, text)?;
        Ok(value)
    }
}

/// Strip dictionary extensions to get the human-facing stem.
fn dictionary_stem(file_name: &str) -> String {
    for suffix in [".dsl.dz", ".dsl", ".mdx", ".MDX", ".ifo"] {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return stem.to_string();
        }
    }
    file_name.to_string()
}

/// A CSS-safe id unique within the catalog.
fn unique_id(stem: &str, taken: &BTreeSet<String>) -> String {
    let base = css_safe_id(stem);
    if !taken.contains(&base) {
        return base;
    }
    let mut i = 2;
    loop {
        let candidate = format!("{base}-{i}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("res"), dir.path().join("cache"));
        let settings = Settings::load(paths).unwrap();
        (dir, settings)
    }

    fn sample_info(dir: &Path, stem: &str) -> DictionaryInfo {
        let filename = dir.join(format!("{stem}.mdx"));
        std::fs::write(&filename, b"stub").unwrap();
        DictionaryInfo {
            display_name: stem.to_string(),
            name: css_safe_id(stem),
            format: DictionaryFormat::Mdx,
            filename,
        }
    }

    #[test]
    fn defaults_are_created_on_first_load() {
        let (dir, settings) = test_settings();
        assert!(dir.path().join("res/preferences.yaml").is_file());
        assert!(dir.path().join("res/groups.yaml").is_file());
        assert_eq!(settings.groups[0].name, DEFAULT_GROUP);
        assert_eq!(settings.misc.num_suggestions, 10);
        assert_eq!(settings.preferences.port, DEFAULT_PORT);
    }

    #[test]
    fn settings_survive_a_reload() {
        let (dir, mut settings) = test_settings();
        let info = sample_info(dir.path(), "oxford");
        settings.add_dictionary(info.clone(), None).unwrap();
        settings.add_word_to_history("cat").unwrap();

        let paths = Paths::new(dir.path().join("res"), dir.path().join("cache"));
        let reloaded = Settings::load(paths).unwrap();
        assert_eq!(reloaded.dictionaries, vec![info]);
        assert_eq!(reloaded.history, vec!["cat"]);
        assert!(reloaded.junction["d-oxford"].contains(DEFAULT_GROUP));
    }

    #[test]
    fn history_dedupes_and_caps() {
        let (_dir, mut settings) = test_settings();
        settings.set_history_size(3).unwrap();
        for word in ["a", "b", "c", "d"] {
            settings.add_word_to_history(word).unwrap();
        }
        assert_eq!(settings.history, vec!["d", "c", "b"]);
        settings.add_word_to_history("b").unwrap();
        assert_eq!(settings.history, vec!["b", "d", "c"]);
    }

    #[test]
    fn group_rename_updates_junction() {
        let (dir, mut settings) = test_settings();
        settings.add_dictionary(sample_info(dir.path(), "a"), None).unwrap();
        settings
            .add_group(GroupInfo { name: "Greek".into(), lang: BTreeSet::from(["el".into()]) })
            .unwrap();
        settings.add_dictionary_to_group("d-a", "Greek").unwrap();
        settings.change_group_name("Greek", "Hellenic").unwrap();
        assert!(settings.junction["d-a"].contains("Hellenic"));
        assert!(!settings.junction["d-a"].contains("Greek"));
    }

    #[test]
    fn group_order_follows_the_catalog() {
        let (dir, mut settings) = test_settings();
        let a = sample_info(dir.path(), "alpha");
        let b = sample_info(dir.path(), "beta");
        settings.add_dictionary(a.clone(), None).unwrap();
        settings.add_dictionary(b.clone(), None).unwrap();
        assert_eq!(
            settings.dictionaries_of_group(DEFAULT_GROUP).unwrap(),
            vec!["d-alpha", "d-beta"]
        );

        settings.reorder_dictionaries(vec![b, a]).unwrap();
        assert_eq!(
            settings.dictionaries_of_group(DEFAULT_GROUP).unwrap(),
            vec!["d-beta", "d-alpha"]
        );
    }

    #[test]
    fn scan_finds_new_dictionaries_and_is_additive() {
        let (dir, mut settings) = test_settings();
        let source = settings.paths.default_source_dir();
        std::fs::write(source.join("words.mdx"), b"x").unwrap();
        std::fs::write(source.join("notes.txt"), b"x").unwrap();
        std::fs::write(source.join("gloss_abrv.dsl"), b"x").unwrap();

        let found = settings.scan_sources();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "d-words");

        settings.add_dictionary(found[0].clone(), None).unwrap();
        // A second scan no longer offers it, and removes nothing.
        assert!(settings.scan_sources().is_empty());
        assert_eq!(settings.dictionaries.len(), 1);
    }

    #[test]
    fn scan_recurses_but_skips_resource_dirs() {
        let (_dir, settings) = test_settings();
        let source = settings.paths.default_source_dir();
        std::fs::create_dir_all(source.join("nested")).unwrap();
        std::fs::write(source.join("nested/inner.ifo"), b"x").unwrap();
        std::fs::create_dir_all(source.join("big.files")).unwrap();
        std::fs::write(source.join("big.files/pic.ifo"), b"x").unwrap();

        let found = settings.scan_sources();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "d-inner");
    }

    #[test]
    fn colliding_stems_get_numbered_ids() {
        let mut taken = BTreeSet::from(["d-words".to_string()]);
        assert_eq!(unique_id("words", &taken), "d-words-2");
        taken.insert("d-words-2".into());
        assert_eq!(unique_id("words", &taken), "d-words-3");
    }

    #[test]
    fn format_detection_handles_double_extensions() {
        assert_eq!(
            DictionaryFormat::detect(Path::new("x/dict.dsl.dz")),
            Some(DictionaryFormat::Dsl)
        );
        assert_eq!(DictionaryFormat::detect(Path::new("a.mdx")), Some(DictionaryFormat::Mdx));
        assert_eq!(DictionaryFormat::detect(Path::new("a.dz")), None);
        assert_eq!(DictionaryFormat::detect(Path::new("a.txt")), None);
    }
}
