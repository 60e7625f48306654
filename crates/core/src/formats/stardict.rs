//! Reader for StarDict dictionaries (versions 2.4.2 and 3.0.0).
//!
//! Four companion files share a basename: `.ifo` metadata, `.idx` sorted
//! index (possibly gzip-compressed), optional `.syn` synonyms, and the
//! `.dict`/`.dict.dz` article payload. Articles are typed by the `.ifo`'s
//! `sametypesequence` or by inline type bytes; the engine renders the text
//! (`m`/`t`/`y`), HTML-ish (`g`/`h`), and XDXF (`x`) kinds.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dictzip::{self, DictzipReader};
use crate::error::{EngineError, Result};
use crate::markup::stardict::StarDictHtmlCleaner;
use crate::markup::xdxf::XdxfCleaner;
use crate::markup::ARTICLE_SEPARATOR;
use crate::store::{EntryRow, IndexStore};
use crate::text::simplify;

const TEXT_TYPES: &[char] = &['m', 't', 'y'];
const HTML_TYPES: &[char] = &['g', 'h'];
const NULL_TERMINATED_TYPES: &str = "mlgtxykwhnr";

// ---------------------------------------------------------------------------
// Companion files
// ---------------------------------------------------------------------------

struct IfoFile {
    fields: HashMap<String, String>,
}

impl IfoFile {
    fn parse(path: &Path) -> Result<IfoFile> {
        let content = std::fs::read_to_string(path)?;
        let mut fields = HashMap::new();
        for line in content.lines().skip(1) {
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        match fields.get("version").map(String::as_str) {
            Some("2.4.2") => {}
            Some("3.0.0") => {
                // 3.0.0 dropped the pre-standard idxoffsetbits extension.
                fields.remove("idxoffsetbits");
            }
            other => {
                return Err(EngineError::UnsupportedVersion {
                    format: "StarDict",
                    version: other.unwrap_or("missing").to_string(),
                });
            }
        }
        Ok(IfoFile { fields })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn offset_width(&self) -> usize {
        if self.get("idxoffsetbits") == Some("64") {
            8
        } else {
            4
        }
    }
}

/// One `.idx` record: headword, payload offset, payload size.
struct IdxEntry {
    word: String,
    offset: u64,
    size: u32,
}

fn parse_idx(path: &Path, offset_width: usize) -> Result<Vec<IdxEntry>> {
    let raw = std::fs::read(path)?;
    let content = if path.extension().is_some_and(|e| e == "gz") {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|_| EngineError::CorruptStream(path.to_path_buf()))?;
        out
    } else {
        raw
    };

    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let end = content[pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| pos + i)
            .ok_or_else(|| EngineError::Decode("unterminated .idx headword".into()))?;
        let word = String::from_utf8_lossy(&content[pos..end]).into_owned();
        pos = end + 1;
        if pos + offset_width + 4 > content.len() {
            return Err(EngineError::Decode("truncated .idx record".into()));
        }
        let offset = if offset_width == 8 {
            u64::from_be_bytes(content[pos..pos + 8].try_into().unwrap())
        } else {
            u64::from(u32::from_be_bytes(content[pos..pos + 4].try_into().unwrap()))
        };
        pos += offset_width;
        let size = u32::from_be_bytes(content[pos..pos + 4].try_into().unwrap());
        pos += 4;
        entries.push(IdxEntry { word, offset, size });
    }
    Ok(entries)
}

/// `.syn` records pair an alternate spelling with the index of its canonical
/// `.idx` entry.
fn parse_syn(path: &Path) -> Result<Vec<(String, u32)>> {
    let bytes = if path.is_file() {
        std::fs::read(path)?
    } else {
        let dz = PathBuf::from(format!("{}.dz", path.display()));
        if !dz.is_file() {
            return Ok(Vec::new());
        }
        DictzipReader::open(&dz)?.read_all()?
    };

    let mut records = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let Some(end) = bytes[pos..].iter().position(|&b| b == 0).map(|i| pos + i) else {
            break;
        };
        let alt = String::from_utf8_lossy(&bytes[pos..end]).into_owned();
        pos = end + 1;
        if pos + 4 > bytes.len() {
            break;
        }
        let index = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
        pos += 4;
        records.push((alt, index));
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Split one payload slice into `(type, data)` fields.
fn parse_entry_fields(data: &[u8], sametypesequence: Option<&str>) -> Vec<(char, Vec<u8>)> {
    let mut fields = Vec::new();
    match sametypesequence {
        Some(sequence) if !sequence.is_empty() => {
            let types: Vec<char> = sequence.chars().collect();
            let mut pos = 0;
            for (i, &ty) in types.iter().enumerate() {
                let last = i == types.len() - 1;
                if NULL_TERMINATED_TYPES.contains(ty) {
                    let end = if last {
                        data.len()
                    } else {
                        data[pos..].iter().position(|&b| b == 0).map(|j| pos + j).unwrap_or(data.len())
                    };
                    fields.push((ty, data[pos..end].to_vec()));
                    pos = (end + 1).min(data.len());
                } else {
                    // Upper-case types carry an explicit size except in last
                    // position, where they run to the end.
                    if last {
                        fields.push((ty, data[pos..].to_vec()));
                        pos = data.len();
                    } else {
                        if pos + 4 > data.len() {
                            break;
                        }
                        let size =
                            u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
                        pos += 4;
                        let end = (pos + size).min(data.len());
                        fields.push((ty, data[pos..end].to_vec()));
                        pos = end;
                    }
                }
            }
        }
        _ => {
            let mut pos = 0;
            while pos < data.len() {
                let ty = data[pos] as char;
                pos += 1;
                if NULL_TERMINATED_TYPES.contains(ty) {
                    let end = data[pos..]
                        .iter()
                        .position(|&b| b == 0)
                        .map(|j| pos + j)
                        .unwrap_or(data.len());
                    fields.push((ty, data[pos..end].to_vec()));
                    pos = (end + 1).min(data.len());
                } else {
                    if pos + 4 > data.len() {
                        break;
                    }
                    let size = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
                    pos += 4;
                    let end = (pos + size).min(data.len());
                    fields.push((ty, data[pos..end].to_vec()));
                    pos = end;
                }
            }
        }
    }
    fields
}

// ---------------------------------------------------------------------------
// The reader
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Default)]
struct SynonymSidecar {
    by_headword: HashMap<String, Vec<String>>,
}

pub struct StarDictReader {
    dictionary_id: String,
    ifo_path: PathBuf,
    dict_path: PathBuf,
    sametypesequence: Option<String>,
    synonyms: SynonymSidecar,
    html_cleaner: StarDictHtmlCleaner,
    xdxf_cleaner: XdxfCleaner,
}

impl StarDictReader {
    /// Open a StarDict dictionary given its `.ifo` path. Ingestion walks the
    /// `.idx` once; the `.syn` synonym map is materialised into a sidecar
    /// beside the cache directory. A plain `.dict` payload is dictzipped on
    /// demand so later reads are random-access.
    pub fn open(
        dictionary_id: &str,
        ifo_path: &Path,
        store: &IndexStore,
        cache_dir: &Path,
    ) -> Result<StarDictReader> {
        std::fs::create_dir_all(cache_dir.parent().unwrap_or(cache_dir))?;
        let base = ifo_path.with_extension("");
        let ifo = IfoFile::parse(ifo_path)?;

        // Stems may contain dots, so extensions are appended textually.
        let mut idx_path = PathBuf::from(format!("{}.idx", base.display()));
        if !idx_path.is_file() {
            idx_path = PathBuf::from(format!("{}.idx.gz", base.display()));
        }

        let mut idx_cache: Option<Vec<IdxEntry>> = None;
        if !store.dictionary_exists(dictionary_id)? {
            let entries = parse_idx(&idx_path, ifo.offset_width())?;
            let mut session = store.write_session(dictionary_id);
            session.drop_entry_index()?;
            session.bulk_insert(entries.iter().map(|e| EntryRow {
                key: simplify(&e.word),
                word: e.word.clone(),
                offset: e.offset,
                size: e.size as i64,
            }))?;
            session.commit()?;
            session.create_entry_index()?;
            info!(dictionary = dictionary_id, entries = entries.len(), "ingested StarDict index");
            idx_cache = Some(entries);
        }

        // Synonym sidecar: alternate spellings resolved to their canonical
        // headwords. It lives beside the per-dictionary cache directory, not
        // inside it; the directory may become a symlink to the source's
        // resource folder.
        let sidecar_path = PathBuf::from(format!("{}.syn.cache", cache_dir.display()));
        let synonyms = if sidecar_path.is_file() {
            std::fs::read(&sidecar_path)
                .ok()
                .and_then(|bytes| bincode::deserialize(&bytes).ok())
                .unwrap_or_default()
        } else {
            let syn_records = parse_syn(&PathBuf::from(format!("{}.syn", base.display())))?;
            let sidecar = if syn_records.is_empty() {
                SynonymSidecar::default()
            } else {
                if idx_cache.is_none() {
                    idx_cache = Some(parse_idx(&idx_path, ifo.offset_width())?);
                }
                let entries = idx_cache.as_ref().unwrap();
                let mut by_headword: HashMap<String, Vec<String>> = HashMap::new();
                for (alt, index) in syn_records {
                    if let Some(entry) = entries.get(index as usize) {
                        by_headword.entry(entry.word.clone()).or_default().push(alt);
                    }
                }
                SynonymSidecar { by_headword }
            };
            if let Ok(bytes) = bincode::serialize(&sidecar) {
                let _ = std::fs::write(&sidecar_path, bytes);
            }
            sidecar
        };
        drop(idx_cache);

        // The payload must be seekable by chunk: compress a plain .dict once.
        let dict_dz = PathBuf::from(format!("{}.dict.dz", base.display()));
        if !dict_dz.is_file() {
            let plain = PathBuf::from(format!("{}.dict", base.display()));
            if !plain.is_file() {
                return Err(EngineError::DictionaryNotFound(format!(
                    "{} has no .dict payload",
                    dictionary_id
                )));
            }
            dictzip::compress_path(&plain, &dict_dz)?;
            std::fs::remove_file(&plain)?;
            info!(dictionary = dictionary_id, "dictzipped payload");
        }

        let source_dir = ifo_path.parent().unwrap_or(Path::new("."));
        let source_stem = base.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let html_cleaner =
            StarDictHtmlCleaner::new(dictionary_id, source_dir, source_stem, cache_dir);

        Ok(StarDictReader {
            dictionary_id: dictionary_id.to_string(),
            ifo_path: ifo_path.to_path_buf(),
            dict_path: dict_dz,
            sametypesequence: ifo.get("sametypesequence").map(str::to_string),
            synonyms,
            html_cleaner,
            xdxf_cleaner: XdxfCleaner::new(),
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.ifo_path
    }

    pub fn article_by_key(&mut self, store: &IndexStore, key: &str) -> Result<String> {
        let locations = store.get_entries(key, &self.dictionary_id)?;
        self.render(locations.into_iter().map(|l| (l.word, l.offset, l.size)).collect())
    }

    pub fn article_by_word(&mut self, store: &IndexStore, word: &str) -> Result<String> {
        let locations = store.get_entries_with_headword(word, &self.dictionary_id)?;
        self.render(locations.into_iter().map(|l| (l.word, l.offset, l.size)).collect())
    }

    fn render(&mut self, locations: Vec<(String, u64, i64)>) -> Result<String> {
        if locations.is_empty() {
            return Ok(String::new());
        }
        let mut payload = DictzipReader::open(&self.dict_path)?;
        let mut articles = Vec::new();
        for (word, offset, size) in locations {
            let data = payload.read(offset, size.max(0) as usize)?;
            for (ty, field) in parse_entry_fields(&data, self.sametypesequence.as_deref()) {
                if let Some(article) = self.render_field(ty, &field, &word)? {
                    articles.push(article);
                }
            }
        }
        Ok(articles.join(ARTICLE_SEPARATOR))
    }

    fn render_field(&self, ty: char, field: &[u8], headword: &str) -> Result<Option<String>> {
        let text = || -> Result<String> {
            String::from_utf8(field.to_vec())
                .map_err(|_| EngineError::Decode(format!("non-UTF-8 article for {headword}")))
        };
        let article = if TEXT_TYPES.contains(&ty) {
            let body = text()?.replace('\n', "<br/>");
            format!("<h3 class=\"headword\">{headword}</h3><p>{body}</p>")
        } else if HTML_TYPES.contains(&ty) {
            self.html_cleaner.clean(&text()?, headword) + &self.synonym_links(headword)
        } else if ty == 'x' {
            let html = self.xdxf_cleaner.clean(&text()?);
            self.html_cleaner.clean(&html, headword) + &self.synonym_links(headword)
        } else {
            // Binary and unhandled kinds are skipped.
            return Ok(None);
        };
        Ok(Some(article))
    }

    fn synonym_links(&self, headword: &str) -> String {
        let Some(alts) = self.synonyms.by_headword.get(headword) else {
            return String::new();
        };
        if alts.is_empty() {
            return String::new();
        }
        let links: Vec<String> = alts
            .iter()
            .map(|alt| {
                format!("<a href=\"/api/lookup/{}/{alt}\">{alt}</a>", self.dictionary_id)
            })
            .collect();
        format!("<div>Syn: {}</div>", links.join(", "))
    }
}
