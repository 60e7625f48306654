//! Reader for Lingvo DSL source dictionaries (`.dsl` / `.dsl.dz`).
//!
//! DSL is a line-oriented text format: headword lines start in column zero
//! (several consecutive headwords may share one article), body lines are
//! indented, `#` lines carry directives. Sources arrive in UTF-16-LE more
//! often than not and full of typographic noise, so ingestion normalises the
//! file once, in place with a `.old` backup, to clean UTF-8 with
//! single-space indents, then records each article's byte span. The
//! normalised file is dictzipped so article reads stay random-access.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

use crate::dictzip::{self, DictzipReader};
use crate::error::{EngineError, Result};
use crate::markup::dsl::DslConverter;
use crate::markup::{strip_non_printing, ARTICLE_SEPARATOR};
use crate::store::{EntryRow, IndexStore};
use crate::text::simplify;

pub struct DslReader {
    dictionary_id: String,
    source_path: PathBuf,
    /// Display name from the `#NAME` directive, when present.
    pub header_name: Option<String>,
    converter: DslConverter,
}

impl DslReader {
    pub fn open(
        dictionary_id: &str,
        source_path: &Path,
        store: &IndexStore,
        cache_dir: &Path,
    ) -> Result<DslReader> {
        std::fs::create_dir_all(cache_dir)?;

        let compressed = source_path.extension().is_some_and(|e| e == "dz");
        let mut final_path = if compressed {
            source_path.to_path_buf()
        } else {
            PathBuf::from(format!("{}.dz", source_path.display()))
        };
        let mut header_name = None;

        if !store.dictionary_exists(dictionary_id)? {
            // Normalisation rewrites the source; keep the original around.
            std::fs::copy(source_path, format!("{}.old", source_path.display()))?;

            let raw = if compressed {
                DictzipReader::open(source_path)?.read_all()?
            } else {
                std::fs::read(source_path)?
            };
            let text = normalise(&decode_detecting(&raw));

            let (blocks, name) = scan_blocks(&text);
            header_name = name;
            let mut session = store.write_session(dictionary_id);
            session.drop_entry_index()?;
            session.bulk_insert(blocks.iter().map(|(headword, offset, size)| EntryRow {
                key: simplify(headword),
                word: headword.clone(),
                offset: *offset,
                size: *size as i64,
            }))?;
            session.commit()?;
            session.create_entry_index()?;
            info!(dictionary = dictionary_id, entries = blocks.len(), "ingested DSL articles");

            // Persist the normalised text and recompress it; offsets in the
            // store refer to these exact bytes.
            let plain_path = if compressed {
                source_path.with_extension("")
            } else {
                source_path.to_path_buf()
            };
            std::fs::write(&plain_path, text.as_bytes())?;
            final_path = PathBuf::from(format!("{}.dz", plain_path.display()));
            dictzip::compress_path(&plain_path, &final_path)?;
            std::fs::remove_file(&plain_path)?;
        } else if !final_path.is_file() && source_path.is_file() {
            final_path = source_path.to_path_buf();
        }

        let converter = DslConverter::new(&final_path, dictionary_id, cache_dir);
        Ok(DslReader {
            dictionary_id: dictionary_id.to_string(),
            source_path: final_path,
            header_name,
            converter,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn article_by_key(&mut self, store: &IndexStore, key: &str) -> Result<String> {
        let locations = store.get_entries(key, &self.dictionary_id)?;
        let mut records = self.fetch(&locations)?;
        // Sibling headwords of one block share a body span; order by source
        // position so merged articles read like the dictionary.
        records.sort_by_key(|(_, _, offset)| *offset);
        self.convert_all(records)
    }

    pub fn article_by_word(&mut self, store: &IndexStore, word: &str) -> Result<String> {
        let locations = store.get_entries_with_headword(word, &self.dictionary_id)?;
        let records = self.fetch(&locations)?;
        self.convert_all(records)
    }

    fn fetch(
        &self,
        locations: &[crate::store::EntryLocation],
    ) -> Result<Vec<(String, String, u64)>> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let mut payload = DictzipReader::open(&self.source_path)?;
        let mut records = Vec::with_capacity(locations.len());
        for location in locations {
            let bytes = payload.read(location.offset, location.size.max(0) as usize)?;
            let text = String::from_utf8(bytes).map_err(|_| {
                EngineError::Decode(format!("non-UTF-8 DSL body for {}", location.word))
            })?;
            records.push((text, location.word.clone(), location.offset));
        }
        Ok(records)
    }

    fn convert_all(&self, records: Vec<(String, String, u64)>) -> Result<String> {
        // DSL tag conversion is the expensive part; fan it out.
        let articles: Vec<String> = records
            .par_iter()
            .map(|(text, word, _)| self.converter.convert(text, word))
            .collect();
        Ok(articles.join(ARTICLE_SEPARATOR))
    }
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Decode with a BOM sniff and the null-byte heuristic (DSL ships as
/// UTF-16-LE far more often than anything else).
fn decode_detecting(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xef, 0xbb, 0xbf]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    if bytes.starts_with(&[0xff, 0xfe]) {
        return encoding_rs::UTF_16LE.decode(bytes).0.into_owned();
    }
    if bytes.starts_with(&[0xfe, 0xff]) {
        return encoding_rs::UTF_16BE.decode(bytes).0.into_owned();
    }
    match (bytes.first(), bytes.get(1)) {
        (Some(&a), Some(&0)) if a != 0 => encoding_rs::UTF_16LE.decode(bytes).0.into_owned(),
        (Some(&0), Some(&b)) if b != 0 => encoding_rs::UTF_16BE.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Strip the BOM, the `{·}` syllable markers, and non-printing bytes, and
/// collapse leading indentation to a single space.
fn normalise(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("{·}", "");
    let text = strip_non_printing(&text);

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if body.starts_with(char::is_whitespace) && !body.trim().is_empty() {
            out.push(' ');
            out.push_str(body.trim_start());
        } else {
            out.push_str(body);
        }
        out.push_str(newline);
    }
    out
}

// ---------------------------------------------------------------------------
// Block scanning
// ---------------------------------------------------------------------------

/// Walk the normalised text, yielding `(headword, body_offset, body_size)`
/// per headword and the `#NAME` directive value. Consecutive headword lines
/// share the body that follows; a headword containing ` and ` additionally
/// indexes its parts.
fn scan_blocks(text: &str) -> (Vec<(String, u64, u64)>, Option<String>) {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }
    let total = text.len();

    let mut entries = Vec::new();
    let mut header_name = None;
    let mut i = 0;
    while i < lines.len() {
        let (_, line) = lines[i];
        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if trimmed.starts_with('#') {
            if trimmed.starts_with("#NAME") {
                let open = trimmed.find('"');
                let close = trimmed.rfind('"');
                if let (Some(open), Some(close)) = (open, close) {
                    if close > open + 1 {
                        header_name = Some(trimmed[open + 1..close].to_string());
                    }
                }
            }
            i += 1;
            continue;
        }
        if trimmed.starts_with([' ', '\t']) {
            // Stray body line without a headword; skip it.
            i += 1;
            continue;
        }

        // Consecutive headword lines share the article that follows.
        let mut headwords: Vec<String> = Vec::new();
        while i < lines.len() {
            let (_, line) = lines[i];
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() || trimmed.starts_with([' ', '\t']) {
                break;
            }
            headwords.push(trimmed.trim().to_string());
            if trimmed.contains(" and ") {
                headwords.extend(trimmed.split(" and ").map(|part| part.trim().to_string()));
            }
            i += 1;
        }

        // The body runs while lines are indented (or comments).
        let body_start = lines.get(i).map(|(offset, _)| *offset).unwrap_or(total);
        while i < lines.len() {
            let (_, line) = lines[i];
            let trimmed = line.trim_end_matches('\n');
            if trimmed.starts_with('#') || trimmed.starts_with([' ', '\t']) {
                i += 1;
            } else {
                break;
            }
        }
        let body_end = lines.get(i).map(|(offset, _)| *offset).unwrap_or(total);

        for headword in headwords {
            if !headword.is_empty() {
                entries.push((headword, body_start as u64, (body_end - body_start) as u64));
            }
        }
    }
    (entries, header_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16le_without_bom_is_detected() {
        let text = "word\n meaning\n";
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_detecting(&bytes), text);
    }

    #[test]
    fn normalise_collapses_indentation() {
        let text = "\u{feff}#NAME \"Test\"\nword\n\t\tdeep{·} body\n";
        assert_eq!(normalise(text), "#NAME \"Test\"\nword\n deep body\n");
    }

    #[test]
    fn blocks_record_body_spans() {
        let text = "#NAME \"Sample\"\nword\n line one\n line two\nnext\n body\n";
        let (entries, name) = scan_blocks(text);
        assert_eq!(name.as_deref(), Some("Sample"));
        assert_eq!(entries.len(), 2);

        let (ref headword, offset, size) = entries[0];
        assert_eq!(headword, "word");
        let body = &text[offset as usize..(offset + size) as usize];
        assert_eq!(body, " line one\n line two\n");

        let (ref next, offset, size) = entries[1];
        assert_eq!(next, "next");
        assert_eq!(&text[offset as usize..(offset + size) as usize], " body\n");
    }

    #[test]
    fn shared_bodies_index_every_headword() {
        let text = "colour\ncolor\n shared body\n";
        let (entries, _) = scan_blocks(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, entries[1].1);
        assert_eq!(entries[0].0, "colour");
        assert_eq!(entries[1].0, "color");
    }

    #[test]
    fn and_compounds_index_their_parts() {
        let text = "bread and butter\n body\n";
        let (entries, _) = scan_blocks(text);
        let words: Vec<&str> = entries.iter().map(|(w, _, _)| w.as_str()).collect();
        assert_eq!(words, vec!["bread and butter", "bread", "butter"]);
    }

    #[test]
    fn empty_line_ends_a_body() {
        let text = "word\n body\n\nother\n text\n";
        let (entries, _) = scan_blocks(text);
        assert_eq!(entries[0].0, "word");
        let body = &text[entries[0].1 as usize..(entries[0].1 + entries[0].2) as usize];
        assert_eq!(body, " body\n");
    }
}
