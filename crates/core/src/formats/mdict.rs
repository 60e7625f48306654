//! Reader for the MDict container formats (`.mdx` articles, `.mdd`
//! resources).
//!
//! An MDX file is: a UTF-16-LE XML header (engine version, text encoding,
//! style table), a key section mapping each headword to its offset in the
//! uncompressed record stream, and a sequence of compressed record blocks.
//! Entry sizes are implied by the next entry's offset; the last entry reads
//! to the end of its block. Record blocks are framed as a four-byte
//! compression tag, an adler32 of the decompressed payload, and the payload
//! itself (raw, LZO on engine versions < 2.0, or zlib).
//!
//! Engine versions ≥ 3 changed the key-section layout; their record walk is
//! supported for already-ingested dictionaries, but ingestion rejects them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::markup::html::MdxHtmlCleaner;
use crate::markup::{css::isolate_css_file, ARTICLE_SEPARATOR};
use crate::store::{EntryRow, IndexStore};
use crate::text::simplify;

const SNAPSHOT_FILE: &str = "mdx.cache";
const MDD_MARKER_FILE: &str = ".mdd-extracted";

// ---------------------------------------------------------------------------
// Shared primitives
// ---------------------------------------------------------------------------

pub(crate) fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65_521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(5_552) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum TextEncoding {
    Utf8,
    Utf16Le,
    Gb18030,
    Big5,
}

impl TextEncoding {
    fn from_header(value: &str) -> TextEncoding {
        match value.to_ascii_uppercase().as_str() {
            "UTF-16" | "UTF-16LE" => TextEncoding::Utf16Le,
            "GBK" | "GB2312" | "GB18030" => TextEncoding::Gb18030,
            "BIG5" | "BIG-5" => TextEncoding::Big5,
            _ => TextEncoding::Utf8,
        }
    }

    fn decode(self, bytes: &[u8]) -> String {
        let encoding = match self {
            TextEncoding::Utf8 => encoding_rs::UTF_8,
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE,
            TextEncoding::Gb18030 => encoding_rs::GB18030,
            TextEncoding::Big5 => encoding_rs::BIG5,
        };
        encoding.decode(bytes).0.into_owned()
    }

    /// Width of one code unit (and of the null terminator).
    fn unit(self) -> usize {
        match self {
            TextEncoding::Utf16Le => 2,
            _ => 1,
        }
    }

    /// Position of the string terminator starting at `from`.
    fn find_terminator(self, data: &[u8], from: usize) -> Option<usize> {
        match self {
            TextEncoding::Utf16Le => {
                let mut pos = from;
                while pos + 1 < data.len() {
                    if data[pos] == 0 && data[pos + 1] == 0 {
                        return Some(pos);
                    }
                    pos += 2;
                }
                None
            }
            _ => data[from..].iter().position(|&b| b == 0).map(|i| from + i),
        }
    }
}

struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(EngineError::Decode("truncated MDX section".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Section numbers widened from u32 to u64 in engine version 2.
    fn number(&mut self, wide: bool) -> Result<u64> {
        if wide {
            self.u64_be()
        } else {
            self.u32_be().map(u64::from)
        }
    }
}

fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| EngineError::Decode("bad zlib block".into()))?;
    Ok(out)
}

#[cfg(feature = "lzo")]
fn lzo_decompress(data: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let lzo = minilzo_rs::LZO::init()
        .map_err(|_| EngineError::Decode("LZO initialisation failed".into()))?;
    lzo.decompress_safe(data, decompressed_size)
        .map_err(|_| EngineError::Decode("bad LZO block".into()))
}

#[cfg(not(feature = "lzo"))]
fn lzo_decompress(_data: &[u8], _decompressed_size: usize) -> Result<Vec<u8>> {
    Err(EngineError::UnsupportedVersion {
        format: "MDX",
        version: "1.x (LZO record blocks; rebuild with the `lzo` feature)".into(),
    })
}

/// Decompress and verify one record/key block
/// (`tag ++ adler32(payload) ++ payload`).
fn decode_block(data: &[u8], expected_size: u64, path: &Path) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(EngineError::Decode("record block too short".into()));
    }
    let checksum = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let payload = &data[8..];
    let out = match data[0..4] {
        [0, 0, 0, 0] => payload.to_vec(),
        [1, 0, 0, 0] => lzo_decompress(payload, expected_size as usize)?,
        [2, 0, 0, 0] => zlib_decompress(payload)?,
        _ => return Err(EngineError::Decode("unknown record block compression".into())),
    };
    if adler32(&out) != checksum {
        return Err(EngineError::CorruptStream(path.to_path_buf()));
    }
    if expected_size > 0 && out.len() as u64 != expected_size {
        return Err(EngineError::CorruptStream(path.to_path_buf()));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Container parsing
// ---------------------------------------------------------------------------

/// The part of the parse that outlives ingestion; snapshotted per dictionary
/// so subsequent startups skip the key section entirely.
#[derive(Serialize, Deserialize)]
pub(crate) struct MdxMeta {
    pub source_path: PathBuf,
    /// Engine major version (1, 2, or 3+).
    pub version: u32,
    pub encoding: TextEncoding,
    /// File offset of the record section.
    pub record_block_offset: u64,
    pub num_entries: u64,
    pub stylesheet: String,
}

pub(crate) struct MdxFile {
    pub meta: MdxMeta,
    /// `(uncompressed_offset, headword)` in file order.
    pub key_list: Vec<(u64, String)>,
}

impl MdxFile {
    pub fn parse(path: &Path, is_resource_container: bool) -> Result<MdxFile> {
        let mut file = File::open(path)?;

        let (attrs, version) = parse_header(&mut file, path)?;
        if version >= 3 {
            return Err(EngineError::UnsupportedVersion {
                format: "MDX",
                version: format!("{version} (v3 key sections are not ingestable)"),
            });
        }
        let encrypted: u32 =
            attrs.get("Encrypted").and_then(|v| v.parse().ok()).unwrap_or(0);
        if encrypted != 0 {
            return Err(EngineError::UnsupportedVersion {
                format: "MDX",
                version: format!("{version} (encrypted, flags {encrypted})"),
            });
        }

        let encoding = if is_resource_container {
            TextEncoding::Utf16Le
        } else {
            TextEncoding::from_header(attrs.get("Encoding").map(String::as_str).unwrap_or(""))
        };
        let wide = version >= 2;

        // Key section counters.
        let counters = read_exactly(&mut file, if wide { 40 } else { 16 })?;
        if wide {
            let mut checksum = [0u8; 4];
            file.read_exact(&mut checksum)?;
            if adler32(&counters) != u32::from_be_bytes(checksum) {
                return Err(EngineError::CorruptStream(path.to_path_buf()));
            }
        }
        let mut cur = ByteCursor::new(&counters);
        let num_key_blocks = cur.number(wide)?;
        let num_entries = cur.number(wide)?;
        let key_info_decomp_size = if wide { cur.number(wide)? } else { 0 };
        let key_info_size = cur.number(wide)?;
        let key_blocks_size = cur.number(wide)?;

        // Key block index: per-block entry counts, boundary words, sizes.
        let raw_info = read_exactly(&mut file, key_info_size as usize)?;
        let info = if wide {
            let block = decode_block(&raw_info, key_info_decomp_size, path)?;
            block
        } else {
            raw_info
        };
        let block_sizes = parse_key_block_index(&info, num_key_blocks, wide, encoding)?;

        // Key blocks themselves.
        let raw_blocks = read_exactly(&mut file, key_blocks_size as usize)?;
        let record_block_offset = file.stream_position()?;

        let mut key_list = Vec::with_capacity(num_entries as usize);
        let mut cursor = ByteCursor::new(&raw_blocks);
        for (compressed_size, decompressed_size) in block_sizes {
            let block = cursor.take(compressed_size as usize)?;
            let block = decode_block(block, decompressed_size, path)?;
            parse_key_block(&block, wide, encoding, &mut key_list)?;
        }

        let stylesheet = attrs.get("StyleSheet").cloned().unwrap_or_default();
        Ok(MdxFile {
            meta: MdxMeta {
                source_path: path.to_path_buf(),
                version,
                encoding,
                record_block_offset,
                num_entries,
                stylesheet,
            },
            key_list,
        })
    }
}

/// Header: u32 length, UTF-16-LE XML attribute blob, adler32 (little-endian).
fn parse_header(file: &mut File, path: &Path) -> Result<(HashMap<String, String>, u32)> {
    let mut len = [0u8; 4];
    file.read_exact(&mut len)?;
    let header = read_exactly(file, u32::from_be_bytes(len) as usize)?;
    let mut checksum = [0u8; 4];
    file.read_exact(&mut checksum)?;
    if adler32(&header) != u32::from_le_bytes(checksum) {
        return Err(EngineError::CorruptStream(path.to_path_buf()));
    }

    let text = encoding_rs::UTF_16LE.decode(&header).0;
    let text = text.trim_end_matches('\0');
    let attr_re = Regex::new(r#"(\w+)="([^"]*)""#).unwrap();
    let mut attrs = HashMap::new();
    for caps in attr_re.captures_iter(text) {
        attrs.insert(caps[1].to_string(), unescape_xml(&caps[2]));
    }

    let version = attrs
        .get("GeneratedByEngineVersion")
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| EngineError::Decode("MDX header lacks an engine version".into()))?;
    Ok((attrs, version as u32))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn read_exactly(file: &mut File, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Walk the key block index, returning each block's
/// `(compressed_size, decompressed_size)`.
fn parse_key_block_index(
    info: &[u8],
    num_key_blocks: u64,
    wide: bool,
    encoding: TextEncoding,
) -> Result<Vec<(u64, u64)>> {
    let unit = encoding.unit();
    let text_term = if wide { 1 } else { 0 };
    let mut cur = ByteCursor::new(info);
    let mut sizes = Vec::with_capacity(num_key_blocks as usize);
    for _ in 0..num_key_blocks {
        let _entries_in_block = cur.number(wide)?;
        let head = if wide { cur.u16_be()? as usize } else { cur.u8()? as usize };
        cur.skip((head + text_term) * unit)?;
        let tail = if wide { cur.u16_be()? as usize } else { cur.u8()? as usize };
        cur.skip((tail + text_term) * unit)?;
        let compressed = cur.number(wide)?;
        let decompressed = cur.number(wide)?;
        sizes.push((compressed, decompressed));
    }
    Ok(sizes)
}

/// A decompressed key block is a run of `(offset, headword NUL)` records.
fn parse_key_block(
    block: &[u8],
    wide: bool,
    encoding: TextEncoding,
    out: &mut Vec<(u64, String)>,
) -> Result<()> {
    let number_width = if wide { 8 } else { 4 };
    let mut pos = 0;
    while pos + number_width <= block.len() {
        let offset = if wide {
            u64::from_be_bytes(block[pos..pos + 8].try_into().unwrap())
        } else {
            u64::from(u32::from_be_bytes(block[pos..pos + 4].try_into().unwrap()))
        };
        pos += number_width;
        let term = encoding
            .find_terminator(block, pos)
            .ok_or_else(|| EngineError::Decode("unterminated headword".into()))?;
        out.push((offset, encoding.decode(&block[pos..term])));
        pos = term + encoding.unit();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Record retrieval
// ---------------------------------------------------------------------------

impl MdxMeta {
    /// Fetch the raw record bytes for one `(offset, length)` location.
    /// `length < 0` reads to the end of the owning block.
    fn fetch_record(&self, file: &mut File, offset: u64, length: i64) -> Result<Vec<u8>> {
        file.seek(SeekFrom::Start(self.record_block_offset))?;
        if self.version >= 3 {
            self.fetch_record_v3(file, offset, length)
        } else {
            self.fetch_record_v1v2(file, offset, length)
        }
    }

    /// v3 record sections interleave `(decompressed, compressed)` size pairs
    /// with the block payloads.
    fn fetch_record_v3(&self, file: &mut File, offset: u64, length: i64) -> Result<Vec<u8>> {
        let num_blocks = read_u32_be(file)?;
        let mut decompressed_offset = 0u64;
        for _ in 0..num_blocks {
            let decompressed_size = u64::from(read_u32_be(file)?);
            let compressed_size = u64::from(read_u32_be(file)?);
            if decompressed_offset + decompressed_size > offset {
                let block = read_exactly(file, compressed_size as usize)?;
                let block = decode_block(&block, decompressed_size, &self.source_path)?;
                return slice_record(&block, offset - decompressed_offset, length);
            }
            decompressed_offset += decompressed_size;
            file.seek(SeekFrom::Current(compressed_size as i64))?;
        }
        Err(EngineError::Decode(format!("record offset {offset} beyond record section")))
    }

    /// v1/v2 record sections put all `(compressed, decompressed)` pairs in a
    /// leading index, followed by the blocks.
    fn fetch_record_v1v2(&self, file: &mut File, offset: u64, length: i64) -> Result<Vec<u8>> {
        let wide = self.version >= 2;
        let num_blocks = read_number(file, wide)?;
        let num_entries = read_number(file, wide)?;
        debug_assert_eq!(num_entries, self.num_entries);
        let info_size = read_number(file, wide)?;
        let _blocks_size = read_number(file, wide)?;

        let mut compressed_offset = file.stream_position()? + info_size;
        let mut decompressed_offset = 0u64;
        let mut found: Option<(u64, u64)> = None;
        for _ in 0..num_blocks {
            let compressed_size = read_number(file, wide)?;
            let decompressed_size = read_number(file, wide)?;
            if decompressed_offset + decompressed_size > offset {
                found = Some((compressed_size, decompressed_size));
                break;
            }
            decompressed_offset += decompressed_size;
            compressed_offset += compressed_size;
        }
        let Some((compressed_size, decompressed_size)) = found else {
            return Err(EngineError::Decode(format!(
                "record offset {offset} beyond record section"
            )));
        };

        file.seek(SeekFrom::Start(compressed_offset))?;
        let block = read_exactly(file, compressed_size as usize)?;
        let block = decode_block(&block, decompressed_size, &self.source_path)?;
        slice_record(&block, offset - decompressed_offset, length)
    }
}

fn slice_record(block: &[u8], start: u64, length: i64) -> Result<Vec<u8>> {
    let start = start as usize;
    if start > block.len() {
        return Err(EngineError::Decode("record offset beyond block".into()));
    }
    let end = if length > 0 {
        (start + length as usize).min(block.len())
    } else {
        block.len()
    };
    Ok(block[start..end].to_vec())
}

fn read_u32_be(file: &mut File) -> Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_number(file: &mut File, wide: bool) -> Result<u64> {
    if wide {
        let mut buf = [0u8; 8];
        file.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    } else {
        read_u32_be(file).map(u64::from)
    }
}

// ---------------------------------------------------------------------------
// The reader
// ---------------------------------------------------------------------------

pub struct MdictReader {
    dictionary_id: String,
    meta: MdxMeta,
    cleaner: MdxHtmlCleaner,
}

impl MdictReader {
    /// Open an MDX dictionary: ingest its key set if the store has no rows
    /// for it, snapshot the parsed header, and extract companion `.mdd`
    /// resource containers into the cache directory on first load.
    pub fn open(
        dictionary_id: &str,
        source_path: &Path,
        store: &IndexStore,
        cache_dir: &Path,
    ) -> Result<MdictReader> {
        std::fs::create_dir_all(cache_dir)?;
        let snapshot_path = cache_dir.join(SNAPSHOT_FILE);

        let mut meta = load_snapshot(&snapshot_path, source_path);
        if !store.dictionary_exists(dictionary_id)? {
            let parsed = MdxFile::parse(source_path, false)?;
            ingest(dictionary_id, &parsed, store)?;
            meta = Some(parsed.meta);
            save_snapshot(&snapshot_path, meta.as_ref().unwrap());
        } else if meta.is_none() {
            // Entries are present but the snapshot is missing or stale.
            let parsed = MdxFile::parse(source_path, false)?;
            meta = Some(parsed.meta);
            save_snapshot(&snapshot_path, meta.as_ref().unwrap());
        }
        let meta = meta.unwrap();

        extract_companion_resources(dictionary_id, source_path, cache_dir)?;

        let cleaner =
            MdxHtmlCleaner::new(source_path, dictionary_id, cache_dir, &meta.stylesheet);
        Ok(MdictReader { dictionary_id: dictionary_id.to_string(), meta, cleaner })
    }

    pub fn source_path(&self) -> &Path {
        &self.meta.source_path
    }

    pub fn article_by_key(&mut self, store: &IndexStore, key: &str) -> Result<String> {
        let locations = store.get_entries(key, &self.dictionary_id)?;
        self.render(locations.into_iter().map(|l| (l.offset, l.size)).collect())
    }

    pub fn article_by_word(&mut self, store: &IndexStore, word: &str) -> Result<String> {
        let locations = store.get_entries_with_headword(word, &self.dictionary_id)?;
        self.render(locations.into_iter().map(|l| (l.offset, l.size)).collect())
    }

    fn render(&self, locations: Vec<(u64, i64)>) -> Result<String> {
        let mut file = File::open(&self.meta.source_path)?;
        let mut records = Vec::with_capacity(locations.len());
        for (offset, size) in locations {
            let raw = self.meta.fetch_record(&mut file, offset, size)?;
            let text = self.meta.encoding.decode(&raw);
            records.push(text.trim_matches(['\0', ' ', '\t', '\r', '\n']).to_string());
        }
        // Markup cleaning dominates the cost; spread it across the pool.
        let cleaned: Vec<String> =
            records.par_iter().map(|record| self.cleaner.clean(record)).collect();
        Ok(cleaned.join(ARTICLE_SEPARATOR))
    }
}

fn ingest(dictionary_id: &str, parsed: &MdxFile, store: &IndexStore) -> Result<()> {
    let mut session = store.write_session(dictionary_id);
    session.drop_entry_index()?;
    let rows = parsed.key_list.iter().enumerate().map(|(i, (offset, word))| {
        let size = match parsed.key_list.get(i + 1) {
            Some((next_offset, _)) => (next_offset - offset) as i64,
            None => -1,
        };
        EntryRow { key: simplify(word), word: word.clone(), offset: *offset, size }
    });
    session.bulk_insert(rows)?;
    session.commit()?;
    session.create_entry_index()?;
    info!(dictionary = dictionary_id, entries = parsed.key_list.len(), "ingested MDX key set");
    Ok(())
}

fn load_snapshot(path: &Path, source_path: &Path) -> Option<MdxMeta> {
    let bytes = std::fs::read(path).ok()?;
    let meta: MdxMeta = bincode::deserialize(&bytes).ok()?;
    (meta.source_path == source_path).then_some(meta)
}

fn save_snapshot(path: &Path, meta: &MdxMeta) {
    if let Ok(bytes) = bincode::serialize(meta) {
        let _ = std::fs::write(path, bytes);
    }
}

/// Extract `name.mdd`, `name.1.mdd`, … into the cache directory (once),
/// normalising path separators and isolating any stylesheets.
fn extract_companion_resources(
    dictionary_id: &str,
    source_path: &Path,
    cache_dir: &Path,
) -> Result<()> {
    let marker = cache_dir.join(MDD_MARKER_FILE);
    if marker.exists() {
        return Ok(());
    }

    let mut containers = Vec::new();
    let stem = source_path.with_extension("");
    let base = stem.to_string_lossy();
    for candidate in [format!("{base}.mdd"), format!("{base}.MDD")] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            containers.push(path);
            break;
        }
    }
    let mut i = 1;
    loop {
        let path = PathBuf::from(format!("{base}.{i}.mdd"));
        if !path.is_file() {
            break;
        }
        containers.push(path);
        i += 1;
    }

    let mut extracted = 0usize;
    for container in &containers {
        extract_mdd(container, &mut |name, bytes| {
            let name = name.replace('\\', "/");
            let name = name.strip_prefix('/').unwrap_or(&name);
            if name.contains("..") {
                return Ok(());
            }
            let target = cache_dir.join(name);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, bytes)?;
            if name.ends_with(".css") {
                isolate_css_file(&target, &format!("#{dictionary_id}"))?;
            }
            extracted += 1;
            Ok(())
        })?;
    }
    if !containers.is_empty() {
        info!(dictionary = dictionary_id, files = extracted, "extracted MDD resources");
    }
    std::fs::write(&marker, b"")?;
    Ok(())
}

/// Stream every `(path, bytes)` resource out of an MDD container.
fn extract_mdd(path: &Path, sink: &mut dyn FnMut(&str, &[u8]) -> Result<()>) -> Result<()> {
    let parsed = MdxFile::parse(path, true)?;
    let meta = &parsed.meta;
    let wide = meta.version >= 2;

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(meta.record_block_offset))?;
    let num_blocks = read_number(&mut file, wide)?;
    let _num_entries = read_number(&mut file, wide)?;
    let _info_size = read_number(&mut file, wide)?;
    let _blocks_size = read_number(&mut file, wide)?;
    let mut sizes = Vec::with_capacity(num_blocks as usize);
    for _ in 0..num_blocks {
        let compressed = read_number(&mut file, wide)?;
        let decompressed = read_number(&mut file, wide)?;
        sizes.push((compressed, decompressed));
    }

    let mut entry_index = 0usize;
    let mut block_start = 0u64;
    for (compressed_size, decompressed_size) in sizes {
        let raw = read_exactly(&mut file, compressed_size as usize)?;
        let block = decode_block(&raw, decompressed_size, path)?;
        let block_end = block_start + block.len() as u64;

        while entry_index < parsed.key_list.len() {
            let (offset, ref name) = parsed.key_list[entry_index];
            if offset >= block_end {
                break;
            }
            let end = parsed
                .key_list
                .get(entry_index + 1)
                .map(|(next, _)| *next)
                .unwrap_or(block_end)
                .min(block_end);
            let slice = &block[(offset - block_start) as usize..(end - block_start) as usize];
            sink(name, slice)?;
            entry_index += 1;
        }
        block_start = block_end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_matches_known_vectors() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11e6_0398);
    }

    #[test]
    fn zlib_block_roundtrip() {
        let payload = b"hello record block".to_vec();
        let mut compressed = Vec::new();
        compressed.extend_from_slice(&[2, 0, 0, 0]);
        compressed.extend_from_slice(&adler32(&payload).to_be_bytes());
        let mut encoder =
            flate2::write::ZlibEncoder::new(&mut compressed, flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, &payload).unwrap();
        encoder.finish().unwrap();

        let out = decode_block(&compressed, payload.len() as u64, Path::new("t")).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let payload = b"data".to_vec();
        let mut block = Vec::new();
        block.extend_from_slice(&[0, 0, 0, 0]);
        block.extend_from_slice(&0xdead_beefu32.to_be_bytes());
        block.extend_from_slice(&payload);
        assert!(matches!(
            decode_block(&block, payload.len() as u64, Path::new("t")),
            Err(EngineError::CorruptStream(_))
        ));
    }

    #[test]
    fn key_blocks_parse_offsets_and_terminators() {
        let mut block = Vec::new();
        block.extend_from_slice(&0u64.to_be_bytes());
        block.extend_from_slice(b"apple\0");
        block.extend_from_slice(&42u64.to_be_bytes());
        block.extend_from_slice(b"banana\0");
        let mut out = Vec::new();
        parse_key_block(&block, true, TextEncoding::Utf8, &mut out).unwrap();
        assert_eq!(out, vec![(0, "apple".to_string()), (42, "banana".to_string())]);
    }

    #[test]
    fn utf16_terminators_are_two_bytes() {
        let mut block = Vec::new();
        block.extend_from_slice(&7u64.to_be_bytes());
        for unit in "词".encode_utf16() {
            block.extend_from_slice(&unit.to_le_bytes());
        }
        block.extend_from_slice(&[0, 0]);
        let mut out = Vec::new();
        parse_key_block(&block, true, TextEncoding::Utf16Le, &mut out).unwrap();
        assert_eq!(out, vec![(7, "词".to_string())]);
    }

    #[test]
    fn header_attributes_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.mdx");
        let xml = r#"<Dictionary GeneratedByEngineVersion="2.0" Encoding="UTF-8" Encrypted="0"/>"#;
        let utf16: Vec<u8> = xml.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(utf16.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&utf16);
        bytes.extend_from_slice(&adler32(&utf16).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let mut file = File::open(&path).unwrap();
        let (attrs, version) = parse_header(&mut file, &path).unwrap();
        assert_eq!(version, 2);
        assert_eq!(attrs.get("Encoding").unwrap(), "UTF-8");
    }
}
