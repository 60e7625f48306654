//! Fixture builders: synthesise minimal but format-correct MDX, StarDict,
//! and DSL dictionaries for end-to-end tests.

use std::io::Write;
use std::path::Path;

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65_521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in data {
        a = (a + u32::from(byte)) % MOD;
        b = (b + a) % MOD;
    }
    (b << 16) | a
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// The MDX block frame: `compression tag ++ adler32(plain) ++ zlib(plain)`.
fn frame_zlib(plain: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plain.len());
    out.extend_from_slice(&[2, 0, 0, 0]);
    out.extend_from_slice(&adler32(plain).to_be_bytes());
    out.extend_from_slice(&zlib(plain));
    out
}

/// Write a version-2.0 MDX file with the given `(headword, html)` entries.
pub fn write_mdx(path: &Path, entries: &[(&str, &str)]) {
    assert!(!entries.is_empty());

    // Record stream: every article NUL-terminated, offsets cumulative.
    let mut record_plain = Vec::new();
    let mut offsets = Vec::new();
    for (_, html) in entries {
        offsets.push(record_plain.len() as u64);
        record_plain.extend_from_slice(html.as_bytes());
        record_plain.push(0);
    }
    let record_block = frame_zlib(&record_plain);

    // One key block: `(offset, headword NUL)` records.
    let mut key_plain = Vec::new();
    for ((word, _), offset) in entries.iter().zip(&offsets) {
        key_plain.extend_from_slice(&offset.to_be_bytes());
        key_plain.extend_from_slice(word.as_bytes());
        key_plain.push(0);
    }
    let key_block = frame_zlib(&key_plain);

    // Key block index: entry count, boundary words, sizes.
    let first = entries.first().unwrap().0.as_bytes();
    let last = entries.last().unwrap().0.as_bytes();
    let mut info_plain = Vec::new();
    info_plain.extend_from_slice(&(entries.len() as u64).to_be_bytes());
    info_plain.extend_from_slice(&(first.len() as u16).to_be_bytes());
    info_plain.extend_from_slice(first);
    info_plain.push(0);
    info_plain.extend_from_slice(&(last.len() as u16).to_be_bytes());
    info_plain.extend_from_slice(last);
    info_plain.push(0);
    info_plain.extend_from_slice(&(key_block.len() as u64).to_be_bytes());
    info_plain.extend_from_slice(&(key_plain.len() as u64).to_be_bytes());
    let key_info = frame_zlib(&info_plain);

    let mut out = Vec::new();

    // Header: u32 length, UTF-16-LE XML, little-endian adler32.
    let xml = r#"<Dictionary GeneratedByEngineVersion="2.0" Format="Html" Encrypted="0" Encoding="UTF-8" Title="Fixture" Description="test fixture"/>"#;
    let header: Vec<u8> = xml.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    out.extend_from_slice(&(header.len() as u32).to_be_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&adler32(&header).to_le_bytes());

    // Key section counters plus their big-endian checksum.
    let mut counters = Vec::new();
    counters.extend_from_slice(&1u64.to_be_bytes());
    counters.extend_from_slice(&(entries.len() as u64).to_be_bytes());
    counters.extend_from_slice(&(info_plain.len() as u64).to_be_bytes());
    counters.extend_from_slice(&(key_info.len() as u64).to_be_bytes());
    counters.extend_from_slice(&(key_block.len() as u64).to_be_bytes());
    out.extend_from_slice(&counters);
    out.extend_from_slice(&adler32(&counters).to_be_bytes());
    out.extend_from_slice(&key_info);
    out.extend_from_slice(&key_block);

    // Record section: counters, block index, one block.
    out.extend_from_slice(&1u64.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u64).to_be_bytes());
    out.extend_from_slice(&16u64.to_be_bytes());
    out.extend_from_slice(&(record_block.len() as u64).to_be_bytes());
    out.extend_from_slice(&(record_block.len() as u64).to_be_bytes());
    out.extend_from_slice(&(record_plain.len() as u64).to_be_bytes());
    out.extend_from_slice(&record_block);

    std::fs::write(path, out).unwrap();
}

/// Write a StarDict 2.4.2 triple (`.ifo`, `.idx`, `.dict`) under `dir` with
/// HTML articles (`sametypesequence=h`).
pub fn write_stardict(dir: &Path, stem: &str, entries: &[(&str, &str)]) {
    let mut dict = Vec::new();
    let mut idx = Vec::new();
    for (word, html) in entries {
        let offset = dict.len() as u32;
        dict.extend_from_slice(html.as_bytes());
        idx.extend_from_slice(word.as_bytes());
        idx.push(0);
        idx.extend_from_slice(&offset.to_be_bytes());
        idx.extend_from_slice(&(html.len() as u32).to_be_bytes());
    }

    let ifo = format!(
        "StarDict's dict ifo file\nversion=2.4.2\nbookname={stem}\nwordcount={}\n\
         idxfilesize={}\nsametypesequence=h\n",
        entries.len(),
        idx.len(),
    );
    std::fs::write(dir.join(format!("{stem}.ifo")), ifo).unwrap();
    std::fs::write(dir.join(format!("{stem}.idx")), idx).unwrap();
    std::fs::write(dir.join(format!("{stem}.dict")), dict).unwrap();
}

/// Write a UTF-16-LE DSL source (the common encoding in the wild).
pub fn write_dsl(path: &Path, text: &str) {
    let mut bytes = vec![0xff, 0xfe];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}
