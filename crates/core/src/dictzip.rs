//! Random-access reader and writer for dictzip/idzip framed deflate streams.
//!
//! A dictzip file is a plain gzip file whose header carries a `RA` ("Random
//! Access") extra subfield listing the compressed sizes of fixed-length
//! uncompressed chunks. Chunk boundaries are full-flush points in the deflate
//! stream, so any chunk can be inflated on its own and a byte range can be
//! served without touching the rest of the file. One physical file may hold
//! several gzip members; a new member is started when the chunk table would
//! no longer fit in the 64 KiB gzip extra field.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::{Compress, Compression, Crc, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{EngineError, Result};

/// Uncompressed chunk length used by dictzip.
pub const CHUNK_LENGTH: usize = 58_315;

/// Chunk count ceiling per gzip member, bounded by the extra field size.
pub const MAX_MEMBER_CHUNKS: usize = (0xffff - 10) / 2;

/// Largest uncompressed payload a single member can describe.
pub const MAX_MEMBER_SIZE: u64 = (MAX_MEMBER_CHUNKS * CHUNK_LENGTH) as u64;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 0x08;

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

const OS_UNIX: u8 = 3;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

struct Member {
    chunk_len: usize,
    /// Uncompressed start position of this member in the whole file.
    start_pos: u64,
    start_chunk: usize,
    /// Uncompressed size, from the member's ISIZE trailer.
    size: u64,
}

/// Random-access reader over a dictzip file.
///
/// When the `RA` subfield is missing the file is still accepted: the whole
/// stream is inflated once on first read and ranges are served from memory.
pub struct DictzipReader {
    file: File,
    path: PathBuf,
    /// `(file_offset, compressed_size)` per chunk, across all members.
    chunks: Vec<(u64, u32)>,
    members: Vec<Member>,
    /// One-slot cache of the most recently inflated chunk.
    cache: Option<(usize, Vec<u8>)>,
    /// Whole-stream fallback when no `RA` subfield is present.
    fallback: Option<Vec<u8>>,
    plain_gzip: bool,
}

impl DictzipReader {
    /// Open `path`, parsing every member header into the chunk table.
    pub fn open(path: &Path) -> Result<DictzipReader> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let header = read_gzip_header(&mut file, path)?;
        let Some(ra) = header.ra_subfield else {
            return Ok(DictzipReader {
                file,
                path: path.to_path_buf(),
                chunks: Vec::new(),
                members: Vec::new(),
                cache: None,
                fallback: None,
                plain_gzip: true,
            });
        };

        let mut reader = DictzipReader {
            file,
            path: path.to_path_buf(),
            chunks: Vec::new(),
            members: Vec::new(),
            cache: None,
            fallback: None,
            plain_gzip: false,
        };
        let mut stream_end = reader.add_member(header.data_offset, ra)?;

        // Walk the remaining members. Each trailer read verifies the stream
        // ends with the expected empty block before the CRC32/ISIZE pair.
        while stream_end < file_len {
            reader.file.seek(SeekFrom::Start(stream_end))?;
            let header = read_gzip_header(&mut reader.file, path)?;
            let ra = header
                .ra_subfield
                .ok_or_else(|| EngineError::CorruptStream(path.to_path_buf()))?;
            stream_end = reader.add_member(header.data_offset, ra)?;
        }

        Ok(reader)
    }

    /// Whether the file carries the random-access chunk table.
    pub fn is_random_access(&self) -> bool {
        !self.plain_gzip
    }

    /// Total uncompressed size. For plain-gzip fallback files this forces the
    /// whole stream to be inflated.
    pub fn uncompressed_size(&mut self) -> Result<u64> {
        if self.plain_gzip {
            return Ok(self.fallback_data()?.len() as u64);
        }
        Ok(self.members.last().map(|m| m.start_pos + m.size).unwrap_or(0))
    }

    /// Read `len` bytes starting at `offset` in the uncompressed stream.
    /// Returns fewer bytes when the range crosses EOF.
    pub fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if self.plain_gzip {
            let data = self.fallback_data()?;
            let start = (offset as usize).min(data.len());
            let end = start.saturating_add(len).min(data.len());
            return Ok(data[start..end].to_vec());
        }

        let Some((mut chunk_index, prefix)) = self.locate(offset) else {
            return Ok(Vec::new());
        };

        let mut buf: Vec<u8> = Vec::with_capacity(prefix + len);
        while buf.len() < prefix + len && chunk_index < self.chunks.len() {
            let chunk = self.read_chunk(chunk_index)?;
            buf.extend_from_slice(&chunk);
            chunk_index += 1;
        }

        let start = prefix.min(buf.len());
        let end = (prefix + len).min(buf.len());
        Ok(buf[start..end].to_vec())
    }

    /// Read the whole uncompressed stream.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let size = self.uncompressed_size()?;
        self.read(0, size as usize)
    }

    fn fallback_data(&mut self) -> Result<&Vec<u8>> {
        if self.fallback.is_none() {
            self.file.seek(SeekFrom::Start(0))?;
            let mut data = Vec::new();
            let mut decoder = flate2::read::MultiGzDecoder::new(&mut self.file);
            decoder
                .read_to_end(&mut data)
                .map_err(|_| EngineError::CorruptStream(self.path.clone()))?;
            self.fallback = Some(data);
        }
        Ok(self.fallback.as_ref().unwrap())
    }

    /// Map an uncompressed position to `(chunk_index, offset_within_chunk)`.
    fn locate(&self, pos: u64) -> Option<(usize, usize)> {
        let member = self.members.iter().find(|m| pos < m.start_pos + m.size)?;
        let in_member = pos - member.start_pos;
        let chunk = member.start_chunk + (in_member / member.chunk_len as u64) as usize;
        Some((chunk, (in_member % member.chunk_len as u64) as usize))
    }

    fn read_chunk(&mut self, index: usize) -> Result<Vec<u8>> {
        if let Some((cached_index, data)) = &self.cache {
            if *cached_index == index {
                return Ok(data.clone());
            }
        }

        let (offset, zlen) = self.chunks[index];
        self.file.seek(SeekFrom::Start(offset))?;
        let mut compressed = vec![0u8; zlen as usize];
        self.file.read_exact(&mut compressed)?;

        let data = inflate_raw(&compressed, CHUNK_LENGTH)
            .map_err(|_| EngineError::CorruptStream(self.path.clone()))?;
        self.cache = Some((index, data.clone()));
        Ok(data)
    }

    /// Register the member whose chunk table starts at `data_offset`, then
    /// verify its trailer. Returns the file offset just past the member.
    fn add_member(&mut self, data_offset: u64, ra: RaSubfield) -> Result<u64> {
        let start_chunk = self.chunks.len();
        let mut offset = data_offset;
        for zlen in &ra.zlengths {
            self.chunks.push((offset, u32::from(*zlen)));
            offset += u64::from(*zlen);
        }

        let (member_end, isize) = self.read_member_trailer(offset)?;
        let start_pos = self.members.last().map(|m| m.start_pos + m.size).unwrap_or(0);
        self.members.push(Member {
            chunk_len: ra.chunk_len as usize,
            start_pos,
            start_chunk,
            size: isize,
        });
        Ok(member_end)
    }

    /// After the last chunk the deflate stream must close with an empty final
    /// block, followed by CRC32 and ISIZE. Any decompressible payload in the
    /// terminator is data the chunk table does not describe.
    fn read_member_trailer(&mut self, pos: u64) -> Result<(u64, u64)> {
        self.file.seek(SeekFrom::Start(pos))?;
        let mut buf = [0u8; 64];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let mut decomp = Decompress::new(false);
        let mut out: Vec<u8> = Vec::with_capacity(16);
        loop {
            let consumed = decomp.total_in() as usize;
            if consumed >= filled {
                return Err(EngineError::CorruptStream(self.path.clone()));
            }
            let status = decomp
                .decompress_vec(&buf[consumed..filled], &mut out, FlushDecompress::None)
                .map_err(|_| EngineError::CorruptStream(self.path.clone()))?;
            if decomp.total_out() > 0 {
                return Err(EngineError::TrailingData(self.path.clone()));
            }
            if status == Status::StreamEnd {
                break;
            }
        }

        let terminator_len = decomp.total_in();
        let trailer_pos = pos + terminator_len;
        if trailer_pos + 8 > pos + filled as u64 {
            return Err(EngineError::CorruptStream(self.path.clone()));
        }
        let isize_start = (terminator_len + 4) as usize;
        let isize = u32::from_le_bytes(buf[isize_start..isize_start + 4].try_into().unwrap());
        Ok((trailer_pos + 8, u64::from(isize)))
    }
}

// ---------------------------------------------------------------------------
// Gzip header parsing
// ---------------------------------------------------------------------------

struct RaSubfield {
    chunk_len: u16,
    zlengths: Vec<u16>,
}

struct GzipHeader {
    /// File offset of the first deflate byte.
    data_offset: u64,
    ra_subfield: Option<RaSubfield>,
}

fn read_gzip_header(file: &mut File, path: &Path) -> Result<GzipHeader> {
    let corrupt = || EngineError::CorruptStream(path.to_path_buf());

    let mut fixed = [0u8; 10];
    file.read_exact(&mut fixed).map_err(|_| corrupt())?;
    if fixed[0..2] != GZIP_MAGIC || fixed[2] != METHOD_DEFLATE {
        return Err(corrupt());
    }
    let flags = fixed[3];
    if flags & FRESERVED != 0 {
        return Err(corrupt());
    }

    let mut ra_subfield = None;
    if flags & FEXTRA != 0 {
        let xlen = read_u16_le(file).map_err(|_| corrupt())?;
        let mut extra = vec![0u8; xlen as usize];
        file.read_exact(&mut extra).map_err(|_| corrupt())?;
        ra_subfield = parse_ra_subfield(&extra, path)?;
    }
    if flags & FNAME != 0 {
        skip_cstring(file)?;
    }
    if flags & FCOMMENT != 0 {
        skip_cstring(file)?;
    }
    if flags & FHCRC != 0 {
        let mut crc = [0u8; 2];
        file.read_exact(&mut crc).map_err(|_| corrupt())?;
    }

    Ok(GzipHeader { data_offset: file.stream_position()?, ra_subfield })
}

/// The extra field holds `(sub_id, len, data)` records; dictzip contributes a
/// single `RA` record: version, chunk length, chunk count, then `count`
/// 16-bit compressed chunk sizes.
fn parse_ra_subfield(extra: &[u8], path: &Path) -> Result<Option<RaSubfield>> {
    let corrupt = || EngineError::CorruptStream(path.to_path_buf());

    let mut pos = 0usize;
    while pos + 4 <= extra.len() {
        let sub_id = &extra[pos..pos + 2];
        let len = u16::from_le_bytes(extra[pos + 2..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + len > extra.len() {
            return Err(corrupt());
        }
        if sub_id == b"RA" {
            let field = &extra[pos..pos + len];
            if field.len() < 6 {
                return Err(corrupt());
            }
            let version = u16::from_le_bytes(field[0..2].try_into().unwrap());
            if version != 1 {
                return Err(corrupt());
            }
            let chunk_len = u16::from_le_bytes(field[2..4].try_into().unwrap());
            let chunk_count = u16::from_le_bytes(field[4..6].try_into().unwrap()) as usize;
            if field.len() < 6 + chunk_count * 2 {
                return Err(corrupt());
            }
            let zlengths = (0..chunk_count)
                .map(|i| u16::from_le_bytes(field[6 + i * 2..8 + i * 2].try_into().unwrap()))
                .collect();
            return Ok(Some(RaSubfield { chunk_len, zlengths }));
        }
        pos += len;
    }
    Ok(None)
}

fn read_u16_le(file: &mut File) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    file.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn skip_cstring(file: &mut File) -> Result<()> {
    let mut byte = [0u8; 1];
    loop {
        let n = file.read(&mut byte)?;
        if n == 0 || byte[0] == 0 {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Inflate helpers
// ---------------------------------------------------------------------------

/// Inflate a raw-deflate fragment (a single full-flushed chunk).
fn inflate_raw(compressed: &[u8], size_hint: usize) -> std::result::Result<Vec<u8>, ()> {
    let mut decomp = Decompress::new(false);
    let mut out: Vec<u8> = Vec::with_capacity(size_hint);
    loop {
        let consumed = decomp.total_in() as usize;
        if consumed >= compressed.len() {
            return Ok(out);
        }
        if out.len() == out.capacity() {
            out.reserve(4096);
        }
        let before_out = decomp.total_out();
        let status = decomp
            .decompress_vec(&compressed[consumed..], &mut out, FlushDecompress::None)
            .map_err(|_| ())?;
        if status == Status::StreamEnd {
            return Ok(out);
        }
        if decomp.total_in() as usize == consumed && decomp.total_out() == before_out {
            return Err(());
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Compress `in_size` bytes from `input` into a dictzip stream on `output`.
/// Only the first member carries the original basename and mtime.
pub fn compress<R: Read, W: Write + Seek>(
    input: &mut R,
    in_size: u64,
    output: &mut W,
    basename: Option<&str>,
    mtime: u64,
) -> Result<()> {
    compress_members(input, in_size, output, basename, mtime, MAX_MEMBER_SIZE)
}

/// Compress `src` into `dst` (`<src>.dz` convention is the caller's choice),
/// carrying the source basename and mtime in the first member header.
pub fn compress_path(src: &Path, dst: &Path) -> Result<()> {
    let meta = std::fs::metadata(src)?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let basename = src.file_name().and_then(|n| n.to_str()).map(str::to_owned);

    let mut input = File::open(src)?;
    let mut output = File::create(dst)?;
    compress(&mut input, meta.len(), &mut output, basename.as_deref(), mtime)?;
    output.flush()?;
    Ok(())
}

fn compress_members<R: Read, W: Write + Seek>(
    input: &mut R,
    in_size: u64,
    output: &mut W,
    basename: Option<&str>,
    mtime: u64,
    max_member_size: u64,
) -> Result<()> {
    let mut remaining = in_size;
    let mut first = true;
    loop {
        let member_size = remaining.min(max_member_size);
        let name = if first { basename } else { None };
        let member_mtime = if first { mtime } else { 0 };
        write_member(input, member_size, output, name, member_mtime)?;
        first = false;
        remaining -= member_size;
        if remaining == 0 {
            return Ok(());
        }
    }
}

fn write_member<R: Read, W: Write + Seek>(
    input: &mut R,
    member_size: u64,
    output: &mut W,
    basename: Option<&str>,
    mtime: u64,
) -> Result<()> {
    let zlengths_pos = write_member_header(output, member_size, basename, mtime)?;
    let zlengths = write_member_data(input, member_size, output)?;

    // Patch the compressed chunk sizes into the reserved header slots.
    let end_pos = output.stream_position()?;
    output.seek(SeekFrom::Start(zlengths_pos))?;
    for zlen in &zlengths {
        output.write_all(&zlen.to_le_bytes())?;
    }
    output.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

fn chunk_count(in_size: u64) -> usize {
    (in_size.div_ceil(CHUNK_LENGTH as u64)) as usize
}

fn write_member_header<W: Write + Seek>(
    output: &mut W,
    in_size: u64,
    basename: Option<&str>,
    mtime: u64,
) -> Result<u64> {
    let mut flags = FEXTRA;
    if basename.is_some() {
        flags |= FNAME;
    }
    output.write_all(&GZIP_MAGIC)?;
    output.write_all(&[METHOD_DEFLATE, flags])?;
    // An mtime that does not fit the 32-bit field is written as undefined.
    let mtime32 = if mtime > u64::from(u32::MAX) { 0 } else { mtime as u32 };
    output.write_all(&mtime32.to_le_bytes())?;
    // XFL=2 marks maximum compression; OS is recorded as unix.
    output.write_all(&[0x02, OS_UNIX])?;

    let num_chunks = chunk_count(in_size);
    let field_len = 3 * 2 + 2 * num_chunks;
    let extra_len = 2 * 2 + field_len;
    debug_assert!(extra_len <= 0xffff);
    output.write_all(&(extra_len as u16).to_le_bytes())?;
    output.write_all(b"RA")?;
    output.write_all(&(field_len as u16).to_le_bytes())?;
    output.write_all(&1u16.to_le_bytes())?;
    output.write_all(&(CHUNK_LENGTH as u16).to_le_bytes())?;
    output.write_all(&(num_chunks as u16).to_le_bytes())?;
    let zlengths_pos = output.stream_position()?;
    output.write_all(&vec![0u8; num_chunks * 2])?;

    if let Some(name) = basename {
        output.write_all(name.as_bytes())?;
        output.write_all(&[0])?;
    }
    Ok(zlengths_pos)
}

fn write_member_data<R: Read, W: Write>(
    input: &mut R,
    in_size: u64,
    output: &mut W,
) -> Result<Vec<u16>> {
    let mut comp = Compress::new(Compression::best(), false);
    let mut crc = Crc::new();
    let mut zlengths = Vec::with_capacity(chunk_count(in_size));
    let mut chunk = vec![0u8; CHUNK_LENGTH];
    let mut out_buf: Vec<u8> = Vec::with_capacity(CHUNK_LENGTH);

    let mut need = in_size;
    while need > 0 {
        let read_size = need.min(CHUNK_LENGTH as u64) as usize;
        input.read_exact(&mut chunk[..read_size])?;
        need -= read_size as u64;
        crc.update(&chunk[..read_size]);

        out_buf.clear();
        deflate_into(&mut comp, &chunk[..read_size], &mut out_buf)?;
        flush_deflate(&mut comp, &mut out_buf, FlushCompress::Full)?;
        if out_buf.len() > 0xffff {
            // A chunk whose compressed form exceeds the 16-bit size field
            // cannot be represented in the RA table.
            return Err(EngineError::Decode("incompressible dictzip chunk".into()));
        }
        output.write_all(&out_buf)?;
        zlengths.push(out_buf.len() as u16);
    }

    // Empty final block with BFINAL=1 terminates the member's deflate stream.
    out_buf.clear();
    flush_deflate(&mut comp, &mut out_buf, FlushCompress::Finish)?;
    output.write_all(&out_buf)?;
    output.write_all(&crc.sum().to_le_bytes())?;
    output.write_all(&((in_size & 0xffff_ffff) as u32).to_le_bytes())?;
    Ok(zlengths)
}

fn deflate_into(comp: &mut Compress, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let start_in = comp.total_in();
    while (comp.total_in() - start_in) < data.len() as u64 {
        let consumed = (comp.total_in() - start_in) as usize;
        out.reserve(data.len() / 2 + 64);
        comp.compress_vec(&data[consumed..], out, FlushCompress::None)
            .map_err(|e| EngineError::Decode(format!("deflate failed: {e}")))?;
    }
    Ok(())
}

fn flush_deflate(comp: &mut Compress, out: &mut Vec<u8>, flush: FlushCompress) -> Result<()> {
    loop {
        out.reserve(256);
        let before_out = comp.total_out();
        let status = comp
            .compress_vec(&[], out, flush)
            .map_err(|e| EngineError::Decode(format!("deflate flush failed: {e}")))?;
        match flush {
            FlushCompress::Finish => {
                if status == Status::StreamEnd {
                    return Ok(());
                }
            }
            _ => {
                if comp.total_out() == before_out {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_data(len: usize) -> Vec<u8> {
        // Compressible but non-uniform.
        (0..len).map(|i| ((i / 7) % 251) as u8).collect()
    }

    fn roundtrip_file(data: &[u8]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.dz");
        let mut output = File::create(&path).unwrap();
        compress(&mut Cursor::new(data), data.len() as u64, &mut output, Some("sample"), 12345)
            .unwrap();
        dir
    }

    #[test]
    fn roundtrip_within_one_chunk() {
        let data = sample_data(1000);
        let dir = roundtrip_file(&data);
        let mut reader = DictzipReader::open(&dir.path().join("sample.dz")).unwrap();
        assert!(reader.is_random_access());
        assert_eq!(reader.read(0, 1000).unwrap(), data);
        assert_eq!(reader.read(100, 50).unwrap(), &data[100..150]);
    }

    #[test]
    fn roundtrip_across_chunks() {
        let data = sample_data(CHUNK_LENGTH * 2 + 777);
        let dir = roundtrip_file(&data);
        let mut reader = DictzipReader::open(&dir.path().join("sample.dz")).unwrap();
        assert_eq!(reader.uncompressed_size().unwrap(), data.len() as u64);
        // A range spanning a chunk boundary.
        let range = reader.read(CHUNK_LENGTH as u64 - 10, 40).unwrap();
        assert_eq!(range, &data[CHUNK_LENGTH - 10..CHUNK_LENGTH + 30]);
        // Reads past EOF come back short.
        let tail = reader.read(data.len() as u64 - 5, 100).unwrap();
        assert_eq!(tail, &data[data.len() - 5..]);
    }

    #[test]
    fn multiple_members_are_chained() {
        let data = sample_data(CHUNK_LENGTH * 3 + 11);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.dz");
        let mut output = File::create(&path).unwrap();
        // Force a member roll-over every chunk.
        compress_members(
            &mut Cursor::new(&data),
            data.len() as u64,
            &mut output,
            None,
            0,
            CHUNK_LENGTH as u64,
        )
        .unwrap();

        let mut reader = DictzipReader::open(&path).unwrap();
        assert_eq!(reader.members.len(), 4);
        assert_eq!(reader.read_all().unwrap(), data);
        let mid = reader.read(CHUNK_LENGTH as u64 * 2 - 3, 10).unwrap();
        assert_eq!(mid, &data[CHUNK_LENGTH * 2 - 3..CHUNK_LENGTH * 2 + 7]);
    }

    #[test]
    fn plain_gzip_falls_back_to_whole_stream() {
        let data = sample_data(4000);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, Compression::default());
        encoder.write_all(&data).unwrap();
        encoder.finish().unwrap();

        let mut reader = DictzipReader::open(&path).unwrap();
        assert!(!reader.is_random_access());
        assert_eq!(reader.read(1234, 100).unwrap(), &data[1234..1334]);
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.dz");
        std::fs::write(&path, b"this is not a gzip file at all").unwrap();
        assert!(matches!(DictzipReader::open(&path), Err(EngineError::CorruptStream(_))));
    }

    #[test]
    fn compress_path_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("words.dsl");
        let data = sample_data(500);
        std::fs::write(&src, &data).unwrap();
        let dst = dir.path().join("words.dsl.dz");
        compress_path(&src, &dst).unwrap();
        let mut reader = DictzipReader::open(&dst).unwrap();
        assert_eq!(reader.read_all().unwrap(), data);
    }
}
