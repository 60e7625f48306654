//! The persistent headword index.
//!
//! Two tables back every lookup path: `entries` maps a simplified key to the
//! `(offset, size)` of its article inside the source file, and `ngrams` is an
//! inverted index of length-4 key substrings used for both-sides suggestion
//! search. Writes are serialised behind a single connection; reads run
//! concurrently on a small checkout pool (WAL mode keeps them live during
//! ingestion).

use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, TryLockError};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::info;

use crate::error::{EngineError, Result};

/// Length of the substrings stored in the inverted index.
pub const NGRAM_LEN: usize = 4;

/// High-codepoint upper bound for prefix scans: `key >= k AND key < k + BOUND`
/// approximates `key LIKE 'k%'` while staying index-friendly. Keys containing
/// codepoints above U+3134A are knowingly under-covered; do not widen this
/// without re-checking collation.
const PREFIX_UPPER_BOUND: char = '\u{3134A}';

/// SQLite caps bound parameters per statement; stay well under it.
const MAX_SQL_VARS: usize = 30_000;

const READER_POOL_CAP: usize = 8;

/// A row destined for the `entries` table.
pub struct EntryRow {
    pub key: String,
    pub word: String,
    pub offset: u64,
    /// `-1` means "read to the end of the containing block".
    pub size: i64,
}

/// A located article for one headword.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLocation {
    pub word: String,
    pub offset: u64,
    pub size: i64,
}

pub struct IndexStore {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl IndexStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<IndexStore> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = open_connection(path)?;
        writer.execute_batch(
            "create table if not exists entries (
                key text,             -- simplified headword
                dictionary_name text, -- catalog id of the owning dictionary
                word text,            -- headword as it appears in the source
                offset integer,       -- position of the article in the uncompressed stream
                size integer          -- article size in bytes, -1 = to end of block
            );
            create table if not exists ngrams (
                ngram text,
                idxs text             -- comma-separated entry rowids, ascending
            );
            create table if not exists ngram_meta (
                include_headwords integer
            );",
        )?;
        Ok(IndexStore {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    fn reader(&self) -> Result<PooledConn<'_>> {
        let pooled = self.readers.lock().unwrap().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => open_connection(&self.path)?,
        };
        Ok(PooledConn { store: self, conn: Some(conn) })
    }

    fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap()
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Lock the writer for one dictionary's ingestion. The caller drives the
    /// drop-index / bulk-insert / commit / create-index sequence; the lock is
    /// held until the session is dropped.
    pub fn write_session(&self, dictionary: &str) -> WriteSession<'_> {
        WriteSession { conn: self.writer(), dictionary: dictionary.to_string(), in_tx: false }
    }

    /// Remove every trace of a dictionary. The n-gram table, when present, is
    /// rebuilt so its postings stay consistent with the entries table.
    pub fn delete_dictionary(&self, dictionary: &str) -> Result<()> {
        let conn = self.writer();
        conn.execute("delete from entries where dictionary_name = ?1", [dictionary])?;
        if let Some(include_headwords) = ngram_flag(&conn)? {
            rebuild_ngrams_on(&conn, include_headwords)?;
        }
        Ok(())
    }

    /// Rebuild the n-gram inverted index from the entries table, optionally
    /// indexing headword substrings alongside key substrings. Fails fast with
    /// `Busy` when another writer holds the store.
    pub fn rebuild_ngram_table(&self, include_headwords: bool) -> Result<()> {
        let conn = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(EngineError::Busy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        rebuild_ngrams_on(&conn, include_headwords)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Whether any entries exist for this dictionary.
    pub fn dictionary_exists(&self, dictionary: &str) -> Result<bool> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "select count(*) from entries where dictionary_name = ?1",
            [dictionary],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn headword_count(&self, dictionary: &str) -> Result<u64> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "select count(distinct word) from entries where dictionary_name = ?1",
            [dictionary],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Whether `key` exists in the given dictionary.
    pub fn exists(&self, key: &str, dictionary: &str) -> Result<bool> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "select count(*) from entries where key = ?1 and dictionary_name = ?2",
            params![key, dictionary],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether `key` exists in any of the given dictionaries.
    pub fn exists_in_any(&self, key: &str, dictionaries: &[String]) -> Result<bool> {
        if dictionaries.is_empty() {
            return Ok(false);
        }
        let conn = self.reader()?;
        let sql = format!(
            "select count(*) from entries where key = ?1 and dictionary_name in ({})",
            placeholders(dictionaries.len(), 2),
        );
        let mut values = vec![key.to_string()];
        values.extend(dictionaries.iter().cloned());
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count > 0)
    }

    /// All article locations stored for `(key, dictionary)`.
    pub fn get_entries(&self, key: &str, dictionary: &str) -> Result<Vec<EntryLocation>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare_cached(
            "select word, offset, size from entries where key = ?1 and dictionary_name = ?2",
        )?;
        let rows = stmt.query_map(params![key, dictionary], |row| {
            Ok(EntryLocation {
                word: row.get(0)?,
                offset: row.get::<_, i64>(1)? as u64,
                size: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Article locations keyed by the original headword (for FTS and anki
    /// consumers that hold the display form).
    pub fn get_entries_with_headword(
        &self,
        word: &str,
        dictionary: &str,
    ) -> Result<Vec<EntryLocation>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare_cached(
            "select word, offset, size from entries where word = ?1 and dictionary_name = ?2",
        )?;
        let rows = stmt.query_map(params![word, dictionary], |row| {
            Ok(EntryLocation {
                word: row.get(0)?,
                offset: row.get::<_, i64>(1)? as u64,
                size: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Distinct headwords whose key begins with one of `keys`, in key order,
    /// capped at `limit` across all keys.
    pub fn prefix(
        &self,
        keys: &[String],
        dictionaries: &[String],
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        if dictionaries.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.reader()?;
        let mut found: Vec<String> = Vec::new();
        for key in keys {
            if found.len() >= limit {
                break;
            }
            let upper = format!("{key}{PREFIX_UPPER_BOUND}");
            let excluded: Vec<&String> = exclude.iter().chain(found.iter()).collect();
            let sql = format!(
                "select word from entries
                 where key >= ?1 and key < ?2
                   and dictionary_name in ({})
                   and word not in ({})
                 group by word order by min(key), word limit ?{}",
                placeholders(dictionaries.len(), 3),
                placeholders(excluded.len(), 3 + dictionaries.len()),
                3 + dictionaries.len() + excluded.len(),
            );
            let mut values: Vec<Value> = vec![Value::from(key.clone()), Value::from(upper)];
            values.extend(dictionaries.iter().map(|d| Value::from(d.clone())));
            values.extend(excluded.iter().map(|w| Value::from((*w).clone())));
            values.push(Value::from((limit - found.len()) as i64));
            let mut stmt = conn.prepare(&sql)?;
            let words = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            for word in words {
                found.push(word?);
            }
        }
        Ok(found)
    }

    /// Distinct headwords whose key matches a SQL `LIKE` pattern.
    pub fn like(
        &self,
        pattern: &str,
        dictionaries: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        if dictionaries.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.reader()?;
        let sql = format!(
            "select word from entries
             where key like ?1 and dictionary_name in ({})
             group by word order by min(key), word limit ?{}",
            placeholders(dictionaries.len(), 2),
            2 + dictionaries.len(),
        );
        let mut values = vec![Value::from(pattern.to_string())];
        values.extend(dictionaries.iter().map(|d| Value::from(d.clone())));
        values.push(Value::from(limit as i64));
        let mut stmt = conn.prepare(&sql)?;
        let words = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
        Ok(words.collect::<std::result::Result<_, _>>()?)
    }

    /// Distinct headwords for an explicit key set, preserving store order.
    pub fn keys_lookup(
        &self,
        keys: &[String],
        dictionaries: &[String],
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        if keys.is_empty() || dictionaries.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.reader()?;
        let mut found: Vec<String> = Vec::new();
        let chunk_size = MAX_SQL_VARS.saturating_sub(dictionaries.len() + exclude.len() + 1).max(1);
        for chunk in keys.chunks(chunk_size) {
            if found.len() >= limit {
                break;
            }
            let excluded: Vec<&String> = exclude.iter().chain(found.iter()).collect();
            let sql = format!(
                "select distinct word from entries
                 where key in ({}) and dictionary_name in ({}) and word not in ({})
                 limit ?{}",
                placeholders(chunk.len(), 1),
                placeholders(dictionaries.len(), 1 + chunk.len()),
                placeholders(excluded.len(), 1 + chunk.len() + dictionaries.len()),
                1 + chunk.len() + dictionaries.len() + excluded.len(),
            );
            let mut values: Vec<Value> = chunk.iter().map(|k| Value::from(k.clone())).collect();
            values.extend(dictionaries.iter().map(|d| Value::from(d.clone())));
            values.extend(excluded.iter().map(|w| Value::from((*w).clone())));
            values.push(Value::from((limit - found.len()) as i64));
            let mut stmt = conn.prepare(&sql)?;
            let words = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            for word in words {
                found.push(word?);
            }
        }
        Ok(found)
    }

    /// Substring search through the n-gram index: tokenize `input` into
    /// length-4 grams, intersect their postings, resolve the surviving rowids
    /// to keys, and keep those that contain `input` contiguously. With
    /// `include_headwords` a rowid also survives when its lowercased headword
    /// contains `input`, so the result is a superset of the strict variant.
    pub fn expand_key(&self, input: &str, include_headwords: bool) -> Result<Vec<String>> {
        let grams = ngrams_of(input);
        if grams.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.reader()?;

        let mut postings: Option<Vec<i64>> = None;
        for gram in grams {
            let row: Option<String> = conn
                .query_row("select idxs from ngrams where ngram = ?1", [gram], |row| row.get(0))
                .optional()?;
            let Some(csv) = row else {
                return Ok(Vec::new());
            };
            let ids: Vec<i64> = csv.split(',').filter_map(|s| s.parse().ok()).collect();
            let merged = match postings {
                None => ids,
                Some(prev) => intersect_sorted(&prev, &ids),
            };
            if merged.is_empty() {
                return Ok(Vec::new());
            }
            postings = Some(merged);
        }

        let rowids = postings.unwrap_or_default();
        let mut keys = Vec::new();
        for chunk in rowids.chunks(MAX_SQL_VARS) {
            let sql = format!(
                "select key, word from entries where rowid in ({}) order by rowid",
                placeholders(chunk.len(), 1),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (key, word) = row?;
                let hit = key.contains(input)
                    || (include_headwords && word.to_lowercase().contains(input));
                if hit && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Write session
// ---------------------------------------------------------------------------

/// Holds the writer connection across one dictionary's ingestion sequence.
pub struct WriteSession<'a> {
    conn: MutexGuard<'a, Connection>,
    dictionary: String,
    in_tx: bool,
}

impl WriteSession<'_> {
    /// Dropping the composite index ahead of a bulk insert roughly halves
    /// ingestion time on large dictionaries.
    pub fn drop_entry_index(&self) -> Result<()> {
        self.conn.execute_batch(
            "drop index if exists idx_dictname;
             drop index if exists idx_key_dictname;",
        )?;
        Ok(())
    }

    pub fn bulk_insert<I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = EntryRow>,
    {
        if !self.in_tx {
            self.conn.execute_batch("begin")?;
            self.in_tx = true;
        }
        let mut stmt = self
            .conn
            .prepare_cached("insert into entries values (?1, ?2, ?3, ?4, ?5)")?;
        for row in rows {
            stmt.execute(params![
                row.key,
                self.dictionary,
                row.word,
                row.offset as i64,
                row.size
            ])?;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.execute_batch("commit")?;
            self.in_tx = false;
        }
        Ok(())
    }

    pub fn create_entry_index(&self) -> Result<()> {
        self.conn.execute_batch(
            "create index if not exists idx_dictname on entries (dictionary_name);
             create index if not exists idx_key_dictname on entries (key, dictionary_name, word);",
        )?;
        Ok(())
    }
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        if self.in_tx {
            // Abandoned session: roll back so a failed ingestion leaves no
            // partial dictionary behind.
            let _ = self.conn.execute_batch("rollback");
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct PooledConn<'a> {
    store: &'a IndexStore,
    conn: Option<Connection>,
}

impl Deref for PooledConn<'_> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().unwrap()
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut pool = self.store.readers.lock().unwrap();
            if pool.len() < READER_POOL_CAP {
                pool.push(conn);
            }
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    let _mode: String =
        conn.query_row("pragma journal_mode = wal", [], |row| row.get(0))?;
    conn.execute_batch("pragma synchronous = normal")?;
    Ok(conn)
}

/// `?n, ?n+1, …` placeholder list starting at 1-based index `start`.
fn placeholders(count: usize, start: usize) -> String {
    (0..count).map(|i| format!("?{}", start + i)).collect::<Vec<_>>().join(", ")
}

fn ngrams_of(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < NGRAM_LEN {
        return Vec::new();
    }
    chars.windows(NGRAM_LEN).map(|w| w.iter().collect()).collect()
}

fn intersect_sorted(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn ngram_flag(conn: &Connection) -> Result<Option<bool>> {
    let flag: Option<i64> = conn
        .query_row("select include_headwords from ngram_meta", [], |row| row.get(0))
        .optional()?;
    Ok(flag.map(|v| v != 0))
}

/// Build the postings into a shadow table, then swap it in atomically so a
/// cancelled rebuild leaves the previous index intact.
fn rebuild_ngrams_on(conn: &Connection, include_headwords: bool) -> Result<()> {
    conn.execute_batch("drop table if exists ngrams_new")?;
    conn.execute_batch("create table ngrams_new (ngram text, idxs text)")?;

    let mut postings: HashMap<String, Vec<i64>> = HashMap::new();
    {
        let mut stmt = conn.prepare("select rowid, key, word from entries order by rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (rowid, key, word) = row?;
            let mut grams = ngrams_of(&key);
            if include_headwords {
                grams.extend(ngrams_of(&word.to_lowercase()));
            }
            grams.sort();
            grams.dedup();
            for gram in grams {
                // Rowids arrive ascending, so each posting list stays sorted.
                postings.entry(gram).or_default().push(rowid);
            }
        }
    }

    conn.execute_batch("begin")?;
    {
        let mut stmt = conn.prepare("insert into ngrams_new values (?1, ?2)")?;
        for (gram, rowids) in &postings {
            let csv: Vec<String> = rowids.iter().map(i64::to_string).collect();
            stmt.execute(params![gram, csv.join(",")])?;
        }
    }
    conn.execute_batch("commit")?;

    conn.execute_batch(
        "begin;
         drop table if exists ngrams;
         alter table ngrams_new rename to ngrams;
         create index if not exists idx_ngram on ngrams (ngram);
         delete from ngram_meta;
         commit;",
    )?;
    conn.execute("insert into ngram_meta values (?1)", [include_headwords as i64])?;
    info!(ngrams = postings.len(), include_headwords, "rebuilt n-gram table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, IndexStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(&dir.path().join("dictionaries.db")).unwrap();
        (dir, store)
    }

    fn seed(store: &IndexStore, dictionary: &str, words: &[&str]) {
        let mut session = store.write_session(dictionary);
        session.drop_entry_index().unwrap();
        session
            .bulk_insert(words.iter().enumerate().map(|(i, w)| EntryRow {
                key: crate::text::simplify(w),
                word: w.to_string(),
                offset: (i * 100) as u64,
                size: 100,
            }))
            .unwrap();
        session.commit().unwrap();
        session.create_entry_index().unwrap();
    }

    #[test]
    fn exists_and_get_entries() {
        let (_dir, store) = test_store();
        seed(&store, "dict_a", &["Apple", "apple", "Banana"]);

        assert!(store.exists("apple", "dict_a").unwrap());
        assert!(!store.exists("apple", "dict_b").unwrap());
        assert!(store.exists_in_any("banana", &["dict_a".into()]).unwrap());

        // Both case variants are stored under the same simplified key.
        let entries = store.get_entries("apple", "dict_a").unwrap();
        assert_eq!(entries.len(), 2);

        let by_word = store.get_entries_with_headword("Apple", "dict_a").unwrap();
        assert_eq!(by_word.len(), 1);
        assert_eq!(by_word[0].offset, 0);
    }

    #[test]
    fn prefix_respects_order_exclusions_and_limit() {
        let (_dir, store) = test_store();
        seed(&store, "d", &["apple", "apply", "applause", "banana", "appetite"]);

        let dicts = vec!["d".to_string()];
        let hits = store.prefix(&["app".to_string()], &dicts, &[], 10).unwrap();
        assert_eq!(hits, vec!["appetite", "applause", "apple", "apply"]);

        let excluded = store
            .prefix(&["app".to_string()], &dicts, &["apple".to_string()], 10)
            .unwrap();
        assert!(!excluded.contains(&"apple".to_string()));

        let capped = store.prefix(&["app".to_string()], &dicts, &[], 2).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn like_matches_translated_wildcards() {
        let (_dir, store) = test_store();
        seed(&store, "d", &["apple", "ample", "maple"]);
        let dicts = vec!["d".to_string()];

        // ^ple → %ple
        let hits = store.like("%ple", &dicts, 10).unwrap();
        assert_eq!(hits.len(), 3);
        // a+ple → a_ple
        let hits = store.like("a_ple", &dicts, 10).unwrap();
        assert_eq!(hits, vec!["ample"]);
    }

    #[test]
    fn ngram_expansion_finds_substrings() {
        let (_dir, store) = test_store();
        seed(&store, "d", &["onomatopoeia", "astronomer", "nomad", "cat"]);
        store.rebuild_ngram_table(false).unwrap();

        let keys = store.expand_key("onom", false).unwrap();
        assert!(keys.contains(&"onomatopoeia".to_string()));
        assert!(keys.contains(&"astronomer".to_string()));
        assert!(!keys.contains(&"nomad".to_string()));

        // Too short to produce a gram.
        assert!(store.expand_key("ono", false).unwrap().is_empty());
    }

    #[test]
    fn headword_ngrams_are_a_superset() {
        let (_dir, store) = test_store();
        seed(&store, "d", &["Onomatopoeia", "metronome", "gastronomy"]);
        store.rebuild_ngram_table(true).unwrap();

        let strict = store.expand_key("onom", false).unwrap();
        let wide = store.expand_key("onom", true).unwrap();
        for key in &strict {
            assert!(wide.contains(key), "{key} missing from the headword expansion");
        }
    }

    #[test]
    fn delete_dictionary_cascades() {
        let (_dir, store) = test_store();
        seed(&store, "a", &["apple"]);
        seed(&store, "b", &["apple"]);
        store.rebuild_ngram_table(false).unwrap();

        store.delete_dictionary("a").unwrap();
        assert!(!store.dictionary_exists("a").unwrap());
        assert!(store.dictionary_exists("b").unwrap());

        // Postings no longer reference the deleted rows.
        let keys = store.expand_key("appl", false).unwrap();
        assert_eq!(keys, vec!["apple".to_string()]);
    }

    #[test]
    fn abandoned_session_rolls_back() {
        let (_dir, store) = test_store();
        {
            let mut session = store.write_session("half");
            session
                .bulk_insert(vec![EntryRow {
                    key: "word".into(),
                    word: "word".into(),
                    offset: 0,
                    size: 10,
                }])
                .unwrap();
            // Dropped without commit.
        }
        assert!(!store.dictionary_exists("half").unwrap());
    }

    #[test]
    fn headword_count_is_distinct() {
        let (_dir, store) = test_store();
        seed(&store, "d", &["Apple", "apple", "pear"]);
        assert_eq!(store.headword_count("d").unwrap(), 3);
    }
}
