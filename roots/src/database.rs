//! SQLite database layer for the lexical store
//!
//! Tables: `verses`, `translations`, `morphology` (one row per segment),
//! `word_glosses` (lazily filled gloss cache), `gloss_fetches` (verses the
//! gloss service has answered for) and the cognate tables
//! `semitic_roots` / `semitic_derivatives`.
//! Uses r2d2 connection pooling to allow concurrent reads without mutex blocking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tracing::warn;

use crate::gloss::WordGloss;
use crate::interface::{CognateEntry, Derivative};
use crate::models::{
    CognateId, CognateSource, StoredSegment, StoredVerse, VerseKey, FEATURE_COLUMNS,
};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The lexical keys of one segment, as read for index building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalRow {
    pub key: VerseKey,
    pub word_pos: u32,
    pub lemma: String,
    pub root: String,
    pub root_arabic: String,
    pub form: String,
}

const SEGMENT_COLUMNS: &str = "chapter, verse, word_pos, segment, \
     COALESCE(form_buckwalter, ''), COALESCE(form_arabic, ''), \
     COALESCE(tag, ''), COALESCE(pos, ''), \
     COALESCE(root_buckwalter, ''), COALESCE(root_arabic, ''), \
     COALESCE(lemma_buckwalter, ''), COALESCE(lemma_arabic, ''), \
     COALESCE(features_raw, ''), \
     gender, number, person, case_val, voice, mood, verb_form, state";

/// Thread-safe database wrapper using connection pooling
///
/// Everything except `word_glosses` is written once by the loader and only
/// read afterwards. WAL mode lets readers proceed while a gloss write lands.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
                PRAGMA mmap_size=67108864;
                PRAGMA cache_size=-32000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and fixtures)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
            ",
            )?;
            Ok(())
        });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS verses (
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                text_uthmani TEXT NOT NULL,
                PRIMARY KEY (chapter, verse)
            );

            CREATE TABLE IF NOT EXISTS translations (
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                text_en TEXT NOT NULL,
                PRIMARY KEY (chapter, verse)
            );

            CREATE TABLE IF NOT EXISTS morphology (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                word_pos INTEGER NOT NULL,
                segment INTEGER NOT NULL,
                form_buckwalter TEXT NOT NULL DEFAULT '',
                form_arabic TEXT NOT NULL DEFAULT '',
                tag TEXT NOT NULL DEFAULT '',
                pos TEXT NOT NULL DEFAULT '',
                root_buckwalter TEXT NOT NULL DEFAULT '',
                root_arabic TEXT NOT NULL DEFAULT '',
                lemma_buckwalter TEXT NOT NULL DEFAULT '',
                lemma_arabic TEXT NOT NULL DEFAULT '',
                features_raw TEXT NOT NULL DEFAULT '',
                gender TEXT NOT NULL DEFAULT '',
                number TEXT NOT NULL DEFAULT '',
                person TEXT NOT NULL DEFAULT '',
                case_val TEXT NOT NULL DEFAULT '',
                voice TEXT NOT NULL DEFAULT '',
                mood TEXT NOT NULL DEFAULT '',
                verb_form TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS word_glosses (
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                word_pos INTEGER NOT NULL,
                translation_en TEXT NOT NULL,
                fetched_at TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (chapter, verse, word_pos)
            );

            CREATE TABLE IF NOT EXISTS gloss_fetches (
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (chapter, verse)
            );

            CREATE TABLE IF NOT EXISTS semitic_roots (
                id INTEGER PRIMARY KEY,
                transliteration TEXT NOT NULL,
                concept TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT 'semiticroots'
            );

            CREATE TABLE IF NOT EXISTS semitic_derivatives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                root_id INTEGER NOT NULL REFERENCES semitic_roots(id) ON DELETE CASCADE,
                language TEXT NOT NULL DEFAULT '',
                word TEXT NOT NULL DEFAULT '',
                displayed_text TEXT NOT NULL DEFAULT '',
                concept TEXT NOT NULL DEFAULT '',
                meaning TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_morph_cv ON morphology(chapter, verse);
            CREATE INDEX IF NOT EXISTS idx_sr_trans ON semitic_roots(transliteration);
            CREATE INDEX IF NOT EXISTS idx_sd_root ON semitic_derivatives(root_id);
        "#,
        )?;

        Self::migrate_legacy_columns(&conn)?;
        Ok(())
    }

    /// Databases built by the first loader lack `word_glosses.fetched_at` and
    /// may lack `semitic_roots.source`. Add them in place; existing rows keep
    /// the column default.
    fn migrate_legacy_columns(conn: &rusqlite::Connection) -> DatabaseResult<()> {
        let legacy = [
            ("word_glosses", "fetched_at", "TEXT NOT NULL DEFAULT ''"),
            ("semitic_roots", "source", "TEXT NOT NULL DEFAULT 'semiticroots'"),
        ];
        for (table, column, decl) in legacy {
            let column_exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
                params![table, column],
                |row| {
                    let count: i64 = row.get(0)?;
                    Ok(count > 0)
                },
            )?;
            if !column_exists {
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, decl
                ))?;
            }
        }
        Ok(())
    }

    /// Get the database size in bytes
    pub fn database_size(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verses
    // ─────────────────────────────────────────────────────────────────────────

    pub fn count_verses(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM verses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every stored verse coordinate, in order.
    pub fn fetch_verse_keys(&self) -> DatabaseResult<Vec<VerseKey>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT chapter, verse FROM verses ORDER BY chapter, verse")?;
        let keys = stmt
            .query_map([], |row| Ok(VerseKey::new(row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// (surah, number of stored verses) for every surah with at least one verse.
    pub fn surah_verse_counts(&self) -> DatabaseResult<Vec<(u16, u16)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chapter, COUNT(*) FROM verses GROUP BY chapter ORDER BY chapter",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of stored verses in one surah.
    pub fn count_surah_verses(&self, surah: u16) -> DatabaseResult<u16> {
        let conn = self.get_conn()?;
        let count: u16 = conn.query_row(
            "SELECT COUNT(*) FROM verses WHERE chapter = ?1",
            params![surah],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn fetch_verse(&self, key: VerseKey) -> DatabaseResult<Option<StoredVerse>> {
        let conn = self.get_conn()?;
        let verse = conn
            .query_row(
                "SELECT v.chapter, v.verse, v.text_uthmani, t.text_en
                 FROM verses v LEFT JOIN translations t
                   ON v.chapter = t.chapter AND v.verse = t.verse
                 WHERE v.chapter = ?1 AND v.verse = ?2",
                params![key.surah, key.ayah],
                Self::row_to_verse,
            )
            .optional()?;
        Ok(verse)
    }

    /// Fetch several verses at once. Missing coordinates are simply absent
    /// from the map.
    pub fn fetch_verses(&self, keys: &[VerseKey]) -> DatabaseResult<HashMap<VerseKey, StoredVerse>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT v.chapter, v.verse, v.text_uthmani, t.text_en
             FROM verses v LEFT JOIN translations t
               ON v.chapter = t.chapter AND v.verse = t.verse
             WHERE v.chapter = ?1 AND v.verse = ?2",
        )?;
        let mut verses = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(verse) = stmt
                .query_row(params![key.surah, key.ayah], Self::row_to_verse)
                .optional()?
            {
                verses.insert(*key, verse);
            }
        }
        Ok(verses)
    }

    /// Verses of one surah with `first <= ayah <= last`, skipping `exclude`.
    pub fn fetch_verse_range(
        &self,
        surah: u16,
        first: u16,
        last: u16,
        exclude: u16,
    ) -> DatabaseResult<Vec<StoredVerse>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT v.chapter, v.verse, v.text_uthmani, t.text_en
             FROM verses v LEFT JOIN translations t
               ON v.chapter = t.chapter AND v.verse = t.verse
             WHERE v.chapter = ?1 AND v.verse BETWEEN ?2 AND ?3 AND v.verse != ?4
             ORDER BY v.verse",
        )?;
        let verses = stmt
            .query_map(params![surah, first, last, exclude], Self::row_to_verse)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(verses)
    }

    fn row_to_verse(row: &rusqlite::Row) -> rusqlite::Result<StoredVerse> {
        Ok(StoredVerse {
            key: VerseKey::new(row.get(0)?, row.get(1)?),
            text_uthmani: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            translation: row.get(3)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Morphology
    // ─────────────────────────────────────────────────────────────────────────

    /// All segments of a verse ordered by word position, then segment.
    pub fn fetch_segments(&self, key: VerseKey) -> DatabaseResult<Vec<StoredSegment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM morphology WHERE chapter = ?1 AND verse = ?2 ORDER BY word_pos, segment",
            SEGMENT_COLUMNS
        ))?;
        let segments = stmt
            .query_map(params![key.surah, key.ayah], Self::row_to_segment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(segments)
    }

    /// Segments of one word, in morpheme order.
    pub fn fetch_word_segments(&self, key: VerseKey, word_pos: u32) -> DatabaseResult<Vec<StoredSegment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM morphology WHERE chapter = ?1 AND verse = ?2 AND word_pos = ?3 ORDER BY segment",
            SEGMENT_COLUMNS
        ))?;
        let segments = stmt
            .query_map(params![key.surah, key.ayah, word_pos], Self::row_to_segment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(segments)
    }

    /// Lexical keys of every segment, for building the in-memory index.
    pub fn fetch_lexical_rows(&self) -> DatabaseResult<Vec<LexicalRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chapter, verse, word_pos,
                    COALESCE(lemma_buckwalter, ''), COALESCE(root_buckwalter, ''),
                    COALESCE(root_arabic, ''), COALESCE(form_buckwalter, '')
             FROM morphology",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LexicalRow {
                    key: VerseKey::new(row.get(0)?, row.get(1)?),
                    word_pos: row.get(2)?,
                    lemma: row.get(3)?,
                    root: row.get(4)?,
                    root_arabic: row.get(5)?,
                    form: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_segment(row: &rusqlite::Row) -> rusqlite::Result<StoredSegment> {
        let mut features = BTreeMap::new();
        for (i, (_, display_key)) in FEATURE_COLUMNS.iter().enumerate() {
            let value: Option<String> = row.get(13 + i)?;
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                features.insert(display_key.to_string(), value);
            }
        }
        Ok(StoredSegment {
            key: VerseKey::new(row.get(0)?, row.get(1)?),
            word_pos: row.get(2)?,
            segment: row.get(3)?,
            form_buckwalter: row.get(4)?,
            form_arabic: row.get(5)?,
            tag: row.get(6)?,
            pos: row.get(7)?,
            root_buckwalter: row.get(8)?,
            root_arabic: row.get(9)?,
            lemma_buckwalter: row.get(10)?,
            lemma_arabic: row.get(11)?,
            features_raw: row.get(12)?,
            features,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gloss cache
    // ─────────────────────────────────────────────────────────────────────────

    /// Cached glosses of a verse keyed by word position.
    pub fn fetch_glosses(&self, key: VerseKey) -> DatabaseResult<BTreeMap<u32, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT word_pos, translation_en FROM word_glosses
             WHERE chapter = ?1 AND verse = ?2 ORDER BY word_pos",
        )?;
        let glosses = stmt
            .query_map(params![key.surah, key.ayah], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(glosses)
    }

    /// Whether the gloss service has already answered for this verse, even
    /// if it left some positions without a gloss.
    pub fn glosses_fetched(&self, key: VerseKey) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let fetched = conn
            .query_row(
                "SELECT 1 FROM gloss_fetches WHERE chapter = ?1 AND verse = ?2",
                params![key.surah, key.ayah],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(fetched)
    }

    /// Persist glosses for a verse and mark the verse as fetched.
    /// `INSERT OR REPLACE` makes a repeated write of the same fetch a no-op,
    /// so racing writers need no lock.
    pub fn store_glosses(&self, key: VerseKey, glosses: &[WordGloss]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let fetched_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.f").to_string();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO word_glosses (chapter, verse, word_pos, translation_en, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for gloss in glosses {
                stmt.execute(params![key.surah, key.ayah, gloss.position, gloss.text, fetched_at])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO gloss_fetches (chapter, verse, fetched_at) VALUES (?1, ?2, ?3)",
            params![key.surah, key.ayah, fetched_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cognates
    // ─────────────────────────────────────────────────────────────────────────

    /// Every cognate record with the given transliteration, ordered by id
    /// (dictionary records first, then comparative ones). Derivatives are
    /// ordered by language.
    pub fn fetch_cognate_entries(&self, transliteration: &str) -> DatabaseResult<Vec<CognateEntry>> {
        let conn = self.get_conn()?;
        let mut root_stmt = conn.prepare_cached(
            "SELECT id, COALESCE(source, 'semiticroots'), transliteration, COALESCE(concept, '')
             FROM semitic_roots WHERE transliteration = ?1 ORDER BY id",
        )?;
        let roots = root_stmt
            .query_map(params![transliteration], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut deriv_stmt = conn.prepare_cached(
            "SELECT COALESCE(language, ''), COALESCE(word, ''), COALESCE(displayed_text, ''),
                    COALESCE(concept, ''), COALESCE(meaning, '')
             FROM semitic_derivatives WHERE root_id = ?1 ORDER BY language, id",
        )?;

        let mut entries = Vec::with_capacity(roots.len());
        for (global_id, source_name, transliteration, concept) in roots {
            let id = CognateSource::from_database_name(&source_name)
                .and_then(|source| CognateId::from_global(source, global_id));
            let Some(id) = id else {
                warn!(global_id, source = %source_name, "skipping cognate record outside its source id range");
                continue;
            };
            let derivatives = deriv_stmt
                .query_map(params![global_id], |row| {
                    Ok(Derivative {
                        language: row.get(0)?,
                        word: row.get(1)?,
                        displayed_text: row.get(2)?,
                        concept: row.get(3)?,
                        meaning: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(CognateEntry {
                id,
                transliteration,
                concept,
                derivatives,
            });
        }
        Ok(entries)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    pub fn insert_verse(&self, key: VerseKey, text_uthmani: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO verses (chapter, verse, text_uthmani) VALUES (?1, ?2, ?3)",
            params![key.surah, key.ayah, text_uthmani],
        )?;
        Ok(())
    }

    pub fn insert_translation(&self, key: VerseKey, text_en: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO translations (chapter, verse, text_en) VALUES (?1, ?2, ?3)",
            params![key.surah, key.ayah, text_en],
        )?;
        Ok(())
    }

    /// Insert morphology rows in one transaction, replacing whatever the
    /// verses in the batch held before. Returns the row count.
    pub fn insert_segments(&self, segments: &[StoredSegment]) -> DatabaseResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let verses: BTreeSet<VerseKey> = segments.iter().map(|seg| seg.key).collect();
            let mut clear =
                tx.prepare_cached("DELETE FROM morphology WHERE chapter = ?1 AND verse = ?2")?;
            for key in verses {
                clear.execute(params![key.surah, key.ayah])?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO morphology
                   (chapter, verse, word_pos, segment, form_buckwalter, form_arabic,
                    tag, pos, root_buckwalter, root_arabic, lemma_buckwalter, lemma_arabic,
                    features_raw, gender, number, person, case_val, voice, mood, verb_form, state)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                           ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"#,
            )?;
            for seg in segments {
                let feature = |name: &str| -> &str {
                    seg.features.get(name).map(String::as_str).unwrap_or("")
                };
                stmt.execute(params![
                    seg.key.surah,
                    seg.key.ayah,
                    seg.word_pos,
                    seg.segment,
                    seg.form_buckwalter,
                    seg.form_arabic,
                    seg.tag,
                    seg.pos,
                    seg.root_buckwalter,
                    seg.root_arabic,
                    seg.lemma_buckwalter,
                    seg.lemma_arabic,
                    seg.features_raw,
                    feature("gender"),
                    feature("number"),
                    feature("person"),
                    feature("case"),
                    feature("voice"),
                    feature("mood"),
                    feature("verb form"),
                    feature("state"),
                ])?;
            }
        }
        tx.commit()?;
        Ok(segments.len())
    }

    /// Insert or replace a cognate record with its derivatives.
    pub fn insert_cognate(&self, entry: &CognateEntry) -> DatabaseResult<()> {
        let Some(id) = CognateId::validated(entry.id.source, entry.id.local_id) else {
            return Err(DatabaseError::Corrupt(format!(
                "cognate id {} is outside the {} id range",
                entry.id.local_id,
                entry.id.source.database_name()
            )));
        };
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let global_id = id.global();

        tx.execute(
            "DELETE FROM semitic_derivatives WHERE root_id = ?1",
            params![global_id],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO semitic_roots (id, transliteration, concept, source)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                global_id,
                entry.transliteration,
                entry.concept,
                entry.id.source.database_name()
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO semitic_derivatives (root_id, language, word, displayed_text, concept, meaning)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for d in &entry.derivatives {
                stmt.execute(params![
                    global_id,
                    d.language,
                    d.word,
                    d.displayed_text,
                    d.concept,
                    d.meaning
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(key: VerseKey, word_pos: u32, segment: u32, form: &str, root: &str) -> StoredSegment {
        StoredSegment {
            key,
            word_pos,
            segment,
            form_buckwalter: form.to_string(),
            tag: "N".to_string(),
            pos: "Noun".to_string(),
            root_buckwalter: root.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.setup_schema().unwrap();
        assert!(db.database_size().unwrap() > 0);
    }

    #[test]
    fn test_verse_with_and_without_translation() {
        let db = Database::open_in_memory().unwrap();
        let a = VerseKey::new(1, 1);
        let b = VerseKey::new(1, 2);
        db.insert_verse(a, "first").unwrap();
        db.insert_verse(b, "second").unwrap();
        db.insert_translation(a, "In the name").unwrap();

        let first = db.fetch_verse(a).unwrap().unwrap();
        assert_eq!(first.translation.as_deref(), Some("In the name"));
        let second = db.fetch_verse(b).unwrap().unwrap();
        assert_eq!(second.translation, None);
        assert!(db.fetch_verse(VerseKey::new(1, 3)).unwrap().is_none());

        let both = db.fetch_verses(&[a, b, VerseKey::new(9, 9)]).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(db.count_verses().unwrap(), 2);
        assert_eq!(db.surah_verse_counts().unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn test_segments_come_back_in_order_with_features() {
        let db = Database::open_in_memory().unwrap();
        let key = VerseKey::new(1, 1);
        let mut stem = segment(key, 1, 2, "somi", "smw");
        stem.features.insert("gender".to_string(), "Masculine".to_string());
        stem.features.insert("case".to_string(), "Genitive".to_string());
        let segments = vec![
            segment(key, 2, 1, "{ll~ahi", "Alh"),
            stem,
            segment(key, 1, 1, "bi", ""),
        ];
        assert_eq!(db.insert_segments(&segments).unwrap(), 3);

        let fetched = db.fetch_segments(key).unwrap();
        let order: Vec<(u32, u32)> = fetched.iter().map(|s| (s.word_pos, s.segment)).collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(fetched[1].features.get("case").map(String::as_str), Some("Genitive"));
        assert_eq!(fetched[1].features.len(), 2);
        assert!(fetched[0].features.is_empty());

        let word = db.fetch_word_segments(key, 1).unwrap();
        assert_eq!(word.len(), 2);

        let rows = db.fetch_lexical_rows().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_reinserting_a_verse_replaces_its_segments() {
        let db = Database::open_in_memory().unwrap();
        let opening = VerseKey::new(1, 1);
        let praise = VerseKey::new(1, 2);
        let batch = vec![
            segment(opening, 1, 1, "bi", ""),
            segment(opening, 1, 2, "somi", "smw"),
            segment(praise, 1, 1, "{lo", ""),
        ];
        db.insert_segments(&batch).unwrap();
        db.insert_segments(&batch).unwrap();
        assert_eq!(db.fetch_segments(opening).unwrap().len(), 2);
        assert_eq!(db.fetch_lexical_rows().unwrap().len(), 3);

        // A later batch for one verse leaves the other verse alone
        db.insert_segments(&[segment(opening, 1, 1, "bisomi", "smw")]).unwrap();
        let word = db.fetch_word_segments(opening, 1).unwrap();
        assert_eq!(word.len(), 1);
        assert_eq!(word[0].form_buckwalter, "bisomi");
        assert_eq!(db.fetch_segments(praise).unwrap().len(), 1);
    }

    #[test]
    fn test_gloss_writes_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let key = VerseKey::new(1, 1);
        let glosses = vec![
            WordGloss { position: 1, text: "In (the) name".to_string() },
            WordGloss { position: 2, text: "(of) Allah".to_string() },
        ];
        db.store_glosses(key, &glosses).unwrap();
        db.store_glosses(key, &glosses).unwrap();

        let cached = db.fetch_glosses(key).unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.get(&2).map(String::as_str), Some("(of) Allah"));
        assert!(db.fetch_glosses(VerseKey::new(1, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_verse_is_marked_fetched_even_without_glosses() {
        let db = Database::open_in_memory().unwrap();
        let key = VerseKey::new(112, 1);
        assert!(!db.glosses_fetched(key).unwrap());

        db.store_glosses(key, &[]).unwrap();
        assert!(db.glosses_fetched(key).unwrap());
        assert!(db.fetch_glosses(key).unwrap().is_empty());
        assert!(!db.glosses_fetched(VerseKey::new(112, 2)).unwrap());
    }

    #[test]
    fn test_cognates_from_both_sources_coexist() {
        let db = Database::open_in_memory().unwrap();
        let derivative = |language: &str| Derivative {
            language: language.to_string(),
            word: "rḥm".to_string(),
            displayed_text: "rḥm".to_string(),
            concept: "mercy".to_string(),
            meaning: "to love".to_string(),
        };
        let dictionary = CognateEntry {
            id: CognateId::new(CognateSource::SemiticRoots, 7),
            transliteration: "r-ḥ-m".to_string(),
            concept: "womb".to_string(),
            derivatives: vec![derivative("Ugaritic"), derivative("Akkadian")],
        };
        let comparative = CognateEntry {
            id: CognateId::new(CognateSource::Starling, 7),
            transliteration: "r-ḥ-m".to_string(),
            concept: "to love".to_string(),
            derivatives: vec![derivative("Hebrew")],
        };
        db.insert_cognate(&dictionary).unwrap();
        db.insert_cognate(&comparative).unwrap();
        // Re-inserting replaces instead of duplicating derivatives
        db.insert_cognate(&dictionary).unwrap();

        let entries = db.fetch_cognate_entries("r-ḥ-m").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, dictionary.id);
        assert_eq!(entries[1].id, comparative.id);
        let languages: Vec<&str> = entries[0].derivatives.iter().map(|d| d.language.as_str()).collect();
        assert_eq!(languages, vec!["Akkadian", "Ugaritic"]);
        assert!(db.fetch_cognate_entries("q-w-l").unwrap().is_empty());
    }

    #[test]
    fn test_cognate_ids_outside_their_source_range_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let comparative = CognateEntry {
            id: CognateId::new(CognateSource::Starling, 4),
            transliteration: "q-w-l".to_string(),
            concept: "to speak".to_string(),
            derivatives: Vec::new(),
        };
        db.insert_cognate(&comparative).unwrap();

        // 10005 is where Starling #4 is stored
        let aliasing = CognateEntry {
            id: CognateId::new(CognateSource::SemiticRoots, 10_005),
            transliteration: "k-t-b".to_string(),
            concept: "to write".to_string(),
            derivatives: Vec::new(),
        };
        assert!(matches!(db.insert_cognate(&aliasing), Err(DatabaseError::Corrupt(_))));
        let negative = CognateEntry {
            id: CognateId::new(CognateSource::Starling, -3),
            ..comparative.clone()
        };
        assert!(matches!(db.insert_cognate(&negative), Err(DatabaseError::Corrupt(_))));

        let entries = db.fetch_cognate_entries("q-w-l").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, comparative.id);
        assert_eq!(entries[0].concept, "to speak");
        assert!(db.fetch_cognate_entries("k-t-b").unwrap().is_empty());
    }

    #[test]
    fn test_legacy_gloss_table_gets_fetched_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE word_glosses (
                    chapter INTEGER, verse INTEGER, word_pos INTEGER, translation_en TEXT,
                    PRIMARY KEY (chapter, verse, word_pos));
                 INSERT INTO word_glosses VALUES (1, 1, 1, 'In (the) name');",
            )
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let cached = db.fetch_glosses(VerseKey::new(1, 1)).unwrap();
        assert_eq!(cached.get(&1).map(String::as_str), Some("In (the) name"));
        db.store_glosses(
            VerseKey::new(1, 1),
            &[WordGloss { position: 2, text: "(of) Allah".to_string() }],
        )
        .unwrap();
        assert_eq!(db.fetch_glosses(VerseKey::new(1, 1)).unwrap().len(), 2);
    }

    #[test]
    fn test_legacy_cognate_table_gets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE semitic_roots (
                    id INTEGER PRIMARY KEY, transliteration TEXT NOT NULL, concept TEXT);
                 INSERT INTO semitic_roots VALUES (3, 'r-ḥ-m', 'womb');",
            )
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        // a second open finds the column and leaves the table alone
        drop(db);
        let db = Database::open(&path).unwrap();

        let entries = db.fetch_cognate_entries("r-ḥ-m").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, CognateId::new(CognateSource::SemiticRoots, 3));
        assert!(entries[0].derivatives.is_empty());
    }
}
