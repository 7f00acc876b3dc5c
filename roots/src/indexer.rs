//! In-memory lexical index
//!
//! Built once from the morphology table when the store opens and never
//! mutated afterwards, so it is shared across requests without locking.
//! Holds each verse's root set and inverted postings (verse → word positions)
//! for every lemma, root and surface form.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use tracing::info;

use crate::database::{Database, DatabaseResult, LexicalRow};
use crate::interface::SearchType;
use crate::models::VerseKey;

/// Verses containing a key, each with the 1-based word positions that carry it.
pub type Postings = BTreeMap<VerseKey, BTreeSet<u32>>;

#[derive(Debug, Default)]
pub struct LexicalIndex {
    total_verses: usize,
    verse_roots: HashMap<VerseKey, BTreeSet<String>>,
    lemmas: HashMap<String, Postings>,
    roots: HashMap<String, Postings>,
    forms: HashMap<String, Postings>,
    root_arabic: HashMap<String, String>,
}

impl LexicalIndex {
    /// Read every segment from the database and build the index.
    pub fn build(db: &Database) -> DatabaseResult<Self> {
        let start = Instant::now();
        let keys = db.fetch_verse_keys()?;
        let rows = db.fetch_lexical_rows()?;
        let index = Self::from_rows(keys, rows);
        info!(
            verses = index.total_verses,
            roots = index.roots.len(),
            lemmas = index.lemmas.len(),
            forms = index.forms.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lexical index built"
        );
        Ok(index)
    }

    /// Build from stored verse keys plus segment rows. Verses that have
    /// morphology but no text row still count toward the corpus size.
    pub fn from_rows(
        verse_keys: impl IntoIterator<Item = VerseKey>,
        rows: impl IntoIterator<Item = LexicalRow>,
    ) -> Self {
        let mut index = Self::default();
        let mut verses: BTreeSet<VerseKey> = verse_keys.into_iter().collect();

        for row in rows {
            verses.insert(row.key);
            if !row.lemma.is_empty() {
                add_posting(&mut index.lemmas, &row.lemma, row.key, row.word_pos);
            }
            if !row.form.is_empty() {
                add_posting(&mut index.forms, &row.form, row.key, row.word_pos);
            }
            if !row.root.is_empty() {
                add_posting(&mut index.roots, &row.root, row.key, row.word_pos);
                index
                    .verse_roots
                    .entry(row.key)
                    .or_default()
                    .insert(row.root.clone());
                if !row.root_arabic.is_empty() {
                    index
                        .root_arabic
                        .entry(row.root)
                        .or_insert(row.root_arabic);
                }
            }
        }

        index.total_verses = verses.len();
        index
    }

    pub fn total_verses(&self) -> usize {
        self.total_verses
    }

    /// Distinct non-empty roots of a verse.
    pub fn roots_of(&self, key: VerseKey) -> Option<&BTreeSet<String>> {
        self.verse_roots.get(&key)
    }

    pub fn postings(&self, search_type: SearchType, key: &str) -> Option<&Postings> {
        let table = match search_type {
            SearchType::Lemma => &self.lemmas,
            SearchType::Root => &self.roots,
            SearchType::Form => &self.forms,
        };
        table.get(key)
    }

    /// Number of verses containing `root`.
    pub fn document_frequency(&self, root: &str) -> usize {
        self.roots.get(root).map_or(0, BTreeMap::len)
    }

    /// `ln(total_verses / verses containing root)`, or `None` for an
    /// unknown root.
    pub fn idf(&self, root: &str) -> Option<f64> {
        let df = self.document_frequency(root);
        if df == 0 || self.total_verses == 0 {
            return None;
        }
        Some((self.total_verses as f64 / df as f64).ln())
    }

    /// Spaced Arabic spelling recorded for a root.
    pub fn root_arabic(&self, root: &str) -> Option<&str> {
        self.root_arabic.get(root).map(String::as_str)
    }
}

fn add_posting(table: &mut HashMap<String, Postings>, key: &str, verse: VerseKey, position: u32) {
    table
        .entry(key.to_string())
        .or_default()
        .entry(verse)
        .or_default()
        .insert(position);
}
