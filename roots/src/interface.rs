//! Lexicon public interface
//!
//! This file defines the payloads returned by the lexicon and the service
//! trait a transport layer talks to. Every record serializes to the JSON
//! shape the verse panel and search views consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CognateId, VerseKey};

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Which lexical key a search term matches against, from most to least
/// specific: a lemma covers the inflections of one word, a root covers its
/// derivational family, a form matches one exact spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Lemma,
    Root,
    Form,
}

/// What the user clicked to produce a search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TermSelection {
    /// A word: its segments are inspected to pick the lexical key.
    Word {
        display_arabic: String,
        segments: Vec<SegmentKeys>,
    },
    /// A root badge: already a root term.
    Root {
        display_arabic: String,
        root_buckwalter: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// One morpheme of a word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub form_arabic: String,
    pub form_buckwalter: String,
    pub tag: String,
    pub pos: String,
    pub root_arabic: Option<String>,
    pub root_buckwalter: Option<String>,
    pub lemma_arabic: Option<String>,
    pub lemma_buckwalter: Option<String>,
    /// Only the applicable features are present (gender, number, person,
    /// case, voice, mood, verb form, state).
    pub features: BTreeMap<String, String>,
    pub features_raw: String,
}

/// The lexical keys of a segment needed to resolve a search term.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentKeys {
    pub form_buckwalter: String,
    pub tag: String,
    pub lemma_buckwalter: Option<String>,
    pub root_buckwalter: Option<String>,
}

impl From<&Segment> for SegmentKeys {
    fn from(segment: &Segment) -> Self {
        Self {
            form_buckwalter: segment.form_buckwalter.clone(),
            tag: segment.tag.clone(),
            lemma_buckwalter: segment.lemma_buckwalter.clone(),
            root_buckwalter: segment.root_buckwalter.clone(),
        }
    }
}

/// A word of a verse with its segments in morpheme order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// 1-based, recitation order
    pub position: u32,
    pub segments: Vec<Segment>,
    /// English gloss. `None` means it has not been fetched yet.
    pub translation: Option<String>,
}

/// An attested reflex of a root in another Semitic language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivative {
    pub language: String,
    pub word: String,
    pub displayed_text: String,
    pub concept: String,
    pub meaning: String,
}

/// One Proto-Semitic root record from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognateEntry {
    pub id: CognateId,
    pub transliteration: String,
    pub concept: String,
    pub derivatives: Vec<Derivative>,
}

/// All cognate records for one surface root, merged across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cognate {
    /// Id of the first record, used by the panel as a stable handle
    pub semitic_root_id: CognateId,
    pub transliteration: String,
    /// Concepts of every record joined with " / "
    pub concept: String,
    pub entries: Vec<CognateEntry>,
}

impl Cognate {
    /// Every derivative of every record, in record order.
    pub fn derivatives(&self) -> impl Iterator<Item = &Derivative> {
        self.entries.iter().flat_map(|e| e.derivatives.iter())
    }
}

/// A distinct root of a verse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootSummary {
    pub root_arabic: String,
    pub root_buckwalter: String,
    /// Number of segments in the verse carrying this root
    pub occurrences: u32,
    pub cognate: Option<Cognate>,
}

/// Everything the verse panel shows for one verse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseDetail {
    pub surah: u16,
    pub ayah: u16,
    pub text_uthmani: String,
    pub translation: String,
    pub words: Vec<Word>,
    /// Distinct roots in first-appearance order
    pub roots_summary: Vec<RootSummary>,
}

/// A root shared between the query verse and a related verse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedRoot {
    pub root_arabic: String,
    pub root_buckwalter: String,
    /// ln(total verses / verses containing the root)
    pub idf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedVerse {
    pub surah: u16,
    pub ayah: u16,
    pub text_uthmani: String,
    pub translation: String,
    pub similarity_score: f64,
    /// Rarest first
    pub shared_roots: Vec<SharedRoot>,
}

/// A search term after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedTerm {
    pub display_arabic: String,
    pub search_type: SearchType,
    pub search_key: String,
}

/// A term satisfied by a search hit and the words that satisfied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: ResolvedTerm,
    /// 1-based, verse-local word positions
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub surah: u16,
    pub ayah: u16,
    pub text_uthmani: String,
    pub translation: String,
    /// Number of distinct terms satisfied
    pub score: u32,
    pub matched_terms: Vec<TermMatch>,
    /// Union of every matched term's positions, ascending
    pub matched_positions: Vec<u32>,
}

/// Search result container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub terms_used: Vec<ResolvedTerm>,
    pub results: Vec<SearchHit>,
    /// Every candidate verse, not just the returned page
    pub total_found: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurahInfo {
    pub number: u16,
    pub name: String,
    pub verse_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextVerse {
    pub surah: u16,
    pub ayah: u16,
    pub text_uthmani: String,
    pub translation: String,
}

/// Verses surrounding a verse within its surah.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseContext {
    pub query: VerseKey,
    pub context: Vec<ContextVerse>,
    pub surah_total: u16,
}

/// Error type for lexicon operations
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Verse {surah}:{ayah} not found")]
    NotFound { surah: u16, ayah: u16 },
    #[error("Gloss service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Selection has no searchable key: {0}")]
    InvalidTerm(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl LexiconError {
    pub(crate) fn not_found(surah: u16, ayah: u16) -> Self {
        LexiconError::NotFound { surah, ayah }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The operations a transport (HTTP handler, extension bridge, CLI) exposes.
#[async_trait::async_trait]
pub trait LexiconApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Verse Panel
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verse text, words, segments, glosses and root summary.
    /// Fills missing glosses from the gloss service on the way.
    async fn verse(&self, surah: u16, ayah: u16) -> Result<VerseDetail, LexiconError>;

    /// Neighbouring verses of the same surah.
    fn context(&self, surah: u16, ayah: u16) -> Result<VerseContext, LexiconError>;

    /// Cognate records for a Buckwalter root, if any source has one.
    fn cognates(&self, root_buckwalter: &str) -> Result<Option<Cognate>, LexiconError>;

    /// Every surah with its name and verse count.
    fn surahs(&self) -> Result<Vec<SurahInfo>, LexiconError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Related Verses
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verses sharing rare roots with the given verse, best first.
    /// `None` uses the configured default limit.
    async fn related(
        &self,
        surah: u16,
        ayah: u16,
        limit: Option<usize>,
    ) -> Result<Vec<RelatedVerse>, LexiconError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Word Search
    // ─────────────────────────────────────────────────────────────────────────────

    /// Resolve the word at a verse position to a search term.
    fn resolve_word(
        &self,
        surah: u16,
        ayah: u16,
        position: u32,
    ) -> Result<Option<ResolvedTerm>, LexiconError>;

    /// Verses matching the most terms, best first.
    async fn search(
        &self,
        terms: Vec<ResolvedTerm>,
        exclude_verse: Option<VerseKey>,
        limit: Option<usize>,
    ) -> Result<SearchResponse, LexiconError>;

    /// Number of verses matching at least one term.
    async fn count_matches(
        &self,
        terms: Vec<ResolvedTerm>,
        exclude_verse: Option<VerseKey>,
    ) -> Result<u64, LexiconError>;
}

impl From<crate::database::DatabaseError> for LexiconError {
    fn from(e: crate::database::DatabaseError) -> Self {
        LexiconError::Database(e.to_string())
    }
}

impl From<crate::gloss::GlossError> for LexiconError {
    fn from(e: crate::gloss::GlossError) -> Self {
        LexiconError::UpstreamUnavailable(e.to_string())
    }
}
