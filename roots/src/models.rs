//! Core data models for the lexicon
//!
//! `Stored*` types mirror database rows and never leave the crate's storage
//! and ranking layers; the `interface` module holds the public payloads built
//! from them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interface::Segment;

// ─────────────────────────────────────────────────────────────────────────────
// VERSE COORDINATES
// ─────────────────────────────────────────────────────────────────────────────

pub const SURAH_COUNT: u16 = 114;

/// Verse count per surah, index 0 = surah 1. Sums to 6236.
const SURAH_VERSE_COUNTS: [u16; SURAH_COUNT as usize] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53,
    89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12,
    12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26,
    30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

const SURAH_NAMES: [&str; SURAH_COUNT as usize] = [
    "Al-Fatihah", "Al-Baqarah", "Ali 'Imran", "An-Nisa", "Al-Ma'idah",
    "Al-An'am", "Al-A'raf", "Al-Anfal", "At-Tawbah", "Yunus",
    "Hud", "Yusuf", "Ar-Ra'd", "Ibrahim", "Al-Hijr",
    "An-Nahl", "Al-Isra", "Al-Kahf", "Maryam", "Taha",
    "Al-Anbya", "Al-Hajj", "Al-Mu'minun", "An-Nur", "Al-Furqan",
    "Ash-Shu'ara", "An-Naml", "Al-Qasas", "Al-'Ankabut", "Ar-Rum",
    "Luqman", "As-Sajdah", "Al-Ahzab", "Saba", "Fatir",
    "Ya-Sin", "As-Saffat", "Sad", "Az-Zumar", "Ghafir",
    "Fussilat", "Ash-Shuraa", "Az-Zukhruf", "Ad-Dukhan", "Al-Jathiyah",
    "Al-Ahqaf", "Muhammad", "Al-Fath", "Al-Hujurat", "Qaf",
    "Adh-Dhariyat", "At-Tur", "An-Najm", "Al-Qamar", "Ar-Rahman",
    "Al-Waqi'ah", "Al-Hadid", "Al-Mujadila", "Al-Hashr", "Al-Mumtahanah",
    "As-Saf", "Al-Jumu'ah", "Al-Munafiqun", "At-Taghabun", "At-Talaq",
    "At-Tahrim", "Al-Mulk", "Al-Qalam", "Al-Haqqah", "Al-Ma'arij",
    "Nuh", "Al-Jinn", "Al-Muzzammil", "Al-Muddaththir", "Al-Qiyamah",
    "Al-Insan", "Al-Mursalat", "An-Naba", "An-Nazi'at", "'Abasa",
    "At-Takwir", "Al-Infitar", "Al-Mutaffifin", "Al-Inshiqaq", "Al-Buruj",
    "At-Tariq", "Al-A'la", "Al-Ghashiyah", "Al-Fajr", "Al-Balad",
    "Ash-Shams", "Al-Layl", "Ad-Duhaa", "Ash-Sharh", "At-Tin",
    "Al-'Alaq", "Al-Qadr", "Al-Bayyinah", "Az-Zalzalah", "Al-'Adiyat",
    "Al-Qari'ah", "At-Takathur", "Al-'Asr", "Al-Humazah", "Al-Fil",
    "Quraysh", "Al-Ma'un", "Al-Kawthar", "Al-Kafirun", "An-Nasr",
    "Al-Masad", "Al-Ikhlas", "Al-Falaq", "An-Nas",
];

/// Canonical number of verses in a surah, or `None` outside 1..=114.
pub fn verse_count(surah: u16) -> Option<u16> {
    let index = usize::from(surah.checked_sub(1)?);
    SURAH_VERSE_COUNTS.get(index).copied()
}

/// English transliterated surah name, or `None` outside 1..=114.
pub fn surah_name(surah: u16) -> Option<&'static str> {
    let index = usize::from(surah.checked_sub(1)?);
    SURAH_NAMES.get(index).copied()
}

/// A verse coordinate. Ordering is (surah, ayah), which is also the
/// tie-break order for every ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseKey {
    pub surah: u16,
    pub ayah: u16,
}

impl VerseKey {
    pub fn new(surah: u16, ayah: u16) -> Self {
        Self { surah, ayah }
    }

    /// Build a key only if it names a real verse.
    pub fn validated(surah: u16, ayah: u16) -> Option<Self> {
        let count = verse_count(surah)?;
        (1..=count).contains(&ayah).then_some(Self { surah, ayah })
    }
}

impl Default for VerseKey {
    fn default() -> Self {
        Self { surah: 1, ayah: 1 }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.ayah)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// STORED ROWS
// ─────────────────────────────────────────────────────────────────────────────

/// A verse row joined with its translation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVerse {
    pub key: VerseKey,
    pub text_uthmani: String,
    pub translation: Option<String>,
}

/// One morphology row: a morpheme-level slice of a word.
///
/// Empty strings in `root_*` / `lemma_*` mean the segment has no root or
/// lemma (closed-class prefixes, suffixes, pronouns).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredSegment {
    pub key: VerseKey,
    pub word_pos: u32,
    pub segment: u32,
    pub form_buckwalter: String,
    pub form_arabic: String,
    pub tag: String,
    pub pos: String,
    pub root_buckwalter: String,
    pub root_arabic: String,
    pub lemma_buckwalter: String,
    pub lemma_arabic: String,
    pub features: BTreeMap<String, String>,
    pub features_raw: String,
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

impl StoredSegment {
    pub fn root(&self) -> Option<&str> {
        non_empty(&self.root_buckwalter)
    }

    pub fn lemma(&self) -> Option<&str> {
        non_empty(&self.lemma_buckwalter)
    }

    pub fn form(&self) -> Option<&str> {
        non_empty(&self.form_buckwalter)
    }

    pub fn to_segment(&self) -> Segment {
        Segment {
            form_arabic: self.form_arabic.clone(),
            form_buckwalter: self.form_buckwalter.clone(),
            tag: self.tag.clone(),
            pos: self.pos.clone(),
            root_arabic: non_empty(&self.root_arabic).map(str::to_string),
            root_buckwalter: self.root().map(str::to_string),
            lemma_arabic: non_empty(&self.lemma_arabic).map(str::to_string),
            lemma_buckwalter: self.lemma().map(str::to_string),
            features: self.features.clone(),
            features_raw: self.features_raw.clone(),
        }
    }
}

/// The feature columns of the `morphology` table paired with the key they
/// are reported under.
pub(crate) const FEATURE_COLUMNS: [(&str, &str); 8] = [
    ("gender", "gender"),
    ("number", "number"),
    ("person", "person"),
    ("case_val", "case"),
    ("voice", "voice"),
    ("mood", "mood"),
    ("verb_form", "verb form"),
    ("state", "state"),
];

// ─────────────────────────────────────────────────────────────────────────────
// COGNATE IDENTITY
// ─────────────────────────────────────────────────────────────────────────────

/// First global id reserved for Starling records; everything below belongs
/// to the semiticroots dictionary.
pub const STARLING_ID_OFFSET: i64 = 10_001;

/// Which etymological database a cognate record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognateSource {
    /// Curated dictionary (semiticroots.net)
    SemiticRoots,
    /// Comparative database (Starling / Tower of Babel)
    Starling,
}

impl CognateSource {
    pub fn database_name(&self) -> &'static str {
        match self {
            CognateSource::SemiticRoots => "semiticroots",
            CognateSource::Starling => "starling",
        }
    }

    pub fn from_database_name(name: &str) -> Option<Self> {
        match name {
            "semiticroots" => Some(CognateSource::SemiticRoots),
            "starling" => Some(CognateSource::Starling),
            _ => None,
        }
    }

    fn id_range(&self) -> std::ops::Range<i64> {
        match self {
            CognateSource::SemiticRoots => 1..STARLING_ID_OFFSET,
            CognateSource::Starling => STARLING_ID_OFFSET..i64::MAX,
        }
    }
}

/// Composite identity of a cognate record. Two sources may describe the
/// same surface root; the (source, local id) pair keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CognateId {
    pub source: CognateSource,
    pub local_id: i64,
}

impl CognateId {
    pub fn new(source: CognateSource, local_id: i64) -> Self {
        Self { source, local_id }
    }

    /// Build an id only if its global id falls in the source's range.
    /// Negative local ids are rejected.
    pub fn validated(source: CognateSource, local_id: i64) -> Option<Self> {
        if local_id < 0 {
            return None;
        }
        let global = match source {
            CognateSource::SemiticRoots => local_id,
            CognateSource::Starling => STARLING_ID_OFFSET.checked_add(local_id)?,
        };
        source
            .id_range()
            .contains(&global)
            .then_some(Self { source, local_id })
    }

    /// The id stored in `semitic_roots.id`.
    pub fn global(&self) -> i64 {
        match self.source {
            CognateSource::SemiticRoots => self.local_id,
            CognateSource::Starling => STARLING_ID_OFFSET + self.local_id,
        }
    }

    /// Recover a composite id from a stored global id, checking that it lies
    /// in the source's range.
    pub fn from_global(source: CognateSource, global: i64) -> Option<Self> {
        if !source.id_range().contains(&global) {
            return None;
        }
        let local_id = match source {
            CognateSource::SemiticRoots => global,
            CognateSource::Starling => global - STARLING_ID_OFFSET,
        };
        Some(Self { source, local_id })
    }
}
