//! Corpus file parsing and loading
//!
//! Reads the local source files the store is built from:
//! - Quranic Arabic Corpus morphology: `(c:v:w:s)\tFORM\tTAG\tFEATURES`
//! - Tanzil Uthmani text and translations: `surah|ayah|text`
//! - cognate records as JSON (one array of [`CognateRecord`])

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::{Database, DatabaseResult};
use crate::interface::{CognateEntry, Derivative};
use crate::models::{CognateId, CognateSource, StoredSegment, VerseKey};
use crate::transliteration::{buckwalter_to_arabic, space_root};

fn pos_name(tag: &str) -> Option<&'static str> {
    let name = match tag {
        "N" => "Noun",
        "PN" => "Proper Noun",
        "ADJ" => "Adjective",
        "V" => "Verb",
        "IMPV" => "Imperative Verb",
        "IMPN" => "Verbal Noun",
        "PRON" => "Pronoun",
        "DEM" => "Demonstrative",
        "REL" => "Relative Pronoun",
        "COND" => "Conditional",
        "T" => "Time Adverb",
        "LOC" => "Location Adverb",
        "P" => "Preposition",
        "CONJ" => "Conjunction",
        "SUB" => "Subordinating Conjunction",
        "ACC" => "Accusative Particle",
        "AMD" => "Amendment Particle",
        "ANS" => "Answer Particle",
        "AVR" => "Aversion Particle",
        "CERT" => "Certainty Particle",
        "CIRC" => "Circumstantial Particle",
        "COM" => "Comitative Particle",
        "CAUS" => "Cause Particle",
        "NEG" => "Negative Particle",
        "EXH" => "Exhortation Particle",
        "EXL" => "Explanation Particle",
        "EXP" => "Exceptive Particle",
        "FUT" => "Future Particle",
        "INC" => "Inceptive Particle",
        "INT" | "INTG" => "Interrogative Particle",
        "PRO" => "Prohibition Particle",
        "RES" => "Restriction Particle",
        "RET" => "Retraction Particle",
        "SUR" => "Surprise Particle",
        "VOC" => "Vocative Particle",
        "REM" => "Resumption Particle",
        "EMPH" => "Emphatic Particle",
        "INL" => "Inceptive lam",
        "PREV" => "Preventive Particle",
        "SP" => "Supplemental Particle",
        "ATT" => "Attention Particle",
        "RSLT" => "Result Particle",
        "INF" => "Interpretation Particle",
        "DET" => "Determiner",
        "STEM" => "Stem",
        "POS" => "Possessive",
        "PREFIX" => "Prefix",
        "SUFFIX" => "Suffix",
        _ => return None,
    };
    Some(name)
}

fn gender(code: char) -> Option<&'static str> {
    match code {
        'M' => Some("Masculine"),
        'F' => Some("Feminine"),
        _ => None,
    }
}

fn number(code: char) -> Option<&'static str> {
    match code {
        'S' => Some("Singular"),
        'D' => Some("Dual"),
        'P' => Some("Plural"),
        _ => None,
    }
}

fn person(code: char) -> Option<&'static str> {
    match code {
        '1' => Some("1st"),
        '2' => Some("2nd"),
        '3' => Some("3rd"),
        _ => None,
    }
}

/// Split a person/gender/number code such as `3MP`, `2D` or `FS` into its
/// parts. Every character must be recognised, otherwise `None`.
fn agreement(code: &str) -> Option<Vec<(&'static str, &'static str)>> {
    let mut chars = code.chars().peekable();
    let mut parts = Vec::new();
    if let Some(p) = chars.peek().and_then(|c| person(*c)) {
        parts.push(("person", p));
        chars.next();
    }
    if let Some(g) = chars.peek().and_then(|c| gender(*c)) {
        parts.push(("gender", g));
        chars.next();
    }
    if let Some(n) = chars.peek().and_then(|c| number(*c)) {
        parts.push(("number", n));
        chars.next();
    }
    (chars.next().is_none() && !parts.is_empty()).then_some(parts)
}

fn single_feature(part: &str) -> Option<(&'static str, &'static str)> {
    let feature = match part {
        "NOM" => ("case", "Nominative"),
        "ACC" => ("case", "Accusative"),
        "GEN" => ("case", "Genitive"),
        "ACT" => ("voice", "Active"),
        "PASS" => ("voice", "Passive"),
        "IND" => ("mood", "Indicative"),
        "SUBJ" => ("mood", "Subjunctive"),
        "JUS" => ("mood", "Jussive"),
        "ENERGETIC" => ("mood", "Energetic"),
        "DEF" => ("state", "Definite"),
        "INDEF" => ("state", "Indefinite"),
        _ => return None,
    };
    Some(feature)
}

fn verb_form(part: &str) -> Option<&'static str> {
    let numeral = part.strip_prefix('(')?.strip_suffix(')')?;
    const FORMS: [&str; 12] = [
        "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
    ];
    FORMS.iter().find(|f| **f == numeral).copied()
}

/// Parsed feature column of a morphology line.
#[derive(Debug, Default, PartialEq)]
pub struct Features {
    pub root: Option<String>,
    pub lemma: Option<String>,
    pub tag: Option<String>,
    pub pos: Option<String>,
    pub values: std::collections::BTreeMap<String, String>,
}

/// Parse `STEM|POS:N|LEM:{som|ROOT:smw|M|GEN`-style feature strings.
/// Unrecognised parts are ignored; `features_raw` keeps them.
pub fn parse_features(raw: &str) -> Features {
    let mut features = Features::default();
    for part in raw.split('|').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(root) = part.strip_prefix("ROOT:") {
            features.root = Some(root.to_string());
        } else if let Some(lemma) = part.strip_prefix("LEM:") {
            features.lemma = Some(lemma.to_string());
        } else if let Some(code) = part.strip_prefix("POS:") {
            features.tag = Some(code.to_string());
            features.pos = Some(pos_name(code).unwrap_or(code).to_string());
        } else if let Some((key, value)) = part.strip_prefix("MOOD:").and_then(single_feature) {
            features.values.insert(key.to_string(), value.to_string());
        } else if let Some((key, value)) = single_feature(part) {
            // ACC is both a case and a particle tag; as a bare part it is a case
            features.values.insert(key.to_string(), value.to_string());
        } else if let Some(name) = pos_name(part) {
            if features.pos.is_none() {
                features.tag = Some(part.to_string());
                features.pos = Some(name.to_string());
            }
        } else if let Some(form) = verb_form(part) {
            features.values.insert("verb form".to_string(), form.to_string());
        } else if let Some(parts) = agreement(part) {
            for (key, value) in parts {
                features.values.insert(key.to_string(), value.to_string());
            }
        }
    }
    features
}

fn parse_location(location: &str) -> Option<(VerseKey, u32, u32)> {
    let inner = location.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split(':').map(|p| p.parse::<u32>().ok());
    let surah = u16::try_from(parts.next()??).ok()?;
    let ayah = u16::try_from(parts.next()??).ok()?;
    let word = parts.next()??;
    let segment = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    Some((VerseKey::new(surah, ayah), word, segment))
}

/// Parse one morphology line. Comments, blank lines and malformed lines
/// yield `None`.
pub fn parse_morphology_line(line: &str) -> Option<StoredSegment> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut columns = line.split('\t');
    let (key, word_pos, segment) = parse_location(columns.next()?)?;
    let form = columns.next()?;
    let file_tag = columns.next()?;
    let features_raw = columns.next()?;

    let features = parse_features(features_raw);
    let root = features.root.unwrap_or_default();
    let lemma = features.lemma.unwrap_or_default();
    let tag = features.tag.unwrap_or_else(|| file_tag.to_string());
    let pos = features
        .pos
        .unwrap_or_else(|| pos_name(file_tag).unwrap_or(file_tag).to_string());

    Some(StoredSegment {
        key,
        word_pos,
        segment,
        form_buckwalter: form.to_string(),
        form_arabic: buckwalter_to_arabic(form),
        tag,
        pos,
        root_arabic: if root.is_empty() {
            String::new()
        } else {
            space_root(&buckwalter_to_arabic(&root))
        },
        lemma_arabic: buckwalter_to_arabic(&lemma),
        root_buckwalter: root,
        lemma_buckwalter: lemma,
        features: features.values,
        features_raw: features_raw.to_string(),
    })
}

/// Parse a `surah|ayah|text` line (Tanzil text or translation).
pub fn parse_verse_line(line: &str) -> Option<(VerseKey, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.splitn(3, '|');
    let surah = parts.next()?.trim().parse().ok()?;
    let ayah = parts.next()?.trim().parse().ok()?;
    let text = parts.next()?;
    Some((VerseKey::new(surah, ayah), text.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cognate records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cognate id {id} is outside the {database} id range")]
    IdOutOfRange { database: &'static str, id: i64 },
    #[error("cognate id {id} does not match Starling number {number}")]
    NumberMismatch { id: i64, number: i64 },
}

/// A cognate record as produced by the scrapers.
///
/// `id` is the id stored in `semitic_roots.id`. The dictionary scraper
/// omits `source`; the comparative scraper writes `"source": "starling"`
/// and the unoffset `starling_number` beside the offset id.
#[derive(Debug, Clone, Deserialize)]
pub struct CognateRecord {
    pub id: i64,
    #[serde(default)]
    pub source: Option<CognateSource>,
    #[serde(default)]
    pub starling_number: Option<i64>,
    pub transliteration: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub derivatives: Vec<DerivativeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivativeRecord {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub displayed_text: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub meaning: String,
}

impl CognateRecord {
    /// Resolve the record against `default_source`, which applies when the
    /// record names no source and carries no Starling number.
    pub fn into_entry(self, default_source: CognateSource) -> Result<CognateEntry, CorpusError> {
        let source = match (self.source, self.starling_number) {
            (Some(source), _) => source,
            (None, Some(_)) => CognateSource::Starling,
            (None, None) => default_source,
        };
        let id = CognateId::from_global(source, self.id).ok_or(CorpusError::IdOutOfRange {
            database: source.database_name(),
            id: self.id,
        })?;
        if let Some(number) = self.starling_number {
            if source != CognateSource::Starling || id.local_id != number {
                return Err(CorpusError::NumberMismatch { id: self.id, number });
            }
        }
        Ok(CognateEntry {
            id,
            transliteration: self.transliteration,
            concept: self.concept,
            derivatives: self
                .derivatives
                .into_iter()
                .map(|d| Derivative {
                    language: d.language,
                    word: d.word,
                    displayed_text: d.displayed_text,
                    concept: d.concept,
                    meaning: d.meaning,
                })
                .collect(),
        })
    }
}

/// Parse a scraper output file. Records without a source belong to
/// `default_source`.
pub fn parse_cognates(
    json: &str,
    default_source: CognateSource,
) -> Result<Vec<CognateEntry>, CorpusError> {
    let records: Vec<CognateRecord> = serde_json::from_str(json)?;
    records
        .into_iter()
        .map(|record| record.into_entry(default_source))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub verses: usize,
    pub translations: usize,
    pub segments: usize,
    pub skipped_lines: usize,
}

/// Load the text files of a corpus into `db`. Lines that do not parse are
/// counted in `skipped_lines`.
pub fn load_corpus(
    db: &Database,
    morphology: &str,
    verses: &str,
    translations: &str,
) -> DatabaseResult<LoadStats> {
    let mut stats = LoadStats::default();

    for line in verses.lines().filter(|l| !is_blank(l)) {
        match parse_verse_line(line) {
            Some((key, text)) => {
                db.insert_verse(key, &text)?;
                stats.verses += 1;
            }
            None => stats.skipped_lines += 1,
        }
    }

    for line in translations.lines().filter(|l| !is_blank(l)) {
        match parse_verse_line(line) {
            Some((key, text)) => {
                db.insert_translation(key, &text)?;
                stats.translations += 1;
            }
            None => stats.skipped_lines += 1,
        }
    }

    let mut segments = Vec::new();
    for line in morphology.lines().filter(|l| !is_blank(l)) {
        match parse_morphology_line(line) {
            Some(segment) => segments.push(segment),
            None => {
                debug!(line, "skipping morphology line");
                stats.skipped_lines += 1;
            }
        }
    }
    stats.segments = db.insert_segments(&segments)?;

    info!(
        verses = stats.verses,
        translations = stats.translations,
        segments = stats.segments,
        skipped = stats.skipped_lines,
        "corpus loaded"
    );
    Ok(stats)
}

pub fn load_cognates(db: &Database, entries: &[CognateEntry]) -> DatabaseResult<usize> {
    for entry in entries {
        db.insert_cognate(entry)?;
    }
    info!(records = entries.len(), "cognates loaded");
    Ok(entries.len())
}

fn is_blank(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}
