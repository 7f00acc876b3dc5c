//! Term resolution and multi-term search
//!
//! A clicked word or root badge is resolved to one lexical key (lemma, root
//! or surface form). Verses are ranked by how many distinct resolved terms
//! they satisfy, using the postings of the lexical index.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::indexer::LexicalIndex;
use crate::interface::{LexiconError, ResolvedTerm, SearchType, SegmentKeys, TermMatch, TermSelection};
use crate::models::VerseKey;
use crate::ranking::SearchRank;

/// Segment tags that never carry a word's searchable identity.
const NON_LEXICAL_TAGS: [&str; 4] = ["PREFIX", "SUFFIX", "PRON", "DET"];

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Pick the lexical key of a word from its segments.
///
/// Prefixes, suffixes, pronouns and determiners are skipped. Among the rest
/// a segment with a lemma wins, then one with a root, then the first. The
/// key is the chosen segment's lemma, else its root, else its surface form.
pub fn resolve_segments(display_arabic: &str, segments: &[SegmentKeys]) -> Result<ResolvedTerm, LexiconError> {
    let eligible: Vec<&SegmentKeys> = segments
        .iter()
        .filter(|s| !NON_LEXICAL_TAGS.contains(&s.tag.as_str()))
        .collect();

    let chosen = eligible
        .iter()
        .find(|s| has_value(&s.lemma_buckwalter))
        .or_else(|| eligible.iter().find(|s| has_value(&s.root_buckwalter)))
        .or_else(|| eligible.first())
        .ok_or_else(|| LexiconError::InvalidTerm(display_arabic.to_string()))?;

    let (search_type, search_key) = if let Some(lemma) = chosen.lemma_buckwalter.as_deref().filter(|v| !v.is_empty()) {
        (SearchType::Lemma, lemma)
    } else if let Some(root) = chosen.root_buckwalter.as_deref().filter(|v| !v.is_empty()) {
        (SearchType::Root, root)
    } else if !chosen.form_buckwalter.is_empty() {
        (SearchType::Form, chosen.form_buckwalter.as_str())
    } else {
        return Err(LexiconError::InvalidTerm(display_arabic.to_string()));
    };

    Ok(ResolvedTerm {
        display_arabic: display_arabic.to_string(),
        search_type,
        search_key: search_key.to_string(),
    })
}

/// Resolve a user selection to a search term.
pub fn resolve_term(selection: &TermSelection) -> Result<ResolvedTerm, LexiconError> {
    match selection {
        TermSelection::Word {
            display_arabic,
            segments,
        } => resolve_segments(display_arabic, segments),
        TermSelection::Root {
            display_arabic,
            root_buckwalter,
        } => {
            if root_buckwalter.is_empty() {
                return Err(LexiconError::InvalidTerm(display_arabic.clone()));
            }
            Ok(ResolvedTerm {
                display_arabic: display_arabic.clone(),
                search_type: SearchType::Root,
                search_key: root_buckwalter.clone(),
            })
        }
    }
}

/// Resolve every selection, silently dropping the ones with no searchable key.
pub fn resolve_terms(selections: &[TermSelection]) -> Vec<ResolvedTerm> {
    selections
        .iter()
        .filter_map(|selection| match resolve_term(selection) {
            Ok(term) => Some(term),
            Err(e) => {
                debug!(error = %e, "dropping unresolvable term");
                None
            }
        })
        .collect()
}

/// Drop repeated (search type, key) pairs, keeping the first occurrence.
/// Terms with an empty key are dropped as well.
pub fn dedupe_terms(terms: Vec<ResolvedTerm>) -> Vec<ResolvedTerm> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|t| !t.search_key.is_empty())
        .filter(|t| seen.insert((t.search_type, t.search_key.clone())))
        .collect()
}

/// A ranked verse with the terms it satisfies.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub key: VerseKey,
    pub score: u32,
    pub matched_terms: Vec<TermMatch>,
    /// Union of the matched terms' positions, ascending
    pub matched_positions: Vec<u32>,
}

/// verse → (term index, positions) for every term it satisfies
fn collect_candidates<'a>(
    index: &'a LexicalIndex,
    terms: &[ResolvedTerm],
    exclude: Option<VerseKey>,
) -> BTreeMap<VerseKey, Vec<(usize, &'a BTreeSet<u32>)>> {
    let mut candidates: BTreeMap<VerseKey, Vec<(usize, &BTreeSet<u32>)>> = BTreeMap::new();
    for (i, term) in terms.iter().enumerate() {
        let Some(postings) = index.postings(term.search_type, &term.search_key) else {
            continue;
        };
        for (verse, positions) in postings {
            if Some(*verse) == exclude {
                continue;
            }
            candidates.entry(*verse).or_default().push((i, positions));
        }
    }
    candidates
}

/// Rank every verse that satisfies at least one term. Returns the top
/// `limit` hits and the total number of candidates.
///
/// `terms` are expected to be deduplicated so each contributes at most once
/// to a score.
pub fn rank_verses(
    index: &LexicalIndex,
    terms: &[ResolvedTerm],
    exclude: Option<VerseKey>,
    limit: usize,
) -> (Vec<RankedHit>, u64) {
    let candidates = collect_candidates(index, terms, exclude);
    let total_found = candidates.len() as u64;

    let mut ranks: Vec<SearchRank> = candidates
        .iter()
        .map(|(key, matched)| SearchRank::new(matched.len() as u32, *key))
        .collect();
    ranks.sort_unstable_by(|a, b| b.cmp(a));
    ranks.truncate(limit);

    let hits = ranks
        .into_iter()
        .filter_map(|rank| {
            let key = rank.key();
            let matched = candidates.get(&key)?;
            let matched_terms: Vec<TermMatch> = matched
                .iter()
                .map(|(i, positions)| TermMatch {
                    term: terms[*i].clone(),
                    positions: positions.iter().copied().collect(),
                })
                .collect();
            let matched_positions: Vec<u32> = matched
                .iter()
                .flat_map(|(_, positions)| positions.iter().copied())
                .collect::<BTreeSet<u32>>()
                .into_iter()
                .collect();
            Some(RankedHit {
                key,
                score: rank.terms_matched,
                matched_terms,
                matched_positions,
            })
        })
        .collect();

    (hits, total_found)
}

/// Number of verses satisfying at least one term.
pub fn count_matches(index: &LexicalIndex, terms: &[ResolvedTerm], exclude: Option<VerseKey>) -> u64 {
    let mut verses: BTreeSet<VerseKey> = BTreeSet::new();
    for term in terms {
        if let Some(postings) = index.postings(term.search_type, &term.search_key) {
            verses.extend(postings.keys().copied());
        }
    }
    if let Some(exclude) = exclude {
        verses.remove(&exclude);
    }
    verses.len() as u64
}
