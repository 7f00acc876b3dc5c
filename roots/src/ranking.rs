//! Ranking for related verses and multi-term search.
//!
//! Related verses are scored by the rarity of the roots they share with the
//! query verse. Search hits use a lexicographic tuple where the number of
//! satisfied terms always dominates and verse order breaks ties.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::indexer::LexicalIndex;
use crate::interface::SearchType;
use crate::models::VerseKey;

/// A root shared with the query verse and its idf weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRoot {
    pub root: String,
    pub idf: f64,
}

/// A scored related verse, before text is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedScore {
    pub key: VerseKey,
    /// Shared weight / query weight, in [0, 1]
    pub score: f64,
    /// Rarest first, then Buckwalter ascending
    pub shared: Vec<WeightedRoot>,
}

/// Score every verse that shares at least one root with `query`.
///
/// `score = Σ idf(shared roots) / Σ idf(query roots)`. Adding a shared root
/// can only raise a score, and a rare root raises it more than a common one.
/// A query whose roots all occur in every verse has zero weight; its
/// candidates are still returned with score 0.
///
/// Returns an empty list for a verse with no roots. When `token` is cancelled
/// the result is partial and the caller must discard it.
pub fn score_related(
    index: &LexicalIndex,
    query: VerseKey,
    limit: usize,
    token: &CancellationToken,
) -> Vec<RelatedScore> {
    let Some(query_roots) = index.roots_of(query) else {
        return Vec::new();
    };

    let weights: Vec<WeightedRoot> = query_roots
        .iter()
        .map(|root| WeightedRoot {
            root: root.clone(),
            idf: index.idf(root).unwrap_or(0.0),
        })
        .collect();
    let query_weight: f64 = weights.iter().map(|w| w.idf).sum();

    // verse → indices into `weights` of the roots it shares
    let mut shared: HashMap<VerseKey, Vec<usize>> = HashMap::new();
    for (i, weighted) in weights.iter().enumerate() {
        if token.is_cancelled() {
            return Vec::new();
        }
        let Some(postings) = index.postings(SearchType::Root, &weighted.root) else {
            continue;
        };
        for verse in postings.keys().filter(|v| **v != query) {
            shared.entry(*verse).or_default().push(i);
        }
    }

    let mut scored: Vec<RelatedScore> = shared
        .into_par_iter()
        .take_any_while(|_| !token.is_cancelled())
        .map(|(key, indices)| {
            let mut roots: Vec<WeightedRoot> = indices.iter().map(|i| weights[*i].clone()).collect();
            roots.sort_by(|a, b| b.idf.total_cmp(&a.idf).then_with(|| a.root.cmp(&b.root)));
            let shared_weight: f64 = roots.iter().map(|r| r.idf).sum();
            let score = if query_weight > 0.0 {
                shared_weight / query_weight
            } else {
                0.0
            };
            RelatedScore {
                key,
                score,
                shared: roots,
            }
        })
        .collect();

    // par_iter doesn't preserve order
    scored.sort_unstable_by(compare_related);
    scored.truncate(limit);
    scored
}

/// Score descending, then (surah, ayah) ascending.
fn compare_related(a: &RelatedScore, b: &RelatedScore) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key))
}

/// Search rank tuple, derived `Ord` gives lexicographic comparison and
/// higher is better:
/// 1. terms_matched: count of distinct terms the verse satisfies
/// 2. order: earlier verses first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchRank {
    pub terms_matched: u32,
    pub order: Reverse<VerseKey>,
}

impl SearchRank {
    pub fn new(terms_matched: u32, key: VerseKey) -> Self {
        Self {
            terms_matched,
            order: Reverse(key),
        }
    }

    pub fn key(&self) -> VerseKey {
        self.order.0
    }
}
