//! Verse assembly helpers
//!
//! Pure functions that turn stored rows into the verse panel payload. The
//! store does the I/O and calls these.

use std::collections::BTreeMap;

use crate::interface::{Cognate, CognateEntry, RootSummary, Word};
use crate::models::{StoredSegment, VerseKey};

/// Distinct word positions of a verse, ascending.
pub fn word_positions(segments: &[StoredSegment]) -> Vec<u32> {
    let mut positions: Vec<u32> = segments.iter().map(|s| s.word_pos).collect();
    positions.dedup();
    positions
}

/// Group segments (ordered by word position, then segment) into words and
/// attach glosses. A word with no gloss gets `translation: None`.
pub fn group_words(segments: &[StoredSegment], glosses: &BTreeMap<u32, String>) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    for segment in segments {
        match words.last_mut() {
            Some(word) if word.position == segment.word_pos => {
                word.segments.push(segment.to_segment());
            }
            _ => words.push(Word {
                position: segment.word_pos,
                segments: vec![segment.to_segment()],
                translation: glosses.get(&segment.word_pos).cloned(),
            }),
        }
    }
    words
}

/// Distinct non-empty roots in first-appearance order, each with the number
/// of segments carrying it. Cognates are attached by the caller.
pub fn summarize_roots(segments: &[StoredSegment]) -> Vec<RootSummary> {
    let mut summary: Vec<RootSummary> = Vec::new();
    for segment in segments {
        let Some(root) = segment.root() else {
            continue;
        };
        match summary.iter_mut().find(|r| r.root_buckwalter == root) {
            Some(existing) => existing.occurrences += 1,
            None => summary.push(RootSummary {
                root_arabic: segment.root_arabic.clone(),
                root_buckwalter: root.to_string(),
                occurrences: 1,
                cognate: None,
            }),
        }
    }
    summary
}

/// Merge every record found for one root into a single cognate. `None` when
/// no source has a record.
pub fn merge_cognates(entries: Vec<CognateEntry>) -> Option<Cognate> {
    let first = entries.first()?;
    let semitic_root_id = first.id;
    let transliteration = first.transliteration.clone();
    let concept = entries
        .iter()
        .map(|e| e.concept.as_str())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" / ");
    Some(Cognate {
        semitic_root_id,
        transliteration,
        concept,
        entries,
    })
}

/// Display text of a verse. The first verse of every surah but the first
/// opens with the bismillah, which is verse 1:1 itself; it is stripped so
/// the verse shows only its own words.
pub fn display_text(text: &str, key: VerseKey, bismillah: Option<&str>) -> String {
    if key.ayah != 1 || key.surah == 1 {
        return text.to_string();
    }
    match bismillah.and_then(|b| text.strip_prefix(b)) {
        Some(rest) => rest.trim().to_string(),
        None => text.to_string(),
    }
}

/// Inclusive ayah range around `ayah` holding up to `size` neighbours:
/// half before and half after, sliding at the surah boundaries.
pub fn context_range(ayah: u16, surah_total: u16, size: u16) -> (u16, u16) {
    let half = size / 2;
    let (before, after) = if ayah <= half {
        let before = ayah.saturating_sub(1);
        (before, size - before)
    } else if ayah.saturating_add(half) > surah_total {
        let after = surah_total.saturating_sub(ayah);
        (size.saturating_sub(after), after)
    } else {
        (half, size - half)
    };
    let first = ayah.saturating_sub(before).max(1);
    let last = ayah.saturating_add(after).min(surah_total);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CognateId, CognateSource};

    fn seg(word_pos: u32, segment: u32, root: &str, root_arabic: &str) -> StoredSegment {
        StoredSegment {
            key: VerseKey::new(1, 1),
            word_pos,
            segment,
            form_buckwalter: format!("w{}s{}", word_pos, segment),
            root_buckwalter: root.to_string(),
            root_arabic: root_arabic.to_string(),
            ..Default::default()
        }
    }

    fn bismillah_segments() -> Vec<StoredSegment> {
        vec![
            seg(1, 1, "", ""),
            seg(1, 2, "smw", "س م و"),
            seg(2, 1, "Alh", "أ ل ه"),
            seg(3, 1, "", ""),
            seg(3, 2, "rHm", "ر ح م"),
            seg(4, 1, "", ""),
            seg(4, 2, "rHm", "ر ح م"),
        ]
    }

    #[test]
    fn test_group_words_keeps_order_and_glosses() {
        let glosses = BTreeMap::from([(1, "In (the) name".to_string()), (3, "the Most Gracious".to_string())]);
        let words = group_words(&bismillah_segments(), &glosses);
        let positions: Vec<u32> = words.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(words[0].segments.len(), 2);
        assert_eq!(words[0].segments[1].form_buckwalter, "w1s2");
        assert_eq!(words[0].translation.as_deref(), Some("In (the) name"));
        assert_eq!(words[1].translation, None);
        assert_eq!(word_positions(&bismillah_segments()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_summarize_roots_counts_segments() {
        let summary = summarize_roots(&bismillah_segments());
        let roots: Vec<(&str, u32)> = summary
            .iter()
            .map(|r| (r.root_buckwalter.as_str(), r.occurrences))
            .collect();
        assert_eq!(roots, vec![("smw", 1), ("Alh", 1), ("rHm", 2)]);
        assert_eq!(summary[0].root_arabic, "س م و");
        let total: u32 = summary.iter().map(|r| r.occurrences).sum();
        let rooted = bismillah_segments().iter().filter(|s| s.root().is_some()).count();
        assert_eq!(total as usize, rooted);
    }

    #[test]
    fn test_merge_cognates() {
        assert!(merge_cognates(Vec::new()).is_none());
        let entry = |source, concept: &str| CognateEntry {
            id: CognateId::new(source, 5),
            transliteration: "r-ḥ-m".to_string(),
            concept: concept.to_string(),
            derivatives: Vec::new(),
        };
        let merged = merge_cognates(vec![
            entry(CognateSource::SemiticRoots, "womb"),
            entry(CognateSource::Starling, ""),
            entry(CognateSource::Starling, "to love"),
        ])
        .unwrap();
        assert_eq!(merged.concept, "womb / to love");
        assert_eq!(merged.semitic_root_id.source, CognateSource::SemiticRoots);
        assert_eq!(merged.entries.len(), 3);
    }

    #[test]
    fn test_display_text_strips_bismillah() {
        let bismillah = "بِسْمِ ٱللَّهِ";
        let opening = format!("{} قُلْ", bismillah);
        assert_eq!(display_text(&opening, VerseKey::new(112, 1), Some(bismillah)), "قُلْ");
        // 1:1 is the bismillah itself
        assert_eq!(display_text(bismillah, VerseKey::new(1, 1), Some(bismillah)), bismillah);
        assert_eq!(display_text(&opening, VerseKey::new(112, 2), Some(bismillah)), opening);
        assert_eq!(display_text(&opening, VerseKey::new(112, 1), None), opening);
        assert_eq!(display_text("قُلْ", VerseKey::new(112, 1), Some(bismillah)), "قُلْ");
    }

    #[test]
    fn test_context_range_slides_at_boundaries() {
        assert_eq!(context_range(1, 7, 6), (1, 7));
        assert_eq!(context_range(4, 7, 6), (1, 7));
        assert_eq!(context_range(7, 7, 6), (1, 7));
        assert_eq!(context_range(50, 286, 6), (47, 53));
        assert_eq!(context_range(2, 286, 6), (1, 7));
        assert_eq!(context_range(285, 286, 6), (280, 286));
        assert_eq!(context_range(2, 4, 6), (1, 4));
    }
}
