//! End-to-end scenarios against a seeded on-disk database.
//! The store runs without a gloss service, so glosses come from the cache
//! or not at all.

use std::path::Path;

use roots::corpus;
use roots::database::Database;
use roots::gloss::WordGloss;
use roots::models::CognateSource;
use roots::{
    LexiconApi, LexiconConfig, LexiconError, LexiconStore, SearchType, SegmentKeys, TermSelection,
    VerseKey,
};

fn seed(path: &Path) {
    let db = Database::open(path).unwrap();
    let stats = corpus::load_corpus(
        &db,
        demo_data::MORPHOLOGY,
        demo_data::UTHMANI,
        demo_data::TRANSLATIONS,
    )
    .unwrap();
    assert_eq!(stats.verses, demo_data::FIXTURE_VERSE_COUNT);
    assert_eq!(stats.skipped_lines, 0);

    let cognates = corpus::parse_cognates(demo_data::COGNATES_JSON, CognateSource::SemiticRoots).unwrap();
    corpus::load_cognates(&db, &cognates).unwrap();

    let fatihah_glosses: Vec<WordGloss> = demo_data::glosses_for(1, 1)
        .into_iter()
        .map(|g| WordGloss {
            position: g.position,
            text: g.text.clone(),
        })
        .collect();
    db.store_glosses(VerseKey::new(1, 1), &fatihah_glosses).unwrap();
}

fn offline_config(path: &Path) -> LexiconConfig {
    LexiconConfig {
        db_path: path.to_path_buf(),
        gloss_endpoint: None,
        ..Default::default()
    }
}

fn open_seeded() -> (tempfile::TempDir, LexiconStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quran.db");
    seed(&path);
    let store = LexiconStore::open(offline_config(&path)).unwrap();
    (dir, store)
}

#[tokio::test]
async fn verse_panel_uses_cached_glosses_offline() {
    let (_dir, store) = open_seeded();
    assert_eq!(store.total_verses(), 14);

    let verse = store.verse(1, 1).await.unwrap();
    let glosses: Vec<Option<&str>> = verse.words.iter().map(|w| w.translation.as_deref()).collect();
    assert_eq!(
        glosses,
        vec![
            Some("In (the) name"),
            Some("(of) Allah"),
            Some("the Most Gracious"),
            Some("the Most Merciful"),
        ]
    );

    // nothing cached for 1:2 and nothing to fetch from
    let praise = store.verse(1, 2).await.unwrap();
    assert!(praise.words.iter().all(|w| w.translation.is_none()));
    assert!(!praise.roots_summary.is_empty());
}

#[tokio::test]
async fn click_word_then_search_then_related() {
    let (_dir, store) = open_seeded();

    // The user opens 112:1 and clicks "Allah".
    let verse = store.verse(112, 1).await.unwrap();
    let allah = &verse.words[2];
    let selection = TermSelection::Word {
        display_arabic: "ٱللَّهُ".to_string(),
        segments: allah.segments.iter().map(SegmentKeys::from).collect(),
    };
    let term = roots::search::resolve_term(&selection).unwrap();
    assert_eq!(term.search_type, SearchType::Lemma);
    assert_eq!(term.search_key, "{ll~ah");

    let response = store
        .search(vec![term], Some(VerseKey::new(112, 1)), None)
        .await
        .unwrap();
    let keys: Vec<(u16, u16)> = response.results.iter().map(|h| (h.surah, h.ayah)).collect();
    assert_eq!(keys, vec![(1, 1), (1, 2), (112, 2)]);
    assert_eq!(response.total_found, 3);

    // Then asks for verses related to the one they landed on.
    let related = store.related(112, 2, None).await.unwrap();
    assert!(related.iter().all(|r| (r.surah, r.ayah) != (112, 2)));
    assert!(related
        .iter()
        .all(|r| r.shared_roots.iter().any(|s| s.root_buckwalter == "Alh")));
}

#[tokio::test]
async fn root_badge_search_spans_surahs() {
    let (_dir, store) = open_seeded();
    let badge = TermSelection::Root {
        display_arabic: "ن و س".to_string(),
        root_buckwalter: "nws".to_string(),
    };
    let terms = roots::search::resolve_terms(&[badge]);
    assert_eq!(store.count_matches(terms.clone(), None).await.unwrap(), 3);

    let response = store.search(terms, None, Some(2)).await.unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.total_found, 3);
}

#[tokio::test]
async fn reopening_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quran.db");
    seed(&path);

    let first = LexiconStore::open(offline_config(&path)).unwrap();
    let before = first.verse(114, 1).await.unwrap();
    drop(first);

    let second = LexiconStore::open(offline_config(&path)).unwrap();
    let after = second.verse(114, 1).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(second.surahs().unwrap().len(), 3);
}

#[tokio::test]
async fn seeding_twice_leaves_one_copy_of_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quran.db");
    seed(&path);
    seed(&path);

    let store = LexiconStore::open(offline_config(&path)).unwrap();
    assert_eq!(store.total_verses(), 14);
    let verse = store.verse(1, 1).await.unwrap();
    assert_eq!(verse.words.len(), 4);
    assert_eq!(verse.words[0].segments.len(), 2);
    let summary: Vec<(&str, u32)> = verse
        .roots_summary
        .iter()
        .map(|r| (r.root_buckwalter.as_str(), r.occurrences))
        .collect();
    assert_eq!(summary, vec![("smw", 1), ("Alh", 1), ("rHm", 2)]);

    let mercy = store.cognates("rHm").unwrap().unwrap();
    let ids: Vec<(CognateSource, i64)> =
        mercy.entries.iter().map(|e| (e.id.source, e.id.local_id)).collect();
    assert_eq!(ids, vec![(CognateSource::SemiticRoots, 2), (CognateSource::Starling, 57)]);
}

#[tokio::test]
async fn empty_database_has_no_verses() {
    let dir = tempfile::tempdir().unwrap();
    let store = LexiconStore::open(offline_config(&dir.path().join("empty.db"))).unwrap();
    assert_eq!(store.total_verses(), 0);
    assert!(store.surahs().unwrap().is_empty());
    assert!(matches!(store.verse(1, 1).await, Err(LexiconError::NotFound { .. })));
    assert!(matches!(store.related(1, 1, None).await, Err(LexiconError::NotFound { .. })));
}

#[tokio::test]
async fn payloads_serialize_for_transports() {
    let (_dir, store) = open_seeded();
    let verse = store.verse(1, 1).await.unwrap();
    let json = serde_json::to_value(&verse).unwrap();
    assert_eq!(json["surah"], 1);
    assert_eq!(json["words"][0]["position"], 1);
    assert_eq!(json["roots_summary"][0]["root_buckwalter"], "smw");
    assert_eq!(json["roots_summary"][0]["cognate"]["semitic_root_id"]["source"], "semiticroots");

    let term = store.resolve_word(1, 1, 1).unwrap().unwrap();
    let json = serde_json::to_value(&term).unwrap();
    assert_eq!(json["search_type"], "lemma");

    let selection: TermSelection = serde_json::from_str(
        r#"{"kind": "root", "display_arabic": "ر ح م", "root_buckwalter": "rHm"}"#,
    )
    .unwrap();
    let term = roots::search::resolve_term(&selection).unwrap();
    assert_eq!(term.search_type, SearchType::Root);
}
