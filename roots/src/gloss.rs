//! Word-by-word English glosses
//!
//! Glosses come from the Quran.com v4 API and are cached per word. A verse
//! request fills its cache in two explicit phases: read what is cached, and
//! only on a miss fetch the whole verse once and persist the result. A verse
//! the API has answered for is not fetched again, even when the answer left
//! some words without a gloss. Neither phase can fail the request; the caller
//! gets whatever glosses are available.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::database::{Database, DatabaseError};
use crate::models::VerseKey;

/// English gloss of one word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordGloss {
    /// 1-based word position within the verse
    pub position: u32,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum GlossError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gloss service returned status {0}")]
    Status(u16),
    #[error("Malformed gloss response: {0}")]
    Decode(String),
    #[error("Gloss request timed out")]
    Timeout,
    #[error("Gloss service disabled")]
    Offline,
    #[error("Gloss cache error: {0}")]
    Cache(#[from] DatabaseError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetching
// ─────────────────────────────────────────────────────────────────────────────

/// Source of word glosses for a whole verse.
#[async_trait]
pub trait GlossFetcher: Send + Sync {
    async fn fetch_glosses(&self, key: VerseKey) -> Result<Vec<WordGloss>, GlossError>;
}

/// Fetches glosses from `GET {endpoint}/{surah}:{ayah}?language=..&words=true`.
pub struct QuranComGlossFetcher {
    client: reqwest::Client,
    endpoint: Url,
    language: String,
}

impl QuranComGlossFetcher {
    pub fn new(endpoint: &str, language: &str, timeout: Duration) -> Result<Self, GlossError> {
        let endpoint = Url::parse(endpoint).map_err(|e| GlossError::Decode(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(GlossError::Decode(format!("not a base URL: {}", endpoint)));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            language: language.to_string(),
        })
    }

    fn verse_url(&self, key: VerseKey) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&key.to_string());
        }
        url.query_pairs_mut()
            .append_pair("language", &self.language)
            .append_pair("words", "true");
        url
    }
}

#[async_trait]
impl GlossFetcher for QuranComGlossFetcher {
    async fn fetch_glosses(&self, key: VerseKey) -> Result<Vec<WordGloss>, GlossError> {
        let response = self.client.get(self.verse_url(key)).send().await?;
        if !response.status().is_success() {
            return Err(GlossError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        parse_glosses(&body)
    }
}

/// Fetcher used when no gloss service is configured. Every fetch fails, so
/// verses are served with whatever the cache already holds.
pub struct OfflineGlossFetcher;

#[async_trait]
impl GlossFetcher for OfflineGlossFetcher {
    async fn fetch_glosses(&self, _key: VerseKey) -> Result<Vec<WordGloss>, GlossError> {
        Err(GlossError::Offline)
    }
}

#[derive(Deserialize)]
struct VerseEnvelope {
    verse: Option<VerseBody>,
}

#[derive(Deserialize)]
struct VerseBody {
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[derive(Deserialize)]
struct ApiWord {
    position: Option<u32>,
    #[serde(default)]
    char_type_name: String,
    translation: Option<ApiTranslation>,
}

#[derive(Deserialize)]
struct ApiTranslation {
    text: Option<String>,
}

/// Extract word glosses from a `verses/by_key` response body. The trailing
/// verse-number marker (`char_type_name == "end"`) and words without a
/// translation are skipped.
pub fn parse_glosses(body: &str) -> Result<Vec<WordGloss>, GlossError> {
    let envelope: VerseEnvelope =
        serde_json::from_str(body).map_err(|e| GlossError::Decode(e.to_string()))?;
    let words = envelope.verse.map(|v| v.words).unwrap_or_default();

    Ok(words
        .into_iter()
        .filter(|w| w.char_type_name != "end")
        .filter_map(|w| {
            let position = w.position.filter(|p| *p > 0)?;
            let text = w.translation?.text.filter(|t| !t.is_empty())?;
            Some(WordGloss { position, text })
        })
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Caching
// ─────────────────────────────────────────────────────────────────────────────

/// What the cache holds for one verse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedGlosses {
    pub glosses: BTreeMap<u32, String>,
    /// The verse's fetch result has been persisted before
    pub fetched: bool,
}

/// Per-word gloss storage. Writes must be idempotent: two requests racing
/// on the same verse may both persist the same glosses.
pub trait GlossCache: Send + Sync {
    fn cached(&self, key: VerseKey) -> Result<CachedGlosses, GlossError>;
    /// Store the result of fetching `key` and mark the verse as fetched.
    fn persist(&self, key: VerseKey, glosses: &[WordGloss]) -> Result<(), GlossError>;
}

impl GlossCache for Database {
    fn cached(&self, key: VerseKey) -> Result<CachedGlosses, GlossError> {
        Ok(CachedGlosses {
            glosses: self.fetch_glosses(key)?,
            fetched: self.glosses_fetched(key)?,
        })
    }

    fn persist(&self, key: VerseKey, glosses: &[WordGloss]) -> Result<(), GlossError> {
        Ok(self.store_glosses(key, glosses)?)
    }
}

/// Process-local cache, for tests and for running without a writable store.
#[derive(Default)]
pub struct InMemoryGlossCache {
    entries: Mutex<HashMap<VerseKey, BTreeMap<u32, String>>>,
    fetched: Mutex<HashSet<VerseKey>>,
}

impl InMemoryGlossCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GlossCache for InMemoryGlossCache {
    fn cached(&self, key: VerseKey) -> Result<CachedGlosses, GlossError> {
        Ok(CachedGlosses {
            glosses: self.entries.lock().get(&key).cloned().unwrap_or_default(),
            fetched: self.fetched.lock().contains(&key),
        })
    }

    fn persist(&self, key: VerseKey, glosses: &[WordGloss]) -> Result<(), GlossError> {
        {
            let mut entries = self.entries.lock();
            let verse = entries.entry(key).or_default();
            for gloss in glosses {
                verse.insert(gloss.position, gloss.text.clone());
            }
        }
        self.fetched.lock().insert(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Two-phase fill
// ─────────────────────────────────────────────────────────────────────────────

/// Where the returned glosses came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlossOutcome {
    /// Every requested word was already cached
    Cached,
    /// A fetch ran and its result was merged in
    Fetched,
    /// A fetch was needed but failed; only cached glosses are returned
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlossFill {
    pub glosses: BTreeMap<u32, String>,
    pub outcome: GlossOutcome,
}

/// Return glosses for the words at `positions`, fetching the verse at most
/// once if any of them is missing from the cache and the verse has never
/// been fetched.
///
/// Must run inside a tokio runtime: cache access goes through
/// `spawn_blocking` and the fetch is bounded by `timeout`.
pub async fn fill_glosses(
    cache: Arc<dyn GlossCache>,
    fetcher: Arc<dyn GlossFetcher>,
    key: VerseKey,
    positions: Vec<u32>,
    timeout: Duration,
) -> GlossFill {
    // Phase 1: cache lookup
    let read_cache = Arc::clone(&cache);
    let cached = match tokio::task::spawn_blocking(move || read_cache.cached(key)).await {
        Ok(Ok(cached)) => cached,
        Ok(Err(e)) => {
            warn!(verse = %key, error = %e, "gloss cache read failed");
            CachedGlosses::default()
        }
        Err(e) => {
            warn!(verse = %key, error = %e, "gloss cache read task failed");
            CachedGlosses::default()
        }
    };
    let mut glosses = cached.glosses;

    if cached.fetched || positions.iter().all(|p| glosses.contains_key(p)) {
        return GlossFill {
            glosses,
            outcome: GlossOutcome::Cached,
        };
    }

    // Phase 2: one fetch for the whole verse, then best-effort persist
    let fetched = match tokio::time::timeout(timeout, fetcher.fetch_glosses(key)).await {
        Ok(result) => result,
        Err(_) => Err(GlossError::Timeout),
    };

    match fetched {
        Ok(fetched) => {
            debug!(verse = %key, words = fetched.len(), "fetched glosses");
            for gloss in &fetched {
                glosses
                    .entry(gloss.position)
                    .or_insert_with(|| gloss.text.clone());
            }
            let write_cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || write_cache.persist(key, &fetched)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(verse = %key, error = %e, "failed to persist glosses"),
                Err(e) => warn!(verse = %key, error = %e, "gloss persist task failed"),
            }
            GlossFill {
                glosses,
                outcome: GlossOutcome::Fetched,
            }
        }
        Err(e) => {
            warn!(verse = %key, error = %e, "gloss fetch failed, serving cached glosses only");
            GlossFill {
                glosses,
                outcome: GlossOutcome::Unavailable,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        glosses: Vec<WordGloss>,
    }

    impl CountingFetcher {
        fn new(glosses: &[(u32, &str)]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                glosses: glosses
                    .iter()
                    .map(|(position, text)| WordGloss {
                        position: *position,
                        text: text.to_string(),
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl GlossFetcher for CountingFetcher {
        async fn fetch_glosses(&self, _key: VerseKey) -> Result<Vec<WordGloss>, GlossError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.glosses.clone())
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl GlossFetcher for SlowFetcher {
        async fn fetch_glosses(&self, _key: VerseKey) -> Result<Vec<WordGloss>, GlossError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    /// Cache holding glosses for `key` without a recorded fetch.
    fn partially_cached(key: VerseKey, glosses: &[(u32, &str)]) -> Arc<InMemoryGlossCache> {
        let cache = InMemoryGlossCache::new();
        cache.entries.lock().insert(
            key,
            glosses.iter().map(|(p, text)| (*p, text.to_string())).collect(),
        );
        Arc::new(cache)
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_skips_end_marker_and_empty_translations() {
        let body = r#"{"verse": {"id": 1, "words": [
            {"position": 1, "char_type_name": "word", "translation": {"text": "In (the) name", "language_name": "english"}},
            {"position": 2, "char_type_name": "word", "translation": {"text": "(of) Allah"}},
            {"position": 3, "char_type_name": "word", "translation": {"text": ""}},
            {"position": 4, "char_type_name": "word"},
            {"position": 5, "char_type_name": "end", "translation": {"text": "(1)"}}
        ]}}"#;
        let glosses = parse_glosses(body).unwrap();
        assert_eq!(
            glosses,
            vec![
                WordGloss { position: 1, text: "In (the) name".to_string() },
                WordGloss { position: 2, text: "(of) Allah".to_string() },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(matches!(parse_glosses("<html>"), Err(GlossError::Decode(_))));
        assert!(parse_glosses("{}").unwrap().is_empty());
    }

    #[test]
    fn test_verse_url() {
        let fetcher = QuranComGlossFetcher::new(
            "https://api.quran.com/api/v4/verses/by_key",
            "en",
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(
            fetcher.verse_url(VerseKey::new(2, 255)).as_str(),
            "https://api.quran.com/api/v4/verses/by_key/2:255?language=en&words=true"
        );
        assert!(QuranComGlossFetcher::new("not a url", "en", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_miss_fetches_once_then_hits_cache() {
        let rt = runtime();
        let cache: Arc<dyn GlossCache> = Arc::new(InMemoryGlossCache::new());
        let fetcher = Arc::new(CountingFetcher::new(&[(1, "Say"), (2, "He"), (3, "(is) Allah")]));
        let key = VerseKey::new(112, 1);

        let first = rt.block_on(fill_glosses(
            Arc::clone(&cache),
            fetcher.clone(),
            key,
            vec![1, 2, 3],
            Duration::from_secs(1),
        ));
        assert_eq!(first.outcome, GlossOutcome::Fetched);
        assert_eq!(first.glosses.len(), 3);

        let second = rt.block_on(fill_glosses(
            Arc::clone(&cache),
            fetcher.clone(),
            key,
            vec![1, 2, 3],
            Duration::from_secs(1),
        ));
        assert_eq!(second.outcome, GlossOutcome::Cached);
        assert_eq!(second.glosses, first.glosses);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cached_glosses_are_not_overwritten() {
        let rt = runtime();
        let key = VerseKey::new(1, 2);
        let cache = partially_cached(key, &[(1, "All praises")]);
        let fetcher = Arc::new(CountingFetcher::new(&[(1, "Praise"), (2, "(be) to Allah")]));

        let fill = rt.block_on(fill_glosses(
            cache,
            fetcher,
            key,
            vec![1, 2],
            Duration::from_secs(1),
        ));
        assert_eq!(fill.glosses.get(&1).map(String::as_str), Some("All praises"));
        assert_eq!(fill.glosses.get(&2).map(String::as_str), Some("(be) to Allah"));
    }

    #[test]
    fn test_failure_and_timeout_fall_back_to_cache() {
        let rt = runtime();
        let key = VerseKey::new(1, 3);
        let cache = partially_cached(key, &[(1, "The Most Gracious")]);

        let offline = rt.block_on(fill_glosses(
            cache.clone(),
            Arc::new(OfflineGlossFetcher),
            key,
            vec![1, 2],
            Duration::from_secs(1),
        ));
        assert_eq!(offline.outcome, GlossOutcome::Unavailable);
        assert_eq!(offline.glosses.len(), 1);

        let slow = rt.block_on(fill_glosses(
            cache,
            Arc::new(SlowFetcher),
            key,
            vec![1, 2],
            Duration::from_millis(20),
        ));
        assert_eq!(slow.outcome, GlossOutcome::Unavailable);
        assert_eq!(slow.glosses.len(), 1);
    }

    #[test]
    fn test_database_backed_cache() {
        let rt = runtime();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let fetcher = Arc::new(CountingFetcher::new(&[(1, "Say")]));
        let key = VerseKey::new(112, 1);

        let fill = rt.block_on(fill_glosses(
            db.clone(),
            fetcher,
            key,
            vec![1],
            Duration::from_secs(1),
        ));
        assert_eq!(fill.outcome, GlossOutcome::Fetched);
        let cached = db.cached(key).unwrap();
        assert!(cached.fetched);
        assert_eq!(cached.glosses.get(&1).map(String::as_str), Some("Say"));
    }

    #[test]
    fn test_words_the_api_never_glosses_are_fetched_once() {
        let rt = runtime();
        // position 2 never comes back from the API
        let fetcher = Arc::new(CountingFetcher::new(&[(1, "Say"), (3, "(is) Allah")]));
        let key = VerseKey::new(112, 1);
        let in_memory: Arc<dyn GlossCache> = Arc::new(InMemoryGlossCache::new());
        let on_disk: Arc<dyn GlossCache> = Arc::new(Database::open_in_memory().unwrap());

        for cache in [in_memory, on_disk] {
            let first = rt.block_on(fill_glosses(
                Arc::clone(&cache),
                fetcher.clone(),
                key,
                vec![1, 2, 3],
                Duration::from_secs(1),
            ));
            assert_eq!(first.outcome, GlossOutcome::Fetched);
            assert!(!first.glosses.contains_key(&2));

            let second = rt.block_on(fill_glosses(
                cache,
                fetcher.clone(),
                key,
                vec![1, 2, 3],
                Duration::from_secs(1),
            ));
            assert_eq!(second.outcome, GlossOutcome::Cached);
            assert_eq!(second.glosses, first.glosses);
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
