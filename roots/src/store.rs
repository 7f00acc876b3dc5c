//! LexiconStore - Main API for transports
//!
//! Architecture: SQLite store + in-memory lexical index built at open.
//!
//! Async Cancellation Architecture:
//! When a caller drops a request future we cancel a CancellationToken through
//! a DropGuard. The blocking scoring thread checks this token between phases
//! and inside the parallel scoring loop, and the request resolves to
//! `Cancelled` instead of finishing work nobody will read.

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assembler;
use crate::config::LexiconConfig;
use crate::database::Database;
use crate::gloss::{self, GlossCache, GlossFetcher, OfflineGlossFetcher, QuranComGlossFetcher};
use crate::indexer::LexicalIndex;
use crate::interface::{
    Cognate, ContextVerse, LexiconApi, LexiconError, RelatedVerse, ResolvedTerm, RootSummary,
    SearchHit, SearchResponse, SegmentKeys, SharedRoot, SurahInfo, VerseContext, VerseDetail,
};
use crate::models::{self, StoredSegment, StoredVerse, VerseKey};
use crate::ranking;
use crate::search;
use crate::transliteration::{buckwalter_to_arabic, root_to_semitic, space_root};

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// This is shared across all LexiconStore instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Initialize global Rayon thread pool, leaving cores for Tokio
fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        // Reserve 2 cores for Tokio to ensure responsiveness, but use at least 1 thread.
        let rayon_threads = num_threads.saturating_sub(2).max(1);

        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon_threads)
            .thread_name(|i| format!("roots-rayon-{}", i))
            .build_global();
    });
}

/// RAII guard that cancels a token when dropped.
/// Dropping the request future drops this guard, which triggers the token.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Thread-safe lexicon store
///
/// Concurrency Model:
/// - Database uses r2d2 connection pool (concurrent reads, no mutex blocking)
/// - The lexical index is immutable after open and shared by `Arc`
/// - Blocking work runs on tokio::spawn_blocking threads
/// - Uses global FALLBACK_RUNTIME when called outside any runtime
pub struct LexiconStore {
    db: Arc<Database>,
    index: Arc<LexicalIndex>,
    glosses: Arc<dyn GlossCache>,
    fetcher: Arc<dyn GlossFetcher>,
    config: LexiconConfig,
    /// Text of 1:1, stripped from the head of other surahs' first verse
    bismillah: Option<String>,
}

impl LexiconStore {
    /// Open the database named by `config` with the SQLite gloss cache and
    /// the Quran.com gloss fetcher (or none when no endpoint is configured).
    pub fn open(config: LexiconConfig) -> Result<Self, LexiconError> {
        config
            .validate()
            .map_err(|e| LexiconError::InvalidInput(e.to_string()))?;
        let db = Arc::new(Database::open(&config.db_path)?);
        let fetcher: Arc<dyn GlossFetcher> = match &config.gloss_endpoint {
            Some(endpoint) => Arc::new(QuranComGlossFetcher::new(
                endpoint,
                &config.gloss_language,
                config.gloss_timeout(),
            )?),
            None => Arc::new(OfflineGlossFetcher),
        };
        let glosses: Arc<dyn GlossCache> = db.clone();
        Self::with_parts(db, glosses, fetcher, config)
    }

    /// Assemble a store from explicit collaborators.
    pub fn with_parts(
        db: Arc<Database>,
        glosses: Arc<dyn GlossCache>,
        fetcher: Arc<dyn GlossFetcher>,
        config: LexiconConfig,
    ) -> Result<Self, LexiconError> {
        init_rayon();
        let index = LexicalIndex::build(&db)?;
        let bismillah = if config.strip_bismillah {
            db.fetch_verse(VerseKey::new(1, 1))?
                .map(|v| v.text_uthmani)
                .filter(|text| !text.is_empty())
        } else {
            None
        };
        info!(verses = index.total_verses(), "lexicon store ready");

        Ok(Self {
            db,
            index: Arc::new(index),
            glosses,
            fetcher,
            config,
            bismillah,
        })
    }

    pub fn config(&self) -> &LexiconConfig {
        &self.config
    }

    /// Number of verses the idf weights are computed over
    pub fn total_verses(&self) -> usize {
        self.index.total_verses()
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current()
            .unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    /// Run `work` on a blocking thread. Dropping the returned future cancels
    /// the token handed to `work`; a cancelled run resolves to `Cancelled`.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T, LexiconError>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T, LexiconError> + Send + 'static,
    {
        let token = CancellationToken::new();
        let _guard = DropGuard::new(token.clone());

        // runtime.spawn_blocking() instead of tokio::task::spawn_blocking()
        // so this also works when no runtime is current
        let handle = self.runtime_handle().spawn_blocking(move || {
            let result = work(&token);
            if token.is_cancelled() {
                return Err(LexiconError::Cancelled);
            }
            result
        });

        match handle.await {
            Ok(result) => result,
            // JoinError means the task panicked or was aborted
            Err(_join_error) => Err(LexiconError::Cancelled),
        }
    }

    fn validate_key(surah: u16, ayah: u16) -> Result<VerseKey, LexiconError> {
        VerseKey::validated(surah, ayah).ok_or_else(|| LexiconError::not_found(surah, ayah))
    }

    fn display_text(bismillah: Option<&str>, verse: &StoredVerse) -> String {
        assembler::display_text(&verse.text_uthmani, verse.key, bismillah)
    }

    fn cognate_for(db: &Database, root_buckwalter: &str) -> Result<Option<Cognate>, LexiconError> {
        let entries = db.fetch_cognate_entries(&root_to_semitic(root_buckwalter))?;
        Ok(assembler::merge_cognates(entries))
    }

    /// Verse row, segments and root summary with cognates attached.
    fn load_verse(
        db: &Database,
        key: VerseKey,
    ) -> Result<(StoredVerse, Vec<StoredSegment>, Vec<RootSummary>), LexiconError> {
        let verse = db
            .fetch_verse(key)?
            .ok_or_else(|| LexiconError::not_found(key.surah, key.ayah))?;
        let segments = db.fetch_segments(key)?;
        let mut roots = assembler::summarize_roots(&segments);
        for root in &mut roots {
            root.cognate = Self::cognate_for(db, &root.root_buckwalter)?;
        }
        Ok((verse, segments, roots))
    }

    async fn fill_glosses(&self, key: VerseKey, positions: Vec<u32>) -> BTreeMap<u32, String> {
        if positions.is_empty() {
            return BTreeMap::new();
        }
        let fill = gloss::fill_glosses(
            Arc::clone(&self.glosses),
            Arc::clone(&self.fetcher),
            key,
            positions,
            self.config.gloss_timeout(),
        );
        match self.runtime_handle().spawn(fill).await {
            Ok(fill) => fill.glosses,
            Err(e) => {
                warn!(verse = %key, error = %e, "gloss fill task failed");
                BTreeMap::new()
            }
        }
    }

    fn root_arabic(index: &LexicalIndex, root: &str) -> String {
        index
            .root_arabic(root)
            .map(str::to_string)
            .unwrap_or_else(|| space_root(&buckwalter_to_arabic(root)))
    }
}

#[async_trait::async_trait]
impl LexiconApi for LexiconStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Verse Panel
    // ─────────────────────────────────────────────────────────────────────────────

    async fn verse(&self, surah: u16, ayah: u16) -> Result<VerseDetail, LexiconError> {
        let key = Self::validate_key(surah, ayah)?;

        let db = Arc::clone(&self.db);
        let (verse, segments, roots_summary) =
            self.run_blocking(move |_| Self::load_verse(&db, key)).await?;

        let glosses = self
            .fill_glosses(key, assembler::word_positions(&segments))
            .await;

        Ok(VerseDetail {
            surah,
            ayah,
            text_uthmani: Self::display_text(self.bismillah.as_deref(), &verse),
            translation: verse.translation.unwrap_or_default(),
            words: assembler::group_words(&segments, &glosses),
            roots_summary,
        })
    }

    fn context(&self, surah: u16, ayah: u16) -> Result<VerseContext, LexiconError> {
        if models::verse_count(surah).is_none() {
            return Err(LexiconError::not_found(surah, ayah));
        }
        let surah_total = self.db.count_surah_verses(surah)?;
        if surah_total == 0 || ayah == 0 || ayah > surah_total {
            return Err(LexiconError::not_found(surah, ayah));
        }

        let (first, last) = assembler::context_range(ayah, surah_total, self.config.context_size);
        let context = self
            .db
            .fetch_verse_range(surah, first, last, ayah)?
            .into_iter()
            .map(|verse| ContextVerse {
                surah: verse.key.surah,
                ayah: verse.key.ayah,
                text_uthmani: Self::display_text(self.bismillah.as_deref(), &verse),
                translation: verse.translation.unwrap_or_default(),
            })
            .collect();

        Ok(VerseContext {
            query: VerseKey::new(surah, ayah),
            context,
            surah_total,
        })
    }

    fn cognates(&self, root_buckwalter: &str) -> Result<Option<Cognate>, LexiconError> {
        if root_buckwalter.is_empty() {
            return Ok(None);
        }
        Self::cognate_for(&self.db, root_buckwalter)
    }

    fn surahs(&self) -> Result<Vec<SurahInfo>, LexiconError> {
        Ok(self
            .db
            .surah_verse_counts()?
            .into_iter()
            .map(|(number, verse_count)| SurahInfo {
                number,
                name: models::surah_name(number)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Surah {}", number)),
                verse_count,
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Related Verses
    // ─────────────────────────────────────────────────────────────────────────────

    async fn related(
        &self,
        surah: u16,
        ayah: u16,
        limit: Option<usize>,
    ) -> Result<Vec<RelatedVerse>, LexiconError> {
        let key = Self::validate_key(surah, ayah)?;
        let limit = self.config.related_limit(limit);

        let db = Arc::clone(&self.db);
        let index = Arc::clone(&self.index);
        let bismillah = self.bismillah.clone();

        self.run_blocking(move |token| {
            if index.roots_of(key).is_none() && db.fetch_verse(key)?.is_none() {
                return Err(LexiconError::not_found(key.surah, key.ayah));
            }

            let scored = ranking::score_related(&index, key, limit, token);
            if token.is_cancelled() {
                return Err(LexiconError::Cancelled);
            }

            let keys: Vec<VerseKey> = scored.iter().map(|s| s.key).collect();
            let verses = db.fetch_verses(&keys)?;

            Ok(scored
                .into_iter()
                .map(|s| {
                    let verse = verses.get(&s.key);
                    RelatedVerse {
                        surah: s.key.surah,
                        ayah: s.key.ayah,
                        text_uthmani: verse
                            .map(|v| Self::display_text(bismillah.as_deref(), v))
                            .unwrap_or_default(),
                        translation: verse
                            .and_then(|v| v.translation.clone())
                            .unwrap_or_default(),
                        similarity_score: s.score,
                        shared_roots: s
                            .shared
                            .into_iter()
                            .map(|r| SharedRoot {
                                root_arabic: Self::root_arabic(&index, &r.root),
                                root_buckwalter: r.root,
                                idf: r.idf,
                            })
                            .collect(),
                    }
                })
                .collect())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Word Search
    // ─────────────────────────────────────────────────────────────────────────────

    fn resolve_word(
        &self,
        surah: u16,
        ayah: u16,
        position: u32,
    ) -> Result<Option<ResolvedTerm>, LexiconError> {
        let key = Self::validate_key(surah, ayah)?;
        let segments = self.db.fetch_word_segments(key, position)?;
        if segments.is_empty() {
            return Ok(None);
        }

        let display_arabic: String = segments.iter().map(|s| s.form_arabic.as_str()).collect();
        let keys: Vec<SegmentKeys> = segments
            .iter()
            .map(|s| SegmentKeys::from(&s.to_segment()))
            .collect();

        match search::resolve_segments(&display_arabic, &keys) {
            Ok(term) => Ok(Some(term)),
            Err(LexiconError::InvalidTerm(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn search(
        &self,
        terms: Vec<ResolvedTerm>,
        exclude_verse: Option<VerseKey>,
        limit: Option<usize>,
    ) -> Result<SearchResponse, LexiconError> {
        let terms = search::dedupe_terms(terms);
        let limit = self.config.search_limit(limit);
        if terms.is_empty() {
            return Ok(SearchResponse {
                terms_used: Vec::new(),
                results: Vec::new(),
                total_found: 0,
            });
        }

        let db = Arc::clone(&self.db);
        let index = Arc::clone(&self.index);
        let bismillah = self.bismillah.clone();

        self.run_blocking(move |_| {
            let (hits, total_found) = search::rank_verses(&index, &terms, exclude_verse, limit);
            let keys: Vec<VerseKey> = hits.iter().map(|h| h.key).collect();
            let verses = db.fetch_verses(&keys)?;

            let results = hits
                .into_iter()
                .map(|hit| {
                    let verse = verses.get(&hit.key);
                    SearchHit {
                        surah: hit.key.surah,
                        ayah: hit.key.ayah,
                        text_uthmani: verse
                            .map(|v| Self::display_text(bismillah.as_deref(), v))
                            .unwrap_or_default(),
                        translation: verse
                            .and_then(|v| v.translation.clone())
                            .unwrap_or_default(),
                        score: hit.score,
                        matched_terms: hit.matched_terms,
                        matched_positions: hit.matched_positions,
                    }
                })
                .collect();

            Ok(SearchResponse {
                terms_used: terms,
                results,
                total_found,
            })
        })
        .await
    }

    async fn count_matches(
        &self,
        terms: Vec<ResolvedTerm>,
        exclude_verse: Option<VerseKey>,
    ) -> Result<u64, LexiconError> {
        let terms = search::dedupe_terms(terms);
        if terms.is_empty() {
            return Ok(0);
        }
        let index = Arc::clone(&self.index);
        self.run_blocking(move |_| Ok(search::count_matches(&index, &terms, exclude_verse)))
            .await
    }
}
