//! Roots - Quranic root lexicon
//!
//! Verse text with word-by-word morphology, Proto-Semitic cognates for each
//! root, related verses ranked by shared rare roots (idf weighting), and
//! multi-term search over lemmas, roots and surface forms.
//!
//! Transports talk to the [`LexiconApi`] trait, implemented by [`LexiconStore`].

mod assembler;
pub mod config;
pub mod corpus;
pub mod database;
pub mod gloss;
pub mod indexer;
pub mod interface;
pub mod models;
pub mod ranking;
pub mod search;
mod store;
pub mod transliteration;

pub use config::LexiconConfig;
pub use interface::*;
pub use models::VerseKey;
pub use store::LexiconStore;
