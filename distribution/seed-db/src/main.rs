//! Lexicon database seeder
//!
//! Loads the morphology corpus, verse text, translation and cognate records
//! into the SQLite database the lexicon reads. `--demo` seeds the bundled
//! three-surah fixture instead, glosses included.
//!
//! Run with: cargo run -p seed-db -- --demo --db-path data/demo.db

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use roots::corpus::{self, LoadStats};
use roots::database::Database;
use roots::gloss::WordGloss;
use roots::models::CognateSource;
use roots::{LexiconConfig, VerseKey};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the SQLite database (defaults to the configured db_path)
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Morphology corpus, one segment per line
    #[arg(long)]
    morphology: Option<PathBuf>,

    /// Uthmani verse text, `surah|ayah|text`
    #[arg(long)]
    verses: Option<PathBuf>,

    /// English translation, `surah|ayah|text`
    #[arg(long)]
    translations: Option<PathBuf>,

    /// Cognate records (JSON array as a scraper writes it). Repeat for
    /// each scraper output file.
    #[arg(long)]
    cognates: Vec<PathBuf>,

    /// Source of cognate records that do not name one
    #[arg(long, default_value = "semiticroots", value_parser = ["semiticroots", "starling"])]
    cognate_source: String,

    /// Seed the bundled fixture (Al-Fatihah, Al-Ikhlas, An-Nas)
    #[arg(long, conflicts_with_all = ["morphology", "verses", "translations", "cognates"])]
    demo: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_optional(path: Option<&PathBuf>) -> Result<String> {
    path.map(|p| read(p)).transpose().map(Option::unwrap_or_default)
}

/// Fixture glosses grouped per verse, ready for the gloss cache.
fn demo_glosses() -> BTreeMap<VerseKey, Vec<WordGloss>> {
    let mut by_verse: BTreeMap<VerseKey, Vec<WordGloss>> = BTreeMap::new();
    for gloss in demo_data::glosses() {
        by_verse
            .entry(VerseKey::new(gloss.surah, gloss.ayah))
            .or_default()
            .push(WordGloss {
                position: gloss.position,
                text: gloss.text.clone(),
            });
    }
    by_verse
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !args.demo && (args.morphology.is_none() || args.verses.is_none()) {
        bail!("Pass --morphology and --verses, or --demo");
    }

    let config = LexiconConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let db_path = args.db_path.unwrap_or(config.db_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("corpus");
    let stats: LoadStats = if args.demo {
        corpus::load_corpus(&db, demo_data::MORPHOLOGY, demo_data::UTHMANI, demo_data::TRANSLATIONS)
    } else {
        let morphology = read_optional(args.morphology.as_ref())?;
        let verses = read_optional(args.verses.as_ref())?;
        let translations = read_optional(args.translations.as_ref())?;
        corpus::load_corpus(&db, &morphology, &verses, &translations)
    }
    .context("Failed to load corpus")?;
    pb.inc(1);

    pb.set_message("cognates");
    let default_source = CognateSource::from_database_name(&args.cognate_source)
        .with_context(|| format!("Unknown cognate source {}", args.cognate_source))?;
    let cognate_files: Vec<(String, String)> = if args.demo {
        vec![("bundled cognates".to_string(), demo_data::COGNATES_JSON.to_string())]
    } else {
        args.cognates
            .iter()
            .map(|path| Ok((path.display().to_string(), read(path)?)))
            .collect::<Result<_>>()?
    };
    let mut cognates = 0;
    for (name, json) in cognate_files.iter().filter(|(_, json)| !json.trim().is_empty()) {
        let entries = corpus::parse_cognates(json, default_source)
            .with_context(|| format!("Failed to parse cognate records in {}", name))?;
        cognates += corpus::load_cognates(&db, &entries)
            .with_context(|| format!("Failed to store cognate records from {}", name))?;
    }
    pb.inc(1);

    pb.set_message("glosses");
    let mut glossed = 0;
    if args.demo {
        for (key, glosses) in demo_glosses() {
            db.store_glosses(key, &glosses)
                .with_context(|| format!("Failed to store glosses for {}", key))?;
            glossed += 1;
        }
    }
    pb.inc(1);
    pb.finish_with_message("Seeding complete");

    info!(
        verses = stats.verses,
        segments = stats.segments,
        cognates,
        "seeded {}",
        db_path.display()
    );
    println!(
        "{} verses, {} translations, {} segments, {} cognate records, {} glossed verses",
        stats.verses, stats.translations, stats.segments, cognates, glossed
    );
    if stats.skipped_lines > 0 {
        println!("Skipped {} malformed lines.", stats.skipped_lines);
    }
    println!("Database size: {} bytes", db.database_size()?);

    Ok(())
}
