//! Shared fixture corpus for tests, benchmarks and the seeding tool.
//!
//! Covers Al-Fatihah (1), Al-Ikhlas (112) and An-Nas (114): verse text,
//! translation, morphology, word glosses and a few cognate records from
//! both etymological sources.

use once_cell::sync::Lazy;

/// Morphology lines: `(surah:ayah:word:segment)\tFORM\tTAG\tFEATURES`
pub const MORPHOLOGY: &str = include_str!("../data/morphology.txt");

/// Uthmani text, `surah|ayah|text`
pub const UTHMANI: &str = include_str!("../data/uthmani.txt");

/// Sahih International translation, `surah|ayah|text`
pub const TRANSLATIONS: &str = include_str!("../data/translation.txt");

/// Cognate records as the scrapers emit them
pub const COGNATES_JSON: &str = include_str!("../data/cognates.json");

const GLOSSES_CSV: &str = include_str!("../data/glosses.csv");

/// Surahs present in the fixture, with their verse counts.
pub const FIXTURE_SURAHS: &[(u16, u16)] = &[(1, 7), (112, 4), (114, 3)];

/// Number of verses in the fixture
pub const FIXTURE_VERSE_COUNT: usize = 14;

/// Word-by-word English gloss as served by the gloss API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureGloss {
    pub surah: u16,
    pub ayah: u16,
    pub position: u32,
    pub text: String,
}

// Lazy-loaded CSV data
static GLOSSES: Lazy<Vec<FixtureGloss>> = Lazy::new(|| {
    load_glosses().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load fixture glosses: {}", e);
        Vec::new()
    })
});

fn load_glosses() -> Result<Vec<FixtureGloss>, Box<dyn std::error::Error>> {
    let mut reader = csv::Reader::from_reader(GLOSSES_CSV.as_bytes());
    let mut glosses = Vec::new();

    for result in reader.records() {
        let record = result?;
        let field = |i: usize| record.get(i).ok_or("Missing gloss column");
        glosses.push(FixtureGloss {
            surah: field(0)?.parse()?,
            ayah: field(1)?.parse()?,
            position: field(2)?.parse()?,
            text: field(3)?.to_string(),
        });
    }

    Ok(glosses)
}

/// Every fixture gloss, ordered by verse then position.
pub fn glosses() -> &'static [FixtureGloss] {
    &GLOSSES
}

/// Glosses of one verse, ordered by position.
pub fn glosses_for(surah: u16, ayah: u16) -> Vec<&'static FixtureGloss> {
    GLOSSES
        .iter()
        .filter(|g| g.surah == surah && g.ayah == ayah)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glosses_parse() {
        assert_eq!(glosses().len(), 52);
        let samad = glosses_for(112, 2);
        assert_eq!(samad.len(), 2);
        assert_eq!(samad[1].text, "the Eternal, the Absolute");
    }

    #[test]
    fn test_fixture_sizes_agree() {
        let verses = UTHMANI.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(verses, FIXTURE_VERSE_COUNT);
        let counted: u16 = FIXTURE_SURAHS.iter().map(|(_, n)| n).sum();
        assert_eq!(usize::from(counted), FIXTURE_VERSE_COUNT);
        assert_eq!(TRANSLATIONS.lines().filter(|l| !l.trim().is_empty()).count(), FIXTURE_VERSE_COUNT);
    }
}
