//! Buckwalter transliteration
//!
//! The morphology corpus spells everything in Buckwalter ASCII. These
//! helpers convert to Arabic script for display and to the dictionary
//! transliteration used by the cognate tables.

/// Buckwalter character → Arabic code point. Unknown characters pass through.
fn buckwalter_char(c: char) -> Option<char> {
    let arabic = match c {
        '\'' => '\u{0621}', // hamza
        '|' => '\u{0622}',  // alef with madda
        '>' => '\u{0623}',  // alef with hamza above
        '&' => '\u{0624}',  // waw with hamza
        '<' => '\u{0625}',  // alef with hamza below
        '}' => '\u{0626}',  // ya with hamza
        'A' => '\u{0627}',
        'b' => '\u{0628}',
        'p' => '\u{0629}', // ta marbuta
        't' => '\u{062A}',
        'v' => '\u{062B}',
        'j' => '\u{062C}',
        'H' => '\u{062D}',
        'x' => '\u{062E}',
        'd' => '\u{062F}',
        '*' => '\u{0630}',
        'r' => '\u{0631}',
        'z' => '\u{0632}',
        's' => '\u{0633}',
        '$' => '\u{0634}',
        'S' => '\u{0635}',
        'D' => '\u{0636}',
        'T' => '\u{0637}',
        'Z' => '\u{0638}',
        'E' => '\u{0639}',
        'g' => '\u{063A}',
        '_' => '\u{0640}', // tatweel
        'f' => '\u{0641}',
        'q' => '\u{0642}',
        'k' => '\u{0643}',
        'l' => '\u{0644}',
        'm' => '\u{0645}',
        'n' => '\u{0646}',
        'h' => '\u{0647}',
        'w' => '\u{0648}',
        'Y' => '\u{0649}', // alef maksura
        'y' => '\u{064A}',
        'F' => '\u{064B}', // fathatan
        'N' => '\u{064C}', // dammatan
        'K' => '\u{064D}', // kasratan
        'a' => '\u{064E}',
        'u' => '\u{064F}',
        'i' => '\u{0650}',
        '~' => '\u{0651}', // shadda
        'o' => '\u{0652}', // sukun
        '^' => '\u{0653}', // maddah above
        '#' => '\u{0654}', // hamza above
        '`' => '\u{0670}', // superscript alef
        '{' => '\u{0671}', // alef wasla
        'P' => '\u{067E}',
        'J' => '\u{0686}',
        'V' => '\u{06A4}',
        'G' => '\u{06AF}',
        _ => return None,
    };
    Some(arabic)
}

/// Convert a Buckwalter string to Arabic script.
pub fn buckwalter_to_arabic(bw: &str) -> String {
    bw.chars().map(|c| buckwalter_char(c).unwrap_or(c)).collect()
}

/// Space the base letters of an Arabic root for display, dropping
/// diacritics: `ملك` → `م ل ك`.
pub fn space_root(root_arabic: &str) -> String {
    root_arabic
        .chars()
        .filter(|c| ('\u{0621}'..='\u{064A}').contains(c))
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Buckwalter consonant → semiticroots transliteration.
fn semitic_consonant(c: char) -> Option<&'static str> {
    let sr = match c {
        '\'' | '>' | '<' | '&' | '}' | 'A' => "ʔ",
        'b' => "b",
        't' => "t",
        'v' => "ṯ",
        'j' => "g",
        'H' => "ḥ",
        'x' => "ḫ",
        'd' => "d",
        '*' => "ḏ",
        'r' => "r",
        'z' => "z",
        's' => "s¹",
        '$' => "s²",
        'S' => "ṣ",
        'D' => "ḍ",
        'T' => "ṭ",
        'Z' => "ẓ",
        'E' => "ʕ",
        'g' => "ġ",
        'f' => "f",
        'q' => "q",
        'k' => "k",
        'l' => "l",
        'm' => "m",
        'n' => "n",
        'h' => "h",
        'w' => "w",
        'y' => "y",
        _ => return None,
    };
    Some(sr)
}

/// Convert a Buckwalter root to the key of the cognate tables:
/// `Hmd` → `ḥ-m-d`, `smw` → `s¹-m-w`.
pub fn root_to_semitic(bw_root: &str) -> String {
    bw_root
        .chars()
        .map(|c| semitic_consonant(c).map(str::to_string).unwrap_or_else(|| c.to_string()))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_to_arabic_and_spaced() {
        let arabic = buckwalter_to_arabic("smw");
        assert_eq!(arabic, "سمو");
        assert_eq!(space_root(&arabic), "س م و");
    }

    #[test]
    fn test_diacritics_are_dropped_when_spacing() {
        let arabic = buckwalter_to_arabic("ma`lik");
        assert_eq!(space_root(&arabic), "م ل ك");
    }

    #[test]
    fn test_unknown_characters_pass_through() {
        assert_eq!(buckwalter_to_arabic("l~ah 1"), "\u{0644}\u{0651}\u{064E}\u{0647} 1");
    }

    #[test]
    fn test_root_to_semitic() {
        assert_eq!(root_to_semitic("Hmd"), "ḥ-m-d");
        assert_eq!(root_to_semitic("smw"), "s¹-m-w");
        assert_eq!(root_to_semitic("rHm"), "r-ḥ-m");
        assert_eq!(root_to_semitic("Alh"), "ʔ-l-h");
        assert_eq!(root_to_semitic("$hd"), "s²-h-d");
    }
}
