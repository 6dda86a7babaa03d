//! Coarse articulatory phoneme vocabulary.
//!
//! A [`Phoneme`] here is a mouth-shape class rather than a linguistic phoneme:
//! several ARPAbet phones collapse onto the same symbol when they look alike on
//! a face. Pauses are part of the vocabulary so that punctuation can drive the
//! timeline the same way speech does.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::PauseClass;

/// Symbol of the animation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phoneme {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AHH")]
    Ahh,
    #[serde(rename = "OHH")]
    Ohh,
    #[serde(rename = "EH")]
    Eh,
    #[serde(rename = "IEE")]
    Iee,
    #[serde(rename = "UUU")]
    Uuu,
    #[serde(rename = "SCHWA")]
    Schwa,
    #[serde(rename = "MBP")]
    Mbp,
    #[serde(rename = "FFF")]
    Fff,
    #[serde(rename = "TTH")]
    Tth,
    #[serde(rename = "SSS")]
    Sss,
    #[serde(rename = "RRR")]
    Rrr,
    #[serde(rename = "PAUSE_SHORT")]
    PauseShort,
    #[serde(rename = "PAUSE_MED")]
    PauseMed,
    #[serde(rename = "PAUSE_LONG")]
    PauseLong,
    /// Symbol outside the vocabulary. Keeps its timing slot but has no shape.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Phoneme {
    pub const ALL: [Phoneme; 16] = [
        Phoneme::Aaa,
        Phoneme::Ahh,
        Phoneme::Ohh,
        Phoneme::Eh,
        Phoneme::Iee,
        Phoneme::Uuu,
        Phoneme::Schwa,
        Phoneme::Mbp,
        Phoneme::Fff,
        Phoneme::Tth,
        Phoneme::Sss,
        Phoneme::Rrr,
        Phoneme::PauseShort,
        Phoneme::PauseMed,
        Phoneme::PauseLong,
        Phoneme::Unknown,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Phoneme::Aaa => "AAA",
            Phoneme::Ahh => "AHH",
            Phoneme::Ohh => "OHH",
            Phoneme::Eh => "EH",
            Phoneme::Iee => "IEE",
            Phoneme::Uuu => "UUU",
            Phoneme::Schwa => "SCHWA",
            Phoneme::Mbp => "MBP",
            Phoneme::Fff => "FFF",
            Phoneme::Tth => "TTH",
            Phoneme::Sss => "SSS",
            Phoneme::Rrr => "RRR",
            Phoneme::PauseShort => "PAUSE_SHORT",
            Phoneme::PauseMed => "PAUSE_MED",
            Phoneme::PauseLong => "PAUSE_LONG",
            Phoneme::Unknown => "UNKNOWN",
        }
    }

    /// Relative length of the phoneme slot, multiplied by the speed preset.
    pub fn duration_multiplier(self) -> f64 {
        match self {
            Phoneme::Aaa | Phoneme::Ohh => 1.3,
            Phoneme::Uuu => 1.25,
            Phoneme::Ahh | Phoneme::Eh | Phoneme::Iee | Phoneme::Schwa => 1.2,
            Phoneme::Sss => 0.9,
            Phoneme::Fff | Phoneme::Rrr => 0.85,
            Phoneme::Mbp => 0.8,
            Phoneme::Tth => 0.75,
            Phoneme::PauseShort => 2.0,
            Phoneme::PauseMed => 3.0,
            Phoneme::PauseLong => 4.5,
            Phoneme::Unknown => 1.0,
        }
    }

    pub fn is_vowel(self) -> bool {
        matches!(
            self,
            Phoneme::Aaa
                | Phoneme::Ahh
                | Phoneme::Ohh
                | Phoneme::Eh
                | Phoneme::Iee
                | Phoneme::Uuu
                | Phoneme::Schwa
        )
    }

    pub fn is_pause(self) -> bool {
        self.pause_class().is_some()
    }

    pub fn pause_class(self) -> Option<PauseClass> {
        match self {
            Phoneme::PauseShort => Some(PauseClass::Short),
            Phoneme::PauseMed => Some(PauseClass::Medium),
            Phoneme::PauseLong => Some(PauseClass::Long),
            _ => None,
        }
    }

    /// Looks up a vocabulary symbol such as `AAA` or `PAUSE_MED`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Phoneme::ALL
            .iter()
            .copied()
            .filter(|phoneme| *phoneme != Phoneme::Unknown)
            .find(|phoneme| phoneme.symbol().eq_ignore_ascii_case(symbol))
    }

    /// Maps an ARPAbet phone (stress digits allowed, e.g. `AH0`) onto the
    /// vocabulary. Returns `None` for strings that are not ARPAbet phones.
    pub fn from_arpabet(phone: &str) -> Option<Self> {
        let base = phone.trim_end_matches(|c: char| c.is_ascii_digit());
        let phoneme = match base.to_ascii_uppercase().as_str() {
            "AA" | "AE" | "AW" | "AY" => Phoneme::Aaa,
            "AH" | "HH" => Phoneme::Ahh,
            "AO" | "OW" | "OY" => Phoneme::Ohh,
            "EH" | "EY" => Phoneme::Eh,
            "IH" | "IY" | "Y" => Phoneme::Iee,
            "UH" | "UW" | "W" => Phoneme::Uuu,
            "ER" | "R" => Phoneme::Rrr,
            "P" | "B" | "M" => Phoneme::Mbp,
            "F" | "V" => Phoneme::Fff,
            "T" | "D" | "N" | "TH" | "DH" | "L" | "K" | "G" | "NG" => Phoneme::Tth,
            "CH" | "JH" | "SH" | "ZH" | "S" | "Z" => Phoneme::Sss,
            _ => return None,
        };
        Some(phoneme)
    }

    /// Interprets a symbol returned by a phonetic service: vocabulary symbols
    /// first, then ARPAbet. Phone-shaped symbols missing from the ARPAbet
    /// table fall back to [`Phoneme::Schwa`]; anything else is
    /// [`Phoneme::Unknown`].
    pub fn parse_lenient(symbol: &str) -> Self {
        let symbol = symbol.trim();
        Self::from_symbol(symbol)
            .or_else(|| Self::from_arpabet(symbol))
            .unwrap_or_else(|| {
                if looks_like_phone(symbol) {
                    Phoneme::Schwa
                } else {
                    Phoneme::Unknown
                }
            })
    }

    /// Pause symbol emitted for a punctuation mark, if any.
    pub fn for_punctuation(mark: char) -> Option<Self> {
        match mark {
            '.' | '!' | '?' => Some(Phoneme::PauseLong),
            ',' | ';' | ':' => Some(Phoneme::PauseMed),
            '-' => Some(Phoneme::PauseShort),
            _ => None,
        }
    }

    /// Rough mouth shape for a single letter, used by the character fallback.
    pub fn for_letter(letter: char) -> Option<Self> {
        let phoneme = match letter.to_ascii_lowercase() {
            'a' => Phoneme::Aaa,
            'e' => Phoneme::Eh,
            'i' | 'y' => Phoneme::Iee,
            'o' => Phoneme::Ohh,
            'u' | 'w' => Phoneme::Uuu,
            'h' => Phoneme::Ahh,
            'b' | 'm' | 'p' => Phoneme::Mbp,
            'f' | 'v' => Phoneme::Fff,
            't' | 'd' | 'n' | 'l' | 'k' | 'g' | 'q' => Phoneme::Tth,
            's' | 'z' | 'c' | 'x' | 'j' => Phoneme::Sss,
            'r' => Phoneme::Rrr,
            _ => return None,
        };
        Some(phoneme)
    }
}

/// One or two ASCII letters followed by optional stress digits, e.g. `AX0`.
fn looks_like_phone(symbol: &str) -> bool {
    let base = symbol.trim_end_matches(|c: char| c.is_ascii_digit());
    (1..=2).contains(&base.len()) && base.chars().all(|c| c.is_ascii_alphabetic())
}

impl fmt::Display for Phoneme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Phoneme {
    type Err = crate::SpeechSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s)
            .ok_or_else(|| crate::SpeechSyncError::msg(format!("unknown phoneme symbol `{s}`")))
    }
}

/// Piece of input text relevant to phoneme generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextToken {
    Word(String),
    Punctuation(char),
}

/// Splits text into words (letters, digits, apostrophes) and pause-bearing
/// punctuation. Whitespace and other symbols are dropped.
pub fn tokenize(text: &str) -> Vec<TextToken> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '\'' {
            word.push(ch);
            continue;
        }

        flush_word(&mut word, &mut tokens);
        if Phoneme::for_punctuation(ch).is_some() {
            tokens.push(TextToken::Punctuation(ch));
        }
    }
    flush_word(&mut word, &mut tokens);

    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<TextToken>) {
    let trimmed = word.trim_matches('\'');
    if !trimmed.is_empty() {
        tokens.push(TextToken::Word(trimmed.to_string()));
    }
    word.clear();
}

/// Character-based phoneme heuristic used when no phonetic service answers.
///
/// Each letter maps to a mouth shape, runs of the same shape inside a word are
/// collapsed, and punctuation becomes the matching pause.
pub fn fallback_phonemes(text: &str) -> Vec<Phoneme> {
    let mut phonemes = Vec::new();

    for token in tokenize(text) {
        match token {
            TextToken::Punctuation(mark) => {
                phonemes.extend(Phoneme::for_punctuation(mark));
            }
            TextToken::Word(word) => {
                let mut previous = None;
                for phoneme in word.chars().filter_map(Phoneme::for_letter) {
                    if previous != Some(phoneme) {
                        phonemes.push(phoneme);
                    }
                    previous = Some(phoneme);
                }
            }
        }
    }

    phonemes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipliers_follow_vocabulary_classes() {
        for phoneme in Phoneme::ALL {
            let multiplier = phoneme.duration_multiplier();
            if phoneme.is_vowel() {
                assert!((1.2..=1.3).contains(&multiplier), "{phoneme}");
            } else if phoneme.is_pause() {
                assert!((2.0..=4.5).contains(&multiplier), "{phoneme}");
            } else if phoneme == Phoneme::Unknown {
                assert_eq!(multiplier, 1.0);
            } else {
                assert!((0.75..=0.9).contains(&multiplier), "{phoneme}");
            }
        }
    }

    #[test]
    fn symbols_round_trip_through_from_symbol() {
        assert_eq!(Phoneme::from_symbol("PAUSE_MED"), Some(Phoneme::PauseMed));
        assert_eq!(Phoneme::from_symbol("sss"), Some(Phoneme::Sss));
        assert_eq!(Phoneme::from_symbol("UNKNOWN"), None);
        assert!("XYZ".parse::<Phoneme>().is_err());
    }

    #[test]
    fn arpabet_phones_collapse_to_mouth_shapes() {
        assert_eq!(Phoneme::from_arpabet("AE1"), Some(Phoneme::Aaa));
        assert_eq!(Phoneme::from_arpabet("ER0"), Some(Phoneme::Rrr));
        assert_eq!(Phoneme::from_arpabet("NG"), Some(Phoneme::Tth));
        assert_eq!(Phoneme::from_arpabet("ZH"), Some(Phoneme::Sss));
        assert_eq!(Phoneme::from_arpabet("QQ"), None);
        assert_eq!(Phoneme::parse_lenient(" W "), Phoneme::Uuu);
    }

    #[test]
    fn unmapped_phones_become_schwa() {
        assert_eq!(Phoneme::parse_lenient("QQ"), Phoneme::Schwa);
        assert_eq!(Phoneme::parse_lenient("AX0"), Phoneme::Schwa);
        assert_eq!(Phoneme::parse_lenient("???"), Phoneme::Unknown);
        assert_eq!(Phoneme::parse_lenient("hello"), Phoneme::Unknown);
        assert_eq!(Phoneme::parse_lenient(""), Phoneme::Unknown);
    }

    #[test]
    fn serde_uses_vocabulary_symbols() {
        let json = serde_json::to_string(&[Phoneme::PauseLong, Phoneme::Iee]).unwrap();
        assert_eq!(json, r#"["PAUSE_LONG","IEE"]"#);
    }

    #[test]
    fn tokenizer_keeps_words_and_pause_punctuation() {
        let tokens = tokenize("Stop - and listen, now!");
        assert_eq!(
            tokens,
            vec![
                TextToken::Word("Stop".into()),
                TextToken::Punctuation('-'),
                TextToken::Word("and".into()),
                TextToken::Word("listen".into()),
                TextToken::Punctuation(','),
                TextToken::Word("now".into()),
                TextToken::Punctuation('!'),
            ]
        );
    }

    #[test]
    fn fallback_maps_letters_and_punctuation() {
        assert_eq!(
            fallback_phonemes("Hello."),
            vec![
                Phoneme::Ahh,
                Phoneme::Eh,
                Phoneme::Tth,
                Phoneme::Ohh,
                Phoneme::PauseLong
            ]
        );
        assert!(fallback_phonemes("   ").is_empty());
    }
}
