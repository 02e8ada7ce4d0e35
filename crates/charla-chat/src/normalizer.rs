//! Spoken-number normalization for Spanish utterances.
//!
//! Number words ("dos", "veinte", "mil") are replaced by digit strings before
//! an utterance is sent upstream, so the dialogue service sees "2" whether the
//! user typed it or said it. Matching is per token and case-sensitive, so
//! callers that want "Dos" to match ask for lower-casing first.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How normalized tokens are put back together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStyle {
    /// Tokens separated by one space.
    #[default]
    Space,
    /// Tokens glued together with no separator.
    Concatenate,
}

impl JoinStyle {
    fn separator(self) -> &'static str {
        match self {
            JoinStyle::Space => " ",
            JoinStyle::Concatenate => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizerOptions {
    pub lowercase: bool,
    pub join: JoinStyle,
}

const LEXICON: &[(&str, &str)] = &[
    ("cero", "0"),
    ("uno", "1"),
    ("dos", "2"),
    ("tres", "3"),
    ("cuatro", "4"),
    ("cinco", "5"),
    ("seis", "6"),
    ("siete", "7"),
    ("ocho", "8"),
    ("nueve", "9"),
    ("diez", "10"),
    ("once", "11"),
    ("doce", "12"),
    ("trece", "13"),
    ("catorce", "14"),
    ("quince", "15"),
    ("dieciséis", "16"),
    ("diecisiete", "17"),
    ("dieciocho", "18"),
    ("diecinueve", "19"),
    ("veinte", "20"),
    ("treinta", "30"),
    ("cuarenta", "40"),
    ("cincuenta", "50"),
    ("sesenta", "60"),
    ("setenta", "70"),
    ("ochenta", "80"),
    ("noventa", "90"),
    ("cien", "100"),
    ("doscientos", "200"),
    ("trescientos", "300"),
    ("cuatrocientos", "400"),
    ("quinientos", "500"),
    ("seiscientos", "600"),
    ("setecientos", "700"),
    ("ochocientos", "800"),
    ("novecientos", "900"),
    ("mil", "1000"),
];

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("Invalid punctuation regex"));

/// Digit string for a lexicon word. Exact, case-sensitive match.
pub fn number_for_word(word: &str) -> Option<&'static str> {
    LEXICON
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, digits)| *digits)
}

/// Replace number words token by token and re-join. No case folding.
pub fn words_to_numbers(text: &str, join: JoinStyle) -> String {
    text.split_whitespace()
        .map(|token| number_for_word(token).unwrap_or(token))
        .collect::<Vec<_>>()
        .join(join.separator())
}

/// Full normalization: optional lower-casing followed by [`words_to_numbers`].
pub fn normalize(text: &str, options: &NormalizerOptions) -> String {
    if options.lowercase {
        words_to_numbers(&text.to_lowercase(), options.join)
    } else {
        words_to_numbers(text, options.join)
    }
}

/// Collapse whitespace, drop punctuation and symbols, and trim.
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUNS.replace_all(text, " ");
    NON_WORD.replace_all(&collapsed, "").trim().to_string()
}
