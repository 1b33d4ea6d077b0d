//! Text hygiene applied to every loaded document
//!
//! PDF extraction in particular produces text with ligatures, accents the
//! embedder handles poorly, letters separated by spaces and ragged whitespace.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t\x0B\x0C\r]+").expect("valid horizontal whitespace regex")
});

static TRAILING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m) +$").expect("valid trailing whitespace regex"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

static WORD_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid word gap regex"));

/// Minimum tokens on a line before it can be judged garbled
const GARBLED_MIN_TOKENS: usize = 4;

/// Share of single-character tokens that marks a line as garbled
const GARBLED_RATIO: f32 = 0.7;

/// Map ligatures, smart punctuation and odd spaces to plain ASCII
pub fn replace_typographic(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push_str("--"),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2022}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' | '\u{202F}' => out.push(' '),
            '\u{00AD}' | '\u{200B}' | '\u{FEFF}' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Remove diacritics by NFKD decomposition, dropping combining marks
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Rejoin lines that were extracted one letter at a time
///
/// `"T h e  q u i c k  f o x"` becomes `"The quick fox"`: runs of two or
/// more spaces separate words, single spaces separate letters.
pub fn despace_garbled(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if is_garbled(line) {
                WORD_GAP
                    .split(line.trim())
                    .map(|word| word.split(' ').collect::<String>())
                    .filter(|word| !word.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_garbled(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < GARBLED_MIN_TOKENS {
        return false;
    }
    let single = tokens.iter().filter(|t| t.chars().count() == 1).count();
    single as f32 / tokens.len() as f32 >= GARBLED_RATIO
}

/// Collapse runs of horizontal whitespace and excess blank lines
///
/// Indentation is reduced to a single space rather than removed.
pub fn collapse_whitespace(text: &str) -> String {
    let text = HORIZONTAL_WS.replace_all(text, " ");
    let text = TRAILING_WS.replace_all(&text, "");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}

/// Full cleanup pass applied to every loaded document
pub fn normalize_text(text: &str) -> String {
    let text = replace_typographic(text);
    let text = strip_diacritics(&text);
    let text = despace_garbled(&text);
    collapse_whitespace(&text)
}
