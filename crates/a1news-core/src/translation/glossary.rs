//! Tokenizing a translation into glossary candidates and filtering model answers.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::domain::{Glossary, WordEntry};

/// Parts of speech a learner does not need glossed.
const CLOSED_CLASS: &[&str] = &[
    "preposition",
    "article",
    "proper noun",
    "auxiliary verb",
    "particle",
    "pronoun",
    "conjunction",
    "symbol",
    "adverb",
];

/// A word of the translated text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// As written in the text, minus surrounding punctuation.
    pub surface: String,
    /// Vocabulary cache key.
    pub key: String,
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '«' | '»' | '…' | '·' | '\u{037E}' | '“' | '”' | '‘' | '’' | '–' | '—'
        )
}

/// Strip leading and trailing punctuation.
pub fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(is_punctuation)
}

/// Cache key for a word: punctuation-stripped and lower-cased.
pub fn normalize_word(word: &str) -> String {
    strip_punctuation(word.trim()).to_lowercase()
}

/// Words of `text` that may need a gloss, deduplicated in order of first use.
///
/// Hashtags, purely ASCII-alphabetic words (Latin-script names and loanwords)
/// and words starting with a digit are skipped.
pub fn glossary_tokens(text: &str) -> Vec<Token> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in text.split_whitespace() {
        if raw.starts_with('#') {
            continue;
        }
        let surface = strip_punctuation(raw);
        if surface.is_empty()
            || surface.chars().all(|c| c.is_ascii_alphabetic())
            || surface.chars().next().is_some_and(|c| c.is_ascii_digit())
        {
            continue;
        }
        if seen.insert(surface.to_string()) {
            out.push(Token {
                surface: surface.to_string(),
                key: surface.to_lowercase(),
            });
        }
    }
    out
}

/// Decode `{"word": ["translation", "part of speech"]}` into cache entries.
///
/// Entries with an unexpected shape are skipped; a missing part of speech
/// becomes an empty string.
pub fn parse_word_entries(map: &Map<String, Value>) -> Vec<WordEntry> {
    map.iter()
        .filter_map(|(word, value)| {
            let items = value.as_array()?;
            let translation = items.first()?.as_str()?.trim();
            let part_of_speech = items.get(1).and_then(Value::as_str).unwrap_or_default();
            let word = normalize_word(word);
            if word.is_empty() || translation.is_empty() {
                return None;
            }
            Some(WordEntry {
                word,
                translation: translation.to_string(),
                part_of_speech: part_of_speech.trim().to_lowercase(),
            })
        })
        .collect()
}

/// `false` for closed-class words and words that translate to themselves.
pub fn is_useful(entry: &WordEntry) -> bool {
    let pos = entry.part_of_speech.trim().to_lowercase();
    if CLOSED_CLASS.contains(&pos.as_str()) {
        return false;
    }
    entry.translation.trim().to_lowercase() != entry.word.trim().to_lowercase()
}

/// Glossary keyed by surface form for every token with a useful entry.
pub fn select_glossary(tokens: &[Token], entries: &HashMap<String, WordEntry>) -> Glossary {
    tokens
        .iter()
        .filter_map(|t| {
            let entry = entries.get(&t.key)?;
            is_useful(entry).then(|| (t.surface.clone(), entry.translation.clone()))
        })
        .collect()
}
