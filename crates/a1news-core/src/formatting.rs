//! Formatting utilities (glossary annotation, Telegram HTML / MarkdownV2 escaping).

use regex::Regex;
use tracing::warn;

use crate::{
    domain::Glossary,
    messaging::types::{FormattedText, Markup},
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Characters Telegram MarkdownV2 reserves outside of entities.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Backslash-escape every reserved MarkdownV2 character.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn escape(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Html => escape_html(text),
        Markup::MarkdownV2 => escape_markdown_v2(text),
    }
}

/// Hidden-until-tapped gloss appended after an annotated word.
fn gloss(translation: &str, markup: Markup) -> String {
    match markup {
        Markup::Html => format!(" (<tg-spoiler>{}</tg-spoiler>)", escape_html(translation)),
        Markup::MarkdownV2 => format!(" \\(||{}||\\)", escape_markdown_v2(translation)),
    }
}

/// Whole-word pattern over the glossary keys, longest key first.
///
/// A word matches when it starts with a key (so inflected forms of a cached
/// stem still get a gloss); alternation is leftmost-first, so ordering by
/// length makes the most specific key win.
fn glossary_pattern(glossary: &Glossary) -> Option<Regex> {
    let mut keys: Vec<&str> = glossary
        .keys()
        .map(|k| k.as_str())
        .filter(|k| !k.trim().is_empty())
        .collect();
    if keys.is_empty() {
        return None;
    }
    keys.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });

    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&format!(r"\b({alternation})\w*\b")) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, keys = keys.len(), "glossary pattern failed to compile");
            None
        }
    }
}

/// Escape `text` for `markup` and append a gloss after every word that
/// matches a glossary key. Matching is case-sensitive.
pub fn annotate_words(text: &str, glossary: &Glossary, markup: Markup) -> String {
    let Some(re) = glossary_pattern(glossary) else {
        return escape(text, markup);
    };

    let mut out = String::with_capacity(text.len() * 2);
    let mut last = 0usize;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&escape(&text[last..whole.start()], markup));
        out.push_str(&escape(whole.as_str(), markup));
        if let Some(translation) = glossary.get(key.as_str()) {
            out.push_str(&gloss(translation, markup));
        }
        last = whole.end();
    }
    out.push_str(&escape(&text[last..], markup));
    out
}

fn footer(source: &str, markup: Markup) -> Option<String> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    Some(format!(
        "{}\n{}",
        escape("---", markup),
        escape(&format!("Source: {source}"), markup)
    ))
}

/// Full channel post: annotated translation plus a source footer.
pub fn render_post(
    translation: &str,
    glossary: &Glossary,
    source: &str,
    markup: Markup,
) -> FormattedText {
    let mut body = annotate_words(translation.trim(), glossary, markup);
    if let Some(footer) = footer(source, markup) {
        body.push('\n');
        body.push_str(&footer);
    }
    FormattedText::new(body, markup)
}

/// The post as messages of at most `limit` characters.
///
/// Splits fall on whitespace of the plain translation, so a gloss never
/// straddles two messages. The footer rides on the last message, or goes
/// alone when it does not fit there. A single word longer than `limit`
/// stays one oversized message.
pub fn split_post(
    translation: &str,
    glossary: &Glossary,
    source: &str,
    markup: Markup,
    limit: usize,
) -> Vec<FormattedText> {
    let whole = render_post(translation, glossary, source, markup);
    if whole.char_len() <= limit {
        return vec![whole];
    }

    let mut bodies: Vec<String> = Vec::new();
    let mut plain = String::new();
    let mut rendered = String::new();
    for piece in translation.trim().split_inclusive(char::is_whitespace) {
        let candidate = format!("{plain}{piece}");
        let candidate_rendered = annotate_words(candidate.trim(), glossary, markup);
        if !rendered.is_empty() && candidate_rendered.chars().count() > limit {
            bodies.push(std::mem::take(&mut rendered));
            plain = piece.trim_start().to_string();
            rendered = annotate_words(plain.trim(), glossary, markup);
        } else {
            plain = candidate;
            rendered = candidate_rendered;
        }
    }
    if !rendered.is_empty() {
        bodies.push(rendered);
    }

    if let Some(footer) = footer(source, markup) {
        match bodies.last_mut() {
            Some(last) if last.chars().count() + 1 + footer.chars().count() <= limit => {
                last.push('\n');
                last.push_str(&footer);
            }
            _ => bodies.push(footer),
        }
    }
    bodies
        .into_iter()
        .map(|body| FormattedText::new(body, markup))
        .collect()
}
