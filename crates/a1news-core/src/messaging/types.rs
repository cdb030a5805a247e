use std::str::FromStr;

use crate::{
    domain::{MediaKind, NewsMedia},
    errors::Error,
    Result,
};

/// Markup dialect of an outgoing body.
///
/// `Html` only needs `&`, `<`, `>` escaped; `MarkdownV2` reserves most
/// punctuation and every occurrence must be backslash-escaped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Markup {
    #[default]
    Html,
    MarkdownV2,
}

impl FromStr for Markup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(Markup::Html),
            "markdown_v2" | "markdownv2" | "markdown" => Ok(Markup::MarkdownV2),
            other => Err(Error::Config(format!("unknown markup mode: {other}"))),
        }
    }
}

/// Body already escaped for `markup`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedText {
    pub body: String,
    pub markup: Markup,
}

impl FormattedText {
    pub fn new(body: impl Into<String>, markup: Markup) -> Self {
        Self {
            body: body.into(),
            markup,
        }
    }

    /// Length as the platform counts it (characters, not bytes).
    pub fn char_len(&self) -> usize {
        self.body.chars().count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMedia {
    pub kind: MediaKind,
    pub file_id: String,
}

impl From<&NewsMedia> for OutgoingMedia {
    fn from(m: &NewsMedia) -> Self {
        Self {
            kind: m.kind,
            file_id: m.file_id.clone(),
        }
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
    pub max_caption_len: usize,
    pub max_album_len: usize,
}

impl Default for MessagingCapabilities {
    fn default() -> Self {
        // Telegram Bot API limits.
        Self {
            max_message_len: 4096,
            max_caption_len: 1024,
            max_album_len: 10,
        }
    }
}
