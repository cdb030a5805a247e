use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{errors::Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Primary key of a News row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewsId(pub i64);

impl fmt::Display for NewsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grouping key shared by every physical message of one logical news item.
///
/// Platform keys are positive numeric strings. Records created without a key
/// get a synthetic one derived from their own id, which is negative.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn synthetic(id: NewsId) -> Self {
        Self((-id.0).to_string())
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with('-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category tag; selects the output channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[default]
    General,
    Gaming,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::General, Category::Gaming];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Gaming => "gaming",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Category::General),
            "gaming" => Ok(Category::Gaming),
            other => Err(Error::Config(format!("unknown category: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            other => Err(Error::Store(format!("unknown media kind: {other}"))),
        }
    }
}

/// Lifecycle of a News record.
///
/// `Placeholder` anchors media that arrived before any text and is never
/// drained; the other states follow `raw -> translated -> published`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NewsStatus {
    Placeholder,
    Raw,
    Translated,
    Published,
}

impl NewsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NewsStatus::Placeholder => "placeholder",
            NewsStatus::Raw => "raw",
            NewsStatus::Translated => "translated",
            NewsStatus::Published => "published",
        }
    }

    /// Status a record with `text` starts in.
    pub fn for_text(text: &str) -> Self {
        if text.trim().is_empty() {
            NewsStatus::Placeholder
        } else {
            NewsStatus::Raw
        }
    }

    pub fn is_drainable(self) -> bool {
        matches!(self, NewsStatus::Raw | NewsStatus::Translated)
    }
}

impl FromStr for NewsStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "placeholder" => Ok(NewsStatus::Placeholder),
            "raw" => Ok(NewsStatus::Raw),
            "translated" => Ok(NewsStatus::Translated),
            "published" => Ok(NewsStatus::Published),
            other => Err(Error::Store(format!("unknown news status: {other}"))),
        }
    }
}

/// Simplified-language word -> source-language translation.
pub type Glossary = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub struct News {
    pub id: NewsId,
    pub original_text: String,
    pub translation: Option<String>,
    pub glossary: Option<Glossary>,
    pub source: String,
    pub media_group_id: GroupKey,
    pub status: NewsStatus,
    pub message_id: Option<MessageId>,
    pub chat_id: Option<ChatId>,
    pub sender_id: String,
    pub category: Category,
    pub media: Vec<NewsMedia>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewsMedia {
    pub id: i64,
    pub media_group_id: GroupKey,
    pub kind: MediaKind,
    pub file_id: String,
    pub message_id: Option<MessageId>,
}

/// Fields written when text for a news item is ingested.
#[derive(Clone, Debug, PartialEq)]
pub struct NewsDraft {
    pub original_text: String,
    pub source: String,
    pub media_group_id: Option<GroupKey>,
    pub message_id: Option<MessageId>,
    pub chat_id: Option<ChatId>,
    pub sender_id: String,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDraft {
    pub media_group_id: GroupKey,
    pub kind: MediaKind,
    pub file_id: String,
    pub message_id: Option<MessageId>,
}

/// Partial update of a News row; `None` leaves the column untouched.
///
/// The `expect_*` fields turn the write into a compare-and-set: the row is
/// only touched while it still has that status and text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewsUpdate {
    pub status: Option<NewsStatus>,
    pub translation: Option<String>,
    pub glossary: Option<Glossary>,
    pub expect_status: Option<NewsStatus>,
    pub expect_text: Option<String>,
}

impl NewsUpdate {
    /// `raw -> translated`, storing translation and glossary together.
    pub fn translated(translation: String, glossary: Glossary) -> Self {
        Self {
            status: Some(NewsStatus::Translated),
            translation: Some(translation),
            glossary: Some(glossary),
            expect_status: Some(NewsStatus::Raw),
            ..Self::default()
        }
    }

    /// `translated -> published`.
    pub fn published() -> Self {
        Self {
            status: Some(NewsStatus::Published),
            expect_status: Some(NewsStatus::Translated),
            ..Self::default()
        }
    }

    /// Only apply while the row still carries `text`.
    pub fn if_text_is(mut self, text: &str) -> Self {
        self.expect_text = Some(text.to_string());
        self
    }
}

/// One vocabulary cache row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordEntry {
    pub word: String,
    pub translation: String,
    pub part_of_speech: String,
}
