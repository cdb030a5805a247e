use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{Category, ChatId, UserId},
    errors::Error,
    messaging::types::Markup,
    utils::split_csv,
    Result,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// An input channel and the category its posts are filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchChannel {
    pub chat_id: ChatId,
    pub category: Category,
}

/// OpenAI-compatible endpoint for one model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Prompt parameters for the simplified retelling and the glossary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageSettings {
    pub target_language: String,
    pub level: String,
    pub gloss_language: String,
    pub max_sentences: u32,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            target_language: "Greek".to_string(),
            level: "A1".to_string(),
            gloss_language: "English".to_string(),
            max_sentences: 6,
        }
    }
}

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub watch_channels: Vec<WatchChannel>,
    pub admin_users: Vec<i64>,
    pub post_channels: HashMap<Category, ChatId>,

    // Ingestion / publishing
    pub media_group_timeout: Duration,
    pub publish_delay: Duration,
    pub publish_markup: Markup,
    pub glossary_required: bool,

    // Database
    pub database_path: PathBuf,
    pub database_max_connections: u32,

    // Language model
    pub translate_model: ModelEndpoint,
    pub words_model: ModelEndpoint,
    pub llm_timeout: Duration,
    pub language: LanguageSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };

        // Required
        let telegram_bot_token = vars.string("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let Some(api_key) = vars.string("OPENAI_API_KEY") else {
            return Err(Error::Config(
                "OPENAI_API_KEY environment variable is required".to_string(),
            ));
        };

        // Input side
        let watch_channels = parse_watch_channels(vars.string("TELEGRAM_WATCH_CHANNELS"))?;
        let admin_users = parse_csv_i64(vars.string("TELEGRAM_ADMIN_USERS"))?;

        // Output side: every category must resolve to a channel.
        let default_post = vars.i64("TELEGRAM_POST_CHANNEL")?;
        let mut post_channels = HashMap::new();
        for category in Category::ALL {
            let key = format!("TELEGRAM_POST_CHANNEL_{}", category.as_str().to_uppercase());
            let chat = vars.i64(&key)?.or(default_post).ok_or_else(|| {
                Error::Config(format!(
                    "no output channel for category '{}': set {key} or TELEGRAM_POST_CHANNEL",
                    category.as_str()
                ))
            })?;
            post_channels.insert(category, ChatId(chat));
        }

        let media_group_timeout =
            Duration::from_millis(vars.u64("MEDIA_GROUP_TIMEOUT")?.unwrap_or(1500));
        let publish_delay = Duration::from_secs(vars.u64("PUBLISH_DELAY_SECS")?.unwrap_or(20));
        let publish_markup = match vars.string("PUBLISH_MARKUP") {
            Some(s) => s.parse()?,
            None => Markup::Html,
        };
        let glossary_required = vars.bool("GLOSSARY_REQUIRED").unwrap_or(false);

        let database_path = PathBuf::from(
            vars.string("DATABASE_PATH")
                .unwrap_or_else(|| "data/a1news.db".to_string()),
        );
        let database_max_connections = vars.u64("DATABASE_MAX_CONNECTIONS")?.unwrap_or(1).max(1) as u32;

        // Translation model, with an optional override set for the vocabulary model.
        let translate_model = ModelEndpoint {
            api_key,
            base_url: vars
                .string("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: vars
                .string("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        };
        let words_model = ModelEndpoint {
            api_key: vars
                .string("WORDS_OPENAI_API_KEY")
                .unwrap_or_else(|| translate_model.api_key.clone()),
            base_url: vars
                .string("WORDS_OPENAI_BASE_URL")
                .unwrap_or_else(|| translate_model.base_url.clone()),
            model: vars
                .string("WORDS_OPENAI_MODEL")
                .unwrap_or_else(|| translate_model.model.clone()),
        };
        let llm_timeout = Duration::from_secs(vars.u64("LLM_TIMEOUT_SECS")?.unwrap_or(120));

        let defaults = LanguageSettings::default();
        let language = LanguageSettings {
            target_language: vars
                .string("TARGET_LANGUAGE")
                .unwrap_or(defaults.target_language),
            level: vars.string("TARGET_LEVEL").unwrap_or(defaults.level),
            gloss_language: vars
                .string("GLOSS_LANGUAGE")
                .unwrap_or(defaults.gloss_language),
            max_sentences: vars
                .u64("MAX_SENTENCES")?
                .map(|n| n.clamp(1, 50) as u32)
                .unwrap_or(defaults.max_sentences),
        };

        Ok(Self {
            telegram_bot_token,
            watch_channels,
            admin_users,
            post_channels,
            media_group_timeout,
            publish_delay,
            publish_markup,
            glossary_required,
            database_path,
            database_max_connections,
            translate_model,
            words_model,
            llm_timeout,
            language,
        })
    }

    /// Category of a watched channel, `None` if the chat is not watched.
    pub fn category_for_chat(&self, chat_id: ChatId) -> Option<Category> {
        self.watch_channels
            .iter()
            .find(|w| w.chat_id == chat_id)
            .map(|w| w.category)
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_users.contains(&user_id.0)
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Trimmed, non-empty value.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.string(key).map(|s| {
            matches!(
                s.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn u64(&self, key: &str) -> Result<Option<u64>> {
        self.string(key)
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{s}'")))
            })
            .transpose()
    }

    fn i64(&self, key: &str) -> Result<Option<i64>> {
        self.string(key)
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| Error::Config(format!("{key} must be a numeric chat id, got '{s}'")))
            })
            .transpose()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    let v = v.unwrap_or_default();
    split_csv(&v)
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid numeric id '{s}'")))
        })
        .collect()
}

/// `id` or `id:category`, comma-separated.
fn parse_watch_channels(v: Option<String>) -> Result<Vec<WatchChannel>> {
    let v = v.unwrap_or_default();
    split_csv(&v)
        .map(|entry| {
            let (id, category) = match entry.split_once(':') {
                Some((id, cat)) => (id.trim(), cat.parse::<Category>()?),
                None => (entry, Category::default()),
            };
            let chat_id = id
                .parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid watch channel id '{id}'")))?;
            Ok(WatchChannel {
                chat_id: ChatId(chat_id),
                category,
            })
        })
        .collect()
}
