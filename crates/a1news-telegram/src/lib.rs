//! Telegram adapter (teloxide).
//!
//! Implements the `a1news-core` MessagingPort over the Telegram Bot API and
//! turns channel posts / admin forwards into inbound units.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, InputMedia, InputMediaPhoto, InputMediaVideo, ParseMode},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use a1news_core::{
    domain::{ChatId, MediaKind, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{FormattedText, Markup, MessagingCapabilities, OutgoingMedia},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn parse_mode(markup: Markup) -> ParseMode {
        match markup {
            Markup::Html => ParseMode::Html,
            Markup::MarkdownV2 => ParseMode::MarkdownV2,
        }
    }

    fn message_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    fn album_item(media: &OutgoingMedia, caption: Option<&FormattedText>) -> InputMedia {
        let file = InputFile::file_id(media.file_id.clone());
        match media.kind {
            MediaKind::Photo => {
                let mut item = InputMediaPhoto::new(file);
                if let Some(c) = caption {
                    item = item
                        .caption(c.body.clone())
                        .parse_mode(Self::parse_mode(c.markup));
                }
                InputMedia::Photo(item)
            }
            MediaKind::Video => {
                let mut item = InputMediaVideo::new(file);
                if let Some(c) = caption {
                    item = item
                        .caption(c.body.clone())
                        .parse_mode(Self::parse_mode(c.markup));
                }
                InputMedia::Video(item)
            }
        }
    }

    async fn send_single(
        &self,
        chat_id: ChatId,
        media: &OutgoingMedia,
        caption: Option<&FormattedText>,
    ) -> Result<Message> {
        let chat = Self::tg_chat(chat_id);
        match media.kind {
            MediaKind::Photo => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_photo(chat, InputFile::file_id(media.file_id.clone()));
                    if let Some(c) = caption {
                        req = req
                            .caption(c.body.clone())
                            .parse_mode(Self::parse_mode(c.markup));
                    }
                    req
                })
                .await
            }
            MediaKind::Video => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_video(chat, InputFile::file_id(media.file_id.clone()));
                    if let Some(c) = caption {
                        req = req
                            .caption(c.body.clone())
                            .parse_mode(Self::parse_mode(c.markup));
                    }
                    req
                })
                .await
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities::default()
    }

    async fn send_text(&self, chat_id: ChatId, text: &FormattedText) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.body.clone())
                    .parse_mode(Self::parse_mode(text.markup))
                    .disable_web_page_preview(true)
            })
            .await?;

        Ok(Self::message_ref(chat_id, &msg))
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &[OutgoingMedia],
        caption: Option<&FormattedText>,
    ) -> Result<Vec<MessageRef>> {
        match media {
            [] => Err(Error::Invariant("send_media called without media".to_string())),
            [single] => {
                let msg = self.send_single(chat_id, single, caption).await?;
                Ok(vec![Self::message_ref(chat_id, &msg)])
            }
            items => {
                let album: Vec<InputMedia> = items
                    .iter()
                    .enumerate()
                    .map(|(i, m)| Self::album_item(m, if i == 0 { caption } else { None }))
                    .collect();
                let msgs = self
                    .with_retry(|| {
                        self.bot
                            .send_media_group(Self::tg_chat(chat_id), album.clone())
                    })
                    .await?;
                Ok(msgs.iter().map(|m| Self::message_ref(chat_id, m)).collect())
            }
        }
    }
}
