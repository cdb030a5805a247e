//! Message -> InboundUnit conversion.

use teloxide::types::{Chat, Message};

use a1news_core::{
    domain::{Category, ChatId, GroupKey, MediaKind, MessageId},
    ingestion::{InboundMedia, InboundUnit},
};

/// `https://t.me/<username>/<id>` for public chats, else the chat title,
/// else `fallback`.
pub fn source_string(
    username: Option<&str>,
    message_id: Option<i32>,
    title: Option<&str>,
    fallback: Option<&str>,
) -> String {
    match (username.filter(|u| !u.is_empty()), message_id) {
        (Some(u), Some(id)) => format!("https://t.me/{u}/{id}"),
        _ => title
            .or(fallback)
            .map(str::to_string)
            .unwrap_or_default(),
    }
}

fn chat_source(chat: &Chat, message_id: Option<i32>, fallback: Option<&str>) -> String {
    source_string(chat.username(), message_id, chat.title(), fallback)
}

fn media_of(msg: &Message) -> Vec<InboundMedia> {
    let message_id = Some(MessageId(msg.id.0));
    let mut media = Vec::new();
    // Largest size is last.
    if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        media.push(InboundMedia {
            kind: MediaKind::Photo,
            file_id: best.file.id.clone(),
            message_id,
        });
    }
    if let Some(video) = msg.video() {
        media.push(InboundMedia {
            kind: MediaKind::Video,
            file_id: video.file.id.clone(),
            message_id,
        });
    }
    media
}

fn base_unit(msg: &Message, source: String, sender_id: String, category: Category) -> InboundUnit {
    InboundUnit {
        chat_id: Some(ChatId(msg.chat.id.0)),
        message_id: Some(MessageId(msg.id.0)),
        media_group_id: msg.media_group_id().map(GroupKey::new),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: media_of(msg),
        source,
        sender_id,
        category,
    }
}

/// A post in a watched channel.
pub fn channel_unit(msg: &Message, category: Category) -> InboundUnit {
    let source = chat_source(&msg.chat, Some(msg.id.0), None);
    let sender_id = msg
        .sender_chat()
        .map(|c| c.id.0)
        .unwrap_or(msg.chat.id.0)
        .to_string();
    base_unit(msg, source, sender_id, category)
}

/// A message an admin forwarded (or wrote) to the bot.
pub fn forwarded_unit(msg: &Message, category: Category) -> InboundUnit {
    let source = if let Some(chat) = msg.forward_from_chat() {
        chat_source(chat, msg.forward_from_message_id(), None)
    } else if let Some(user) = msg.forward_from_user() {
        user.full_name()
    } else if let Some(name) = msg.forward_from_sender_name() {
        name.to_string()
    } else {
        chat_source(&msg.chat, None, None)
    };

    let sender_id = msg
        .forward_from_chat()
        .map(|c| c.id.0.to_string())
        .or_else(|| msg.forward_from_user().map(|u| u.id.0.to_string()))
        .or_else(|| msg.from().map(|u| u.id.0.to_string()))
        .unwrap_or_default();

    base_unit(msg, source, sender_id, category)
}
