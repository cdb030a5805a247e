use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{FormattedText, MessagingCapabilities, OutgoingMedia},
    Result,
};

/// Outbound delivery port used by the publish pipeline.
///
/// Telegram is the only implementation; the shape keeps platform quirks
/// (parse modes, album limits) behind capability flags.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_text(&self, chat_id: ChatId, text: &FormattedText) -> Result<MessageRef>;

    /// Send one photo/video, or an album when `media` has several items.
    /// The caption is attached to the first item.
    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &[OutgoingMedia],
        caption: Option<&FormattedText>,
    ) -> Result<Vec<MessageRef>>;
}
