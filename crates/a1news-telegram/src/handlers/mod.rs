//! Telegram update handlers.
//!
//! - channel posts from watched channels: grouped parts are buffered until the
//!   album is complete, then ingested and drained
//! - private messages from admins: ingested per message, drain is debounced

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, error, info, warn};

use a1news_core::{
    domain::{Category, ChatId, UserId},
    ingestion::{InboundUnit, IngestionHandler},
    pipeline::PublishPipeline,
};

use crate::router::AppState;

pub mod inbound;
pub mod media_group;

/// Ingest one complete unit and drain in the background.
pub async fn ingest_and_drain(
    ingestion: &IngestionHandler,
    pipeline: &Arc<PublishPipeline>,
    unit: InboundUnit,
) {
    match ingestion.ingest(&unit).await {
        Ok(Some(_)) => {
            let pipeline = Arc::clone(pipeline);
            tokio::spawn(async move {
                if let Err(e) = pipeline.drain().await {
                    error!(error = %e, "drain after ingestion failed");
                }
            });
        }
        Ok(None) => {}
        Err(e) => error!(message_id = ?unit.message_id, error = %e, "failed to ingest channel post"),
    }
}

pub async fn handle_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = ChatId(msg.chat.id.0);
    let Some(category) = state.cfg.category_for_chat(chat_id) else {
        debug!(chat_id = chat_id.0, "post from unwatched chat ignored");
        return Ok(());
    };

    let unit = inbound::channel_unit(&msg, category);
    if unit.is_empty() {
        return Ok(());
    }
    state.media_groups.add(unit).await;
    Ok(())
}

pub async fn handle_admin_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);
    if !state.cfg.is_admin(user_id) {
        warn!(user_id = user_id.0, "message from non-admin user ignored");
        return Ok(());
    }

    let unit = inbound::forwarded_unit(&msg, Category::General);
    match state.ingestion.ingest(&unit).await {
        Ok(Some(ingested)) => {
            info!(news_id = %ingested.news_id, "admin forward stored");
            state.delayed_drain.schedule().await;
        }
        Ok(None) => debug!("admin message without text or media ignored"),
        Err(e) => error!(message_id = msg.id.0, error = %e, "failed to ingest admin forward"),
    }
    Ok(())
}
