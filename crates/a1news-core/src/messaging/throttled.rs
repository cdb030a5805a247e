use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{FormattedText, MessagingCapabilities, OutgoingMedia},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two outbound calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between posts to the same channel.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Channels accept roughly 20 posts per minute.
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(3000),
        }
    }
}

/// Next free slot of a fixed-interval schedule.
#[derive(Debug)]
struct Slot {
    next: Instant,
}

impl Slot {
    fn now() -> Self {
        Self {
            next: Instant::now(),
        }
    }

    /// Claim the next slot; returns how long to wait for it.
    fn claim(&mut self, interval: Duration) -> Duration {
        let now = Instant::now();
        let start = self.next.max(now);
        self.next = start + interval;
        start - now
    }
}

#[derive(Debug)]
struct Slots {
    global: Slot,
    per_chat: HashMap<ChatId, Slot>,
}

/// MessagingPort decorator that spaces outbound posts.
///
/// Keeps a backlog drain under the channel flood limits; the adapter still
/// retries once on `RetryAfter`.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<Slots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(Slots {
                global: Slot::now(),
                per_chat: HashMap::new(),
            }),
        }
    }

    async fn wait_turn(&self, chat_id: ChatId) {
        let wait = {
            let mut slots = self.slots.lock().await;
            let global = slots.global.claim(self.cfg.global_min_interval);
            let chat = slots
                .per_chat
                .entry(chat_id)
                .or_insert_with(Slot::now)
                .claim(self.cfg.per_chat_min_interval);
            global.max(chat)
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &FormattedText) -> Result<MessageRef> {
        self.wait_turn(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &[OutgoingMedia],
        caption: Option<&FormattedText>,
    ) -> Result<Vec<MessageRef>> {
        self.wait_turn(chat_id).await;
        self.inner.send_media(chat_id, media, caption).await
    }
}
