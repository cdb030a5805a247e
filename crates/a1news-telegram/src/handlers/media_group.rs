use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use a1news_core::ingestion::InboundUnit;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProcessFn = Arc<dyn Fn(InboundUnit) -> BoxFuture + Send + Sync>;

struct PendingGroup {
    parts: Vec<InboundUnit>,
    cancel: CancellationToken,
}

/// Collects the parts of a media group until no new part has arrived for
/// `timeout`, then hands one combined unit to `process`.
pub struct MediaGroupBuffer {
    process: ProcessFn,
    timeout: Duration,
    pending: tokio::sync::Mutex<HashMap<String, PendingGroup>>,
}

impl MediaGroupBuffer {
    pub fn new(timeout: Duration, process: ProcessFn) -> Arc<Self> {
        Arc::new(Self {
            process,
            timeout,
            pending: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Buffer a part. Units without a grouping key are processed right away.
    pub async fn add(self: &Arc<Self>, unit: InboundUnit) {
        let Some(key) = unit.media_group_id.as_ref().map(|k| k.as_str().to_string()) else {
            (self.process)(unit).await;
            return;
        };

        let cancel = CancellationToken::new();
        {
            let mut map = self.pending.lock().await;
            match map.get_mut(&key) {
                Some(group) => {
                    // Existing group: push and reset the quiet timer.
                    group.parts.push(unit);
                    group.cancel.cancel();
                    group.cancel = cancel.clone();
                }
                None => {
                    map.insert(
                        key.clone(),
                        PendingGroup {
                            parts: vec![unit],
                            cancel: cancel.clone(),
                        },
                    );
                }
            }
        }
        debug!(group = %key, "media group part buffered");
        self.spawn_timer(key, cancel);
    }

    fn spawn_timer(self: &Arc<Self>, key: String, cancel: CancellationToken) {
        let buffer = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(buffer.timeout) => {
                    buffer.flush(&key).await;
                }
            }
        });
    }

    async fn flush(&self, key: &str) {
        let group = {
            let mut map = self.pending.lock().await;
            map.remove(key)
        };
        let Some(group) = group else {
            return;
        };

        let count = group.parts.len();
        if let Some(unit) = InboundUnit::combine(group.parts) {
            debug!(group = %key, parts = count, "media group complete");
            (self.process)(unit).await;
        }
    }

    pub async fn pending_groups(&self) -> usize {
        self.pending.lock().await.len()
    }
}
