use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::pipeline::PublishPipeline;

/// Debounced drain: each `schedule` call re-arms a single timer, and the
/// pipeline drains once `delay` passes without another call. Gives the late
/// parts of a forwarded album time to attach before publishing.
pub struct DelayedDrain {
    pipeline: Arc<PublishPipeline>,
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl DelayedDrain {
    pub fn new(pipeline: Arc<PublishPipeline>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            delay,
            pending: Mutex::new(None),
        })
    }

    pub async fn schedule(self: &Arc<Self>) {
        let cancel = CancellationToken::new();
        {
            let mut pending = self.pending.lock().await;
            if let Some(prev) = pending.replace(cancel.clone()) {
                prev.cancel();
            }
        }
        debug!(delay_ms = self.delay.as_millis() as u64, "drain scheduled");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(this.delay) => {
                    {
                        let mut pending = this.pending.lock().await;
                        if cancel.is_cancelled() {
                            return; // superseded while waiting for the lock
                        }
                        pending.take();
                    }
                    if let Err(e) = this.pipeline.drain().await {
                        error!(error = %e, "scheduled drain failed");
                    }
                }
            }
        });
    }

    /// Cancel a scheduled drain, if any.
    pub async fn cancel(&self) {
        if let Some(token) = self.pending.lock().await.take() {
            token.cancel();
        }
    }
}
