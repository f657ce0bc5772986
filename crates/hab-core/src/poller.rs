//! Single-consumer inbound polling loop.
//!
//! Fetches a batch from an [`UpdateSource`] with an explicit cursor, hands every update to the
//! orchestrator in arrival order, and only then asks for the next batch. The cursor never
//! decreases, so a crash mid-batch at most replays updates that were already seen.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{messaging::types::PolledUpdate, orchestrator::AlarmBot, Result};

/// Inbound half of the chat platform (long polling).
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch updates with id >= `offset`, waiting up to `timeout` for one to arrive.
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<PolledUpdate>>;
}

#[derive(Clone, Copy, Debug)]
pub struct PollerConfig {
    pub poll_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(5),
        }
    }
}

pub struct Poller {
    source: Arc<dyn UpdateSource>,
    bot: Arc<AlarmBot>,
    cfg: PollerConfig,
    cursor: i64,
}

impl Poller {
    pub fn new(source: Arc<dyn UpdateSource>, bot: Arc<AlarmBot>, cfg: PollerConfig) -> Self {
        Self {
            source,
            bot,
            cfg,
            cursor: 0,
        }
    }

    /// Next offset to ask for.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// One fetch + in-order handling. Returns the number of updates processed.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let batch = self
            .source
            .fetch(self.cursor, self.cfg.poll_timeout)
            .await?;
        Ok(self.apply(batch).await)
    }

    async fn apply(&mut self, batch: Vec<PolledUpdate>) -> usize {
        let n = batch.len();
        for polled in batch {
            self.bot.handle(polled.update).await;
            if polled.id >= self.cursor {
                self.cursor = polled.id + 1;
            }
        }
        n
    }

    /// Poll until `cancel` fires. Fetch errors are logged and retried after a fixed delay;
    /// cancellation is only observed between batches.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(offset = self.cursor, "inbound polling started");
        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.source.fetch(self.cursor, self.cfg.poll_timeout) => r,
            };

            match fetched {
                Ok(batch) => {
                    let n = self.apply(batch).await;
                    if n > 0 {
                        tracing::debug!(updates = n, offset = self.cursor, "batch handled");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        offset = self.cursor,
                        retry_in = ?self.cfg.retry_delay,
                        "getUpdates failed: {e}"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.cfg.retry_delay) => {}
                    }
                }
            }
        }
        tracing::info!(offset = self.cursor, "inbound polling stopped");
    }
}
