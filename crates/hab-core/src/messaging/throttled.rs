use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::ChatId, messaging::port::MessagingPort, Result};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// Broadcasts fan the same text out to every registered chat; this keeps a burst of alarm
/// notifications under Telegram's flood limits. It does not guarantee zero 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: ChatId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.throttle_chat(chat_id).await;
        self.inner.send_message(chat_id, text).await
    }

    async fn send_video(&self, chat_id: ChatId, video: &[u8], caption: &str) -> Result<()> {
        self.throttle_chat(chat_id).await;
        self.inner.send_video(chat_id, video, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        sends: StdMutex<Vec<(ChatId, String)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for Recorder {
        async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
            self.sends.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_video(&self, chat_id: ChatId, _video: &[u8], caption: &str) -> Result<()> {
            self.sends.lock().unwrap().push((chat_id, caption.to_string()));
            Ok(())
        }
    }

    #[test]
    fn limiter_spaces_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_secs(10));
        assert!(lim.reserve().is_zero());
        let second = lim.reserve();
        assert!(second > Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn same_chat_calls_are_spaced() {
        let rec = Arc::new(Recorder::default());
        let throttled = ThrottledMessenger::new(
            rec.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(0),
                per_chat_min_interval: Duration::from_millis(500),
            },
        );

        let start = Instant::now();
        throttled.send_message(ChatId(1), "a").await.unwrap();
        throttled.send_video(ChatId(1), b"v", "b").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));

        let sends = rec.sends.lock().unwrap().clone();
        assert_eq!(
            sends,
            vec![(ChatId(1), "a".to_string()), (ChatId(1), "b".to_string())]
        );
    }
}
