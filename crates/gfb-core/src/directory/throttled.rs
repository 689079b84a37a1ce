use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    directory::port::ConversationDirectory,
    domain::ConversationId,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* platform calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends into one conversation.
    pub per_conversation_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_conversation_min_interval: Duration::from_millis(1050), // ~0.95/sec
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

/// ConversationDirectory decorator that rate-limits outbound calls.
///
/// Fan-out rules can turn one incoming message into several sends; this keeps
/// the bot under platform flood limits without putting timing logic into the
/// engine itself.
pub struct ThrottledDirectory {
    inner: Arc<dyn ConversationDirectory>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_conversation: Mutex<HashMap<ConversationId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledDirectory {
    pub fn new(inner: Arc<dyn ConversationDirectory>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_conversation: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, conversation: &ConversationId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_conversation.lock().await;
        map.entry(conversation.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_conversation_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_send(&self, conversation: &ConversationId) {
        let global_wait = { self.global.lock().await.reserve() };
        let conversation_wait = {
            let lim = self.limiter_for(conversation).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = if global_wait > conversation_wait {
            global_wait
        } else {
            conversation_wait
        };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ConversationDirectory for ThrottledDirectory {
    async fn resolve(&self, name: &str) -> Result<Option<ConversationId>> {
        // Resolution may hit the live platform; global throttling only.
        self.throttle_global().await;
        self.inner.resolve(name).await
    }

    async fn send(&self, conversation: &ConversationId, text: &str) -> Result<()> {
        self.throttle_send(conversation).await;
        self.inner.send(conversation, text).await
    }
}
