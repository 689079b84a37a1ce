use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dedup::{dedup_key, ProcessedSet},
    directory::ConversationDirectory,
    domain::MessageEvent,
    forward::{forward, ForwardResult},
    routing::{route, RoutePolicy},
    rules::CompiledRule,
    utils::{normalize_name, truncate_text},
};

/// Per-message outcome, for logging and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No rule listens on the message's origin.
    NoRule,
    /// The message's key is already recorded.
    Duplicate,
    /// Rules listen on the origin but none fired.
    NoMatch,
    Forwarded { delivered: usize, failed: usize },
}

/// The routing engine: one instance, explicitly constructed with its rules,
/// dedup store and directory handle.
///
/// All mutable state is owned here and driven by a single sequential loop, so
/// no locking discipline beyond that loop is required.
pub struct ForwardEngine {
    rules: Vec<CompiledRule>,
    policy: RoutePolicy,
    processed: ProcessedSet,
    directory: Arc<dyn ConversationDirectory>,
}

impl ForwardEngine {
    pub fn new(
        rules: Vec<CompiledRule>,
        policy: RoutePolicy,
        processed: ProcessedSet,
        directory: Arc<dyn ConversationDirectory>,
    ) -> Self {
        Self {
            rules,
            policy,
            processed,
            directory,
        }
    }

    /// Process one message: origin fast path, dedup check, rule evaluation,
    /// forward fan-out, dedup record.
    ///
    /// Never returns an error; failures local to one message are logged and
    /// must not abort processing of subsequent messages.
    pub async fn handle_event(&mut self, ev: &MessageEvent) -> Outcome {
        // Fast path: if no rule listens on this origin there is nothing to
        // do — no preprocessing, no dedup lookup.
        let origin = normalize_name(&ev.origin);
        if !self.rules.iter().any(|r| r.origin == origin) {
            return Outcome::NoRule;
        }

        // One dedup check per message, not per rule.
        let key = dedup_key(ev);
        if self.processed.contains(&key) {
            debug!("duplicate message {key}, skipping");
            return Outcome::Duplicate;
        }

        let decisions = route(ev, &self.rules, self.policy);
        if decisions.is_empty() {
            return Outcome::NoMatch;
        }

        let mut delivered = 0usize;
        let mut failed = 0usize;
        for decision in &decisions {
            match forward(decision, self.directory.as_ref()).await {
                ForwardResult::Delivered { target } => {
                    info!(
                        "forwarded to {} ({}): {}",
                        decision.target,
                        target.0,
                        truncate_text(&decision.text, 80)
                    );
                    delivered += 1;
                }
                ForwardResult::TargetNotFound | ForwardResult::SendFailed { .. } => {
                    failed += 1;
                }
            }
        }

        // The key is recorded only after a successful forward; a message
        // whose every decision failed stays eligible for redelivery retry.
        if delivered > 0 {
            self.processed.record(key);
        }

        Outcome::Forwarded { delivered, failed }
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }

    /// Sequential event loop: one message fully handled (rule evaluation,
    /// forwarding, dedup recording) before the next is taken. On shutdown the
    /// in-flight message completes; unprocessed queue entries are dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<MessageEvent>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("engine loop stopping");
                    break;
                }
                maybe = rx.recv() => {
                    let Some(ev) = maybe else {
                        info!("event source closed, engine loop stopping");
                        break;
                    };
                    match self.handle_event(&ev).await {
                        Outcome::Forwarded { delivered, failed } if failed > 0 => {
                            warn!(
                                "message from {}: {delivered} forwarded, {failed} failed",
                                ev.origin
                            );
                        }
                        outcome => debug!("message from {}: {outcome:?}", ev.origin),
                    }
                }
            }
        }
    }
}
