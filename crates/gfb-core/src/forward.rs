use tracing::warn;

use crate::{
    directory::ConversationDirectory,
    domain::ConversationId,
    routing::RoutingDecision,
    utils::truncate_text,
};

/// Outcome of delivering one routing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardResult {
    Delivered { target: ConversationId },
    /// The directory has no conversation under the target name. Logged, not
    /// retried inline; the directory is consulted fresh on the next message.
    TargetNotFound,
    /// Transport failure from the platform. The caller must not mark the
    /// message processed, so a redelivered event can retry.
    SendFailed { reason: String },
}

/// Resolve the decision's target and deliver its text.
pub async fn forward(
    decision: &RoutingDecision,
    directory: &dyn ConversationDirectory,
) -> ForwardResult {
    let conversation = match directory.resolve(&decision.target).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!("target conversation not found: {}", decision.target);
            return ForwardResult::TargetNotFound;
        }
        Err(e) => {
            warn!("resolving {} failed: {e}", decision.target);
            return ForwardResult::SendFailed {
                reason: e.to_string(),
            };
        }
    };

    match directory.send(&conversation, &decision.text).await {
        Ok(()) => ForwardResult::Delivered {
            target: conversation,
        },
        Err(e) => {
            warn!(
                "send to {} failed ({e}): {}",
                decision.target,
                truncate_text(&decision.text, 80)
            );
            ForwardResult::SendFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, utils::normalize_name, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticDirectory {
        conversations: HashMap<String, ConversationId>,
        sends: Mutex<Vec<(ConversationId, String)>>,
        fail_sends: bool,
    }

    impl StaticDirectory {
        fn with(names: &[(&str, &str)]) -> Self {
            Self {
                conversations: names
                    .iter()
                    .map(|(name, id)| (normalize_name(name), ConversationId(id.to_string())))
                    .collect(),
                sends: Mutex::new(Vec::new()),
                fail_sends: false,
            }
        }
    }

    #[async_trait]
    impl ConversationDirectory for StaticDirectory {
        async fn resolve(&self, name: &str) -> Result<Option<ConversationId>> {
            Ok(self.conversations.get(&normalize_name(name)).cloned())
        }

        async fn send(&self, conversation: &ConversationId, text: &str) -> Result<()> {
            if self.fail_sends {
                return Err(Error::Send("connection reset".to_string()));
            }
            self.sends
                .lock()
                .unwrap()
                .push((conversation.clone(), text.to_string()));
            Ok(())
        }
    }

    fn decision(target: &str) -> RoutingDecision {
        RoutingDecision {
            target: target.to_string(),
            text: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_a_resolved_target() {
        let dir = StaticDirectory::with(&[("Archive", "100")]);
        let result = forward(&decision("archive"), &dir).await;

        assert_eq!(
            result,
            ForwardResult::Delivered {
                target: ConversationId("100".to_string())
            }
        );
        assert_eq!(dir.sends.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_target_reports_not_found() {
        let dir = StaticDirectory::with(&[("Archive", "100")]);
        let result = forward(&decision("Nowhere"), &dir).await;
        assert_eq!(result, ForwardResult::TargetNotFound);
    }

    #[tokio::test]
    async fn transport_error_reports_send_failed() {
        let mut dir = StaticDirectory::with(&[("Archive", "100")]);
        dir.fail_sends = true;

        let result = forward(&decision("Archive"), &dir).await;
        assert!(matches!(result, ForwardResult::SendFailed { .. }));
    }
}
