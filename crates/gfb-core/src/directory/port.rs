use async_trait::async_trait;

use crate::{domain::ConversationId, Result};

/// Port onto the platform's conversation directory.
///
/// `resolve` is case-insensitive by contract and consulted per decision at
/// forward time — group membership and naming can change between messages,
/// so the engine never caches the answer. Both calls may suspend on live
/// platform queries; transport-level retry/backoff belongs to the
/// implementation, not the engine.
#[async_trait]
pub trait ConversationDirectory: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Option<ConversationId>>;
    async fn send(&self, conversation: &ConversationId, text: &str) -> Result<()>;
}
