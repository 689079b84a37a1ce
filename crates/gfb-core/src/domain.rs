use chrono::{DateTime, Utc};

/// Platform-assigned conversation id (opaque; numeric on some platforms,
/// `xxx@g.us`-style strings on others).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

/// Sender id within a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SenderId(pub String);

/// One observed message, as delivered by a source adapter.
///
/// `message_id` is the platform's stable id when the source can supply one;
/// DOM-scraped sources cannot, and the dedup layer falls back to a digest of
/// the remaining fields.
#[derive(Clone, Debug)]
pub struct MessageEvent {
    /// Display name (or id) of the conversation the message arrived in.
    pub origin: String,
    pub sender: SenderId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub message_id: Option<String>,
}
