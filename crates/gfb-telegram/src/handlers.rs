use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use gfb_core::domain::{MessageEvent, SenderId};

use crate::router::AppState;

/// Convert an observed Telegram message into a core event and hand it to the
/// engine channel. The handler itself never forwards anything; ordering and
/// dedup discipline live in the engine's sequential loop.
pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text().map(|s| s.to_string()) else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };

    // Group chats carry the display name rules target; refresh the directory
    // registry on every update so resolution stays current. Chats without a
    // title (private chats) are addressed by id.
    let origin = match msg.chat.title() {
        Some(title) => {
            state.directory.observe_chat(title, msg.chat.id.0).await;
            title.to_string()
        }
        None => msg.chat.id.0.to_string(),
    };

    let sender = user
        .username
        .clone()
        .unwrap_or_else(|| user.id.0.to_string());

    let event = MessageEvent {
        origin,
        sender: SenderId(sender),
        timestamp: msg.date,
        text,
        // Telegram message ids are stable per chat; combined with the chat id
        // they make a globally unique dedup key.
        message_id: Some(format!("{}:{}", msg.chat.id.0, msg.id.0)),
    };

    if state.events.send(event).await.is_err() {
        warn!("engine loop is gone, dropping message");
    }

    Ok(())
}
