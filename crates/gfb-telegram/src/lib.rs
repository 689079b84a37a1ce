//! Telegram adapter (teloxide).
//!
//! Implements the `gfb-core` conversation directory over the Bot API and
//! feeds observed group messages into the routing engine. Telegram bots
//! cannot enumerate their chats, so the directory is a registry learned from
//! observed updates: every update refreshes the title-to-id mapping, and a
//! missing target heals as soon as the target group shows any activity.

use std::collections::HashMap;

use async_trait::async_trait;

use teloxide::prelude::*;
use tokio::sync::Mutex;
use tokio::time::sleep;

use gfb_core::{
    directory::ConversationDirectory,
    domain::ConversationId,
    errors::Error,
    utils::normalize_name,
    Result,
};

pub mod handlers;
pub mod router;

pub struct TelegramDirectory {
    bot: Bot,
    /// Normalized chat title -> chat id, refreshed from every observed update.
    registry: Mutex<HashMap<String, i64>>,
}

impl TelegramDirectory {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub async fn observe_chat(&self, title: &str, chat_id: i64) {
        self.registry
            .lock()
            .await
            .insert(normalize_name(title), chat_id);
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Send(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl ConversationDirectory for TelegramDirectory {
    async fn resolve(&self, name: &str) -> Result<Option<ConversationId>> {
        // Numeric targets address a chat id directly, no registry needed.
        if name.trim().parse::<i64>().is_ok() {
            return Ok(Some(ConversationId(name.trim().to_string())));
        }

        let registry = self.registry.lock().await;
        Ok(registry
            .get(&normalize_name(name))
            .map(|id| ConversationId(id.to_string())))
    }

    async fn send(&self, conversation: &ConversationId, text: &str) -> Result<()> {
        let chat_id: i64 = conversation
            .0
            .parse()
            .map_err(|_| Error::Send(format!("invalid conversation id: {}", conversation.0)))?;

        self.with_retry(|| {
            self.bot
                .send_message(teloxide::types::ChatId(chat_id), text.to_string())
        })
        .await?;
        Ok(())
    }
}
