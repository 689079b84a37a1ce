use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gfb_core::{
    config::Config,
    dedup::ProcessedSet,
    directory::{
        throttled::{ThrottleConfig, ThrottledDirectory},
        ConversationDirectory,
    },
    domain::MessageEvent,
    engine::ForwardEngine,
    routing::RoutePolicy,
    rules::CompiledRule,
};

use crate::{handlers, TelegramDirectory};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<TelegramDirectory>,
    pub events: mpsc::Sender<MessageEvent>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    rules: Vec<CompiledRule>,
    policy: RoutePolicy,
    processed: ProcessedSet,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("gfb started: @{}", me.username());
    }
    info!("active rules: {}", rules.len());
    info!("processed keys loaded: {}", processed.len());

    // The raw directory wrapped with a throttling decorator: fan-out rules can
    // turn one message into several sends, which is how bots hit flood limits.
    let directory = Arc::new(TelegramDirectory::new(bot.clone()));
    let throttled: Arc<dyn ConversationDirectory> = Arc::new(ThrottledDirectory::new(
        directory.clone(),
        ThrottleConfig::default(),
    ));

    let (tx, rx) = mpsc::channel::<MessageEvent>(64);
    let shutdown = CancellationToken::new();

    let engine = ForwardEngine::new(rules, policy, processed, throttled);
    let engine_task = tokio::spawn(engine.run(rx, shutdown.clone()));

    let state = Arc::new(AppState {
        directory,
        events: tx,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    // Dispatcher returned: let the in-flight message finish, then stop.
    shutdown.cancel();
    let _ = engine_task.await;

    Ok(())
}
