use std::sync::Arc;

use gfb_core::{config::Config, dedup::ProcessedSet, rules, store::JsonFileStore};

#[tokio::main]
async fn main() -> Result<(), gfb_core::Error> {
    gfb_core::logging::init("gfb")?;

    let cfg = Arc::new(Config::load()?);

    // Rules file absence is fatal; individual bad rules are not.
    let rules_file = rules::load_rules_file(&cfg.rules_file)?;
    let compiled = rules::compile(&rules_file.rules);
    if compiled.is_empty() {
        tracing::warn!("no usable forwarding rules; the bot will observe but never forward");
    }

    let store = Arc::new(JsonFileStore::new(cfg.state_file.clone()));
    let processed = ProcessedSet::load(store, cfg.processed_ceiling);

    gfb_telegram::router::run_polling(cfg, compiled, rules_file.routing, processed)
        .await
        .map_err(|e| gfb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
