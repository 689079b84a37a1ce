use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{dedup::DEFAULT_PROCESSED_CEILING, errors::Error, Result};

/// Typed runtime configuration.
///
/// Rule records live in their own JSON file (`rules_file`), loaded separately
/// by `rules::load_rules_file`; everything here comes from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// JSON rules document. Absence is a fatal startup error.
    pub rules_file: PathBuf,
    /// Persisted processed-message keys. Absence is fine (starts empty).
    pub state_file: PathBuf,
    /// Ceiling for stored dedup keys before bulk truncation.
    pub processed_ceiling: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let rules_file =
            env_path("GFB_RULES_FILE").unwrap_or_else(|| PathBuf::from("./config.json"));
        let state_file = env_path("GFB_STATE_FILE")
            .unwrap_or_else(|| PathBuf::from("/tmp/gfb-processed.json"));
        let processed_ceiling =
            env_usize("GFB_PROCESSED_CEILING").unwrap_or(DEFAULT_PROCESSED_CEILING);

        Ok(Self {
            telegram_bot_token,
            rules_file,
            state_file,
            processed_ceiling,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
