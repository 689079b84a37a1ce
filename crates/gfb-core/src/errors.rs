/// Core error type for the forward bot.
///
/// Adapter crates should map their platform-specific errors into this type so
/// the engine can classify failures consistently (fatal startup config vs
/// recoverable per-message transport errors).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("send error: {0}")]
    Send(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
