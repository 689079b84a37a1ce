use std::path::PathBuf;
use std::sync::Mutex;

use crate::Result;

/// Persistence port for the processed-message key list.
///
/// The engine treats persistence as synchronous-enough to survive a restart
/// between any two processed messages; implementations should not defer
/// writes past the `save` call.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Vec<String>>;
    fn save(&self, keys: &[String]) -> Result<()>;
}

/// Production store: a JSON array of keys in a single file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let txt = std::fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = serde_json::from_str(&txt)?;
        Ok(keys)
    }

    fn save(&self, keys: &[String]) -> Result<()> {
        let txt = serde_json::to_string(keys)?;
        std::fs::write(&self.path, txt)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    keys: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self.keys.lock().unwrap().clone())
    }

    fn save(&self, keys: &[String]) -> Result<()> {
        *self.keys.lock().unwrap() = keys.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    #[test]
    fn file_store_round_trips_keys() {
        let store = JsonFileStore::new(tmp_file("gfb-store-test"));
        let keys = vec!["m1".to_string(), "m2".to_string()];
        store.save(&keys).unwrap();
        assert_eq!(store.load().unwrap(), keys);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = JsonFileStore::new("/tmp/gfb-store-does-not-exist.json");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn empty_file_loads_empty() {
        let path = tmp_file("gfb-store-empty-test");
        std::fs::write(&path, "  \n").unwrap();
        let store = JsonFileStore::new(path);
        assert!(store.load().unwrap().is_empty());
    }
}
