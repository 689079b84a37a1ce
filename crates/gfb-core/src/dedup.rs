use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{domain::MessageEvent, store::StateStore};

/// Default ceiling for stored keys.
pub const DEFAULT_PROCESSED_CEILING: usize = 5000;

/// Dedup key for a message: the platform's stable id when the source supplied
/// one, otherwise a digest of `(origin, sender, timestamp, text)`. Identical
/// 4-tuples are indistinguishable on the fallback path and treated as the
/// same message.
pub fn dedup_key(ev: &MessageEvent) -> String {
    if let Some(id) = &ev.message_id {
        if !id.trim().is_empty() {
            return id.clone();
        }
    }

    let mut h = Sha256::new();
    h.update(ev.origin.as_bytes());
    h.update([0x1f]);
    h.update(ev.sender.0.as_bytes());
    h.update([0x1f]);
    h.update(ev.timestamp.to_rfc3339().as_bytes());
    h.update([0x1f]);
    h.update(ev.text.as_bytes());
    hex_digest(&h.finalize())
}

fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Ordered, size-bounded set of processed-message keys.
///
/// Loaded once at startup and persisted through the injected store after each
/// record, so a crash loses at most the last unpersisted append. When the
/// store cannot be read or written the in-memory set keeps functioning for
/// the rest of the process.
pub struct ProcessedSet {
    store: Arc<dyn StateStore>,
    keys: Vec<String>,
    index: HashSet<String>,
    max_keys: usize,
}

impl ProcessedSet {
    pub fn load(store: Arc<dyn StateStore>, max_keys: usize) -> Self {
        let keys = match store.load() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("could not load processed-message state ({e}), starting empty");
                Vec::new()
            }
        };
        let index = keys.iter().cloned().collect();

        Self {
            store,
            keys,
            index,
            max_keys,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Append a key and persist.
    ///
    /// Once the list grows past the ceiling the oldest excess is dropped in
    /// bulk (overflow plus a tenth of the ceiling) so the rewrite cost
    /// amortizes instead of paying a shift per message.
    pub fn record(&mut self, key: String) {
        if self.index.contains(&key) {
            return;
        }

        self.keys.push(key.clone());
        self.index.insert(key);

        if self.keys.len() > self.max_keys {
            let drop_n = (self.keys.len() - self.max_keys) + self.max_keys / 10;
            for dropped in self.keys.drain(..drop_n) {
                self.index.remove(&dropped);
            }
        }

        if let Err(e) = self.store.save(&self.keys) {
            warn!("could not persist processed-message state ({e}), continuing in memory");
        }
    }
}
