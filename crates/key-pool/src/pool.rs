//! Ordered API key list with a rotation cursor
//!
//! The pool is replaced wholesale on every `load` and rotates strictly
//! round-robin on `advance`. The key list sits behind a `RwLock` and the
//! cursor in an `AtomicUsize`; `load` rewrites both while holding the write
//! lock, so the cursor is always a valid index whenever the list is non-empty.
//!
//! Readers receive cloned keys, so a request already in flight keeps the key
//! it started with even if the pool is reconfigured underneath it.

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Credential, Secret};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Separator between keys in a raw configuration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Interactive editing: one key per line
    Newline,
    /// Environment variable: comma-separated
    Comma,
}

impl Delimiter {
    fn as_char(self) -> char {
        match self {
            Delimiter::Newline => '\n',
            Delimiter::Comma => ',',
        }
    }
}

/// The key at the cursor together with its index, read in one snapshot.
#[derive(Debug, Clone)]
pub struct SelectedKey {
    pub index: usize,
    pub key: Credential,
}

/// Raw pool contents for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub keys: Vec<String>,
    pub cursor: usize,
}

/// Split, trim and drop empty entries. Never fails: garbage in, empty out.
pub fn parse_keys(raw: &str, delimiter: Delimiter) -> Vec<Credential> {
    raw.split(delimiter.as_char())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| Secret::new(k.to_string()))
        .collect()
}

/// Ordered pool of API keys with a round-robin cursor.
pub struct KeyPool {
    keys: RwLock<Vec<Credential>>,
    cursor: AtomicUsize,
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyPool {
    /// Empty pool. Generation fails with `ConfigurationMissing` until loaded.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pool pre-loaded from a raw configuration string.
    pub fn from_config(raw: &str, delimiter: Delimiter) -> Self {
        let keys = parse_keys(raw, delimiter);
        info!(keys = keys.len(), ?delimiter, "key pool initialized");
        Self {
            keys: RwLock::new(keys),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Replace the key list from a raw configuration string and reset the
    /// cursor to the first key.
    pub async fn load(&self, raw: &str, delimiter: Delimiter) {
        let parsed = parse_keys(raw, delimiter);
        let mut keys = self.keys.write().await;
        *keys = parsed;
        self.cursor.store(0, Ordering::Relaxed);
        info!(keys = keys.len(), ?delimiter, "key pool reloaded");
    }

    /// Replace the key list from persisted state, keeping the saved cursor.
    ///
    /// Entries are normalized the same way `load` does; a cursor beyond the
    /// list wraps around.
    pub async fn restore(&self, raw_keys: Vec<String>, cursor: usize) {
        let parsed: Vec<Credential> = raw_keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Secret::new)
            .collect();
        let mut keys = self.keys.write().await;
        let restored = if parsed.is_empty() {
            0
        } else {
            cursor % parsed.len()
        };
        *keys = parsed;
        self.cursor.store(restored, Ordering::Relaxed);
        info!(keys = keys.len(), cursor = restored, "key pool restored");
    }

    /// Key at the cursor, or `None` for an empty pool.
    pub async fn current(&self) -> Option<Credential> {
        self.selected().await.map(|s| s.key)
    }

    /// Key at the cursor with its index.
    pub async fn selected(&self) -> Option<SelectedKey> {
        let keys = self.keys.read().await;
        let index = self.cursor.load(Ordering::Relaxed);
        keys.get(index).map(|key| SelectedKey {
            index,
            key: key.clone(),
        })
    }

    /// Move the cursor to the next key, wrapping at the end. No-op when empty.
    pub async fn advance(&self) {
        let keys = self.keys.read().await;
        let n = keys.len();
        if n == 0 {
            return;
        }
        let previous = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % n))
            .unwrap_or_else(|c| c);
        debug!(from = previous, to = (previous + 1) % n, "advanced key cursor");
    }

    /// Number of keys in the pool.
    pub async fn size(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.size().await == 0
    }

    /// Cursor position, or `None` for an empty pool.
    pub async fn cursor(&self) -> Option<usize> {
        let keys = self.keys.read().await;
        if keys.is_empty() {
            None
        } else {
            Some(self.cursor.load(Ordering::Relaxed))
        }
    }

    /// Keys rendered for display, in pool order.
    pub async fn masked(&self) -> Vec<String> {
        self.keys.read().await.iter().map(|k| k.masked()).collect()
    }

    /// Raw keys and cursor for writing the interactive key file.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let keys = self.keys.read().await;
        PoolSnapshot {
            keys: keys.iter().map(|k| k.expose().clone()).collect(),
            cursor: self.cursor.load(Ordering::Relaxed),
        }
    }
}
