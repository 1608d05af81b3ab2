//! Key configuration sources
//!
//! The pool can be fed from two places: the comma-separated environment
//! variable read once at start, or a newline-separated list the operator
//! edits at runtime. The edited list is persisted to `keys.json` together
//! with the rotation cursor and wins over the environment on the next start.

use std::path::PathBuf;
use std::sync::Arc;

use common::Secret;
use key_pool::{Delimiter, KeyPool, parse_keys};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::storage::{read_json, remove_file, write_atomic};

/// Where the pool's current keys came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Unconfigured,
    Environment,
    Interactive,
}

/// On-disk form of the interactive key list.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    keys: Vec<String>,
    #[serde(default)]
    cursor: usize,
}

pub struct KeyStore {
    path: PathBuf,
    pool: Arc<KeyPool>,
    env_keys: Option<Secret<String>>,
    source: Mutex<KeySource>,
}

impl KeyStore {
    /// Fill `pool` from the persisted interactive list if one exists,
    /// otherwise from the environment key list.
    pub async fn initialize(
        path: PathBuf,
        pool: Arc<KeyPool>,
        env_keys: Option<Secret<String>>,
    ) -> common::Result<Self> {
        let source = match read_json::<KeyFile>(&path).await? {
            Some(file) => {
                pool.restore(file.keys, file.cursor).await;
                let size = pool.size().await;
                info!(path = %path.display(), keys = size, "using interactive key list");
                KeySource::Interactive
            }
            None => Self::load_env(&pool, env_keys.as_ref()).await,
        };

        Ok(Self {
            path,
            pool,
            env_keys,
            source: Mutex::new(source),
        })
    }

    async fn load_env(pool: &KeyPool, env_keys: Option<&Secret<String>>) -> KeySource {
        match env_keys {
            Some(raw) => {
                pool.load(raw.expose(), Delimiter::Comma).await;
                if pool.is_empty().await {
                    warn!("API key environment variable holds no usable keys");
                    KeySource::Unconfigured
                } else {
                    let size = pool.size().await;
                    info!(keys = size, "using API keys from environment");
                    KeySource::Environment
                }
            }
            None => {
                pool.load("", Delimiter::Comma).await;
                warn!("no API keys configured; set GEMINI_API_KEYS or PUT /keys");
                KeySource::Unconfigured
            }
        }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub async fn source(&self) -> KeySource {
        *self.source.lock().await
    }

    /// Persist an operator-edited newline list, then swap it into the pool.
    /// On a write error the pool and source are left untouched. Returns the
    /// number of usable keys.
    pub async fn replace(&self, raw: &str) -> common::Result<usize> {
        let mut source = self.source.lock().await;
        let keys: Vec<String> = parse_keys(raw, Delimiter::Newline)
            .iter()
            .map(|key| key.expose().clone())
            .collect();
        let file = KeyFile { keys, cursor: 0 };
        write_atomic(&self.path, &file).await?;

        self.pool.restore(file.keys, 0).await;
        *source = KeySource::Interactive;
        let size = self.pool.size().await;
        info!(keys = size, "interactive key list saved");
        Ok(size)
    }

    /// Drop the interactive list and go back to the environment keys.
    pub async fn reset(&self) -> common::Result<KeySource> {
        let mut source = self.source.lock().await;
        remove_file(&self.path).await?;
        *source = Self::load_env(&self.pool, self.env_keys.as_ref()).await;
        Ok(*source)
    }

    /// Save the current cursor when the interactive list is in use, so the
    /// next start resumes from the same key.
    pub async fn persist_cursor(&self) -> common::Result<()> {
        let source = self.source.lock().await;
        if *source != KeySource::Interactive {
            return Ok(());
        }
        let snapshot = self.pool.snapshot().await;
        write_atomic(
            &self.path,
            &KeyFile {
                keys: snapshot.keys,
                cursor: snapshot.cursor,
            },
        )
        .await
    }
}
