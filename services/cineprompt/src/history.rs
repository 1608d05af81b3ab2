//! Persisted generation history
//!
//! An append-only, capped list of past (story, prompt) pairs kept newest
//! first in `history.json`. A tokio Mutex serializes writes; every mutation
//! rewrites the file atomically and only then replaces the in-memory list.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::storage::{read_json, write_atomic};

/// One past generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    pub original_input: String,
    pub generated_prompt: String,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
    state: Mutex<Vec<PromptRecord>>,
}

impl HistoryStore {
    /// Load history from `path`, creating an empty file on first start.
    /// A file longer than `limit` is truncated to the newest entries.
    pub async fn load(path: PathBuf, limit: usize) -> common::Result<Self> {
        let records = match read_json::<Vec<PromptRecord>>(&path).await? {
            Some(mut records) => {
                records.truncate(limit);
                info!(path = %path.display(), records = records.len(), "loaded history");
                records
            }
            None => {
                info!(path = %path.display(), "history file not found, starting empty");
                let records = Vec::new();
                write_atomic(&path, &records).await?;
                records
            }
        };

        Ok(Self {
            path,
            limit,
            state: Mutex::new(records),
        })
    }

    /// Record a successful generation at the front, dropping the oldest
    /// entries beyond the limit.
    pub async fn append(
        &self,
        original_input: &str,
        generated_prompt: &str,
    ) -> common::Result<PromptRecord> {
        let record = PromptRecord {
            id: uuid::Uuid::new_v4().to_string(),
            original_input: original_input.to_string(),
            generated_prompt: generated_prompt.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };

        let mut state = self.state.lock().await;
        let mut records = Vec::with_capacity(state.len() + 1);
        records.push(record.clone());
        records.extend(state.iter().cloned());
        records.truncate(self.limit);
        write_atomic(&self.path, &records).await?;

        *state = records;
        debug!(id = %record.id, records = state.len(), "appended history record");
        Ok(record)
    }

    /// All records, newest first.
    pub async fn list(&self) -> Vec<PromptRecord> {
        self.state.lock().await.clone()
    }

    /// Remove one record. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> common::Result<bool> {
        let mut state = self.state.lock().await;
        let records: Vec<PromptRecord> = state.iter().filter(|r| r.id != id).cloned().collect();
        if records.len() == state.len() {
            return Ok(false);
        }
        write_atomic(&self.path, &records).await?;

        *state = records;
        debug!(id, "deleted history record");
        Ok(true)
    }

    pub async fn clear(&self) -> common::Result<()> {
        let mut state = self.state.lock().await;
        write_atomic(&self.path, &Vec::<PromptRecord>::new()).await?;
        state.clear();
        info!("cleared history");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
