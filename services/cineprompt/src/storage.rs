//! Atomic JSON state files
//!
//! History and the interactive key list are both small JSON documents
//! rewritten in full on every change. Writes go to a temp file in the same
//! directory and are renamed over the target, so a crash never leaves a
//! half-written file behind.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Read and parse a JSON state file. `Ok(None)` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> common::Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize `data` and atomically replace `path` with it.
///
/// File permissions are set to 0600 (owner read/write only) since the key
/// file holds API keys.
pub async fn write_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> common::Result<()> {
    let json = serde_json::to_string_pretty(data)?;

    let dir = path
        .parent()
        .ok_or_else(|| common::Error::Config(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("state");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes()).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms).await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;

    debug!(path = %path.display(), "persisted state file");
    Ok(())
}

/// Delete a state file; a file that is already gone is fine.
pub async fn remove_file(path: &Path) -> common::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
