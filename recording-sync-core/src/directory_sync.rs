//! Reset-then-populate download of a batch of [`ResourcePair`]s.
//!
//! The target directory is emptied (or created) before the first fetch; each
//! pair is then streamed to `<identifier>.mp3`. A failed pair is logged and
//! skipped, only a failed reset aborts the batch.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::extract::ResourcePair;

pub const DOWNLOAD_EXTENSION: &str = "mp3";
pub const PLACEHOLDER_PREFIX: &str = "unknown_";

/// Why a single pair was skipped. Never escapes the batch.
#[derive(Debug, Error)]
enum FetchError {
    #[error("non-success status {0}")]
    Status(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads resource pairs into a directory it owns exclusively.
#[derive(Debug, Clone, Default)]
pub struct DirectorySync {
    client: reqwest::Client,
}

impl DirectorySync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Reset `dir`, then fetch every pair in order. Returns the paths written,
    /// in input order minus skipped pairs.
    pub async fn sync(
        &self,
        dir: &Path,
        pairs: &[ResourcePair],
    ) -> Result<Vec<PathBuf>, SyncError> {
        reset_directory(dir)?;

        let mut written = Vec::new();
        for (index, pair) in pairs.iter().enumerate() {
            let file_name = download_file_name(pair.identifier.as_deref(), index + 1);
            let dest = dir.join(&file_name);

            match self.fetch_to_file(&pair.locator, &dest).await {
                Ok(bytes) => {
                    info!(path = %dest.display(), bytes, "[DOWNLOAD] Downloaded recording");
                    written.push(dest);
                }
                Err(FetchError::Status(status)) => {
                    warn!(
                        status = %status,
                        url = %pair.locator,
                        "[DOWNLOAD] Skipping recording, server refused"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        url = %pair.locator,
                        "[DOWNLOAD] Skipping recording, fetch failed"
                    );
                    // A failed rewrite also removes what an earlier pair wrote to this name.
                    if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                        written.retain(|p| p != &dest);
                    }
                }
            }
        }

        info!(
            dir = %dir.display(),
            downloaded = written.len(),
            requested = pairs.len(),
            "[DOWNLOAD] Directory sync finished"
        );
        Ok(written)
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let streamed = async {
            let mut written: u64 = 0;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, FetchError>(written)
        }
        .await;
        drop(file);

        if streamed.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                error!(
                    error = ?e,
                    path = %dest.display(),
                    "[DOWNLOAD] Failed to remove partial file"
                );
            }
        }
        streamed
    }
}

/// `<identifier>.mp3`, or `unknown_<index>.mp3` when the identifier is absent,
/// empty or not a plain file name. `index` is 1-based.
pub fn download_file_name(identifier: Option<&str>, index: usize) -> String {
    match identifier {
        Some(id) if is_plain_file_name(id) => format!("{id}.{DOWNLOAD_EXTENSION}"),
        Some(id) if !id.is_empty() => {
            warn!(identifier = id, index, "[DOWNLOAD] Identifier is not a plain file name");
            format!("{PLACEHOLDER_PREFIX}{index}.{DOWNLOAD_EXTENSION}")
        }
        _ => format!("{PLACEHOLDER_PREFIX}{index}.{DOWNLOAD_EXTENSION}"),
    }
}

/// A single normal path component with no separator of either platform.
fn is_plain_file_name(id: &str) -> bool {
    if id.is_empty() || id.contains(&['/', '\\'][..]) {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Remove every entry inside `dir` but keep the directory; create it when missing.
pub fn reset_directory(dir: &Path) -> Result<(), SyncError> {
    let reset_err = |source: std::io::Error| SyncError::Reset {
        path: dir.to_path_buf(),
        source,
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(reset_err)?;
        debug!(path = %dir.display(), "Created download directory");
        return Ok(());
    }

    for entry in fs::read_dir(dir).map_err(reset_err)? {
        let path = entry.map_err(reset_err)?.path();
        // symlink_metadata so a link to a directory is unlinked, not followed.
        let meta = fs::symlink_metadata(&path).map_err(reset_err)?;
        if meta.is_dir() {
            fs::remove_dir_all(&path).map_err(reset_err)?;
        } else {
            fs::remove_file(&path).map_err(reset_err)?;
        }
        debug!(path = %path.display(), "Removed stale entry");
    }
    Ok(())
}
