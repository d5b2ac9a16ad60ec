//! File-backed asset storage.
//!
//! Assets are written as `{hash}{ext}` under a single flat directory, where
//! the hash is derived from the source URL and the extension from the mime
//! type. The directory is the only durable state the capture core owns;
//! lookups never need an index file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;

use super::hash::asset_key;
use super::mime::{extension_for_mime, mime_for_extension};
use crate::Error;

/// Configuration for an [`AssetCache`] instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the cached asset files.
    pub directory: PathBuf,
}

/// A cached binary sub-resource.
#[derive(Debug, Clone)]
pub struct CachedAsset {
    /// Hex digest of the source URL; primary key.
    pub hash: String,
    /// Mime type, as stored or as recovered from the file extension.
    pub mime_type: String,
    /// Raw payload.
    pub data: Bytes,
}

/// Durable, content-addressed storage for binary sub-resources.
///
/// Construct one instance per cache directory and pass it by reference into
/// the interceptor and orchestrator; tests get their own temp-directory
/// instance.
#[derive(Debug, Clone)]
pub struct AssetCache {
    directory: PathBuf,
}

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

impl AssetCache {
    /// Create a cache over the configured directory.
    ///
    /// The directory is created lazily; every `store`/`retrieve` re-ensures
    /// it, so a directory deleted out from under a long-lived cache heals on
    /// the next operation.
    pub fn new(config: CacheConfig) -> Self {
        Self { directory: config.directory }
    }

    /// The directory this cache writes into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the cache directory if absent and correct its permission bits.
    ///
    /// Idempotent and best-effort: failures are logged and swallowed so a
    /// mis-permissioned cache degrades to "works but uncached" rather than
    /// aborting the capture. Subsequent writes retry creation.
    pub async fn ensure_directory(&self) {
        if tokio::fs::metadata(&self.directory).await.is_err() {
            if let Err(e) = tokio::fs::create_dir_all(&self.directory).await {
                tracing::warn!(directory = %self.directory.display(), error = %e, "failed to create cache directory");
                return;
            }
        }

        #[cfg(unix)]
        self.fix_directory_mode().await;
    }

    #[cfg(unix)]
    async fn fix_directory_mode(&self) {
        use std::os::unix::fs::PermissionsExt;

        match tokio::fs::metadata(&self.directory).await {
            Ok(meta) => {
                let mode = meta.permissions().mode() & 0o777;
                if mode != DIR_MODE {
                    let perms = std::fs::Permissions::from_mode(DIR_MODE);
                    if let Err(e) = tokio::fs::set_permissions(&self.directory, perms).await {
                        tracing::warn!(directory = %self.directory.display(), error = %e, "failed to fix cache directory permissions");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(directory = %self.directory.display(), error = %e, "failed to stat cache directory");
            }
        }
    }

    /// Store a payload under the hash of its source URL.
    ///
    /// A repeat store for the same URL overwrites the same file. If the
    /// write fails because the directory vanished, the directory is
    /// re-created and the write retried once; any other failure propagates.
    pub async fn store(&self, url: &str, data: &[u8], mime_type: &str) -> Result<CachedAsset, Error> {
        self.ensure_directory().await;

        let hash = asset_key(url);
        let filename = format!("{hash}{}", extension_for_mime(mime_type));
        let path = self.directory.join(&filename);

        match self.write_file(&path, data).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.ensure_directory().await;
                self.write_file(&path, data).await?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(url, path = %path.display(), bytes = data.len(), "stored asset");

        Ok(CachedAsset { hash, mime_type: mime_type.to_string(), data: Bytes::copy_from_slice(data) })
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, data).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(FILE_MODE);
            if let Err(e) = tokio::fs::set_permissions(path, perms).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to set asset file permissions");
            }
        }

        Ok(())
    }

    /// Look up the cached payload for a URL.
    ///
    /// The directory scan matches any filename starting with the URL hash,
    /// so entries survive mime-type (and therefore extension) drift. An
    /// unreadable file, like a missing one, is a miss rather than an error.
    pub async fn retrieve(&self, url: &str) -> Option<CachedAsset> {
        let hash = asset_key(url);

        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(directory = %self.directory.display(), error = %e, "cache directory not readable");
                return None;
            }
        };

        let path = loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if entry.file_name().to_string_lossy().starts_with(&hash) {
                        break entry.path();
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(directory = %self.directory.display(), error = %e, "cache directory scan failed");
                    return None;
                }
            }
        };

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cached file exists but is not readable");
                return None;
            }
        };

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mime_type = mime_for_extension(ext).to_string();

        tracing::debug!(url, path = %path.display(), "cache hit");

        Some(CachedAsset { hash, mime_type, data: Bytes::from(data) })
    }

    /// Delete every file in the cache directory.
    ///
    /// Per-file failures are logged and skipped. Returns the number of files
    /// removed.
    pub async fn clear(&self) -> u64 {
        self.remove_matching(|_| true).await
    }

    /// Delete cached files whose modification time is older than `max_age`.
    ///
    /// Returns the number of files removed. Meant for periodic housekeeping
    /// by an external caller; a capture session never sweeps on its own.
    pub async fn sweep_older_than(&self, max_age: Duration) -> u64 {
        self.remove_matching(|age| age > max_age).await
    }

    async fn remove_matching(&self, should_remove: impl Fn(Duration) -> bool) -> u64 {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(directory = %self.directory.display(), error = %e, "cache directory not readable");
                return 0;
            }
        };

        let mut removed = 0u64;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();

            let age = match entry.metadata().await {
                Ok(meta) => meta
                    .modified()
                    .ok()
                    .and_then(|m| std::time::SystemTime::now().duration_since(m).ok())
                    .unwrap_or(Duration::ZERO),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to stat cached file");
                    continue;
                }
            };

            if !should_remove(age) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete cached file");
                }
            }
        }

        removed
    }
}
