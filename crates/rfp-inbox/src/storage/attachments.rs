//! Content store for proposal attachments.
//!
//! Bytes are written once under `<root>/<key>` where the key is
//! `<unix-millis>_<safe-name>`. Keys are relative to the root, and every
//! lookup re-checks that the resolved file stays inside it.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::model::Attachment;
use crate::sanitize::redact_path;

const MAX_ATTEMPTS: u32 = 1000;

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "attachment".to_string()
    } else {
        safe
    }
}

/// A stored attachment opened for streaming back to a caller.
#[derive(Debug)]
pub struct StoredContent {
    /// Name to present to the downloader (the key without its timestamp token).
    pub filename: String,
    pub content_length: u64,
    pub media_type: String,
    pub file: tokio::fs::File,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes attachment bytes under a fresh key and returns its descriptor.
    pub async fn put(
        &self,
        filename: &str,
        media_type: &str,
        content: &[u8],
    ) -> Result<Attachment, StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.root.clone(),
                source: e,
            })?;

        let safe = sanitize_filename(filename);
        let millis = Utc::now().timestamp_millis();

        for attempt in 0..MAX_ATTEMPTS {
            let key = if attempt == 0 {
                format!("{}_{}", millis, safe)
            } else {
                format!("{}-{}_{}", millis, attempt, safe)
            };
            let path = self.root.join(&key);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let written = match file.write_all(content).await {
                        Ok(()) => file.flush().await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = written {
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(StorageError::WriteFile { path, source: e });
                    }

                    log::debug!("Stored attachment {} ({} bytes)", key, content.len());
                    return Ok(Attachment {
                        filename: filename.to_string(),
                        key,
                        media_type: media_type.to_string(),
                        size: content.len() as u64,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::Exhausted { name: safe })
    }

    /// Resolves a key to a path inside the root.
    ///
    /// Keys with absolute or parent components are denied outright; keys that
    /// escape through a symlink are denied after canonicalization.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let denied = || StorageError::AccessDenied {
            key: key.to_string(),
        };

        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(denied());
        }

        let not_found = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::ReadFile {
                    path: self.root.join(relative),
                    source: e,
                }
            }
        };

        let root = self.root.canonicalize().map_err(not_found)?;
        let resolved = root.join(relative).canonicalize().map_err(not_found)?;
        if !resolved.starts_with(&root) {
            log::warn!(
                "Refusing attachment key that resolves outside the store: {}",
                redact_path(&resolved)
            );
            return Err(denied());
        }
        if !resolved.is_file() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Opens a stored attachment for reading.
    pub async fn open(&self, key: &str) -> Result<StoredContent, StorageError> {
        let path = self.resolve(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StorageError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
        let metadata = file.metadata().await.map_err(|e| StorageError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let stored_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(key)
            .to_string();
        let filename = match stored_name.split_once('_') {
            Some((_, rest)) if !rest.is_empty() => rest.to_string(),
            _ => stored_name,
        };
        let media_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(StoredContent {
            filename,
            content_length: metadata.len(),
            media_type,
            file,
        })
    }
}
