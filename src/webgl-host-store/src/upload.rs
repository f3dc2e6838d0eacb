//! Upload volume storage
//!
//! Uploads are streamed into a temporary file inside the volume directory
//! and renamed into place only once the whole body has been received, so a
//! listing never shows a half-written build file.

use crate::{format_megabytes, Result, StoreError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Largest accepted upload (200 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

const TEMP_PREFIX: &str = ".upload-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A file in the upload volume
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    pub path: PathBuf,
}

/// Directory that admin uploads are written into
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Create the volume directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        debug!("upload directory ready at {:?}", self.dir);
        Ok(())
    }

    /// Start receiving a file that will be stored as `filename`.
    ///
    /// Only the final component of `filename` is kept, so client-side paths
    /// such as `C:\fakepath\app.wasm` store as `app.wasm`.
    pub async fn begin(&self, filename: &str) -> Result<PendingUpload> {
        let filename = sanitize_filename(filename)?;
        let temp_path = self.dir.join(format!(
            "{}{}-{}-{}",
            TEMP_PREFIX,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
            filename
        ));
        let file = File::create(&temp_path).await?;

        Ok(PendingUpload {
            file: Some(file),
            final_path: self.dir.join(&filename),
            temp_path,
            filename,
            written: 0,
            limit: self.max_bytes,
            finished: false,
        })
    }

    /// Regular files in the volume, sorted by name
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if filename.starts_with(TEMP_PREFIX) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                filename,
                size: metadata.len(),
                path: entry.path(),
            });
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }
}

/// An upload that is still being received
pub struct PendingUpload {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    filename: String,
    written: u64,
    limit: u64,
    finished: bool,
}

impl PendingUpload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk. Exceeding the size limit discards the partial file.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let total = self.written + chunk.len() as u64;
        if total > self.limit {
            warn!(
                "rejecting upload {}: more than {} bytes",
                self.filename, self.limit
            );
            self.discard().await;
            return Err(StoreError::TooLarge { limit: self.limit });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("upload already finished"))?;
        file.write_all(chunk).await?;
        self.written = total;
        Ok(())
    }

    /// Flush to disk and move the file to its final name
    pub async fn commit(mut self) -> Result<StoredFile> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| std::io::Error::other("upload already finished"))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        self.finished = true;

        info!(
            "uploaded {} ({})",
            self.filename,
            format_megabytes(self.written)
        );

        Ok(StoredFile {
            filename: self.filename.clone(),
            size: self.written,
            path: self.final_path.clone(),
        })
    }

    /// Drop the partial file
    pub async fn abort(mut self) {
        self.discard().await;
    }

    async fn discard(&mut self) {
        self.file = None;
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = tokio::fs::remove_file(&self.temp_path).await {
            warn!("failed to remove partial upload {:?}: {}", self.temp_path, e);
        }
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Client went away mid-body. Unlink off the async worker when a
        // runtime is around.
        self.file = None;
        let temp_path = std::mem::take(&mut self.temp_path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_partial(&temp_path));
            }
            Err(_) => remove_partial(&temp_path),
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed abandoned upload {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove partial upload {:?}: {}", path, e),
    }
}

fn sanitize_filename(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with(TEMP_PREFIX)
        || name.contains('\0')
    {
        return Err(StoreError::InvalidFilename(raw.to_string()));
    }

    Ok(name.to_string())
}
