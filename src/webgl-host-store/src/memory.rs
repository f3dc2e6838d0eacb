//! Preloaded in-memory asset cache
//!
//! The table is filled exactly once, before the server starts routing
//! requests, and is never mutated afterwards. Lookups therefore need no
//! locking: after initialization the map is only ever read through a shared
//! reference.

use crate::{format_megabytes, is_contained, Result, StoreError};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A whole file held in memory
#[derive(Debug)]
pub struct CacheEntry {
    path: String,
    bytes: Bytes,
}

impl CacheEntry {
    /// Relative path the entry is keyed under
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File contents. Cloning the returned `Bytes` does not copy the buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

type Table = HashMap<String, Arc<CacheEntry>>;

/// Read-only cache of build files, keyed by path relative to the asset root
pub struct MemoryCache {
    root: PathBuf,
    table: OnceCell<Table>,
}

impl MemoryCache {
    /// Create an empty, uninitialized cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            table: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every path in `paths` into memory.
    ///
    /// Returns how many entries were cached. Files that are missing or
    /// unreadable are logged and skipped. The only fatal error is a missing
    /// asset root, which leaves the cache uninitialized.
    ///
    /// Only the first successful call does any work; later calls return the
    /// size of the existing table. Concurrent callers wait for the first one.
    pub async fn preload<I, S>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(table) = self.table.get() {
            debug!("memory cache already initialized, skipping preload");
            return Ok(table.len());
        }

        let paths: Vec<String> = paths
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();

        let table = self
            .table
            .get_or_try_init(|| load_table(&self.root, paths))
            .await?;

        Ok(table.len())
    }

    pub fn is_initialized(&self) -> bool {
        self.table.initialized()
    }

    /// Exact-match lookup. Keys are relative paths without a leading slash.
    pub fn lookup(&self, path: &str) -> Option<Arc<CacheEntry>> {
        self.table.get()?.get(path).cloned()
    }

    /// All entries, sorted by path
    pub fn entries(&self) -> Vec<Arc<CacheEntry>> {
        let mut entries: Vec<_> = self
            .table
            .get()
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    pub fn len(&self) -> usize {
        self.table.get().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all cached buffer sizes
    pub fn total_bytes(&self) -> u64 {
        self.table
            .get()
            .map_or(0, |table| table.values().map(|e| e.size_bytes()).sum())
    }
}

async fn load_table(root: &Path, paths: Vec<String>) -> Result<Table> {
    let root_is_dir = tokio::fs::metadata(root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !root_is_dir {
        return Err(StoreError::RootMissing(root.to_path_buf()));
    }

    info!("loading {} file(s) into memory cache", paths.len());

    let mut table = Table::with_capacity(paths.len());
    for key in paths {
        if !is_contained(Path::new(&key)) {
            warn!("skipping cache entry outside asset root: {}", key);
            continue;
        }

        match tokio::fs::read(root.join(&key)).await {
            Ok(content) => {
                let entry = CacheEntry {
                    path: key.clone(),
                    bytes: Bytes::from(content),
                };
                info!("cached {} ({})", key, format_megabytes(entry.size_bytes()));
                table.insert(key, Arc::new(entry));
            }
            Err(e) => {
                warn!("failed to cache {}: {}", key, e);
            }
        }
    }

    let total: u64 = table.values().map(|e| e.size_bytes()).sum();
    info!(
        "memory cache initialized: {} file(s), {} in memory",
        table.len(),
        format_megabytes(total)
    );

    Ok(table)
}
