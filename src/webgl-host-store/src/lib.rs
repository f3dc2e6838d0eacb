//! webgl-host-store - Byte storage for webgl-host
//!
//! Two collaborators live here: the memory cache that keeps a fixed set of
//! build files resident for the lifetime of the process, and the upload
//! volume that admin uploads are written into.

mod error;
mod memory;
mod upload;

pub use error::{Result, StoreError};
pub use memory::{CacheEntry, MemoryCache};
pub use upload::{PendingUpload, StoredFile, UploadStore, DEFAULT_MAX_UPLOAD_BYTES};

use std::path::{Component, Path};

/// Byte count in mebibytes
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// Format a byte count as megabytes with two decimals ("12.34 MB")
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", megabytes(bytes))
}

/// True if a relative path stays inside whatever root it is joined onto.
pub fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_megabytes(5 * 1024 * 1024 / 2), "2.50 MB");
        assert_eq!(megabytes(3 * 1024 * 1024), 3.0);
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("Build/app.wasm")));
        assert!(!is_contained(Path::new("../etc/passwd")));
        assert!(!is_contained(Path::new("Build/../../x")));
        assert!(!is_contained(Path::new("/etc/passwd")));
        assert!(!is_contained(Path::new("")));
    }
}
