//! Shared application state

use crate::compression::CompressionSettings;
use crate::policy::{CacheMode, CrossOriginHeaders, HeaderPolicy};
use crate::server::ServerOptions;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use webgl_host_store::{MemoryCache, UploadStore};

/// Directories the delivery pipeline reads from
#[derive(Debug, Clone)]
pub struct AssetRoots {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub template_data_dir: PathBuf,
    /// Entry-point markup served for `/`
    pub index_file: PathBuf,
}

impl AssetRoots {
    /// Filesystem locations that may hold `relative`, in lookup order
    pub fn candidates(&self, relative: &str) -> Vec<PathBuf> {
        let mut candidates = vec![self.root.join(relative)];

        let mounted = [
            ("Build/", &self.build_dir),
            ("TemplateData/", &self.template_data_dir),
        ];
        for (prefix, dir) in mounted {
            if let Some(rest) = relative.strip_prefix(prefix) {
                let candidate = dir.join(rest);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }
}

/// Shared state across all handlers
#[derive(Clone)]
pub struct AppState {
    pub assets: Arc<AssetRoots>,

    /// Headers for disk-served assets, per the configured cache mode
    pub headers: Arc<HeaderPolicy>,

    /// Headers for memory-cache hits (always no-store)
    pub memory_headers: Arc<HeaderPolicy>,

    pub cross_origin: Arc<CrossOriginHeaders>,

    /// Present when the memory cache capability is on
    pub cache: Option<Arc<MemoryCache>>,

    /// Present when the upload endpoint capability is on
    pub uploads: Option<Arc<UploadStore>>,

    /// None disables response compression
    pub compression: Option<CompressionSettings>,

    pub started_at: Instant,
}

impl AppState {
    /// Create application state from already-initialized collaborators
    pub fn new(
        options: &ServerOptions,
        cache: Option<Arc<MemoryCache>>,
        uploads: Option<Arc<UploadStore>>,
    ) -> Self {
        let cross_origin = CrossOriginHeaders::new(uploads.is_some());

        Self {
            assets: Arc::new(AssetRoots {
                root: options.root.clone(),
                build_dir: options.build_dir(),
                template_data_dir: options.template_data_dir(),
                index_file: options.root.join(&options.index_file),
            }),
            headers: Arc::new(HeaderPolicy::new(options.cache_mode, &cross_origin)),
            memory_headers: Arc::new(HeaderPolicy::new(CacheMode::NoStore, &cross_origin)),
            cross_origin: Arc::new(cross_origin),
            cache,
            uploads,
            compression: options
                .capabilities
                .compression
                .then_some(options.compression),
            started_at: Instant::now(),
        }
    }

    /// Preload the memory cache and prepare the upload volume, as enabled
    /// by `options`. Must finish before the listener accepts connections.
    pub async fn initialize(options: &ServerOptions) -> anyhow::Result<Self> {
        let cache = if options.capabilities.memory_cache {
            let cache = MemoryCache::new(&options.root);
            let count = cache
                .preload(&options.cache_files)
                .await
                .context("failed to preload memory cache")?;
            info!("memory cache enabled with {} file(s)", count);
            Some(Arc::new(cache))
        } else {
            None
        };

        let uploads = if options.capabilities.upload_endpoint {
            let store = UploadStore::new(&options.upload_dir, options.max_upload_bytes);
            store
                .ensure_dir()
                .await
                .with_context(|| format!("failed to create upload directory {:?}", options.upload_dir))?;
            info!("upload endpoint enabled, writing to {:?}", options.upload_dir);
            Some(Arc::new(store))
        } else {
            None
        };

        Ok(Self::new(options, cache, uploads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> AssetRoots {
        AssetRoots {
            root: PathBuf::from("/srv/game"),
            build_dir: PathBuf::from("/data/unity-build-cache"),
            template_data_dir: PathBuf::from("/srv/game/TemplateData"),
            index_file: PathBuf::from("/srv/game/index.html"),
        }
    }

    #[test]
    fn test_candidates_include_mounted_dirs() {
        let roots = roots();

        assert_eq!(
            roots.candidates("Build/app.wasm"),
            vec![
                PathBuf::from("/srv/game/Build/app.wasm"),
                PathBuf::from("/data/unity-build-cache/app.wasm"),
            ]
        );
        // Same directory as the root lookup, not repeated
        assert_eq!(
            roots.candidates("TemplateData/style.css"),
            vec![PathBuf::from("/srv/game/TemplateData/style.css")]
        );
        assert_eq!(
            roots.candidates("favicon.ico"),
            vec![PathBuf::from("/srv/game/favicon.ico")]
        );
    }
}
