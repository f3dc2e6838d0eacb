//! Configuration management
//!
//! Settings come from an optional TOML file, then an optional named profile,
//! then the `PORT` environment variable, then command-line flags; each layer
//! overrides the one before it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use webgl_host_web::server::{DEFAULT_PORT, DEFAULT_UPLOAD_DIR};
use webgl_host_web::{CacheMode, Capabilities, CompressionSettings, ServerOptions};
use webgl_host_store::DEFAULT_MAX_UPLOAD_BYTES;

/// File picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "webgl-host.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    /// Named profiles that can override base config
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, ProfileConfig>,
}

/// Listener and asset location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the WebGL build
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Alternate directory for `/Build/*` (e.g. an upload volume)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data_dir: Option<PathBuf>,

    #[serde(default = "default_index_file")]
    pub index_file: String,

    #[serde(default)]
    pub cache_mode: CacheMode,
}

/// Memory cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Paths relative to the root, e.g. "Build/game.wasm"
    #[serde(default)]
    pub files: Vec<String>,
}

/// Response compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum body size in bytes
    #[serde(default = "default_threshold")]
    pub threshold: u16,

    #[serde(default = "default_level")]
    pub level: i32,
}

/// Admin upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

/// Profile for overriding settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadConfig>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub root: Option<PathBuf>,
    pub cache_mode: Option<CacheMode>,
    pub memory_cache: Option<bool>,
    pub compression: Option<bool>,
    pub upload: Option<bool>,
    pub upload_dir: Option<PathBuf>,
}

// Default value functions
fn default_host() -> IpAddr { IpAddr::V4(Ipv4Addr::UNSPECIFIED) }
fn default_port() -> u16 { DEFAULT_PORT }
fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_index_file() -> String { "index.html".to_string() }
fn default_threshold() -> u16 { CompressionSettings::default().threshold }
fn default_level() -> i32 { CompressionSettings::default().level }
fn default_upload_dir() -> PathBuf { PathBuf::from(DEFAULT_UPLOAD_DIR) }
fn default_max_bytes() -> u64 { DEFAULT_MAX_UPLOAD_BYTES }
fn default_true() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            root: default_root(),
            build_dir: None,
            template_data_dir: None,
            index_file: default_index_file(),
            cache_mode: CacheMode::default(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let settings = CompressionSettings::default();
        Self {
            enabled: true,
            threshold: settings.threshold,
            level: settings.level,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_upload_dir(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML {:?}", path))
    }

    /// Load `path`, or the default file if it exists, or built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Apply a named profile, merging settings
    ///
    /// Profile settings override base configuration values.
    pub fn apply_profile(mut self, profile_name: &str) -> Result<Self> {
        let profile = self.profiles.get(profile_name)
            .with_context(|| format!("Profile '{}' not found", profile_name))?
            .clone();

        // Merge profile settings (profile overrides base)
        if let Some(server) = profile.server {
            self.server = server;
        }
        if let Some(cache) = profile.cache {
            self.cache = cache;
        }
        if let Some(compression) = profile.compression {
            self.compression = compression;
        }
        if let Some(upload) = profile.upload {
            self.upload = upload;
        }

        Ok(self)
    }

    /// Apply the `PORT` environment variable
    pub fn apply_env(self) -> Result<Self> {
        self.apply_port_var(std::env::var("PORT").ok())
    }

    fn apply_port_var(mut self, port: Option<String>) -> Result<Self> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value '{}'", port))?;
        }
        Ok(self)
    }

    /// Apply command-line flags
    pub fn apply_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(root) = &overrides.root {
            self.server.root = root.clone();
        }
        if let Some(cache_mode) = overrides.cache_mode {
            self.server.cache_mode = cache_mode;
        }
        if let Some(enabled) = overrides.memory_cache {
            self.cache.enabled = enabled;
        }
        if let Some(enabled) = overrides.compression {
            self.compression.enabled = enabled;
        }
        if let Some(enabled) = overrides.upload {
            self.upload.enabled = enabled;
        }
        if let Some(dir) = &overrides.upload_dir {
            self.upload.dir = dir.clone();
        }
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            memory_cache: self.cache.enabled,
            compression: self.compression.enabled,
            upload_endpoint: self.upload.enabled,
        }
    }

    /// Convert into the web server's startup options
    pub fn server_options(&self) -> ServerOptions {
        let mut options = ServerOptions::new(&self.server.root);
        options.host = self.server.host;
        options.port = self.server.port;
        options.build_dir = self.server.build_dir.clone();
        options.template_data_dir = self.server.template_data_dir.clone();
        options.index_file = self.server.index_file.clone();
        options.cache_mode = self.server.cache_mode;
        options.cache_files = self.cache.files.clone();
        options.compression = CompressionSettings {
            threshold: self.compression.threshold,
            level: self.compression.level,
        };
        options.upload_dir = self.upload.dir.clone();
        options.max_upload_bytes = self.upload.max_bytes;
        options.capabilities = self.capabilities();
        options
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
