//! webgl-host web server - static delivery of WebGL builds
//!
//! One configurable pipeline: asset classification, per-class header
//! policy, optional memory cache, filesystem fallback, optional compression
//! and optional admin uploads.

pub mod asset;
pub mod compression;
pub mod conditional;
pub mod error;
pub mod policy;
pub mod routes;
pub mod server;
pub mod state;

pub use asset::{classify, AssetClass};
pub use compression::CompressionSettings;
pub use conditional::Validators;
pub use error::ApiError;
pub use policy::{resolve_headers, CacheMode, CachePolicy, HeaderPolicy};
pub use server::{build_router, serve, Capabilities, ServerOptions};
pub use state::AppState;
