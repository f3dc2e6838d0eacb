//! Axum server setup and routing

use crate::compression::{compression_layer, honor_opt_out, CompressionSettings};
use crate::policy::{CacheMode, CrossOriginHeaders};
use crate::routes;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use webgl_host_store::DEFAULT_MAX_UPLOAD_BYTES;

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_UPLOAD_DIR: &str = "/data/unity-build-cache";

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Optional pieces of the pipeline, fixed at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub memory_cache: bool,
    pub compression: bool,
    pub upload_endpoint: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            memory_cache: false,
            compression: true,
            upload_endpoint: false,
        }
    }
}

/// Everything needed to start a server instance
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: IpAddr,
    pub port: u16,

    /// Directory holding `index.html`, `Build/` and `TemplateData/`
    pub root: PathBuf,

    /// Override for `/Build/*` lookups (defaults to `<root>/Build`)
    pub build_dir: Option<PathBuf>,

    /// Override for `/TemplateData/*` lookups (defaults to `<root>/TemplateData`)
    pub template_data_dir: Option<PathBuf>,

    /// Entry-point markup, relative to `root`
    pub index_file: String,

    pub cache_mode: CacheMode,

    /// Paths relative to `root` loaded into the memory cache
    pub cache_files: Vec<String>,

    pub compression: CompressionSettings,

    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,

    pub capabilities: Capabilities,
}

impl ServerOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            root: root.into(),
            build_dir: None,
            template_data_dir: None,
            index_file: "index.html".to_string(),
            cache_mode: CacheMode::default(),
            cache_files: Vec::new(),
            compression: CompressionSettings::default(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            capabilities: Capabilities::default(),
        }
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir
            .clone()
            .unwrap_or_else(|| self.root.join("Build"))
    }

    pub fn template_data_dir(&self) -> PathBuf {
        self.template_data_dir
            .clone()
            .unwrap_or_else(|| self.root.join("TemplateData"))
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Build the router for an initialized state
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health))
        .route("/cache-status", get(routes::cache_status));

    let mut methods = vec![Method::GET, Method::OPTIONS];
    if let Some(uploads) = &state.uploads {
        let body_limit = usize::try_from(uploads.max_bytes().saturating_add(MULTIPART_OVERHEAD))
            .unwrap_or(usize::MAX);
        app = app
            .route(
                "/admin/upload",
                post(routes::upload_file).layer(DefaultBodyLimit::max(body_limit)),
            )
            .route("/admin/files", get(routes::list_files));
        methods.push(Method::POST);
    }

    let compression = state.compression;
    let cross_origin = state.cross_origin.clone();

    let app = app
        // Static delivery (memory cache, disk, index, 404)
        .fallback(routes::serve_asset)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(methods)
                .allow_headers([header::CONTENT_TYPE]),
        );

    with_middleware(app, compression, cross_origin)
}

/// Outer layers shared by every route: compression, panic recovery,
/// cross-origin headers and request tracing
fn with_middleware(
    mut app: Router,
    compression: Option<CompressionSettings>,
    cross_origin: Arc<CrossOriginHeaders>,
) -> Router {
    if let Some(settings) = compression {
        app = app
            .layer(compression_layer(settings))
            .layer(middleware::from_fn(honor_opt_out));
    }

    app.layer(CatchPanicLayer::custom(panic_response))
        // Outside the panic handler so even 500s carry cross-origin headers
        .layer(middleware::map_response(move |mut response: Response| {
            let cross_origin = cross_origin.clone();
            async move {
                cross_origin.apply(response.headers_mut());
                response
            }
        }))
        .layer(TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("handler panicked: {}", detail);

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

/// Start the web server
pub async fn serve(options: ServerOptions) -> anyhow::Result<()> {
    // Preload completes before the listener exists
    let state = AppState::initialize(&options).await?;
    let app = build_router(state);

    let addr = options.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("serving {:?} on http://{}", options.root, addr);
    info!(
        "cache mode: {}, memory cache: {}, compression: {}, uploads: {}",
        options.cache_mode,
        options.capabilities.memory_cache,
        options.capabilities.compression,
        options.capabilities.upload_endpoint
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received shutdown signal");
}
